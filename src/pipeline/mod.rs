//! Video ingestion pipeline
//!
//! webhook → [`retriever`] → [`orchestrator`] → [`recorder`] → [`notifier`]
//!
//! [`retry`] and [`manual`] re-enter later, driven by an operator through
//! chat buttons or the operator API.

use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::Database;
use crate::telegram::{AccessPolicy, MessagingClient, Update};

pub mod ingest;
pub mod manual;
pub mod notifier;
pub mod orchestrator;
pub mod providers;
pub mod recorder;
pub mod retriever;
pub mod retry;
pub mod webhook;

pub use ingest::{IngestOutcome, IngestRequest, IngestionService};
pub use manual::ManualResolution;
pub use notifier::Notifier;
pub use orchestrator::{DualUploadOrchestrator, DualUploadOutcome, UploadClassification};
pub use providers::{ProviderRegistry, UploadFile, UploadProvider};
pub use retriever::FileRetriever;
pub use retry::{RetryDispatcher, RetryOutcome};
pub use webhook::{UpdateDisposition, UpdateHandler};

/// All pipeline services, wired once at startup
#[derive(Clone)]
pub struct Pipeline {
    pub ingest: Arc<IngestionService>,
    pub retry: Arc<RetryDispatcher>,
    pub manual: Arc<ManualResolution>,
    pub updates: Arc<UpdateHandler>,
    pub notifier: Arc<Notifier>,
    pub messaging: Arc<dyn MessagingClient>,
    /// Webhook updates still being handled; drained before shutdown
    pub tasks: TaskTracker,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        database: Database,
        messaging: Arc<dyn MessagingClient>,
        providers: ProviderRegistry,
    ) -> Self {
        let retriever = Arc::new(FileRetriever::new(
            messaging.clone(),
            config.telegram.max_file_size,
        ));
        let orchestrator = Arc::new(DualUploadOrchestrator::new(
            providers,
            config.providers.upload_timeout,
        ));
        let notifier = Arc::new(Notifier::new(
            messaging.clone(),
            config.telegram.operator_chat_id,
            &config.providers,
        ));

        let ingest = Arc::new(IngestionService::new(
            retriever.clone(),
            orchestrator.clone(),
            recorder::VideoRecordWriter::new(database.clone()),
            recorder::FailureRecorder::new(database.clone(), config.retry.max_attempts),
            notifier.clone(),
        ));
        let retry = Arc::new(RetryDispatcher::new(
            database.clone(),
            retriever,
            orchestrator,
            notifier.clone(),
            config.retry.max_attempts,
            config.retry.claim_ttl,
        ));
        let manual = Arc::new(ManualResolution::new(database, config.retry.claim_ttl));
        let updates = Arc::new(UpdateHandler::new(
            AccessPolicy::from_config(&config.telegram),
            messaging.clone(),
            ingest.clone(),
            retry.clone(),
            notifier.clone(),
        ));

        Self {
            ingest,
            retry,
            manual,
            updates,
            notifier,
            messaging,
            tasks: TaskTracker::new(),
        }
    }

    /// Handle `update` in a tracked background task
    pub fn spawn_update(&self, update: Update) {
        let updates = self.updates.clone();
        self.tasks.spawn(async move {
            let update_id = update.update_id;
            let disposition = updates.handle(update).await;
            debug!("Update {} finished: {:?}", update_id, disposition);
        });
    }

    /// Wait for every in-flight update to finish
    pub async fn drain(&self) {
        self.tasks.close();
        if !self.tasks.is_empty() {
            info!("Waiting for {} in-flight update(s)", self.tasks.len());
        }
        self.tasks.wait().await;
    }
}
