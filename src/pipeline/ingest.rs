//! Webhook-triggered ingestion: retrieve, dual upload, record, reply.

use std::sync::Arc;
use tracing::{info, warn};

use super::notifier::{Notifier, ReplyTarget};
use super::orchestrator::{DualUploadOrchestrator, DualUploadOutcome, UploadClassification};
use super::providers::UploadFile;
use super::recorder::{FailureRecorder, VideoRecordWriter, VideoSource};
use super::retriever::FileRetriever;
use crate::errors::{PersistenceError, RetrievalError};
use crate::models::{UploadFailureRecord, VideoRecord};
use crate::telegram::VideoAttachment;

/// One inbound video
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub chat_id: i64,
    pub message_id: i64,
    pub attachment: VideoAttachment,
    pub caption: Option<String>,
}

#[derive(Debug)]
pub enum IngestOutcome {
    /// Source could not be fetched; nothing uploaded, nothing stored
    RetrievalFailed(RetrievalError),
    /// Both providers failed; no record written
    UploadFailed(DualUploadOutcome),
    /// Record written (full or partial success)
    Stored {
        video: VideoRecord,
        classification: UploadClassification,
        failures: Vec<UploadFailureRecord>,
    },
    /// Uploads exist remotely but the video record was not written
    PersistenceFailed(PersistenceError),
}

/// First non-empty caption line is the title, the rest the description.
/// Without a caption the file name stem becomes the title.
pub fn split_caption(caption: Option<&str>, file_name: &str) -> (String, Option<String>) {
    let caption = caption.map(str::trim).filter(|c| !c.is_empty());
    if let Some(caption) = caption {
        let mut lines = caption.lines().skip_while(|line| line.trim().is_empty());
        if let Some(first) = lines.next() {
            let rest = lines.collect::<Vec<_>>().join("\n");
            let rest = rest.trim();
            let description = (!rest.is_empty()).then(|| rest.to_string());
            return (first.trim().to_string(), description);
        }
    }

    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_name);
    (stem.to_string(), None)
}

pub struct IngestionService {
    retriever: Arc<FileRetriever>,
    orchestrator: Arc<DualUploadOrchestrator>,
    writer: VideoRecordWriter,
    failures: FailureRecorder,
    notifier: Arc<Notifier>,
}

impl IngestionService {
    pub fn new(
        retriever: Arc<FileRetriever>,
        orchestrator: Arc<DualUploadOrchestrator>,
        writer: VideoRecordWriter,
        failures: FailureRecorder,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            retriever,
            orchestrator,
            writer,
            failures,
            notifier,
        }
    }

    /// Run one ingestion attempt. Sends exactly one chat reply.
    pub async fn ingest(&self, request: IngestRequest) -> IngestOutcome {
        let target = ReplyTarget {
            chat_id: request.chat_id,
            message_id: Some(request.message_id),
        };
        let attachment = &request.attachment;
        info!(
            "Ingesting '{}' from chat {} message {}",
            attachment.file_name, request.chat_id, request.message_id
        );

        let bytes = match self
            .retriever
            .retrieve(&attachment.file_id, attachment.file_size)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Retrieval of '{}' failed: {}", attachment.file_name, e);
                self.notifier
                    .deliver(self.notifier.compose_retrieval_failure(target, &attachment.file_name, &e))
                    .await;
                return IngestOutcome::RetrievalFailed(e);
            }
        };

        let (title, description) = split_caption(request.caption.as_deref(), &attachment.file_name);
        let file = UploadFile {
            bytes,
            file_name: attachment.file_name.clone(),
            title: title.clone(),
            mime_type: attachment.mime_type.clone(),
        };

        let outcome = self.orchestrator.upload_both(&file).await;
        let classification = outcome.classification();
        if classification == UploadClassification::Failure {
            self.notifier
                .deliver(self.notifier.compose_upload_failure(target, &attachment.file_name, &outcome))
                .await;
            return IngestOutcome::UploadFailed(outcome);
        }

        let source = VideoSource {
            title,
            description,
            file_name: attachment.file_name.clone(),
            file_size: file.len() as i64,
            mime_type: attachment.mime_type.clone(),
            source_file_id: attachment.file_id.clone(),
            source_chat_id: request.chat_id,
            source_message_id: request.message_id,
        };

        let video = match self.writer.write(&source, &outcome).await {
            Ok(video) => video,
            Err(e) => {
                self.notifier.alert_persistence(&e).await;
                self.notifier
                    .deliver(self.notifier.compose_persistence_failure(target, &attachment.file_name))
                    .await;
                return IngestOutcome::PersistenceFailed(e);
            }
        };

        let failures = match self.failures.record(video.id, &outcome.errors).await {
            Ok(failures) => failures,
            Err(e) => {
                // the video is stored; only the failure tracking is missing
                self.notifier.alert_persistence(&e).await;
                Vec::new()
            }
        };

        self.notifier
            .deliver(
                self.notifier
                    .compose_ingest_result(target, &video, &outcome, &failures),
            )
            .await;

        IngestOutcome::Stored {
            video,
            classification,
            failures,
        }
    }
}
