//! Retry Dispatcher
//!
//! Re-runs the File Retriever and the single failed adapter for one
//! unresolved failure. Concurrent retries of the same pair are serialized
//! through the `retry_started_at` claim, which is only taken when
//! `attempt_count` still matches what was read.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::notifier::Notifier;
use super::orchestrator::DualUploadOrchestrator;
use super::providers::UploadFile;
use super::retriever::FileRetriever;
use crate::database::{Database, ResolvePrecondition};
use crate::errors::{AppError, AppResult, OrphanedUpload, PersistenceError};
use crate::models::{ErrorDetails, Provider, UploadFailureRecord, VideoRecord};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetryOutcome {
    /// Handle filled and failure closed
    Resolved {
        failure: UploadFailureRecord,
        video: VideoRecord,
    },
    /// Attempt counted; `failure` carries the new attempt count
    Failed {
        failure: UploadFailureRecord,
        error: String,
    },
}

pub struct RetryDispatcher {
    database: Database,
    retriever: Arc<FileRetriever>,
    orchestrator: Arc<DualUploadOrchestrator>,
    notifier: Arc<Notifier>,
    max_attempts: u32,
    claim_ttl: Duration,
}

impl RetryDispatcher {
    pub fn new(
        database: Database,
        retriever: Arc<FileRetriever>,
        orchestrator: Arc<DualUploadOrchestrator>,
        notifier: Arc<Notifier>,
        max_attempts: u32,
        claim_ttl: Duration,
    ) -> Self {
        Self {
            database,
            retriever,
            orchestrator,
            notifier,
            max_attempts,
            claim_ttl,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Retry the unresolved failure of `provider` for `video_id`, as
    /// addressed by chat retry buttons
    pub async fn retry_for_video(&self, video_id: Uuid, provider: Provider) -> AppResult<RetryOutcome> {
        let failure = self
            .database
            .find_unresolved_failure(video_id, provider)
            .await?
            .ok_or_else(|| {
                AppError::not_found("unresolved upload failure", format!("{video_id}/{provider}"))
            })?;
        self.retry(failure.id).await
    }

    pub async fn retry(&self, failure_id: Uuid) -> AppResult<RetryOutcome> {
        let failure = self
            .database
            .get_upload_failure(failure_id)
            .await?
            .ok_or_else(|| AppError::not_found("upload failure", failure_id.to_string()))?;
        Self::check_retryable(&failure)?;

        let now = Utc::now();
        let claim_ttl = chrono::Duration::from_std(self.claim_ttl)
            .map_err(|e| AppError::configuration(format!("retry.claim_ttl out of range: {e}")))?;
        let attempt = failure.attempt_count;
        if !self
            .database
            .claim_retry(failure_id, attempt, now, now - claim_ttl)
            .await?
        {
            return Err(self.explain_lost_claim(failure_id).await);
        }
        info!(
            "Retrying {} for video {} (failure {}, attempt {})",
            failure.provider,
            failure.video_id,
            failure_id,
            attempt + 1
        );

        match self.attempt(&failure).await {
            Ok(Ok(code)) => self.finish_success(&failure, code).await,
            Ok(Err(details)) => self.finish_failure(&failure, details).await,
            Err(e) => {
                if let Err(release) = self.database.release_retry_claim(failure_id, attempt).await {
                    warn!("Could not release retry claim on {}: {}", failure_id, release);
                }
                Err(e)
            }
        }
    }

    fn check_retryable(failure: &UploadFailureRecord) -> AppResult<()> {
        if failure.is_resolved() {
            return Err(AppError::conflict(format!(
                "upload failure {} is already resolved",
                failure.id
            )));
        }
        if failure.requires_manual_upload {
            return Err(AppError::RetryExhausted {
                failure_id: failure.id.to_string(),
                attempt_count: failure.attempt_count,
            });
        }
        Ok(())
    }

    /// Re-read after a refused claim to report the precise reason
    async fn explain_lost_claim(&self, failure_id: Uuid) -> AppError {
        match self.database.get_upload_failure(failure_id).await {
            Ok(Some(current)) => match Self::check_retryable(&current) {
                Err(e) => e,
                Ok(()) => AppError::conflict(format!(
                    "a retry of upload failure {failure_id} is already in progress"
                )),
            },
            Ok(None) => AppError::not_found("upload failure", failure_id.to_string()),
            Err(e) => e.into(),
        }
    }

    /// Fetch and upload. The inner result is the attempt's outcome; the
    /// outer error means the attempt could not be made at all.
    async fn attempt(&self, failure: &UploadFailureRecord) -> AppResult<Result<String, ErrorDetails>> {
        let video = self
            .database
            .get_video(failure.video_id)
            .await?
            .ok_or_else(|| AppError::not_found("video", failure.video_id.to_string()))?;

        let declared = u64::try_from(video.file_size).ok();
        let bytes = match self.retriever.retrieve(&video.source_file_id, declared).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Retry retrieval for video {} failed: {}", video.id, e);
                return Ok(Err(e.details()));
            }
        };

        let file = UploadFile {
            bytes,
            file_name: video.file_name.clone(),
            title: video.title.clone(),
            mime_type: video.mime_type.clone(),
        };
        Ok(self
            .orchestrator
            .upload_one(failure.provider, &file)
            .await
            .map_err(|e| e.details()))
    }

    async fn finish_success(
        &self,
        failure: &UploadFailureRecord,
        code: String,
    ) -> AppResult<RetryOutcome> {
        let precondition = ResolvePrecondition::RetryClaim {
            expected_attempt: failure.attempt_count,
        };
        let orphaned = || {
            vec![OrphanedUpload {
                provider: failure.provider,
                code: code.clone(),
            }]
        };

        match self.database.resolve_failure(failure.id, &code, precondition).await {
            Ok(Some((failure, video))) => {
                info!(
                    "Retry resolved failure {}: {} is now {}",
                    failure.id, failure.provider, code
                );
                Ok(RetryOutcome::Resolved { failure, video })
            }
            Ok(None) => {
                let err = PersistenceError::new(
                    format!("resolve upload failure {}", failure.id),
                    "the failure changed while the retry was running",
                    orphaned(),
                );
                self.notifier.alert_persistence(&err).await;
                Err(err.into())
            }
            Err(e) => {
                let err = PersistenceError::new(
                    format!("resolve upload failure {}", failure.id),
                    e.to_string(),
                    orphaned(),
                );
                self.notifier.alert_persistence(&err).await;
                Err(err.into())
            }
        }
    }

    async fn finish_failure(
        &self,
        failure: &UploadFailureRecord,
        details: ErrorDetails,
    ) -> AppResult<RetryOutcome> {
        let updated = self
            .database
            .record_retry_failure(failure.id, failure.attempt_count, &details, self.max_attempts)
            .await?
            .ok_or_else(|| {
                AppError::conflict(format!(
                    "upload failure {} changed while the retry was running",
                    failure.id
                ))
            })?;

        warn!(
            "Retry of failure {} failed (attempt {}, manual: {}): {}",
            updated.id, updated.attempt_count, updated.requires_manual_upload, details.message
        );
        Ok(RetryOutcome::Failed {
            failure: updated,
            error: details.message,
        })
    }
}
