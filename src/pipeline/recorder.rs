//! Video Record Writer and Failure Recorder
//!
//! Both run after remote uploads already succeeded, so any storage error
//! here is a [`PersistenceError`] naming what would otherwise be lost.

use std::collections::BTreeMap;
use tracing::{error, info};
use uuid::Uuid;

use super::orchestrator::DualUploadOutcome;
use crate::database::Database;
use crate::errors::{OrphanedUpload, PersistenceError, ProviderUploadError};
use crate::models::{NewVideoRecord, Provider, UploadFailureRecord, VideoRecord, VideoStatus};

/// Source metadata carried into the video record
#[derive(Debug, Clone)]
pub struct VideoSource {
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub source_file_id: String,
    pub source_chat_id: i64,
    pub source_message_id: i64,
}

pub struct VideoRecordWriter {
    database: Database,
}

impl VideoRecordWriter {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Persist the canonical record for a successful or partial upload
    pub async fn write(
        &self,
        source: &VideoSource,
        outcome: &DualUploadOutcome,
    ) -> Result<VideoRecord, PersistenceError> {
        let request = NewVideoRecord {
            title: source.title.clone(),
            description: source.description.clone(),
            provider_a_code: outcome.provider_a.clone(),
            provider_b_code: outcome.provider_b.clone(),
            file_name: source.file_name.clone(),
            file_size: source.file_size,
            mime_type: source.mime_type.clone(),
            source_file_id: source.source_file_id.clone(),
            source_chat_id: source.source_chat_id,
            source_message_id: source.source_message_id,
            status: VideoStatus::Active,
        };

        match self.database.create_video(&request).await {
            Ok(video) => {
                info!(
                    "Stored video {} '{}' (A: {:?}, B: {:?})",
                    video.id, video.title, video.provider_a_code, video.provider_b_code
                );
                Ok(video)
            }
            Err(e) => {
                let orphaned = outcome
                    .succeeded()
                    .into_iter()
                    .map(|(provider, code)| OrphanedUpload {
                        provider,
                        code: code.to_string(),
                    })
                    .collect();
                let err = PersistenceError::new("create video record", e.to_string(), orphaned);
                error!("Video record for '{}' not stored: {:?}", source.file_name, err);
                Err(err)
            }
        }
    }
}

pub struct FailureRecorder {
    database: Database,
    max_attempts: u32,
}

impl FailureRecorder {
    pub fn new(database: Database, max_attempts: u32) -> Self {
        Self {
            database,
            max_attempts,
        }
    }

    /// Create or bump the unresolved failure for every failed provider.
    /// Stops at the first storage error.
    pub async fn record(
        &self,
        video_id: Uuid,
        errors: &BTreeMap<Provider, ProviderUploadError>,
    ) -> Result<Vec<UploadFailureRecord>, PersistenceError> {
        let mut recorded = Vec::with_capacity(errors.len());
        for (provider, upload_error) in errors {
            let failure = self
                .database
                .record_upload_failure(video_id, *provider, &upload_error.details(), self.max_attempts)
                .await
                .map_err(|e| {
                    let err = PersistenceError::new(
                        format!("record {} failure for video {}", provider, video_id),
                        e.to_string(),
                        Vec::new(),
                    );
                    error!("{}", err);
                    err
                })?;
            info!(
                "Recorded {} failure {} for video {} (attempt {}, manual: {})",
                provider,
                failure.id,
                video_id,
                failure.attempt_count,
                failure.requires_manual_upload
            );
            recorded.push(failure);
        }
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::memory_database;
    use std::time::Duration;

    fn source() -> VideoSource {
        VideoSource {
            title: "clip".to_string(),
            description: None,
            file_name: "clip.mp4".to_string(),
            file_size: 2 * 1024 * 1024,
            mime_type: Some("video/mp4".to_string()),
            source_file_id: "F1".to_string(),
            source_chat_id: -1001,
            source_message_id: 3,
        }
    }

    fn partial_outcome() -> DualUploadOutcome {
        let mut outcome = DualUploadOutcome {
            provider_a: Some("abc123".to_string()),
            ..DualUploadOutcome::default()
        };
        outcome.errors.insert(
            Provider::ProviderB,
            ProviderUploadError::Timeout {
                provider: Provider::ProviderB,
                timeout: Duration::from_secs(600),
            },
        );
        outcome
    }

    #[tokio::test]
    async fn test_partial_outcome_is_written_and_tracked() {
        let database = memory_database().await;
        let writer = VideoRecordWriter::new(database.clone());
        let recorder = FailureRecorder::new(database.clone(), 3);

        let outcome = partial_outcome();
        let video = writer.write(&source(), &outcome).await.unwrap();
        let failures = recorder.record(video.id, &outcome.errors).await.unwrap();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].provider, Provider::ProviderB);
        assert_eq!(failures[0].attempt_count, 1);
        assert_eq!(failures[0].error_details.context["kind"], "timeout");
    }

    #[tokio::test]
    async fn test_write_failure_lists_orphans() {
        let database = memory_database().await;
        let writer = VideoRecordWriter::new(database.clone());
        database.pool().close().await;

        let err = writer.write(&source(), &partial_outcome()).await.unwrap_err();
        assert_eq!(
            err.orphaned,
            vec![OrphanedUpload {
                provider: Provider::ProviderA,
                code: "abc123".to_string()
            }]
        );
    }
}
