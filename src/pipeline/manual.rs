use chrono::Utc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::database::{Database, ResolvePrecondition};
use crate::errors::{AppError, AppResult};
use crate::models::{UploadFailureRecord, VideoRecord};

/// Operator-supplied handle for a failure that automatic retry did not fix.
///
/// The handle is trusted as given (beyond non-emptiness). A failure held by
/// a live retry claim is refused until that retry finishes or its claim
/// goes stale.
pub struct ManualResolution {
    database: Database,
    claim_ttl: Duration,
}

impl ManualResolution {
    pub fn new(database: Database, claim_ttl: Duration) -> Self {
        Self {
            database,
            claim_ttl,
        }
    }

    pub async fn resolve(
        &self,
        failure_id: Uuid,
        code: &str,
    ) -> AppResult<(UploadFailureRecord, VideoRecord)> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::validation("content handle must not be empty"));
        }

        let failure = self
            .database
            .get_upload_failure(failure_id)
            .await?
            .ok_or_else(|| AppError::not_found("upload failure", failure_id.to_string()))?;
        if failure.is_resolved() {
            return Err(already_resolved(failure_id));
        }

        let claim_ttl = chrono::Duration::from_std(self.claim_ttl)
            .map_err(|e| AppError::configuration(format!("retry.claim_ttl out of range: {e}")))?;
        let precondition = ResolvePrecondition::NoActiveClaim {
            stale_before: Utc::now() - claim_ttl,
        };

        match self.database.resolve_failure(failure_id, code, precondition).await? {
            Some((failure, video)) => {
                info!(
                    "Failure {} resolved manually: {} for video {} set to {}",
                    failure.id, failure.provider, video.id, code
                );
                Ok((failure, video))
            }
            None => {
                let current = self.database.get_upload_failure(failure_id).await?;
                Err(match current {
                    Some(current) if current.is_resolved() => already_resolved(failure_id),
                    Some(_) => AppError::conflict(format!(
                        "a retry of upload failure {failure_id} is in progress"
                    )),
                    None => AppError::not_found("upload failure", failure_id.to_string()),
                })
            }
        }
    }
}

fn already_resolved(failure_id: Uuid) -> AppError {
    AppError::conflict(format!("upload failure {failure_id} is already resolved"))
}
