use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::*;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::videos::{fetch_video, set_provider_code};
use super::{db_timestamp, parse_timestamp, parse_uuid};

const FAILURE_COLUMNS: &str = "id, video_id, provider, attempt_count, error_details, requires_manual_upload,
     retry_started_at, resolution, resolved_at, created_at, updated_at";

const JOINED_FAILURE_COLUMNS: &str = "f.id AS id, f.video_id AS video_id, f.provider AS provider,
     f.attempt_count AS attempt_count, f.error_details AS error_details,
     f.requires_manual_upload AS requires_manual_upload, f.retry_started_at AS retry_started_at,
     f.resolution AS resolution, f.resolved_at AS resolved_at, f.created_at AS created_at,
     f.updated_at AS updated_at, v.title AS video_title, v.source_chat_id AS source_chat_id";

/// Condition that must still hold when a failure is closed
#[derive(Debug, Clone, Copy)]
pub enum ResolvePrecondition {
    /// The caller holds the retry claim it took at this attempt count
    RetryClaim { expected_attempt: i32 },
    /// No retry claim newer than `stale_before` may be held
    NoActiveClaim { stale_before: DateTime<Utc> },
}

impl super::Database {
    /// Insert a first failure for the pair, or bump the unresolved one.
    /// One statement, so concurrent writers cannot create a second
    /// unresolved row.
    pub async fn record_upload_failure(
        &self,
        video_id: Uuid,
        provider: Provider,
        details: &ErrorDetails,
        max_attempts: u32,
    ) -> RepositoryResult<UploadFailureRecord> {
        let now = db_timestamp(Utc::now());
        let sql = format!(
            "INSERT INTO upload_failures (id, video_id, provider, attempt_count, error_details,
                                          requires_manual_upload, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, CASE WHEN 1 >= ?5 THEN 1 ELSE 0 END, ?6, ?6)
             ON CONFLICT (video_id, provider) WHERE resolved_at IS NULL DO UPDATE SET
                 attempt_count = upload_failures.attempt_count + 1,
                 error_details = excluded.error_details,
                 requires_manual_upload = CASE
                     WHEN upload_failures.attempt_count + 1 >= ?5 THEN 1
                     ELSE upload_failures.requires_manual_upload
                 END,
                 updated_at = excluded.updated_at
             RETURNING {FAILURE_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(video_id.to_string())
            .bind(provider.as_str())
            .bind(serde_json::to_string(details)?)
            .bind(max_attempts as i64)
            .bind(&now)
            .fetch_one(&self.pool)
            .await?;

        failure_from_row(&row)
    }

    pub async fn get_upload_failure(&self, id: Uuid) -> RepositoryResult<Option<UploadFailureRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {FAILURE_COLUMNS} FROM upload_failures WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(failure_from_row).transpose()
    }

    pub async fn find_unresolved_failure(
        &self,
        video_id: Uuid,
        provider: Provider,
    ) -> RepositoryResult<Option<UploadFailureRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {FAILURE_COLUMNS} FROM upload_failures
             WHERE video_id = ? AND provider = ? AND resolved_at IS NULL"
        ))
        .bind(video_id.to_string())
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(failure_from_row).transpose()
    }

    pub async fn list_failures_for_video(
        &self,
        video_id: Uuid,
    ) -> RepositoryResult<Vec<UploadFailureRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {FAILURE_COLUMNS} FROM upload_failures WHERE video_id = ? ORDER BY created_at"
        ))
        .bind(video_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(failure_from_row).collect()
    }

    /// Operator view, most recently touched first
    pub async fn list_upload_failures(
        &self,
        include_resolved: bool,
    ) -> RepositoryResult<Vec<UploadFailureView>> {
        let filter = if include_resolved {
            ""
        } else {
            "WHERE f.resolved_at IS NULL"
        };
        let rows = sqlx::query(&format!(
            "SELECT {JOINED_FAILURE_COLUMNS}
             FROM upload_failures f
             JOIN videos v ON v.id = f.video_id
             {filter}
             ORDER BY f.updated_at DESC, f.id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(UploadFailureView {
                    failure: failure_from_row(row)?,
                    video_title: row.try_get("video_title")?,
                    source_chat_id: row.try_get("source_chat_id")?,
                })
            })
            .collect()
    }

    /// Take the retry claim. Fails (returns false) when the record changed
    /// since it was read, is resolved, needs manual upload, or another
    /// live claim is held.
    pub async fn claim_retry(
        &self,
        id: Uuid,
        expected_attempt: i32,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE upload_failures
             SET retry_started_at = ?1, updated_at = ?1
             WHERE id = ?2
               AND resolved_at IS NULL
               AND requires_manual_upload = 0
               AND attempt_count = ?3
               AND (retry_started_at IS NULL OR retry_started_at < ?4)",
        )
        .bind(db_timestamp(now))
        .bind(id.to_string())
        .bind(expected_attempt)
        .bind(db_timestamp(stale_before))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Drop a claim without recording an attempt
    pub async fn release_retry_claim(&self, id: Uuid, expected_attempt: i32) -> RepositoryResult<()> {
        sqlx::query(
            "UPDATE upload_failures SET retry_started_at = NULL, updated_at = ?1
             WHERE id = ?2 AND attempt_count = ?3 AND resolved_at IS NULL",
        )
        .bind(db_timestamp(Utc::now()))
        .bind(id.to_string())
        .bind(expected_attempt)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Count a failed retry against the claimed record. `None` when the
    /// record moved on since the claim was taken.
    pub async fn record_retry_failure(
        &self,
        id: Uuid,
        expected_attempt: i32,
        details: &ErrorDetails,
        max_attempts: u32,
    ) -> RepositoryResult<Option<UploadFailureRecord>> {
        let row = sqlx::query(&format!(
            "UPDATE upload_failures
             SET attempt_count = attempt_count + 1,
                 error_details = ?1,
                 requires_manual_upload = CASE
                     WHEN attempt_count + 1 >= ?2 THEN 1
                     ELSE requires_manual_upload
                 END,
                 retry_started_at = NULL,
                 updated_at = ?3
             WHERE id = ?4 AND resolved_at IS NULL AND attempt_count = ?5
               AND retry_started_at IS NOT NULL
             RETURNING {FAILURE_COLUMNS}"
        ))
        .bind(serde_json::to_string(details)?)
        .bind(max_attempts as i64)
        .bind(db_timestamp(Utc::now()))
        .bind(id.to_string())
        .bind(expected_attempt)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(failure_from_row).transpose()
    }

    /// Close a failure and write the provider handle onto its video in one
    /// transaction. `None` when the precondition no longer holds; nothing
    /// is written in that case.
    pub async fn resolve_failure(
        &self,
        id: Uuid,
        code: &str,
        precondition: ResolvePrecondition,
    ) -> RepositoryResult<Option<(UploadFailureRecord, VideoRecord)>> {
        let now = db_timestamp(Utc::now());
        let (resolution, condition, only_if_missing) = match precondition {
            ResolvePrecondition::RetryClaim { .. } => (
                Resolution::Retry,
                "attempt_count = ?4 AND retry_started_at IS NOT NULL",
                true,
            ),
            ResolvePrecondition::NoActiveClaim { .. } => (
                Resolution::Manual,
                "(retry_started_at IS NULL OR retry_started_at < ?4)",
                false,
            ),
        };
        let sql = format!(
            "UPDATE upload_failures
             SET resolved_at = ?1, resolution = ?2, retry_started_at = NULL, updated_at = ?1
             WHERE id = ?3 AND resolved_at IS NULL AND {condition}
             RETURNING video_id, provider"
        );
        let query = sqlx::query(&sql)
            .bind(&now)
            .bind(resolution.as_str())
            .bind(id.to_string());
        let query = match precondition {
            ResolvePrecondition::RetryClaim { expected_attempt } => query.bind(expected_attempt),
            ResolvePrecondition::NoActiveClaim { stale_before } => {
                query.bind(db_timestamp(stale_before))
            }
        };

        // starts with a write so the transaction holds the lock from the outset
        let mut tx = self.pool.begin().await?;

        let closed = query.fetch_optional(&mut *tx).await?;

        let Some(closed) = closed else {
            tx.rollback().await?;
            return Ok(None);
        };
        let video_id: String = closed.try_get("video_id")?;
        let video_id = parse_uuid("upload_failures", "video_id", &video_id)?;
        let provider = parse_provider(&closed.try_get::<String, _>("provider")?)?;

        if set_provider_code(&mut *tx, video_id, provider, code, only_if_missing).await? == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let failure_row = sqlx::query(&format!(
            "SELECT {FAILURE_COLUMNS} FROM upload_failures WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_one(&mut *tx)
        .await?;
        let failure = failure_from_row(&failure_row)?;
        let video = fetch_video(&mut *tx, video_id).await?.ok_or_else(|| {
            RepositoryError::invalid_data("upload_failures", "video_id", "referenced video is missing")
        })?;

        tx.commit().await?;
        Ok(Some((failure, video)))
    }
}

fn parse_provider(raw: &str) -> RepositoryResult<Provider> {
    raw.parse()
        .map_err(|e: String| RepositoryError::invalid_data("upload_failures", "provider", e))
}

fn failure_from_row(row: &SqliteRow) -> RepositoryResult<UploadFailureRecord> {
    let id: String = row.try_get("id")?;
    let video_id: String = row.try_get("video_id")?;
    let provider: String = row.try_get("provider")?;
    let error_details: String = row.try_get("error_details")?;
    let retry_started_at: Option<String> = row.try_get("retry_started_at")?;
    let resolution: Option<String> = row.try_get("resolution")?;
    let resolved_at: Option<String> = row.try_get("resolved_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let optional_timestamp = |field: &str, raw: Option<String>| {
        raw.map(|value| parse_timestamp("upload_failures", field, &value))
            .transpose()
    };

    Ok(UploadFailureRecord {
        id: parse_uuid("upload_failures", "id", &id)?,
        video_id: parse_uuid("upload_failures", "video_id", &video_id)?,
        provider: parse_provider(&provider)?,
        attempt_count: row.try_get("attempt_count")?,
        error_details: serde_json::from_str(&error_details)?,
        requires_manual_upload: row.try_get("requires_manual_upload")?,
        retry_started_at: optional_timestamp("retry_started_at", retry_started_at)?,
        resolution: resolution
            .map(|value| {
                value.parse().map_err(|e: String| {
                    RepositoryError::invalid_data("upload_failures", "resolution", e)
                })
            })
            .transpose()?,
        resolved_at: optional_timestamp("resolved_at", resolved_at)?,
        created_at: parse_timestamp("upload_failures", "created_at", &created_at)?,
        updated_at: parse_timestamp("upload_failures", "updated_at", &updated_at)?,
    })
}
