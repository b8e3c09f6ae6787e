use crate::errors::RepositoryResult;
use crate::models::*;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{db_timestamp, parse_timestamp, parse_uuid};

const VIDEO_COLUMNS: &str = "id, title, description, provider_a_code, provider_b_code, upload_status,
     file_name, file_size, mime_type, source_file_id, source_chat_id, source_message_id,
     status, created_at, updated_at";

impl super::Database {
    pub async fn create_video(&self, request: &NewVideoRecord) -> RepositoryResult<VideoRecord> {
        let id = Uuid::new_v4();
        let now = db_timestamp(Utc::now());
        let upload_status = UploadStatus::from_codes(
            request.provider_a_code.as_deref(),
            request.provider_b_code.as_deref(),
        );

        sqlx::query(
            "INSERT INTO videos (id, title, description, provider_a_code, provider_b_code, upload_status,
                                 file_name, file_size, mime_type, source_file_id, source_chat_id,
                                 source_message_id, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.provider_a_code)
        .bind(&request.provider_b_code)
        .bind(serde_json::to_string(&upload_status)?)
        .bind(&request.file_name)
        .bind(request.file_size)
        .bind(&request.mime_type)
        .bind(&request.source_file_id)
        .bind(request.source_chat_id)
        .bind(request.source_message_id)
        .bind(request.status.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"))
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        video_from_row(&row)
    }

    pub async fn get_video(&self, id: Uuid) -> RepositoryResult<Option<VideoRecord>> {
        let mut conn = self.pool.acquire().await?;
        fetch_video(&mut conn, id).await
    }

    /// Newest first
    pub async fn list_videos(&self, limit: u32, offset: u32) -> RepositoryResult<Vec<VideoRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(video_from_row).collect()
    }

    pub async fn count_videos(&self) -> RepositoryResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Apply operator edits; `None` when the video does not exist
    pub async fn update_video(
        &self,
        id: Uuid,
        request: &VideoUpdateRequest,
    ) -> RepositoryResult<Option<VideoRecord>> {
        let result = sqlx::query(
            "UPDATE videos
             SET title = COALESCE(?, title),
                 description = COALESCE(?, description),
                 status = COALESCE(?, status),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.status.map(|s| s.as_str()))
        .bind(db_timestamp(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_video(id).await
    }
}

/// Write one provider handle and recompute `upload_status` in the same
/// statement. With `only_if_missing` an existing handle is left alone and
/// zero rows are reported.
pub(crate) async fn set_provider_code(
    conn: &mut SqliteConnection,
    video_id: Uuid,
    provider: Provider,
    code: &str,
    only_if_missing: bool,
) -> RepositoryResult<u64> {
    // SET expressions see the pre-update row, so the written provider is
    // hard-wired to success and only the other one is derived
    let status_expr = match provider {
        Provider::ProviderA => {
            "json_object('provider_a', 'success',
                         'provider_b', CASE WHEN provider_b_code IS NULL THEN 'failed' ELSE 'success' END)"
        }
        Provider::ProviderB => {
            "json_object('provider_a', CASE WHEN provider_a_code IS NULL THEN 'failed' ELSE 'success' END,
                         'provider_b', 'success')"
        }
    };
    let column = provider.code_column();
    let guard = if only_if_missing {
        format!(" AND {column} IS NULL")
    } else {
        String::new()
    };

    let sql = format!(
        "UPDATE videos SET {column} = ?, upload_status = {status_expr}, updated_at = ?
         WHERE id = ?{guard}"
    );
    let result = sqlx::query(&sql)
        .bind(code)
        .bind(db_timestamp(Utc::now()))
        .bind(video_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn fetch_video(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> RepositoryResult<Option<VideoRecord>> {
    let row = sqlx::query(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(video_from_row).transpose()
}

fn video_from_row(row: &SqliteRow) -> RepositoryResult<VideoRecord> {
    let id: String = row.try_get("id")?;
    let upload_status: String = row.try_get("upload_status")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(VideoRecord {
        id: parse_uuid("videos", "id", &id)?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        provider_a_code: row.try_get("provider_a_code")?,
        provider_b_code: row.try_get("provider_b_code")?,
        upload_status: serde_json::from_str(&upload_status)?,
        file_name: row.try_get("file_name")?,
        file_size: row.try_get("file_size")?,
        mime_type: row.try_get("mime_type")?,
        source_file_id: row.try_get("source_file_id")?,
        source_chat_id: row.try_get("source_chat_id")?,
        source_message_id: row.try_get("source_message_id")?,
        status: status.parse().map_err(|e: String| {
            crate::errors::RepositoryError::invalid_data("videos", "status", e)
        })?,
        created_at: parse_timestamp("videos", "created_at", &created_at)?,
        updated_at: parse_timestamp("videos", "updated_at", &updated_at)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::database::test_support::memory_database;

    pub(crate) fn new_video(a: Option<&str>, b: Option<&str>) -> NewVideoRecord {
        NewVideoRecord {
            title: "clip".to_string(),
            description: Some("first take".to_string()),
            provider_a_code: a.map(str::to_string),
            provider_b_code: b.map(str::to_string),
            file_name: "clip.mp4".to_string(),
            file_size: 2 * 1024 * 1024,
            mime_type: Some("video/mp4".to_string()),
            source_file_id: "file-1".to_string(),
            source_chat_id: -1001,
            source_message_id: 42,
            status: VideoStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_create_video_derives_upload_status() {
        let database = memory_database().await;
        let video = database
            .create_video(&new_video(Some("abc123"), None))
            .await
            .unwrap();

        assert_eq!(video.provider_a_code.as_deref(), Some("abc123"));
        assert_eq!(video.provider_b_code, None);
        assert_eq!(video.upload_status.provider_a, UploadState::Success);
        assert_eq!(video.upload_status.provider_b, UploadState::Failed);

        let fetched = database.get_video(video.id).await.unwrap().unwrap();
        assert_eq!(fetched.file_size, 2 * 1024 * 1024);
        assert_eq!(fetched.source_message_id, 42);
    }

    #[tokio::test]
    async fn test_video_without_any_handle_is_rejected() {
        let database = memory_database().await;
        assert!(database.create_video(&new_video(None, None)).await.is_err());
        assert_eq!(database.count_videos().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_provider_code_flips_status() {
        let database = memory_database().await;
        let video = database
            .create_video(&new_video(Some("abc123"), None))
            .await
            .unwrap();

        let mut conn = database.pool().acquire().await.unwrap();
        let updated = set_provider_code(&mut conn, video.id, Provider::ProviderB, "xyz999", true)
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let video = fetch_video(&mut conn, video.id).await.unwrap().unwrap();
        assert_eq!(video.provider_b_code.as_deref(), Some("xyz999"));
        assert_eq!(video.provider_a_code.as_deref(), Some("abc123"));
        assert_eq!(video.upload_status, UploadStatus::from_codes(Some("a"), Some("b")));

        // a second fill-if-missing must not clobber the handle
        let again = set_provider_code(&mut conn, video.id, Provider::ProviderB, "other", true)
            .await
            .unwrap();
        assert_eq!(again, 0);
        let video = fetch_video(&mut conn, video.id).await.unwrap().unwrap();
        assert_eq!(video.provider_b_code.as_deref(), Some("xyz999"));
    }

    #[tokio::test]
    async fn test_list_and_update_videos() {
        let database = memory_database().await;
        for _ in 0..3 {
            database
                .create_video(&new_video(Some("abc"), Some("xyz")))
                .await
                .unwrap();
        }

        let page = database.list_videos(2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].created_at >= page[1].created_at);
        assert_eq!(database.list_videos(2, 2).await.unwrap().len(), 1);
        assert_eq!(database.count_videos().await.unwrap(), 3);

        let target = page[0].id;
        let updated = database
            .update_video(
                target,
                &VideoUpdateRequest {
                    title: Some("Renamed".to_string()),
                    description: None,
                    status: Some(VideoStatus::Hidden),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description.as_deref(), Some("first take"));
        assert_eq!(updated.status, VideoStatus::Hidden);
        assert_eq!(updated.provider_a_code.as_deref(), Some("abc"));

        let missing = database
            .update_video(Uuid::new_v4(), &VideoUpdateRequest::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
