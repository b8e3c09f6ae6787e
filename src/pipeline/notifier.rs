//! Chat replies and operator alerts
//!
//! `compose_*` build the single reply for an ingestion or retry; `deliver`
//! sends it. Operator alerts go to `telegram.operator_chat_id` and are
//! always logged at `error` as well, so they survive a broken chat path.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, warn};

use super::orchestrator::DualUploadOutcome;
use crate::config::ProvidersConfig;
use crate::errors::{PersistenceError, RetrievalError};
use crate::models::{Provider, RetryCallback, UploadFailureRecord, VideoRecord};
use crate::telegram::{InlineKeyboardButton, InlineKeyboardMarkup, MessagingClient, SendMessageRequest};

/// Where a reply goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTarget {
    pub chat_id: i64,
    pub message_id: Option<i64>,
}

impl ReplyTarget {
    fn request(&self, text: String) -> SendMessageRequest {
        let request = SendMessageRequest::new(self.chat_id, text);
        match self.message_id {
            Some(id) => request.reply_to(id),
            None => request,
        }
    }
}

pub struct Notifier {
    client: Arc<dyn MessagingClient>,
    operator_chat_id: Option<i64>,
    names: BTreeMap<Provider, String>,
}

impl Notifier {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        operator_chat_id: Option<i64>,
        providers: &ProvidersConfig,
    ) -> Self {
        let names = Provider::ALL
            .into_iter()
            .map(|p| (p, providers.account(p).display_name.clone()))
            .collect();
        Self {
            client,
            operator_chat_id,
            names,
        }
    }

    pub fn provider_name(&self, provider: Provider) -> &str {
        self.names
            .get(&provider)
            .map(String::as_str)
            .unwrap_or(provider.as_str())
    }

    fn retry_button(&self, provider: Provider, video_id: uuid::Uuid) -> InlineKeyboardButton {
        InlineKeyboardButton {
            text: format!("🔁 Retry {}", self.provider_name(provider)),
            callback_data: RetryCallback::new(provider, video_id).to_string(),
        }
    }

    pub fn compose_retrieval_failure(
        &self,
        target: ReplyTarget,
        file_name: &str,
        err: &RetrievalError,
    ) -> SendMessageRequest {
        target.request(format!(
            "❌ Could not fetch \"{file_name}\": {err}\nNothing was uploaded. Please send the video again."
        ))
    }

    /// Reply for a stored ingestion. Retry buttons are only offered for
    /// failures that were actually recorded.
    pub fn compose_ingest_result(
        &self,
        target: ReplyTarget,
        video: &VideoRecord,
        outcome: &DualUploadOutcome,
        recorded: &[UploadFailureRecord],
    ) -> SendMessageRequest {
        if outcome.errors.is_empty() {
            let lines: Vec<String> = outcome
                .succeeded()
                .into_iter()
                .map(|(p, code)| format!("{}: {}", self.provider_name(p), code))
                .collect();
            return target.request(format!(
                "✅ Uploaded \"{}\"\n{}",
                video.title,
                lines.join("\n")
            ));
        }

        let mut text = format!("⚠️ \"{}\" was only partially uploaded.", video.title);
        for (provider, code) in outcome.succeeded() {
            text.push_str(&format!("\n✅ {}: {}", self.provider_name(provider), code));
        }
        for (provider, err) in &outcome.errors {
            text.push_str(&format!("\n❌ {} failed: {}", self.provider_name(*provider), err));
        }

        let buttons: Vec<Vec<InlineKeyboardButton>> = recorded
            .iter()
            .filter(|f| !f.requires_manual_upload)
            .map(|f| vec![self.retry_button(f.provider, video.id)])
            .collect();
        if buttons.is_empty() {
            text.push_str("\nAn operator will complete the missing upload.");
        } else {
            text.push_str("\nUse the button below to retry.");
        }

        target.request(text).with_keyboard(InlineKeyboardMarkup {
            inline_keyboard: buttons,
        })
    }

    pub fn compose_upload_failure(
        &self,
        target: ReplyTarget,
        file_name: &str,
        outcome: &DualUploadOutcome,
    ) -> SendMessageRequest {
        let mut text = format!("❌ Upload of \"{file_name}\" failed on both providers.");
        for (provider, err) in &outcome.errors {
            text.push_str(&format!("\n{}: {}", self.provider_name(*provider), err));
        }
        text.push_str("\nPlease send the video again.");
        target.request(text)
    }

    /// Reply when the video record itself could not be stored
    pub fn compose_persistence_failure(&self, target: ReplyTarget, file_name: &str) -> SendMessageRequest {
        target.request(format!(
            "⚠️ \"{file_name}\" was uploaded but could not be recorded. An operator has been alerted."
        ))
    }

    pub fn compose_retry_success(
        &self,
        target: ReplyTarget,
        video: &VideoRecord,
        provider: Provider,
    ) -> SendMessageRequest {
        target.request(format!(
            "✅ Retry succeeded: \"{}\" is now on {} as {}",
            video.title,
            self.provider_name(provider),
            video.code(provider).unwrap_or_default()
        ))
    }

    pub fn compose_retry_failure(
        &self,
        target: ReplyTarget,
        failure: &UploadFailureRecord,
        max_attempts: u32,
    ) -> SendMessageRequest {
        let name = self.provider_name(failure.provider);
        let request = target.request(format!(
            "⚠️ Retry for {} failed (attempt {} of {}): {}{}",
            name,
            failure.attempt_count,
            max_attempts,
            failure.error_details.message,
            if failure.requires_manual_upload {
                "\nAutomatic retries are exhausted; a manual upload is required."
            } else {
                ""
            }
        ));
        if failure.requires_manual_upload {
            return request;
        }
        request.with_keyboard(InlineKeyboardMarkup {
            inline_keyboard: vec![vec![self.retry_button(failure.provider, failure.video_id)]],
        })
    }

    pub fn compose_notice<S: Into<String>>(&self, target: ReplyTarget, text: S) -> SendMessageRequest {
        target.request(text.into())
    }

    /// Send a reply; delivery problems are logged, never propagated
    pub async fn deliver(&self, request: SendMessageRequest) {
        if let Err(e) = self.client.send_message(&request).await {
            warn!("Could not deliver reply to chat {}: {}", request.chat_id, e);
        }
    }

    /// Operator channel, separate from ordinary replies
    pub async fn alert_operator(&self, text: &str) {
        error!("Operator alert: {}", text);
        let Some(chat_id) = self.operator_chat_id else {
            error!("No operator chat configured; alert only logged");
            return;
        };
        let request = SendMessageRequest::new(chat_id, format!("🚨 {text}"));
        if let Err(e) = self.client.send_message(&request).await {
            error!("Operator alert could not be delivered: {}", e);
        }
    }

    pub async fn alert_persistence(&self, err: &PersistenceError) {
        let mut text = format!("Persistence failure: {err}");
        if err.orphaned.is_empty() {
            text.push_str("\nNo remote upload is unreferenced.");
        } else {
            text.push_str("\nRemote uploads not referenced locally:");
            for orphan in &err.orphaned {
                text.push_str(&format!(
                    "\n- {} ({}): {}",
                    self.provider_name(orphan.provider),
                    orphan.provider,
                    orphan.code
                ));
            }
        }
        self.alert_operator(&text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{OrphanedUpload, ProviderUploadError};
    use crate::models::{ErrorDetails, UploadStatus, VideoStatus};
    use crate::testing::RecordingMessagingClient;
    use chrono::Utc;
    use std::time::Duration;
    use uuid::Uuid;

    fn notifier(client: Arc<RecordingMessagingClient>, operator: Option<i64>) -> Notifier {
        Notifier::new(client, operator, &ProvidersConfig::default())
    }

    fn video(a: Option<&str>, b: Option<&str>) -> VideoRecord {
        let now = Utc::now();
        VideoRecord {
            id: Uuid::new_v4(),
            title: "clip".to_string(),
            description: None,
            provider_a_code: a.map(str::to_string),
            provider_b_code: b.map(str::to_string),
            upload_status: UploadStatus::from_codes(a, b),
            file_name: "clip.mp4".to_string(),
            file_size: 10,
            mime_type: None,
            source_file_id: "F1".to_string(),
            source_chat_id: -1001,
            source_message_id: 1,
            status: VideoStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn failure(video_id: Uuid, attempts: i32, manual: bool) -> UploadFailureRecord {
        let now = Utc::now();
        UploadFailureRecord {
            id: Uuid::new_v4(),
            video_id,
            provider: Provider::ProviderB,
            attempt_count: attempts,
            error_details: ErrorDetails {
                message: "provider_b upload timed out after 10m".to_string(),
                context: serde_json::Value::Null,
            },
            requires_manual_upload: manual,
            retry_started_at: None,
            resolution: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    const TARGET: ReplyTarget = ReplyTarget {
        chat_id: -1001,
        message_id: Some(1),
    };

    #[test]
    fn test_success_reply_lists_both_handles() {
        let n = notifier(Arc::new(RecordingMessagingClient::new()), None);
        let outcome = DualUploadOutcome {
            provider_a: Some("abc123".to_string()),
            provider_b: Some("xyz".to_string()),
            ..DualUploadOutcome::default()
        };
        let reply = n.compose_ingest_result(TARGET, &video(Some("abc123"), Some("xyz")), &outcome, &[]);
        assert!(reply.text.contains("abc123"));
        assert!(reply.text.contains("xyz"));
        assert!(reply.reply_markup.is_none());
        assert_eq!(reply.reply_to_message_id, Some(1));
    }

    #[test]
    fn test_partial_reply_offers_one_retry_per_failure() {
        let n = notifier(Arc::new(RecordingMessagingClient::new()), None);
        let v = video(Some("abc123"), None);
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
        let reply = n.compose_ingest_result(TARGET, &v, &outcome, &[failure(v.id, 1, false)]);

        assert!(reply.text.contains("Provider B failed"));
        let keyboard = reply.reply_markup.unwrap().inline_keyboard;
        assert_eq!(keyboard.len(), 1);
        assert_eq!(keyboard[0][0].callback_data, format!("retry_B_{}", v.id));
    }

    #[test]
    fn test_exhausted_retry_has_no_button() {
        let n = notifier(Arc::new(RecordingMessagingClient::new()), None);
        let reply = n.compose_retry_failure(TARGET, &failure(Uuid::new_v4(), 3, true), 3);
        assert!(reply.text.contains("attempt 3 of 3"));
        assert!(reply.text.contains("manual upload is required"));
        assert!(reply.reply_markup.is_none());

        let retryable = n.compose_retry_failure(TARGET, &failure(Uuid::new_v4(), 2, false), 3);
        assert!(retryable.reply_markup.is_some());
    }

    #[tokio::test]
    async fn test_persistence_alert_reaches_operator_chat() {
        let client = Arc::new(RecordingMessagingClient::new());
        let n = notifier(client.clone(), Some(999));
        n.alert_persistence(&PersistenceError::new(
            "create video record",
            "disk I/O error",
            vec![OrphanedUpload {
                provider: Provider::ProviderA,
                code: "abc123".to_string(),
            }],
        ))
        .await;

        let alerts = client.messages_to(999);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].text.contains("abc123"));
        assert!(alerts[0].text.contains("disk I/O error"));
    }
}
