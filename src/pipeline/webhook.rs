//! Routes one webhook update to ingestion, retry or membership handling.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::ingest::{IngestOutcome, IngestRequest, IngestionService};
use super::notifier::{Notifier, ReplyTarget};
use super::retry::{RetryDispatcher, RetryOutcome};
use crate::errors::AppError;
use crate::models::RetryCallback;
use crate::telegram::{AccessPolicy, CallbackQuery, ChatMemberUpdated, Message, MessagingClient, Update};

/// What an update turned into, for logs and tests
#[derive(Debug)]
pub enum UpdateDisposition {
    Ignored(&'static str),
    Ingested(IngestOutcome),
    RetryHandled,
    MembershipLogged,
}

pub struct UpdateHandler {
    policy: AccessPolicy,
    client: Arc<dyn MessagingClient>,
    ingest: Arc<IngestionService>,
    retry: Arc<RetryDispatcher>,
    notifier: Arc<Notifier>,
}

impl UpdateHandler {
    pub fn new(
        policy: AccessPolicy,
        client: Arc<dyn MessagingClient>,
        ingest: Arc<IngestionService>,
        retry: Arc<RetryDispatcher>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            policy,
            client,
            ingest,
            retry,
            notifier,
        }
    }

    pub async fn handle(&self, update: Update) -> UpdateDisposition {
        let update_id = update.update_id;
        let disposition = if let Some(message) = update.message.or(update.channel_post) {
            self.handle_message(message).await
        } else if let Some(query) = update.callback_query {
            self.handle_callback(query).await
        } else if let Some(member) = update.my_chat_member {
            self.handle_membership(member).await
        } else {
            UpdateDisposition::Ignored("unsupported update kind")
        };

        if let UpdateDisposition::Ignored(reason) = &disposition {
            debug!("Update {} ignored: {}", update_id, reason);
        }
        disposition
    }

    async fn handle_message(&self, message: Message) -> UpdateDisposition {
        if !self.policy.allows_message(&message) {
            return UpdateDisposition::Ignored("chat or sender not allowed");
        }
        let Some(attachment) = message.video_attachment() else {
            return UpdateDisposition::Ignored("no video attachment");
        };

        let request = IngestRequest {
            chat_id: message.chat.id,
            message_id: message.message_id,
            attachment,
            caption: message.caption.clone(),
        };
        UpdateDisposition::Ingested(self.ingest.ingest(request).await)
    }

    async fn handle_callback(&self, query: CallbackQuery) -> UpdateDisposition {
        let Some(callback) = query.data.as_deref().and_then(RetryCallback::parse) else {
            self.answer(&query.id, None).await;
            return UpdateDisposition::Ignored("unrecognised callback data");
        };
        if !self.policy.is_admin(&query.from) {
            warn!(
                "User {} pressed a retry button without permission",
                query.from.id
            );
            self.answer(&query.id, Some("You are not allowed to retry uploads"))
                .await;
            return UpdateDisposition::Ignored("callback from non-admin user");
        }

        // acknowledge before the upload starts
        self.answer(&query.id, Some("Retrying upload…")).await;

        let target = ReplyTarget {
            chat_id: query
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(query.from.id),
            message_id: query.message.as_ref().map(|m| m.message_id),
        };
        info!(
            "User {} requested retry of {} for video {}",
            query.from.id, callback.provider, callback.video_id
        );

        let reply = match self
            .retry
            .retry_for_video(callback.video_id, callback.provider)
            .await
        {
            Ok(RetryOutcome::Resolved { video, .. }) => {
                self.notifier
                    .compose_retry_success(target, &video, callback.provider)
            }
            Ok(RetryOutcome::Failed { failure, .. }) => {
                self.notifier
                    .compose_retry_failure(target, &failure, self.retry.max_attempts())
            }
            Err(AppError::RetryExhausted { attempt_count, .. }) => self.notifier.compose_notice(
                target,
                format!(
                    "⛔ {} has failed {} times; automatic retry is disabled. An operator must upload it manually.",
                    self.notifier.provider_name(callback.provider),
                    attempt_count
                ),
            ),
            Err(AppError::Conflict { message }) => {
                self.notifier
                    .compose_notice(target, format!("ℹ️ Nothing to retry: {message}"))
            }
            Err(AppError::NotFound { .. }) => self.notifier.compose_notice(
                target,
                format!(
                    "ℹ️ Nothing to retry: {} has no open failure for this video",
                    self.notifier.provider_name(callback.provider)
                ),
            ),
            Err(e) => {
                warn!("Retry from callback failed: {}", e);
                self.notifier
                    .compose_notice(target, "❌ The retry could not be carried out. Please try again later.")
            }
        };
        self.notifier.deliver(reply).await;
        UpdateDisposition::RetryHandled
    }

    async fn handle_membership(&self, member: ChatMemberUpdated) -> UpdateDisposition {
        let chat = &member.chat;
        info!(
            "Bot membership in {} changed: {} -> {} (by user {})",
            chat.label(),
            member.old_chat_member.status,
            member.new_chat_member.status,
            member.from.id
        );

        let joined = member.new_chat_member.is_present() && !member.old_chat_member.is_present();
        if joined && !chat.is_private() && !self.policy.is_allowed_chat(chat.id) {
            self.notifier
                .alert_operator(&format!(
                    "Bot was added to chat {} which is not on the allow-list; its uploads will be ignored",
                    chat.label()
                ))
                .await;
        }
        UpdateDisposition::MembershipLogged
    }

    async fn answer(&self, query_id: &str, text: Option<&str>) {
        if let Err(e) = self.client.answer_callback_query(query_id, text).await {
            warn!("Could not answer callback query {}: {}", query_id, e);
        }
    }
}
