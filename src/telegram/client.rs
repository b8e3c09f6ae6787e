//! Telegram Bot API client
//!
//! [`MessagingClient`] is the seam the pipeline talks to; [`TelegramClient`]
//! is the HTTP implementation. Every Bot API URL embeds the bot token, so
//! URLs only reach the logs through [`TelegramClient::redact`].

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{ApiEnvelope, File, SendMessageRequest};
use crate::config::defaults::BOT_API_CALL_TIMEOUT;
use crate::config::TelegramConfig;
use crate::errors::{MessagingError, RetrievalError};

/// A platform file reference resolved to a temporary download location
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFile {
    pub url: String,
    pub file_size: Option<u64>,
}

/// Operations the pipeline needs from the messaging platform
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Resolve an attachment reference to a temporary download URL
    async fn resolve_file(&self, file_id: &str) -> Result<ResolvedFile, MessagingError>;

    /// Download `url` into memory, refusing bodies larger than `max_bytes`
    async fn download(&self, url: &str, max_bytes: u64) -> Result<Bytes, RetrievalError>;

    /// Send a message, returning the new message id
    async fn send_message(&self, request: &SendMessageRequest) -> Result<i64, MessagingError>;

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), MessagingError>;

    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<(), MessagingError>;
}

/// Bot API over HTTPS
pub struct TelegramClient {
    client: Client,
    api_base: String,
    bot_token: String,
    download_timeout: Duration,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("vidmirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            download_timeout: config.download_timeout,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.api_base,
            self.bot_token,
            file_path.trim_start_matches('/')
        )
    }

    /// Strip the bot token from a URL or error message before logging it
    pub fn redact(&self, text: &str) -> String {
        if self.bot_token.is_empty() {
            return text.to_string();
        }
        text.replace(&self.bot_token, "<redacted>")
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, MessagingError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.method_url(method);
        debug!("Bot API call {}", self.redact(&url));

        let response = self
            .client
            .post(&url)
            .timeout(BOT_API_CALL_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| MessagingError::transport(self.redact(&e.to_string())))?;

        let status = response.status();
        // error answers also carry the envelope, so decode regardless of status
        let envelope: ApiEnvelope<T> = response.json().await.map_err(|e| {
            MessagingError::transport(format!(
                "{} answered HTTP {} with an unreadable body: {}",
                method,
                status.as_u16(),
                self.redact(&e.to_string())
            ))
        })?;

        match (envelope.ok, envelope.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(MessagingError::Api {
                method: method.to_string(),
                description: "response has no result".to_string(),
            }),
            (false, _) => Err(MessagingError::Api {
                method: method.to_string(),
                description: envelope
                    .description
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            }),
        }
    }
}

#[async_trait]
impl MessagingClient for TelegramClient {
    async fn resolve_file(&self, file_id: &str) -> Result<ResolvedFile, MessagingError> {
        let file: File = self.call("getFile", &json!({ "file_id": file_id })).await?;
        let file_path = file.file_path.ok_or_else(|| MessagingError::Api {
            method: "getFile".to_string(),
            description: "file has no download path".to_string(),
        })?;

        Ok(ResolvedFile {
            url: self.file_url(&file_path),
            file_size: file.file_size,
        })
    }

    async fn download(&self, url: &str, max_bytes: u64) -> Result<Bytes, RetrievalError> {
        debug!("Downloading {}", self.redact(url));

        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| RetrievalError::transport(self.redact(&e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Download {
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(RetrievalError::TooLarge {
                    size: length,
                    max_size: max_bytes,
                });
            }
        }

        let mut buffer = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RetrievalError::transport(self.redact(&e.to_string())))?;
            buffer.extend_from_slice(&chunk);
            if buffer.len() as u64 > max_bytes {
                return Err(RetrievalError::TooLarge {
                    size: buffer.len() as u64,
                    max_size: max_bytes,
                });
            }
        }

        Ok(buffer.freeze())
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<i64, MessagingError> {
        let sent: serde_json::Value = self.call("sendMessage", request).await?;
        Ok(sent
            .get("message_id")
            .and_then(|id| id.as_i64())
            .unwrap_or_default())
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), MessagingError> {
        let mut body = json!({ "callback_query_id": callback_query_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<(), MessagingError> {
        let mut body = json!({
            "url": url,
            "allowed_updates": ["message", "channel_post", "callback_query", "my_chat_member"],
        });
        if let Some(secret) = secret_token {
            body["secret_token"] = json!(secret);
        }
        let registered: bool = self.call("setWebhook", &body).await?;
        if !registered {
            warn!("setWebhook answered ok without confirming registration");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;

    fn client_for(server: &MockServer) -> TelegramClient {
        TelegramClient::new(&TelegramConfig {
            bot_token: "test-token".to_string(),
            api_base: server.base_url(),
            ..TelegramConfig::default()
        })
    }

    #[tokio::test]
    async fn test_resolve_file_builds_download_url() {
        let server = MockServer::start();
        let get_file = server.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/getFile")
                .json_body(json!({"file_id": "F1"}));
            then.status(200).json_body(json!({
                "ok": true,
                "result": {"file_id": "F1", "file_size": 12, "file_path": "videos/file_3.mp4"}
            }));
        });

        let resolved = client_for(&server).resolve_file("F1").await.unwrap();
        get_file.assert_calls(1);
        assert_eq!(
            resolved.url,
            format!("{}/file/bottest-token/videos/file_3.mp4", server.base_url())
        );
        assert_eq!(resolved.file_size, Some(12));
    }

    #[tokio::test]
    async fn test_set_webhook_sends_secret_token() {
        let server = MockServer::start();
        let register = server.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/setWebhook")
                .json_body_includes(r#"{"url": "https://bot.example/webhook/telegram"}"#)
                .json_body_includes(r#"{"secret_token": "s3cret"}"#);
            then.status(200).json_body(json!({"ok": true, "result": true}));
        });

        client_for(&server)
            .set_webhook("https://bot.example/webhook/telegram", Some("s3cret"))
            .await
            .unwrap();
        register.assert_calls(1);
    }

    #[tokio::test]
    async fn test_api_error_surfaces_description() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/bottest-token/getFile");
            then.status(400).json_body(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: invalid file_id"
            }));
        });

        let err = client_for(&server).resolve_file("nope").await.unwrap_err();
        match err {
            MessagingError::Api { method, description } => {
                assert_eq!(method, "getFile");
                assert!(description.contains("invalid file_id"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_download_streams_body_and_enforces_limit() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/file/bottest-token/videos/a.mp4");
            then.status(200).body(vec![7u8; 64]);
        });
        server.mock(|when, then| {
            when.method(GET).path("/file/bottest-token/videos/missing.mp4");
            then.status(404);
        });

        let client = client_for(&server);
        let url = client.file_url("videos/a.mp4");
        let bytes = client.download(&url, 1024).await.unwrap();
        assert_eq!(bytes.len(), 64);

        let too_large = client.download(&url, 16).await.unwrap_err();
        assert!(matches!(too_large, RetrievalError::TooLarge { max_size: 16, .. }));

        let missing = client
            .download(&client.file_url("videos/missing.mp4"), 1024)
            .await
            .unwrap_err();
        assert!(matches!(missing, RetrievalError::Download { status: 404 }));
    }

    #[tokio::test]
    async fn test_send_message_returns_message_id() {
        let server = MockServer::start();
        let sent = server.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/sendMessage")
                .json_body_includes(r#"{"chat_id": -1001, "reply_to_message_id": 9}"#);
            then.status(200)
                .json_body(json!({"ok": true, "result": {"message_id": 55}}));
        });

        let request = SendMessageRequest::new(-1001, "done").reply_to(9);
        let id = client_for(&server).send_message(&request).await.unwrap();
        sent.assert_calls(1);
        assert_eq!(id, 55);
    }

    #[test]
    fn test_redact_hides_token() {
        let client = TelegramClient::new(&TelegramConfig {
            bot_token: "123:secret".to_string(),
            ..TelegramConfig::default()
        });
        let redacted = client.redact(&client.method_url("getFile"));
        assert!(!redacted.contains("123:secret"));
        assert!(redacted.ends_with("/bot<redacted>/getFile"));
    }
}
