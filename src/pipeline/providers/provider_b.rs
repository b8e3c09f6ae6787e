//! Provider B: single multipart `POST {base}/api/v1/videos/upload` with a
//! bearer key, answering `{"success": true, "data": {"id": "…"}}`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{truncate_body, UploadFile, UploadProvider};
use crate::config::ProviderAccountConfig;
use crate::errors::ProviderUploadError;
use crate::models::Provider;

const PROVIDER: Provider = Provider::ProviderB;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    success: bool,
    #[serde(default)]
    data: Option<UploadedVideo>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

pub struct ProviderBClient {
    client: Client,
    display_name: String,
    upload_url: String,
    api_key: String,
}

impl ProviderBClient {
    pub fn new(config: &ProviderAccountConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("vidmirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            display_name: config.display_name.clone(),
            upload_url: format!("{}/api/v1/videos/upload", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl UploadProvider for ProviderBClient {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn upload(&self, file: &UploadFile) -> Result<String, ProviderUploadError> {
        let part = Part::stream_with_length(file.bytes.clone(), file.len() as u64)
            .file_name(file.file_name.clone())
            .mime_str(file.content_type())
            .map_err(|e| ProviderUploadError::transport(PROVIDER, e.to_string()))?;
        let form = Form::new()
            .text("title", file.title.clone())
            .part("file", part);

        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderUploadError::transport(PROVIDER, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderUploadError::transport(PROVIDER, e.to_string()))?;
        if !status.is_success() {
            return Err(ProviderUploadError::Http {
                provider: PROVIDER,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderUploadError::invalid_response(PROVIDER, format!("{e}: {}", truncate_body(&body)))
        })?;
        if !parsed.success {
            return Err(ProviderUploadError::Rejected {
                provider: PROVIDER,
                message: parsed
                    .error
                    .unwrap_or_else(|| "upload was not accepted".to_string()),
            });
        }

        parsed
            .data
            .map(|video| video.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderUploadError::invalid_response(PROVIDER, "no video id in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    fn client_for(server: &MockServer) -> ProviderBClient {
        ProviderBClient::new(&ProviderAccountConfig {
            display_name: "Beta".to_string(),
            base_url: format!("{}/", server.base_url()),
            api_key: "key-b".to_string(),
        })
    }

    fn clip() -> UploadFile {
        UploadFile {
            bytes: Bytes::from_static(b"frames"),
            file_name: "clip.mp4".to_string(),
            title: "Clip title".to_string(),
            mime_type: None,
        }
    }

    #[tokio::test]
    async fn test_upload_returns_video_id() {
        let server = MockServer::start();
        let upload = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/videos/upload")
                .header("authorization", "Bearer key-b")
                .body_includes("Clip title");
            then.status(200)
                .json_body(json!({"success": true, "data": {"id": "xyz"}}));
        });

        let code = client_for(&server).upload(&clip()).await.unwrap();
        upload.assert_calls(1);
        assert_eq!(code, "xyz");
    }

    #[tokio::test]
    async fn test_unsuccessful_answer_is_rejection() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/videos/upload");
            then.status(200)
                .json_body(json!({"success": false, "error": "quota exceeded"}));
        });

        let err = client_for(&server).upload(&clip()).await.unwrap_err();
        assert_eq!(err.kind(), "rejected");
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_garbage_body_is_invalid_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/videos/upload");
            then.status(200).body("<html>maintenance</html>");
        });

        let err = client_for(&server).upload(&clip()).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_response");
        assert_eq!(err.provider(), Provider::ProviderB);
    }
}
