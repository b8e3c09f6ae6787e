//! Provider A: two-step upload.
//!
//! 1. `GET {base}/api/upload/server?key=…` returns the upload node to use
//! 2. multipart `POST` of the file to that node returns the file code

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{truncate_body, UploadFile, UploadProvider};
use crate::config::ProviderAccountConfig;
use crate::errors::ProviderUploadError;
use crate::models::Provider;

const PROVIDER: Provider = Provider::ProviderA;

#[derive(Debug, Deserialize)]
struct ServerResponse {
    status: u16,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    status: u16,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    result: Vec<UploadedFile>,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    filecode: String,
}

pub struct ProviderAClient {
    client: Client,
    display_name: String,
    base_url: String,
    api_key: String,
}

impl ProviderAClient {
    pub fn new(config: &ProviderAccountConfig) -> Self {
        // no overall timeout here: the orchestrator bounds each upload
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("vidmirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            display_name: config.display_name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    async fn upload_server(&self) -> Result<String, ProviderUploadError> {
        let response = self
            .client
            .get(format!("{}/api/upload/server", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ProviderUploadError::transport(PROVIDER, e.to_string()))?;

        let server: ServerResponse = read_json(response).await?;
        if server.status != 200 {
            return Err(ProviderUploadError::Rejected {
                provider: PROVIDER,
                message: server
                    .msg
                    .unwrap_or_else(|| format!("upload server lookup answered {}", server.status)),
            });
        }
        server
            .result
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderUploadError::invalid_response(PROVIDER, "no upload server returned"))
    }
}

#[async_trait]
impl UploadProvider for ProviderAClient {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn upload(&self, file: &UploadFile) -> Result<String, ProviderUploadError> {
        let server = self.upload_server().await?;
        debug!("{} upload node: {}", self.display_name, server);

        let part = Part::stream_with_length(file.bytes.clone(), file.len() as u64)
            .file_name(file.file_name.clone())
            .mime_str(file.content_type())
            .map_err(|e| ProviderUploadError::transport(PROVIDER, e.to_string()))?;
        let form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("file_title", file.title.clone())
            .part("file", part);

        let response = self
            .client
            .post(&server)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderUploadError::transport(PROVIDER, e.to_string()))?;

        let uploaded: UploadResponse = read_json(response).await?;
        if uploaded.status != 200 {
            return Err(ProviderUploadError::Rejected {
                provider: PROVIDER,
                message: uploaded
                    .msg
                    .unwrap_or_else(|| format!("upload answered {}", uploaded.status)),
            });
        }

        uploaded
            .result
            .into_iter()
            .map(|f| f.filecode)
            .find(|code| !code.is_empty())
            .ok_or_else(|| ProviderUploadError::invalid_response(PROVIDER, "no file code in response"))
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderUploadError> {
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
    serde_json::from_str(&body).map_err(|e| {
        ProviderUploadError::invalid_response(PROVIDER, format!("{e}: {}", truncate_body(&body)))
    })
}
