//! Upload provider adapters
//!
//! Each hosting account sits behind the same [`UploadProvider`] trait so the
//! orchestrator never branches on which concrete provider it is calling.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::config::ProvidersConfig;
use crate::errors::{AppError, AppResult, ProviderUploadError};
use crate::models::Provider;

pub mod provider_a;
pub mod provider_b;

pub use provider_a::ProviderAClient;
pub use provider_b::ProviderBClient;

/// Payload submitted to a provider
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Bytes,
    pub file_name: String,
    pub title: String,
    pub mime_type: Option<String>,
}

impl UploadFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// MIME type for the multipart file part
    pub fn content_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or("video/mp4")
    }
}

/// One hosting account
#[async_trait]
pub trait UploadProvider: Send + Sync {
    fn provider(&self) -> Provider;

    fn display_name(&self) -> &str;

    /// Upload the file and return the provider's content handle
    async fn upload(&self, file: &UploadFile) -> Result<String, ProviderUploadError>;
}

/// Both adapters, addressed by tag
#[derive(Clone)]
pub struct ProviderRegistry {
    provider_a: Arc<dyn UploadProvider>,
    provider_b: Arc<dyn UploadProvider>,
}

impl ProviderRegistry {
    pub fn new(
        provider_a: Arc<dyn UploadProvider>,
        provider_b: Arc<dyn UploadProvider>,
    ) -> AppResult<Self> {
        if provider_a.provider() != Provider::ProviderA || provider_b.provider() != Provider::ProviderB {
            return Err(AppError::configuration(
                "provider adapters registered under the wrong tag",
            ));
        }
        Ok(Self {
            provider_a,
            provider_b,
        })
    }

    /// HTTP adapters for the configured accounts
    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self {
            provider_a: Arc::new(ProviderAClient::new(&config.provider_a)),
            provider_b: Arc::new(ProviderBClient::new(&config.provider_b)),
        }
    }

    pub fn get(&self, provider: Provider) -> &Arc<dyn UploadProvider> {
        match provider {
            Provider::ProviderA => &self.provider_a,
            Provider::ProviderB => &self.provider_b,
        }
    }

    pub fn display_name(&self, provider: Provider) -> &str {
        self.get(provider).display_name()
    }
}

/// Trim a response body for storage in error details
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    #[test]
    fn test_registry_rejects_swapped_adapters() {
        let a = Arc::new(ScriptedProvider::new(Provider::ProviderA));
        let b = Arc::new(ScriptedProvider::new(Provider::ProviderB));
        assert!(ProviderRegistry::new(a.clone(), b.clone()).is_ok());
        assert!(ProviderRegistry::new(b, a).is_err());
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let long = "é".repeat(600);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with('…'));
        assert!(truncated.len() <= 512 + '…'.len_utf8());
        assert_eq!(truncate_body("short"), "short");
    }
}
