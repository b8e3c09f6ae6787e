//! Dual upload orchestration
//!
//! Both adapters run concurrently and the orchestrator waits for both to
//! settle; a slow or failing provider never hides the other's result.
//! Every call is bounded by `providers.upload_timeout`, so a stalled
//! provider ends as a recorded [`ProviderUploadError::Timeout`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::providers::{ProviderRegistry, UploadFile};
use crate::errors::ProviderUploadError;
use crate::models::Provider;

/// Overall result of a dual upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadClassification {
    Success,
    Partial,
    Failure,
}

/// Settled outcome of both adapters
#[derive(Debug, Clone, Default)]
pub struct DualUploadOutcome {
    pub provider_a: Option<String>,
    pub provider_b: Option<String>,
    pub errors: BTreeMap<Provider, ProviderUploadError>,
}

impl DualUploadOutcome {
    fn record(&mut self, provider: Provider, result: Result<String, ProviderUploadError>) {
        match result {
            Ok(code) => match provider {
                Provider::ProviderA => self.provider_a = Some(code),
                Provider::ProviderB => self.provider_b = Some(code),
            },
            Err(error) => {
                self.errors.insert(provider, error);
            }
        }
    }

    pub fn code(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::ProviderA => self.provider_a.as_deref(),
            Provider::ProviderB => self.provider_b.as_deref(),
        }
    }

    /// Handles that exist remotely, in preference order
    pub fn succeeded(&self) -> Vec<(Provider, &str)> {
        Provider::ALL
            .into_iter()
            .filter_map(|provider| self.code(provider).map(|code| (provider, code)))
            .collect()
    }

    pub fn classification(&self) -> UploadClassification {
        match self.succeeded().len() {
            2 => UploadClassification::Success,
            1 => UploadClassification::Partial,
            _ => UploadClassification::Failure,
        }
    }
}

pub struct DualUploadOrchestrator {
    providers: ProviderRegistry,
    upload_timeout: Duration,
}

impl DualUploadOrchestrator {
    pub fn new(providers: ProviderRegistry, upload_timeout: Duration) -> Self {
        Self {
            providers,
            upload_timeout,
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Fan out to both providers and fan back in once both settled
    pub async fn upload_both(&self, file: &UploadFile) -> DualUploadOutcome {
        let (a, b) = tokio::join!(
            self.upload_one(Provider::ProviderA, file),
            self.upload_one(Provider::ProviderB, file),
        );

        let mut outcome = DualUploadOutcome::default();
        outcome.record(Provider::ProviderA, a);
        outcome.record(Provider::ProviderB, b);

        info!(
            "Dual upload of '{}' finished: {:?} (A: {:?}, B: {:?})",
            file.file_name,
            outcome.classification(),
            outcome.provider_a,
            outcome.provider_b
        );
        outcome
    }

    /// Run one adapter under the configured timeout
    pub async fn upload_one(
        &self,
        provider: Provider,
        file: &UploadFile,
    ) -> Result<String, ProviderUploadError> {
        let adapter = self.providers.get(provider);
        let started = Instant::now();

        let result = match tokio::time::timeout(self.upload_timeout, adapter.upload(file)).await {
            Ok(Ok(code)) if code.trim().is_empty() => Err(ProviderUploadError::invalid_response(
                provider,
                "empty content handle",
            )),
            Ok(result) => result,
            Err(_) => Err(ProviderUploadError::Timeout {
                provider,
                timeout: self.upload_timeout,
            }),
        };

        match &result {
            Ok(code) => info!(
                "{} accepted '{}' as {} in {:?}",
                adapter.display_name(),
                file.file_name,
                code,
                started.elapsed()
            ),
            Err(e) => warn!(
                "{} failed for '{}' after {:?}: {}",
                adapter.display_name(),
                file.file_name,
                started.elapsed(),
                e
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use bytes::Bytes;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    fn clip() -> UploadFile {
        UploadFile {
            bytes: Bytes::from(vec![0u8; 2 * 1024 * 1024]),
            file_name: "clip.mp4".to_string(),
            title: "clip".to_string(),
            mime_type: Some("video/mp4".to_string()),
        }
    }

    fn orchestrator(a: ScriptedProvider, b: ScriptedProvider, timeout: Duration) -> DualUploadOrchestrator {
        let registry = ProviderRegistry::new(Arc::new(a), Arc::new(b)).unwrap();
        DualUploadOrchestrator::new(registry, timeout)
    }

    #[tokio::test]
    async fn test_both_succeed() {
        let orchestrator = orchestrator(
            ScriptedProvider::succeeding(Provider::ProviderA, "abc123"),
            ScriptedProvider::succeeding(Provider::ProviderB, "xyz"),
            Duration::from_secs(5),
        );
        let outcome = orchestrator.upload_both(&clip()).await;
        assert_eq!(outcome.classification(), UploadClassification::Success);
        assert_eq!(outcome.provider_a.as_deref(), Some("abc123"));
        assert_eq!(outcome.provider_b.as_deref(), Some("xyz"));
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_becomes_partial() {
        let orchestrator = orchestrator(
            ScriptedProvider::succeeding(Provider::ProviderA, "abc123"),
            ScriptedProvider::hanging(Provider::ProviderB),
            Duration::from_millis(100),
        );
        let outcome = orchestrator.upload_both(&clip()).await;
        assert_eq!(outcome.classification(), UploadClassification::Partial);
        assert_eq!(outcome.provider_a.as_deref(), Some("abc123"));
        assert_eq!(outcome.provider_b, None);
        assert!(matches!(
            outcome.errors.get(&Provider::ProviderB),
            Some(ProviderUploadError::Timeout { provider: Provider::ProviderB, .. })
        ));
    }

    #[tokio::test]
    async fn test_both_fail() {
        let orchestrator = orchestrator(
            ScriptedProvider::failing(
                Provider::ProviderA,
                ProviderUploadError::transport(Provider::ProviderA, "connection reset"),
            ),
            ScriptedProvider::hanging(Provider::ProviderB),
            Duration::from_millis(50),
        );
        let outcome = orchestrator.upload_both(&clip()).await;
        assert_eq!(outcome.classification(), UploadClassification::Failure);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.succeeded().is_empty());
    }

    #[tokio::test]
    async fn test_uploads_run_concurrently() {
        // each adapter blocks until the other has started; sequential
        // execution would never reach the rendezvous and time out
        let barrier = Arc::new(Barrier::new(2));
        let orchestrator = orchestrator(
            ScriptedProvider::succeeding(Provider::ProviderA, "abc").with_rendezvous(barrier.clone()),
            ScriptedProvider::succeeding(Provider::ProviderB, "xyz").with_rendezvous(barrier),
            Duration::from_secs(2),
        );
        let outcome = orchestrator.upload_both(&clip()).await;
        assert_eq!(outcome.classification(), UploadClassification::Success);
    }

    #[tokio::test]
    async fn test_slow_failure_does_not_discard_success() {
        let orchestrator = orchestrator(
            ScriptedProvider::succeeding(Provider::ProviderA, "abc"),
            ScriptedProvider::failing(
                Provider::ProviderB,
                ProviderUploadError::Http {
                    provider: Provider::ProviderB,
                    status: 500,
                    body: "boom".to_string(),
                },
            )
            .with_delay(Duration::from_millis(50)),
            Duration::from_secs(2),
        );
        let outcome = orchestrator.upload_both(&clip()).await;
        assert_eq!(outcome.succeeded(), vec![(Provider::ProviderA, "abc")]);
        assert_eq!(outcome.errors[&Provider::ProviderB].kind(), "http");
    }

    #[tokio::test]
    async fn test_blank_handle_is_rejected() {
        let orchestrator = orchestrator(
            ScriptedProvider::succeeding(Provider::ProviderA, "  "),
            ScriptedProvider::succeeding(Provider::ProviderB, "xyz"),
            Duration::from_secs(1),
        );
        let result = orchestrator.upload_one(Provider::ProviderA, &clip()).await;
        assert_eq!(result.unwrap_err().kind(), "invalid_response");
    }
}
