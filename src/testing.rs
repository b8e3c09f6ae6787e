//! In-process test doubles for the messaging platform and upload providers.
//!
//! Shared by unit tests and the integration tests under `tests/`.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

use crate::errors::{MessagingError, ProviderUploadError, RetrievalError};
use crate::models::Provider;
use crate::pipeline::providers::{UploadFile, UploadProvider};
use crate::telegram::{MessagingClient, ResolvedFile, SendMessageRequest};

const MEMORY_SCHEME: &str = "memory://";

/// Programmed answer for one upload call
#[derive(Debug, Clone)]
pub enum ScriptedUpload {
    Succeed(String),
    Fail(ProviderUploadError),
    /// Never completes; only the orchestrator's timeout ends the call
    Hang,
}

/// Upload provider answering from a script, falling back to a default
/// answer once the script is exhausted
pub struct ScriptedProvider {
    provider: Provider,
    display_name: String,
    script: Mutex<VecDeque<ScriptedUpload>>,
    fallback: ScriptedUpload,
    delay: Duration,
    rendezvous: Option<Arc<Barrier>>,
    calls: AtomicUsize,
    uploads: Mutex<Vec<(String, String, usize)>>,
}

impl ScriptedProvider {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            display_name: match provider {
                Provider::ProviderA => "Provider A".to_string(),
                Provider::ProviderB => "Provider B".to_string(),
            },
            script: Mutex::new(VecDeque::new()),
            fallback: ScriptedUpload::Succeed(format!("{}-code", provider.short_code().to_lowercase())),
            delay: Duration::ZERO,
            rendezvous: None,
            calls: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(provider: Provider, code: &str) -> Self {
        Self::new(provider).with_fallback(ScriptedUpload::Succeed(code.to_string()))
    }

    pub fn failing(provider: Provider, error: ProviderUploadError) -> Self {
        Self::new(provider).with_fallback(ScriptedUpload::Fail(error))
    }

    pub fn hanging(provider: Provider) -> Self {
        Self::new(provider).with_fallback(ScriptedUpload::Hang)
    }

    pub fn with_fallback(mut self, fallback: ScriptedUpload) -> Self {
        self.fallback = fallback;
        self
    }

    /// Queue answers consumed one per call before the fallback applies
    pub fn then(self, answer: ScriptedUpload) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(answer);
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block each call until every party of `barrier` has arrived
    pub fn with_rendezvous(mut self, barrier: Arc<Barrier>) -> Self {
        self.rendezvous = Some(barrier);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(file_name, title, size)` of every upload received
    pub fn uploads(&self) -> Vec<(String, String, usize)> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UploadProvider for ScriptedProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn upload(&self, file: &UploadFile) -> Result<String, ProviderUploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push((file.file_name.clone(), file.title.clone(), file.len()));
        }
        let answer = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.fallback.clone());

        if let Some(barrier) = &self.rendezvous {
            barrier.wait().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match answer {
            ScriptedUpload::Succeed(code) => Ok(code),
            ScriptedUpload::Fail(error) => Err(error),
            ScriptedUpload::Hang => {
                std::future::pending::<()>().await;
                Err(ProviderUploadError::transport(self.provider, "unreachable"))
            }
        }
    }
}

/// Messaging client serving files from memory and recording everything sent
#[derive(Default)]
pub struct RecordingMessagingClient {
    files: Mutex<HashMap<String, Bytes>>,
    sent: Mutex<Vec<SendMessageRequest>>,
    answered: Mutex<Vec<(String, Option<String>)>>,
    webhooks: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingMessagingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, file_id: &str, content: impl Into<Bytes>) -> Self {
        self.add_file(file_id, content);
        self
    }

    pub fn add_file(&self, file_id: &str, content: impl Into<Bytes>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(file_id.to_string(), content.into());
        }
    }

    /// Make a previously served file unavailable (expired reference)
    pub fn remove_file(&self, file_id: &str) {
        if let Ok(mut files) = self.files.lock() {
            files.remove(file_id);
        }
    }

    pub fn sent_messages(&self) -> Vec<SendMessageRequest> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn messages_to(&self, chat_id: i64) -> Vec<SendMessageRequest> {
        self.sent_messages()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .collect()
    }

    pub fn answered_callbacks(&self) -> Vec<(String, Option<String>)> {
        self.answered.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn registered_webhooks(&self) -> Vec<(String, Option<String>)> {
        self.webhooks.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MessagingClient for RecordingMessagingClient {
    async fn resolve_file(&self, file_id: &str) -> Result<ResolvedFile, MessagingError> {
        let size = self
            .files
            .lock()
            .ok()
            .and_then(|files| files.get(file_id).map(|b| b.len() as u64));
        match size {
            Some(size) => Ok(ResolvedFile {
                url: format!("{MEMORY_SCHEME}{file_id}"),
                file_size: Some(size),
            }),
            None => Err(MessagingError::Api {
                method: "getFile".to_string(),
                description: "Bad Request: invalid file_id".to_string(),
            }),
        }
    }

    async fn download(&self, url: &str, max_bytes: u64) -> Result<Bytes, RetrievalError> {
        let file_id = url.strip_prefix(MEMORY_SCHEME).unwrap_or(url);
        let content = self
            .files
            .lock()
            .ok()
            .and_then(|files| files.get(file_id).cloned())
            .ok_or(RetrievalError::Download { status: 404 })?;
        if content.len() as u64 > max_bytes {
            return Err(RetrievalError::TooLarge {
                size: content.len() as u64,
                max_size: max_bytes,
            });
        }
        Ok(content)
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<i64, MessagingError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| MessagingError::transport("recorder poisoned"))?;
        sent.push(request.clone());
        Ok(sent.len() as i64)
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), MessagingError> {
        if let Ok(mut answered) = self.answered.lock() {
            answered.push((callback_query_id.to_string(), text.map(str::to_string)));
        }
        Ok(())
    }

    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<(), MessagingError> {
        if let Ok(mut webhooks) = self.webhooks.lock() {
            webhooks.push((url.to_string(), secret_token.map(str::to_string)));
        }
        Ok(())
    }
}
