use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{MessagingError, RetrievalError};
use crate::telegram::MessagingClient;

/// Fetches a platform attachment into memory. One attempt, no retry.
pub struct FileRetriever {
    client: Arc<dyn MessagingClient>,
    max_file_size: u64,
}

impl FileRetriever {
    pub fn new(client: Arc<dyn MessagingClient>, max_file_size: u64) -> Self {
        Self {
            client,
            max_file_size,
        }
    }

    /// Resolve `file_id` and download it. `declared_size` (from the update)
    /// lets oversized files fail before any request is made.
    pub async fn retrieve(
        &self,
        file_id: &str,
        declared_size: Option<u64>,
    ) -> Result<Bytes, RetrievalError> {
        self.check_size(declared_size)?;

        let resolved = self
            .client
            .resolve_file(file_id)
            .await
            .map_err(|e| match e {
                MessagingError::Api { description, .. } => RetrievalError::InvalidReference {
                    file_id: file_id.to_string(),
                    message: description,
                },
                MessagingError::Transport { message } => RetrievalError::Transport { message },
            })?;
        self.check_size(resolved.file_size)?;
        debug!("Resolved file {} (size {:?})", file_id, resolved.file_size);

        let bytes = self.client.download(&resolved.url, self.max_file_size).await?;
        info!("Retrieved file {} ({} bytes)", file_id, bytes.len());
        Ok(bytes)
    }

    fn check_size(&self, size: Option<u64>) -> Result<(), RetrievalError> {
        match size {
            Some(size) if size > self.max_file_size => Err(RetrievalError::TooLarge {
                size,
                max_size: self.max_file_size,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingMessagingClient;

    #[tokio::test]
    async fn test_retrieve_downloads_known_file() {
        let client = Arc::new(RecordingMessagingClient::new().with_file("F1", vec![1u8; 32]));
        let retriever = FileRetriever::new(client, 1024);
        let bytes = retriever.retrieve("F1", Some(32)).await.unwrap();
        assert_eq!(bytes.len(), 32);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_invalid() {
        let retriever = FileRetriever::new(Arc::new(RecordingMessagingClient::new()), 1024);
        let err = retriever.retrieve("gone", None).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidReference { ref file_id, .. } if file_id == "gone"));
    }

    #[tokio::test]
    async fn test_declared_size_checked_before_download() {
        let client = Arc::new(RecordingMessagingClient::new());
        let retriever = FileRetriever::new(client, 10);
        let err = retriever.retrieve("big", Some(11)).await.unwrap_err();
        assert!(matches!(err, RetrievalError::TooLarge { size: 11, max_size: 10 }));
    }

    #[tokio::test]
    async fn test_resolved_size_checked() {
        let client = Arc::new(RecordingMessagingClient::new().with_file("F2", vec![0u8; 64]));
        let retriever = FileRetriever::new(client, 16);
        let err = retriever.retrieve("F2", None).await.unwrap_err();
        assert_eq!(err.kind(), "too_large");
    }
}
