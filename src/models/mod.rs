use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod callback;

pub use callback::RetryCallback;

/// One of the two hosting providers every video is mirrored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    ProviderA,
    ProviderB,
}

impl Provider {
    /// Both providers, in canonical preference order
    pub const ALL: [Provider; 2] = [Provider::ProviderA, Provider::ProviderB];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::ProviderA => "provider_a",
            Provider::ProviderB => "provider_b",
        }
    }

    /// Single-letter tag used in inline button payloads
    pub fn short_code(&self) -> &'static str {
        match self {
            Provider::ProviderA => "A",
            Provider::ProviderB => "B",
        }
    }

    pub fn from_short_code(code: &str) -> Option<Self> {
        match code {
            "A" | "a" => Some(Provider::ProviderA),
            "B" | "b" => Some(Provider::ProviderB),
            _ => None,
        }
    }

    /// Column on `videos` holding this provider's content handle
    pub(crate) fn code_column(&self) -> &'static str {
        match self {
            Provider::ProviderA => "provider_a_code",
            Provider::ProviderB => "provider_b_code",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider_a" => Ok(Provider::ProviderA),
            "provider_b" => Ok(Provider::ProviderB),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Per-provider upload state as stored in `upload_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    Success,
    Failed,
}

/// Upload state for both providers; always carries both keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStatus {
    pub provider_a: UploadState,
    pub provider_b: UploadState,
}

impl UploadStatus {
    /// Derive the status from which handles are present
    pub fn from_codes(provider_a: Option<&str>, provider_b: Option<&str>) -> Self {
        let state = |code: Option<&str>| match code {
            Some(_) => UploadState::Success,
            None => UploadState::Failed,
        };
        Self {
            provider_a: state(provider_a),
            provider_b: state(provider_b),
        }
    }

    pub fn get(&self, provider: Provider) -> UploadState {
        match provider {
            Provider::ProviderA => self.provider_a,
            Provider::ProviderB => self.provider_b,
        }
    }
}

/// Catalog lifecycle of a video; only `Active` videos are shown publicly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Processing,
    Active,
    Hidden,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Processing => "processing",
            VideoStatus::Active => "active",
            VideoStatus::Hidden => "hidden",
        }
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(VideoStatus::Processing),
            "active" => Ok(VideoStatus::Active),
            "hidden" => Ok(VideoStatus::Hidden),
            other => Err(format!("unknown video status '{other}'")),
        }
    }
}

/// Canonical record of one ingested video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub provider_a_code: Option<String>,
    pub provider_b_code: Option<String>,
    pub upload_status: UploadStatus,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    /// Platform attachment reference, kept so retries can fetch the file again
    pub source_file_id: String,
    pub source_chat_id: i64,
    pub source_message_id: i64,
    pub status: VideoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    pub fn code(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::ProviderA => self.provider_a_code.as_deref(),
            Provider::ProviderB => self.provider_b_code.as_deref(),
        }
    }

    /// Handle used for playback: provider A when present, else provider B
    pub fn primary_code(&self) -> Option<(Provider, &str)> {
        Provider::ALL
            .into_iter()
            .find_map(|provider| self.code(provider).map(|code| (provider, code)))
    }
}

/// Fields required to create a `VideoRecord`
#[derive(Debug, Clone)]
pub struct NewVideoRecord {
    pub title: String,
    pub description: Option<String>,
    pub provider_a_code: Option<String>,
    pub provider_b_code: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub source_file_id: String,
    pub source_chat_id: i64,
    pub source_message_id: i64,
    pub status: VideoStatus,
}

/// Operator edits; handles are not editable here
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<VideoStatus>,
}

/// Error message plus raw context persisted with a failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub message: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// How an upload failure was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Retry,
    Manual,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Retry => "retry",
            Resolution::Manual => "manual",
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retry" => Ok(Resolution::Retry),
            "manual" => Ok(Resolution::Manual),
            other => Err(format!("unknown resolution '{other}'")),
        }
    }
}

/// Durable tracking of one failed (video, provider) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFailureRecord {
    pub id: Uuid,
    pub video_id: Uuid,
    pub provider: Provider,
    pub attempt_count: i32,
    pub error_details: ErrorDetails,
    pub requires_manual_upload: bool,
    /// Set while an automatic retry holds the pair
    pub retry_started_at: Option<DateTime<Utc>>,
    pub resolution: Option<Resolution>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadFailureRecord {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// True when a retry claim is held and has not gone stale
    pub fn retry_in_flight(&self, now: DateTime<Utc>, claim_ttl: chrono::Duration) -> bool {
        self.retry_started_at
            .map(|started| started > now - claim_ttl)
            .unwrap_or(false)
    }
}

/// Row of the operator's unresolved-failure view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFailureView {
    #[serde(flatten)]
    pub failure: UploadFailureRecord,
    pub video_title: String,
    pub source_chat_id: i64,
}

/// Body of the manual-resolution operator call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualResolutionRequest {
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(a: Option<&str>, b: Option<&str>) -> VideoRecord {
        let now = Utc::now();
        VideoRecord {
            id: Uuid::new_v4(),
            title: "clip".to_string(),
            description: None,
            provider_a_code: a.map(str::to_string),
            provider_b_code: b.map(str::to_string),
            upload_status: UploadStatus::from_codes(a, b),
            file_name: "clip.mp4".to_string(),
            file_size: 2 * 1024 * 1024,
            mime_type: Some("video/mp4".to_string()),
            source_file_id: "file-1".to_string(),
            source_chat_id: -100,
            source_message_id: 5,
            status: VideoStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_primary_code_prefers_provider_a() {
        let both = record(Some("abc123"), Some("xyz"));
        assert_eq!(both.primary_code(), Some((Provider::ProviderA, "abc123")));

        let only_b = record(None, Some("xyz"));
        assert_eq!(only_b.primary_code(), Some((Provider::ProviderB, "xyz")));
    }

    #[test]
    fn test_upload_status_serializes_both_keys() {
        let status = UploadStatus::from_codes(Some("abc123"), None);
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json, serde_json::json!({"provider_a": "success", "provider_b": "failed"}));
    }

    #[test]
    fn test_provider_codes() {
        for provider in Provider::ALL {
            assert_eq!(Provider::from_short_code(provider.short_code()), Some(provider));
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(provider));
        }
        assert_eq!(Provider::from_short_code("C"), None);
    }

    #[test]
    fn test_retry_in_flight_respects_ttl() {
        let now = Utc::now();
        let mut failure = UploadFailureRecord {
            id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
            provider: Provider::ProviderB,
            attempt_count: 1,
            error_details: ErrorDetails {
                message: "timeout".to_string(),
                context: serde_json::Value::Null,
            },
            requires_manual_upload: false,
            retry_started_at: None,
            resolution: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };
        let ttl = chrono::Duration::minutes(30);
        assert!(!failure.retry_in_flight(now, ttl));

        failure.retry_started_at = Some(now - chrono::Duration::minutes(5));
        assert!(failure.retry_in_flight(now, ttl));

        failure.retry_started_at = Some(now - chrono::Duration::hours(2));
        assert!(!failure.retry_in_flight(now, ttl));
    }
}
