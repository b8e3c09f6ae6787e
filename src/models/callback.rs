//! Inline button payloads (`retry_<A|B>_<video_id>`)

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

use super::Provider;

/// Parsed retry button payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCallback {
    pub provider: Provider,
    pub video_id: Uuid,
}

fn callback_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^retry_([AaBb])_([0-9a-fA-F-]{36})$").expect("retry callback pattern is valid")
    })
}

impl RetryCallback {
    pub fn new(provider: Provider, video_id: Uuid) -> Self {
        Self { provider, video_id }
    }

    /// Parse button data; anything not shaped like a retry payload yields `None`
    pub fn parse(data: &str) -> Option<Self> {
        let caps = callback_pattern().captures(data.trim())?;
        let provider = Provider::from_short_code(caps.get(1)?.as_str())?;
        let video_id = Uuid::parse_str(caps.get(2)?.as_str()).ok()?;
        Some(Self { provider, video_id })
    }
}

impl fmt::Display for RetryCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retry_{}_{}", self.provider.short_code(), self.video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_payload() {
        let id = Uuid::parse_str("c63d556e-7b3c-4a85-accd-214c32663482").unwrap();
        let parsed = RetryCallback::parse("retry_B_c63d556e-7b3c-4a85-accd-214c32663482");
        assert_eq!(parsed, Some(RetryCallback::new(Provider::ProviderB, id)));
    }

    #[test]
    fn test_display_matches_parse() {
        let callback = RetryCallback::new(Provider::ProviderA, Uuid::new_v4());
        let data = callback.to_string();
        assert!(data.starts_with("retry_A_"));
        // Bot API caps callback_data at 64 bytes
        assert!(data.len() <= 64);
        assert_eq!(RetryCallback::parse(&data), Some(callback));
    }

    #[test]
    fn test_parse_rejects_other_payloads() {
        assert_eq!(RetryCallback::parse("retry_C_c63d556e-7b3c-4a85-accd-214c32663482"), None);
        assert_eq!(RetryCallback::parse("retry_A_not-a-uuid"), None);
        assert_eq!(RetryCallback::parse("like_42"), None);
        assert_eq!(RetryCallback::parse(""), None);
    }
}
