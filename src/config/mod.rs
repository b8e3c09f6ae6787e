use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use url::Url;

pub mod defaults;
pub mod duration_serde;

use crate::errors::{AppError, AppResult};
use crate::models::Provider;
use defaults::*;

/// Process-wide configuration, loaded once and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used when registering the webhook
    pub public_url: Option<String>,
    /// Expected value of `X-Telegram-Bot-Api-Secret-Token`
    pub webhook_secret: Option<String>,
    /// Bearer token for the operator API; the API is closed when unset
    pub operator_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Group/channel chats whose posts are ingested
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
    /// Users allowed to ingest via direct message and to press retry buttons
    #[serde(default)]
    pub admin_user_ids: Vec<i64>,
    /// Chat that receives operator alerts (persistence failures, unknown chats)
    #[serde(default)]
    pub operator_chat_id: Option<i64>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_download_timeout", with = "duration_serde::duration")]
    pub download_timeout: Duration,
    #[serde(default)]
    pub register_webhook: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_upload_timeout", with = "duration_serde::duration")]
    pub upload_timeout: Duration,
    #[serde(default = "ProviderAccountConfig::default_a")]
    pub provider_a: ProviderAccountConfig,
    #[serde(default = "ProviderAccountConfig::default_b")]
    pub provider_b: ProviderAccountConfig,
}

/// Credentials and endpoint for one hosting account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAccountConfig {
    pub display_name: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempt count at which a failure requires manual upload
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// How long an in-flight retry claim is honoured before it counts as stale
    #[serde(default = "default_claim_ttl", with = "duration_serde::duration")]
    pub claim_ttl: Duration,
}

fn default_api_base() -> String {
    DEFAULT_TELEGRAM_API_BASE.to_string()
}
fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}
fn default_download_timeout() -> Duration {
    DEFAULT_DOWNLOAD_TIMEOUT
}
fn default_upload_timeout() -> Duration {
    DEFAULT_UPLOAD_TIMEOUT
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_claim_ttl() -> Duration {
    DEFAULT_CLAIM_TTL
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_url: None,
            webhook_secret: None,
            operator_token: None,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: default_api_base(),
            allowed_chat_ids: Vec::new(),
            admin_user_ids: Vec::new(),
            operator_chat_id: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            register_webhook: false,
        }
    }
}

impl ProviderAccountConfig {
    fn default_a() -> Self {
        Self {
            display_name: "Provider A".to_string(),
            base_url: "https://provider-a.invalid".to_string(),
            api_key: String::new(),
        }
    }

    fn default_b() -> Self {
        Self {
            display_name: "Provider B".to_string(),
            base_url: "https://provider-b.invalid".to_string(),
            api_key: String::new(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            provider_a: ProviderAccountConfig::default_a(),
            provider_b: ProviderAccountConfig::default_b(),
        }
    }
}

impl ProvidersConfig {
    pub fn account(&self, provider: Provider) -> &ProviderAccountConfig {
        match provider {
            Provider::ProviderA => &self.provider_a,
            Provider::ProviderB => &self.provider_b,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            claim_ttl: DEFAULT_CLAIM_TTL,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            web: WebConfig::default(),
            telegram: TelegramConfig::default(),
            providers: ProvidersConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load the TOML file at `path` (if present) layered under
    /// `VIDMIRROR__SECTION__KEY` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Toml).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .list_separator(",")
                    .with_list_parse_key("telegram.allowed_chat_ids")
                    .with_list_parse_key("telegram.admin_user_ids")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;

        info!(
            "Configuration loaded: {} allowed chats, {} admins, providers '{}' and '{}'",
            config.telegram.allowed_chat_ids.len(),
            config.telegram.admin_user_ids.len(),
            config.providers.provider_a.display_name,
            config.providers.provider_b.display_name
        );

        Ok(config)
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(AppError::configuration("telegram.bot_token must be set"));
        }
        Url::parse(&self.telegram.api_base).map_err(|e| {
            AppError::configuration(format!("telegram.api_base is not a valid URL: {e}"))
        })?;
        for provider in Provider::ALL {
            let account = self.providers.account(provider);
            Url::parse(&account.base_url).map_err(|e| {
                AppError::configuration(format!(
                    "providers.{}.base_url is not a valid URL: {e}",
                    provider.as_str()
                ))
            })?;
        }
        if self.providers.upload_timeout.is_zero() {
            return Err(AppError::configuration(
                "providers.upload_timeout must be greater than zero",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::configuration("retry.max_attempts must be at least 1"));
        }
        // a claim must outlive the longest retry it guards
        let longest_retry =
            BOT_API_CALL_TIMEOUT + self.telegram.download_timeout + self.providers.upload_timeout;
        if self.retry.claim_ttl <= longest_retry {
            return Err(AppError::configuration(format!(
                "retry.claim_ttl ({}) must exceed the longest retry: file lookup, telegram.download_timeout and providers.upload_timeout ({})",
                humantime::format_duration(self.retry.claim_ttl),
                humantime::format_duration(longest_retry)
            )));
        }
        if let Some(public_url) = &self.web.public_url {
            Url::parse(public_url).map_err(|e| {
                AppError::configuration(format!("web.public_url is not a valid URL: {e}"))
            })?;
        }
        Ok(())
    }

    /// Effective configuration as TOML with secrets masked
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut redacted = self.clone();
        let mask = |value: &mut String| {
            if !value.is_empty() {
                *value = "********".to_string();
            }
        };
        mask(&mut redacted.telegram.bot_token);
        mask(&mut redacted.providers.provider_a.api_key);
        mask(&mut redacted.providers.provider_b.api_key);
        if let Some(secret) = redacted.web.webhook_secret.as_mut() {
            mask(secret);
        }
        if let Some(token) = redacted.web.operator_token.as_mut() {
            mask(token);
        }
        Ok(toml::to_string_pretty(&redacted)?)
    }
}
