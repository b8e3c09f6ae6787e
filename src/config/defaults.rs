/// Configuration default values
///
/// Every default lives here so it can be changed in one place.
use std::time::Duration;

// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./vidmirror.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Telegram defaults
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
// Bot API refuses getFile downloads above 20 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5 * 60);
// Per-request limit for Bot API method calls (getFile, sendMessage, ...)
pub const BOT_API_CALL_TIMEOUT: Duration = Duration::from_secs(30);

// Upload provider defaults
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

// Retry defaults
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_CLAIM_TTL: Duration = Duration::from_secs(30 * 60);

// Environment layering
pub const ENV_PREFIX: &str = "VIDMIRROR";
pub const ENV_SEPARATOR: &str = "__";
