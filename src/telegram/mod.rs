//! Messaging platform integration (Telegram Bot API)

pub mod access;
pub mod client;
pub mod types;

pub use access::AccessPolicy;
pub use client::{MessagingClient, ResolvedFile, TelegramClient};
pub use types::*;
