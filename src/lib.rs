//! vidmirror: ingest videos posted to a Telegram bot and mirror each one to
//! two independent hosting providers, tracking partial failures until an
//! operator retries or resolves them.

pub mod assets;
pub mod config;
pub mod database;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod telegram;
pub mod testing;
pub mod web;
