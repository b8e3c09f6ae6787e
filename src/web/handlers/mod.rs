//! HTTP request handlers organized by domain
//!
//! Handlers stay thin: parse the request, call one pipeline or database
//! operation, map the result through `handle_result`.

pub mod health;
pub mod upload_failures;
pub mod videos;
pub mod webhook;
