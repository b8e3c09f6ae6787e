//! Query-string extractors for the operator API

use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Pagination parameters from query string
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PaginationParams {
    pub fn validate(&self) -> AppResult<()> {
        if self.page < 1 {
            return Err(AppError::validation("page must be >= 1"));
        }
        if self.limit < 1 || self.limit > 500 {
            return Err(AppError::validation("limit must be between 1 and 500"));
        }
        Ok(())
    }

    /// Offset for database queries (0-based)
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1) * self.limit
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FailureListParams {
    #[serde(default)]
    pub include_resolved: bool,
}

pub fn parse_uuid_param(param: &str) -> AppResult<Uuid> {
    Uuid::parse_str(param)
        .map_err(|_| AppError::validation(format!("Invalid UUID format: {}", param)))
}
