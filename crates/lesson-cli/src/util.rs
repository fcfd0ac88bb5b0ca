use anyhow::{anyhow, Result};
use lesson_core::error::CoreError;
use uuid::Uuid;

use crate::config::Config;

pub fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim())
        .map_err(|_| anyhow!(CoreError::InvalidInput(format!("'{}' is not a valid id", id))))
}

pub fn parse_ids(ids: &[String]) -> Result<Vec<Uuid>> {
    ids.iter().map(|id| parse_id(id)).collect()
}

/// The explicit user if given, otherwise the configured default.
pub fn resolve_user(explicit: Option<&str>, config: &Config) -> Result<Uuid> {
    match explicit {
        Some(id) => parse_id(id),
        None => config.default_user.ok_or_else(|| {
            anyhow!(CoreError::InvalidInput(
                "No user given; pass one explicitly or set LESSONS_DEFAULT_USER".to_string()
            ))
        }),
    }
}
