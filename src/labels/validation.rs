// Per-field checks for proxy rows entered in the create/edit form

use super::BlockPolicy;
use crate::models::ProxyDescriptor;
use serde::Serialize;
use thiserror::Error;

pub const MAX_SLUG_LEN: usize = 64;

/// A field failed validation. The message is shown next to the field as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Slug is required")]
    SlugRequired,
    #[error("Use lowercase letters, digits, and dashes (must start/end with alphanumeric)")]
    SlugPattern,
    #[error("Slug is too long")]
    SlugTooLong,
    #[error("Port is required")]
    PortRequired,
    #[error("Port must be a number between 1 and 65535")]
    PortRange,
    #[error("Nginx block is required")]
    BlockRequired,
}

/// Messages for one row; `None` means the field is fine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRowErrors {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nginx_block: Option<String>,
}

impl ProxyRowErrors {
    pub fn is_empty(&self) -> bool {
        self.slug.is_none() && self.port.is_none() && self.nginx_block.is_none()
    }
}

/// `^[a-z0-9]([a-z0-9-]*[a-z0-9])?$`, at most 64 characters.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(ValidationError::SlugRequired);
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let bytes_ok = slug.chars().all(|c| allowed(c) || c == '-');
    let ends_ok = slug.starts_with(allowed) && slug.ends_with(allowed);
    if !bytes_ok || !ends_ok {
        return Err(ValidationError::SlugPattern);
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(ValidationError::SlugTooLong);
    }
    Ok(())
}

pub fn validate_port(port: &str) -> Result<u16, ValidationError> {
    let port = port.trim();
    if port.is_empty() {
        return Err(ValidationError::PortRequired);
    }
    if !port.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::PortRange);
    }
    match port.parse::<u32>() {
        Ok(n) if (1..=65535).contains(&n) => Ok(n as u16),
        _ => Err(ValidationError::PortRange),
    }
}

pub fn validate_block(block: &str, policy: BlockPolicy) -> Result<(), ValidationError> {
    if policy == BlockPolicy::Required && block.trim().is_empty() {
        return Err(ValidationError::BlockRequired);
    }
    Ok(())
}

/// Errors for every invalid row; empty when all rows pass.
pub fn validate_descriptors(rows: &[ProxyDescriptor], policy: BlockPolicy) -> Vec<ProxyRowErrors> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| ProxyRowErrors {
            index,
            slug: validate_slug(&row.slug).err().map(|e| e.to_string()),
            port: validate_port(&row.port).err().map(|e| e.to_string()),
            nginx_block: validate_block(row.block(), policy)
                .err()
                .map(|e| e.to_string()),
        })
        .filter(|errors| !errors.is_empty())
        .collect()
}
