//! Backend credential parsing
//!
//! Credentials are stored as a versioned JSON document. Records that carry
//! nothing, the older `KEY=VALUE` env-file format, or an unknown version are
//! rejected here, before any provider-specific schema is applied.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{BackendRecord, CURRENT_SCHEMA_VERSION};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Versioned credential document that passed the envelope checks
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialDocument {
    pub version: u32,
    pub body: Value,
}

impl CredentialDocument {
    pub fn new(body: Value) -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            body,
        }
    }

    /// Deserialize the document into a provider's credential schema
    pub fn parse_as<T: DeserializeOwned>(&self, provider: &str) -> OrchestratorResult<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| OrchestratorError::InvalidCredentials {
            provider: provider.to_string(),
            message: e.to_string(),
        })
    }
}

fn env_line_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(export\s+)?[A-Za-z_][A-Za-z0-9_]*\s*=").ok())
        .as_ref()
}

/// True when every non-blank, non-comment line is an env-file assignment
fn is_env_format(raw: &str) -> bool {
    let mut assignments = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .peekable();
    let Some(pattern) = env_line_pattern() else {
        return false;
    };
    assignments.peek().is_some() && assignments.all(|line| pattern.is_match(line))
}

/// Check presence, format and version of a backend's stored credentials
pub fn parse(record: &BackendRecord) -> OrchestratorResult<CredentialDocument> {
    let raw = match record.credentials.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(OrchestratorError::CredentialsMissing { backend_id: record.id }),
    };

    let body: Value = match serde_json::from_str(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            return Err(OrchestratorError::InvalidCredentials {
                provider: record.provider.clone(),
                message: "credentials must be a JSON object".to_string(),
            })
        }
        Err(_) if is_env_format(raw) => {
            return Err(OrchestratorError::LegacyCredentials { backend_id: record.id })
        }
        Err(e) => {
            return Err(OrchestratorError::InvalidCredentials {
                provider: record.provider.clone(),
                message: e.to_string(),
            })
        }
    };

    // Pre-versioned JSON documents are treated as the legacy format
    let version = match body.get("version") {
        None => return Err(OrchestratorError::LegacyCredentials { backend_id: record.id }),
        Some(v) => v.as_u64().ok_or_else(|| OrchestratorError::InvalidCredentials {
            provider: record.provider.clone(),
            message: "version must be a positive integer".to_string(),
        })?,
    };

    if version != u64::from(CURRENT_SCHEMA_VERSION) {
        return Err(OrchestratorError::UnsupportedCredentialVersion {
            backend_id: record.id,
            version,
        });
    }

    Ok(CredentialDocument {
        version: CURRENT_SCHEMA_VERSION,
        body,
    })
}
