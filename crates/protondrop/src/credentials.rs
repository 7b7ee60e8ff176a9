//! Credential resolution from the 1Password CLI.
//!
//! The mailbox credentials live in an external secret store and are fetched
//! per run via `op item get`. Nothing is cached or persisted locally; the
//! parsed credential stays in process memory for the session lifetime.

use log::{debug, info};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;

/// Errors that can occur while resolving credentials.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The secret store CLI could not be invoked at all.
    #[error("Secret store CLI unavailable: {0}")]
    StoreUnavailable(String),

    /// The requested item does not exist (or the store refused the lookup).
    #[error("Secret store item '{item}' not found: {detail}")]
    NotFound { item: String, detail: String },

    /// The store returned output we could not parse.
    #[error("Failed to parse secret store output: {0}")]
    Parse(#[from] serde_json::Error),

    /// The item exists but lacks a required field.
    #[error("Secret store item '{item}' is missing the '{field}' field")]
    Incomplete { item: String, field: &'static str },
}

pub type Result<T> = std::result::Result<T, CredentialError>;

/// A resolved mailbox credential. Held in memory only.
#[derive(Debug)]
pub struct Credential {
    pub username: String,
    pub password: SecretString,
    /// Current one-time code, when the item carries an OTP field.
    pub one_time_code: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct ItemOutput {
    #[serde(default)]
    fields: Vec<ItemField>,
}

#[derive(Debug, Deserialize)]
struct ItemField {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    totp: Option<String>,
}

/// Fetches the named item from the secret store and extracts the mailbox
/// credential fields.
pub async fn fetch_credential(item: &str, vault: &str) -> Result<Credential> {
    info!("Fetching credentials for item '{}' from vault '{}'", item, vault);

    let output = Command::new("op")
        .args(["item", "get", item, "--vault", vault, "--format", "json"])
        .output()
        .await
        .map_err(|e| CredentialError::StoreUnavailable(format!("failed to run 'op': {}", e)))?;

    if !output.status.success() {
        let detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(CredentialError::NotFound {
            item: item.to_string(),
            detail,
        });
    }

    parse_item(item, &output.stdout)
}

/// Parses the JSON item representation the store emits.
///
/// Factored out of [`fetch_credential`] so it is testable without invoking
/// the external process.
fn parse_item(item: &str, raw: &[u8]) -> Result<Credential> {
    let parsed: ItemOutput = serde_json::from_slice(raw)?;

    let mut username = None;
    let mut password = None;
    let mut one_time_code = None;

    for field in parsed.fields {
        match field.id.as_deref() {
            Some("username") => username = field.value,
            Some("password") => password = field.value,
            Some("one-time password") => one_time_code = field.totp,
            _ => {
                if field.kind.as_deref() == Some("OTP") && one_time_code.is_none() {
                    one_time_code = field.totp;
                }
            }
        }
    }

    let username = username
        .filter(|s| !s.is_empty())
        .ok_or(CredentialError::Incomplete {
            item: item.to_string(),
            field: "username",
        })?;
    let password = password
        .filter(|s| !s.is_empty())
        .ok_or(CredentialError::Incomplete {
            item: item.to_string(),
            field: "password",
        })?;

    debug!(
        "Resolved credentials for '{}' (one-time code: {})",
        username,
        if one_time_code.is_some() { "present" } else { "absent" }
    );

    Ok(Credential {
        username,
        password: SecretString::from(password),
        one_time_code: one_time_code
            .filter(|s| !s.is_empty())
            .map(SecretString::from),
    })
}
