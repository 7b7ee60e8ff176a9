//! Mail session capability.
//!
//! The sync engine only ever talks to the [`MailSession`] trait; the real
//! IMAP implementation lives in [`imap`], and tests substitute an in-memory
//! fake.

pub mod error;
pub mod imap;
pub mod parser;
pub mod second_factor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use error::MailError;
pub use imap::ImapSession;
pub use parser::ExtensionFilter;
pub use second_factor::{select_code_source, CodeSource, DenyCode, PromptCode, StoredCode};

use error::Result;

/// Connection settings for the mail server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Tolerate self-signed certificates (local bridge endpoints).
    pub accept_invalid_certs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 993,
            use_tls: true,
            accept_invalid_certs: false,
        }
    }
}

/// A message discovered during enumeration.
#[derive(Debug, Clone)]
pub struct MessageRef {
    /// Server-side handle used to fetch the message body.
    pub uid: u32,
    /// The Message-ID header, when the server reports one.
    pub message_id: Option<String>,
    /// Display name of the sender, falling back to the address.
    pub sender: String,
    pub received_at: DateTime<Utc>,
}

/// An attachment extracted from a message.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Sanitized filename.
    pub filename: String,
    /// Lowercase file extension.
    pub extension: String,
    pub content: Vec<u8>,
}

/// An authenticated mail session.
#[async_trait]
pub trait MailSession: Send {
    /// Enumerates messages in `folder` received strictly after `since`,
    /// ordered ascending by receive time. The cutoff is applied by the
    /// server-side query, bounded by a same-day residual filter.
    async fn list_new(&mut self, folder: &str, since: DateTime<Utc>) -> Result<Vec<MessageRef>>;

    /// Fetches the attachments of a message that pass the extension
    /// allow-list. Non-matching attachments are skipped, not errors.
    async fn fetch_attachments(
        &mut self,
        message: &MessageRef,
        filter: &ExtensionFilter,
    ) -> Result<Vec<Attachment>>;

    /// Releases the session. Invoked on error paths too.
    async fn close(&mut self) -> Result<()>;
}
