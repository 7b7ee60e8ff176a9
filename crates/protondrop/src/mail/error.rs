//! Mail session error types.

use thiserror::Error;

/// Errors that can occur while talking to the mail server.
#[derive(Error, Debug)]
pub enum MailError {
    /// Failed to reach the IMAP server.
    #[error("IMAP connection failed: {0}")]
    ConnectionFailed(String),

    /// TLS/SSL error during connection.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A second factor was demanded but no code source is available.
    #[error("Second factor required but no one-time code is available")]
    SecondFactorRequired,

    /// IMAP protocol failure mid-conversation.
    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    /// The requested folder/label does not exist.
    #[error("IMAP folder '{0}' not found")]
    FolderNotFound(String),

    /// Failed to parse a fetched message.
    #[error("Failed to parse message: {0}")]
    Parse(String),

    /// Invalid session configuration.
    #[error("Invalid mail configuration: {0}")]
    Config(String),
}

impl MailError {
    /// Network-level failures a scheduler can retry by re-invoking the job.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MailError::ConnectionFailed(_) | MailError::Tls(_) | MailError::Protocol(_)
        )
    }
}

impl From<async_native_tls::Error> for MailError {
    fn from(err: async_native_tls::Error) -> Self {
        MailError::Tls(err.to_string())
    }
}

/// Result type for mail operations.
pub type Result<T> = std::result::Result<T, MailError>;
