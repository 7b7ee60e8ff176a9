//! Second-factor code acquisition.
//!
//! The session asks a [`CodeSource`] for a one-time code when the server
//! rejects the bare password. Which source is in play is a deployment
//! decision: a code handed over by the secret store, a blocking operator
//! prompt, or a hard refusal for unattended runs.

use std::io::{self, BufRead, Write};

use log::info;
use secrecy::{ExposeSecret, SecretString};

use super::error::{MailError, Result};

/// A pluggable source of one-time codes.
pub trait CodeSource: Send + Sync {
    fn obtain(&self) -> Result<SecretString>;
}

/// Code supplied by the secret store alongside the password.
pub struct StoredCode {
    code: SecretString,
}

impl StoredCode {
    pub fn new(code: SecretString) -> Self {
        Self { code }
    }
}

impl CodeSource for StoredCode {
    fn obtain(&self) -> Result<SecretString> {
        info!("Using one-time code from the secret store");
        Ok(SecretString::from(self.code.expose_secret().to_string()))
    }
}

/// Blocking console prompt for an operator-entered code.
pub struct PromptCode;

impl CodeSource for PromptCode {
    fn obtain(&self) -> Result<SecretString> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let banner = "=".repeat(50);
        writeln!(out, "\n{}", banner)
            .and_then(|_| writeln!(out, "TWO-FACTOR AUTHENTICATION REQUIRED"))
            .and_then(|_| writeln!(out, "{}", banner))
            .and_then(|_| write!(out, "Enter 2FA code: "))
            .and_then(|_| out.flush())
            .map_err(|e| MailError::Config(format!("console unavailable: {}", e)))?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| MailError::Config(format!("console unavailable: {}", e)))?;

        let code = line.trim();
        if code.is_empty() {
            return Err(MailError::SecondFactorRequired);
        }
        Ok(SecretString::from(code.to_string()))
    }
}

/// Non-interactive stub: always refuses.
pub struct DenyCode;

impl CodeSource for DenyCode {
    fn obtain(&self) -> Result<SecretString> {
        Err(MailError::SecondFactorRequired)
    }
}

/// Picks the code source for a run: a stored code wins, otherwise the
/// operator prompt when interactive, otherwise refusal.
pub fn select_code_source(stored: Option<SecretString>, interactive: bool) -> Box<dyn CodeSource> {
    match stored {
        Some(code) => Box::new(StoredCode::new(code)),
        None if interactive => Box::new(PromptCode),
        None => Box::new(DenyCode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_code_returned() {
        let source = StoredCode::new(SecretString::from("123456".to_string()));
        assert_eq!(source.obtain().unwrap().expose_secret(), "123456");
    }

    #[test]
    fn test_deny_refuses() {
        let err = DenyCode.obtain().unwrap_err();
        assert!(matches!(err, MailError::SecondFactorRequired));
    }

    #[test]
    fn test_selection_prefers_stored_code() {
        let source = select_code_source(Some(SecretString::from("42".to_string())), false);
        assert_eq!(source.obtain().unwrap().expose_secret(), "42");
    }

    #[test]
    fn test_selection_refuses_when_non_interactive() {
        let source = select_code_source(None, false);
        assert!(matches!(
            source.obtain().unwrap_err(),
            MailError::SecondFactorRequired
        ));
    }
}
