//! IMAP-backed mail session.

use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{debug, info, warn};
use secrecy::ExposeSecret;

use crate::credentials::Credential;

use super::error::{MailError, Result};
use super::parser::{self, ExtensionFilter};
use super::second_factor::CodeSource;
use super::{Attachment, MailSession, MessageRef, ServerConfig};

/// Type alias for the underlying async stream (async-io wrapped TcpStream).
type AsyncTcpStream = async_io::Async<std::net::TcpStream>;

/// Type alias for the TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// A live, authenticated IMAP session.
pub struct ImapSession {
    session: Option<Session<TlsStream>>,
    current_folder: Option<String>,
}

impl ImapSession {
    /// Connects and authenticates, negotiating a second factor if the server
    /// demands one.
    pub async fn open(
        config: &ServerConfig,
        credential: &Credential,
        code_source: &dyn CodeSource,
    ) -> Result<Self> {
        if !config.use_tls {
            return Err(MailError::Config(
                "TLS is required for mail connections".to_string(),
            ));
        }

        let addr = format!("{}:{}", config.host, config.port);
        info!("Connecting to IMAP server at {}", addr);

        // Establish TCP connection using std::net and wrap with async-io.
        let std_stream = std::net::TcpStream::connect(&addr)
            .map_err(|e| MailError::ConnectionFailed(e.to_string()))?;
        std_stream
            .set_nonblocking(true)
            .map_err(|e| MailError::ConnectionFailed(e.to_string()))?;
        let tcp_stream = async_io::Async::new(std_stream)
            .map_err(|e| MailError::ConnectionFailed(e.to_string()))?;

        let tls = TlsConnector::new().danger_accept_invalid_certs(config.accept_invalid_certs);
        let tls_stream = tls
            .connect(&config.host, tcp_stream)
            .await
            .map_err(|e| MailError::Tls(e.to_string()))?;

        let client = async_imap::Client::new(tls_stream);
        let session = Self::login(client, credential, code_source).await?;

        info!("Successfully authenticated as {}", credential.username);
        Ok(Self {
            session: Some(session),
            current_folder: None,
        })
    }

    /// Attempts LOGIN with the bare password; on rejection, obtains a
    /// one-time code and retries once with the code appended.
    async fn login(
        client: async_imap::Client<TlsStream>,
        credential: &Credential,
        code_source: &dyn CodeSource,
    ) -> Result<Session<TlsStream>> {
        let client = match client
            .login(&credential.username, credential.password.expose_secret())
            .await
        {
            Ok(session) => return Ok(session),
            Err((err, client)) => {
                debug!("LOGIN rejected ({}), negotiating second factor", err);
                client
            }
        };

        let code = code_source.obtain()?;
        let password_with_code = format!(
            "{}{}",
            credential.password.expose_secret(),
            code.expose_secret()
        );

        client
            .login(&credential.username, &password_with_code)
            .await
            .map_err(|(e, _)| MailError::AuthenticationFailed(e.to_string()))
    }

    /// Opens a folder in read-only mode using EXAMINE (not SELECT), so
    /// messages are never marked as read by a sync pass.
    async fn examine_folder(&mut self, folder: &str) -> Result<()> {
        if self.current_folder.as_deref() == Some(folder) {
            return Ok(());
        }

        let session = self.session_mut()?;
        info!("Examining folder: {}", folder);

        session.examine(folder).await.map_err(|e| {
            let text = e.to_string();
            if text.contains("Mailbox doesn't exist") || text.contains("NO") {
                MailError::FolderNotFound(folder.to_string())
            } else {
                MailError::Protocol(text)
            }
        })?;

        self.current_folder = Some(folder.to_string());
        Ok(())
    }

    fn session_mut(&mut self) -> Result<&mut Session<TlsStream>> {
        self.session
            .as_mut()
            .ok_or_else(|| MailError::ConnectionFailed("Not connected".to_string()))
    }
}

#[async_trait]
impl MailSession for ImapSession {
    async fn list_new(&mut self, folder: &str, since: DateTime<Utc>) -> Result<Vec<MessageRef>> {
        self.examine_folder(folder).await?;
        let session = self.session_mut()?;

        // SINCE has day granularity; the residual same-day overlap is cut
        // exactly on received_at below.
        let query = if since.timestamp() <= 0 {
            "ALL".to_string()
        } else {
            format!("SINCE {}", since.format("%d-%b-%Y"))
        };
        debug!("Searching with query: {}", query);

        let uids = session
            .uid_search(&query)
            .await
            .map_err(|e| MailError::Protocol(e.to_string()))?;

        let mut uid_list: Vec<u32> = uids.into_iter().collect();
        uid_list.sort_unstable();
        if uid_list.is_empty() {
            return Ok(Vec::new());
        }

        let uid_set = uid_list
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(",");
        debug!("Fetching envelopes for {} candidates", uid_list.len());

        let mut refs = Vec::new();
        {
            let mut messages = session
                .uid_fetch(&uid_set, "(UID ENVELOPE INTERNALDATE)")
                .await
                .map_err(|e| MailError::Protocol(e.to_string()))?;

            while let Some(item) = messages.next().await {
                let fetch = match item {
                    Ok(fetch) => fetch,
                    Err(e) => {
                        warn!("Error fetching envelope: {}", e);
                        continue;
                    }
                };

                let (Some(uid), Some(received_at)) = (fetch.uid, fetch.internal_date()) else {
                    warn!("Envelope response missing UID or INTERNALDATE");
                    continue;
                };

                let envelope = fetch.envelope();
                let sender = envelope
                    .and_then(|env| env.from.as_ref())
                    .and_then(|from| from.first())
                    .map(|addr| {
                        if let Some(name) = addr.name.as_deref().filter(|n| !n.is_empty()) {
                            decode(name)
                        } else {
                            match (addr.mailbox.as_deref(), addr.host.as_deref()) {
                                (Some(mailbox), Some(host)) => {
                                    format!("{}@{}", decode(mailbox), decode(host))
                                }
                                (Some(mailbox), None) => decode(mailbox),
                                _ => String::new(),
                            }
                        }
                    })
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "unknown-sender".to_string());
                let message_id = envelope.and_then(|env| env.message_id.as_deref()).map(decode);

                refs.push(MessageRef {
                    uid,
                    message_id,
                    sender,
                    received_at: received_at.with_timezone(&Utc),
                });
            }
        }

        refs.retain(|r| r.received_at > since);
        refs.sort_by_key(|r| (r.received_at, r.uid));

        debug!("Found {} new messages in '{}'", refs.len(), folder);
        Ok(refs)
    }

    async fn fetch_attachments(
        &mut self,
        message: &MessageRef,
        filter: &ExtensionFilter,
    ) -> Result<Vec<Attachment>> {
        let session = self.session_mut()?;
        debug!("Fetching message body for UID {}", message.uid);

        // BODY.PEEK[] fetches without marking as read.
        let mut messages = session
            .uid_fetch(message.uid.to_string(), "BODY.PEEK[]")
            .await
            .map_err(|e| MailError::Protocol(e.to_string()))?;

        let fetch = messages
            .next()
            .await
            .ok_or_else(|| {
                MailError::Protocol(format!("Message with UID {} not found", message.uid))
            })?
            .map_err(|e| MailError::Protocol(e.to_string()))?;

        let body = fetch
            .body()
            .ok_or_else(|| MailError::Protocol("Message has no body".to_string()))?;

        parser::extract_attachments(body, filter)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            info!("Disconnecting from IMAP server");
            session
                .logout()
                .await
                .map_err(|e| MailError::Protocol(e.to_string()))?;
        }
        self.current_folder = None;
        Ok(())
    }
}

impl Drop for ImapSession {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("ImapSession dropped without explicit close");
        }
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
