#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use protondrop::mail::error::Result;
use protondrop::{Attachment, ExtensionFilter, MailError, MailSession, MessageRef};

/// In-memory mail session honoring the `MailSession` contract: `list_new`
/// applies the `since` cutoff and returns ascending order, and
/// `fetch_attachments` applies the extension allow-list.
#[derive(Default)]
pub struct FakeSession {
    pub mailbox: Vec<(MessageRef, Vec<Attachment>)>,
    /// UID whose body fetch fails with a transport error.
    pub fail_fetch_for: Option<u32>,
    pub closed: bool,
    pub list_calls: usize,
}

impl FakeSession {
    pub fn new(mailbox: Vec<(MessageRef, Vec<Attachment>)>) -> Self {
        Self {
            mailbox,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MailSession for FakeSession {
    async fn list_new(&mut self, _folder: &str, since: DateTime<Utc>) -> Result<Vec<MessageRef>> {
        self.list_calls += 1;
        let mut refs: Vec<MessageRef> = self
            .mailbox
            .iter()
            .map(|(message, _)| message.clone())
            .filter(|message| message.received_at > since)
            .collect();
        refs.sort_by_key(|r| (r.received_at, r.uid));
        Ok(refs)
    }

    async fn fetch_attachments(
        &mut self,
        message: &MessageRef,
        filter: &ExtensionFilter,
    ) -> Result<Vec<Attachment>> {
        if self.fail_fetch_for == Some(message.uid) {
            return Err(MailError::Protocol("connection dropped".to_string()));
        }

        let attachments = self
            .mailbox
            .iter()
            .find(|(m, _)| m.uid == message.uid)
            .map(|(_, attachments)| attachments.clone())
            .unwrap_or_default();

        Ok(attachments
            .into_iter()
            .filter(|a| filter.allows(&a.extension))
            .collect())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

pub fn message(uid: u32, sender: &str, received_at: DateTime<Utc>) -> MessageRef {
    MessageRef {
        uid,
        message_id: Some(format!("<msg-{}@test.example>", uid)),
        sender: sender.to_string(),
        received_at,
    }
}

pub fn attachment(filename: &str, content: &[u8]) -> Attachment {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    Attachment {
        filename: filename.to_string(),
        extension,
        content: content.to_vec(),
    }
}

pub fn received(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 30, 0).unwrap()
}
