//! The incremental sync pass.
//!
//! One run: load the checkpoint, enumerate messages newer than it, write
//! their allow-listed attachments to the drop directory, and advance the
//! checkpoint only as far as fully-processed messages. Crash-safety comes
//! from ordering alone: the checkpoint is saved last, so an interrupted run
//! re-processes rather than skips (at-least-once, never zero-times).

use chrono::{DateTime, Utc};
use tracing::{error, info, info_span, warn};

use crate::checkpoint::CheckpointStore;
use crate::error::Result;
use crate::mail::{Attachment, ExtensionFilter, MailSession, MessageRef};
use crate::sanitize::{sanitize_component, MAX_SENDER_LEN};
use crate::storage::FileWriter;

/// Knobs for a sync pass.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Abort the whole run on the first attachment write failure instead of
    /// recording it and continuing.
    pub stop_on_first_error: bool,
}

/// Outcome of a sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub messages_seen: usize,
    pub attachments_written: usize,
    /// Per-attachment failures recorded in continue mode.
    pub errors: Vec<String>,
    /// New checkpoint value, when the pass advanced it.
    pub advanced_to: Option<DateTime<Utc>>,
}

/// Orchestrates one incremental pass over a folder.
pub struct SyncEngine {
    folder: String,
    filter: ExtensionFilter,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(folder: impl Into<String>, options: SyncOptions) -> Self {
        Self {
            folder: folder.into(),
            filter: ExtensionFilter::default(),
            options,
        }
    }

    /// Replaces the default `{pdf, zip}` attachment allow-list.
    pub fn with_filter(mut self, filter: ExtensionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Runs one pass. The session is closed on success and on error paths.
    pub async fn run<S: MailSession>(
        &self,
        session: &mut S,
        checkpoints: &CheckpointStore,
        writer: &FileWriter,
    ) -> Result<SyncReport> {
        let result = self.run_inner(session, checkpoints, writer).await;
        if let Err(e) = session.close().await {
            warn!("Failed to close mail session: {}", e);
        }
        result
    }

    async fn run_inner<S: MailSession>(
        &self,
        session: &mut S,
        checkpoints: &CheckpointStore,
        writer: &FileWriter,
    ) -> Result<SyncReport> {
        let _span = info_span!("sync", folder = %self.folder).entered();

        writer.ensure_exists()?;

        let since = checkpoints.load();
        info!(
            "Scanning folder '{}' for messages received after {}",
            self.folder, since
        );

        let refs = session.list_new(&self.folder, since).await?;
        let mut report = SyncReport::default();

        if refs.is_empty() {
            info!("No new messages in '{}'", self.folder);
            return Ok(report);
        }
        info!("Found {} new messages in '{}'", refs.len(), self.folder);

        let mut committed = since;
        let mut advance_blocked = false;

        for message in &refs {
            report.messages_seen += 1;

            // Transport failures here are fatal: abort without saving, the
            // next run picks up from the old checkpoint.
            let attachments = session.fetch_attachments(message, &self.filter).await?;

            let mut message_failed = false;
            for attachment in &attachments {
                let name = destination_name(message, attachment);
                match writer.write(&name, &attachment.content) {
                    Ok(path) => {
                        report.attachments_written += 1;
                        info!("Saved attachment: {}", path.display());
                    }
                    Err(e) => {
                        if self.options.stop_on_first_error {
                            return Err(e.into());
                        }
                        error!(
                            "Failed to write '{}' from message UID {}: {}",
                            name, message.uid, e
                        );
                        report.errors.push(format!("{}: {}", name, e));
                        message_failed = true;
                    }
                }
            }

            if message_failed {
                // The checkpoint must never move past a failed message;
                // later successes still get written, but not committed.
                advance_blocked = true;
            } else if !advance_blocked && message.received_at > committed {
                committed = message.received_at;
            }
        }

        if committed > since {
            checkpoints.save(committed)?;
            info!("Checkpoint advanced to {}", committed);
            report.advanced_to = Some(committed);
        }

        Ok(report)
    }
}

/// Destination filename: `{YYYYMMDD}-{sender}-{original_filename}`.
fn destination_name(message: &MessageRef, attachment: &Attachment) -> String {
    format!(
        "{}-{}-{}",
        message.received_at.format("%Y%m%d"),
        sanitize_component(&message.sender, MAX_SENDER_LEN),
        attachment.filename
    )
}
