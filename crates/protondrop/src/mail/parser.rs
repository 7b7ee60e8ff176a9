//! Message parsing and attachment extraction.

use std::collections::HashSet;

use log::debug;
use mail_parser::{MessageParser, MimeHeaders, PartType};

use crate::sanitize::sanitize_filename;

use super::error::{MailError, Result};
use super::Attachment;

/// Extension allow-list applied to extracted attachments.
///
/// Attachments that do not match are skipped silently; they are mailbox
/// noise, not an error condition.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    allowed: HashSet<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: extensions
                .into_iter()
                .map(|e| e.into().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn allows(&self, extension: &str) -> bool {
        self.allowed.contains(&extension.to_ascii_lowercase())
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(["pdf", "zip"])
    }
}

/// Extracts allow-listed attachments from a raw RFC 5322 message.
pub fn extract_attachments(raw: &[u8], filter: &ExtensionFilter) -> Result<Vec<Attachment>> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MailError::Parse("failed to parse message".to_string()))?;

    let mut attachments = Vec::new();

    for part in message.parts.iter() {
        if !is_attachment(part) {
            continue;
        }

        let content = match &part.body {
            PartType::Binary(data) | PartType::InlineBinary(data) => data.to_vec(),
            PartType::Text(text) => text.as_bytes().to_vec(),
            PartType::Html(html) => html.as_bytes().to_vec(),
            _ => continue,
        };

        let Some(filename) = attachment_filename(part) else {
            debug!("Skipping attachment without a usable filename");
            continue;
        };

        let Some(extension) = extension_of(&filename) else {
            debug!("Skipping attachment '{}' without extension", filename);
            continue;
        };

        if !filter.allows(&extension) {
            debug!("Skipping attachment '{}' ({})", filename, extension);
            continue;
        }

        debug!(
            "Found attachment: {} ({}, {} bytes)",
            filename,
            extension,
            content.len()
        );

        attachments.push(Attachment {
            filename,
            extension,
            content,
        });
    }

    Ok(attachments)
}

/// Checks if a message part is an attachment.
fn is_attachment(part: &mail_parser::MessagePart) -> bool {
    if let Some(disposition) = part.content_disposition() {
        if disposition.ctype() == "attachment" {
            return true;
        }
    }

    // Inline attachments still carry a filename.
    if part.attachment_name().is_some() {
        return true;
    }

    // Typed non-text parts that are not containers.
    if let Some(content_type) = part.content_type() {
        let ctype = content_type.ctype();
        if ctype != "text" && ctype != "multipart" && ctype != "message" {
            return content_type.subtype().is_some();
        }
    }

    false
}

/// Resolves a sanitized filename for the part, falling back to a name
/// derived from the content type when the headers carry none.
fn attachment_filename(part: &mail_parser::MessagePart) -> Option<String> {
    let raw = part
        .attachment_name()
        .or_else(|| part.content_type().and_then(|ct| ct.attribute("name")))
        .map(|s| s.to_string());

    match raw {
        Some(name) if !name.is_empty() => Some(sanitize_filename(&name)),
        _ => {
            let content_type = part.content_type()?;
            let subtype = content_type.subtype()?;
            let ext = match (content_type.ctype(), subtype) {
                ("application", "pdf") => "pdf",
                ("application", "zip") | ("application", "x-zip-compressed") => "zip",
                _ => return None,
            };
            Some(format!("attachment.{}", ext))
        }
    }
}

fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}
