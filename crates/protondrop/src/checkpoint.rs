//! Durable "last checked" state for incremental sync.
//!
//! One JSON record per checkpoint file; a separate file per (account, folder)
//! pair is the caller's responsibility. Saves are atomic (temp file + rename)
//! so a crash mid-write never leaves a corrupt record behind.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;

/// Timestamp format used in the checkpoint record.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRecord {
    last_check: String,
}

/// Reads and writes the persisted sync boundary.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the last-checked timestamp.
    ///
    /// A missing file means first run and yields the Unix epoch (process
    /// everything). An unreadable or corrupt record is treated the same way,
    /// with a warning; re-downloading is safe, losing messages is not.
    pub fn load(&self) -> DateTime<Utc> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "No checkpoint at '{}', starting from epoch",
                    self.path.display()
                );
                return DateTime::UNIX_EPOCH;
            }
            Err(e) => {
                warn!(
                    "Could not read checkpoint '{}' ({}), starting from epoch",
                    self.path.display(),
                    e
                );
                return DateTime::UNIX_EPOCH;
            }
        };

        match parse_record(&content) {
            Some(ts) => ts,
            None => {
                warn!(
                    "Corrupt checkpoint record in '{}', starting from epoch",
                    self.path.display()
                );
                DateTime::UNIX_EPOCH
            }
        }
    }

    /// Atomically replaces the record with the given timestamp.
    ///
    /// The record is written to a sibling temp file first and renamed over
    /// the target, so the old value survives a crash mid-write.
    pub fn save(&self, timestamp: DateTime<Utc>) -> Result<(), CheckpointError> {
        let record = CheckpointRecord {
            last_check: timestamp.format(DATE_FORMAT).to_string(),
        };
        let json = serde_json::to_string(&record)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| CheckpointError::Write {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|e| CheckpointError::Write {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| CheckpointError::Write {
            path: self.path.clone(),
            source: e,
        })?;

        debug!(
            "Checkpoint '{}' saved: {}",
            self.path.display(),
            record.last_check
        );
        Ok(())
    }
}

fn parse_record(content: &str) -> Option<DateTime<Utc>> {
    let record: CheckpointRecord = serde_json::from_str(content).ok()?;
    if let Ok(naive) = NaiveDateTime::parse_from_str(&record.last_check, DATE_FORMAT) {
        return Some(naive.and_utc());
    }
    // Tolerate full RFC 3339 records written by hand.
    DateTime::parse_from_rfc3339(&record.last_check)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
