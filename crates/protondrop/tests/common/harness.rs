#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use protondrop::{CheckpointStore, FileWriter};

/// Isolated environment for one sync-engine test: a temp drop directory and
/// a temp checkpoint file.
pub struct Harness {
    temp_dir: TempDir,
    pub drop_dir: PathBuf,
    pub checkpoints: CheckpointStore,
    pub writer: FileWriter,
}

impl Harness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let drop_dir = temp_dir.path().join("drop");
        let checkpoints = CheckpointStore::new(temp_dir.path().join("last_check.json"));
        let writer = FileWriter::new(&drop_dir);

        Self {
            temp_dir,
            drop_dir,
            checkpoints,
            writer,
        }
    }

    /// Current checkpoint value (epoch when no run has saved yet).
    pub fn checkpoint_value(&self) -> DateTime<Utc> {
        self.checkpoints.load()
    }

    pub fn checkpoint_file_exists(&self) -> bool {
        self.checkpoints.path().exists()
    }

    /// Sorted filenames currently in the drop directory.
    pub fn drop_files(&self) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(&self.drop_dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    pub fn read_drop_file(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.drop_dir.join(name)).expect("Failed to read drop file")
    }
}
