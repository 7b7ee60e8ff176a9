use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::StorageError;

/// Upper bound on collision-resolution attempts for a single name.
const MAX_ATTEMPTS: u32 = 1000;

/// Writes attachment bytes into the drop directory, never overwriting.
pub struct FileWriter {
    drop_dir: PathBuf,
}

impl FileWriter {
    pub fn new<P: AsRef<Path>>(drop_dir: P) -> Self {
        Self {
            drop_dir: drop_dir.as_ref().to_path_buf(),
        }
    }

    pub fn drop_dir(&self) -> &Path {
        &self.drop_dir
    }

    /// Creates the drop directory if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<(), StorageError> {
        self.ensure_drop_dir()
    }

    /// Writes `content` under `filename`, disambiguating collisions.
    ///
    /// The exists-check and creation are a single atomic step
    /// (`create_new`), so two racing writers cannot clobber each other. When
    /// the name is taken, a numeric suffix is inserted before the extension
    /// (`name-1.pdf`, `name-2.pdf`, ...) until a free slot is found.
    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        self.ensure_drop_dir()?;

        let (base, ext) = match filename.rfind('.') {
            Some(dot) => (&filename[..dot], &filename[dot..]),
            None => (filename, ""),
        };

        for counter in 0..=MAX_ATTEMPTS {
            let candidate = if counter == 0 {
                filename.to_string()
            } else {
                format!("{}-{}{}", base, counter, ext)
            };
            let path = self.drop_dir.join(&candidate);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: path.clone(),
                            source: e,
                        })?;
                    if counter > 0 {
                        debug!("Name '{}' taken, wrote '{}'", filename, candidate);
                    }
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile { path, source: e });
                }
            }
        }

        Err(StorageError::FileExists(self.drop_dir.join(filename)))
    }

    fn ensure_drop_dir(&self) -> Result<(), StorageError> {
        if !self.drop_dir.exists() {
            std::fs::create_dir_all(&self.drop_dir).map_err(|e| StorageError::CreateDirectory {
                path: self.drop_dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }
}
