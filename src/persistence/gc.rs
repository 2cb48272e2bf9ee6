// src/persistence/gc.rs
//! Count-based retention of rotated store files.
//!
//! Keeps the N most-recently rotated files for a base filename and
//! best-effort deletes the rest. A file that cannot be deleted is left
//! in the queue and retried on a later rotation; cleanup never blocks
//! new-file creation.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::PathBuf;

pub struct FileGC {
    dir: PathBuf,
    retention_count: usize,
    /// Rotated file names, oldest first. Timestamp suffixes sort
    /// lexicographically in chronological order.
    eligible: VecDeque<String>,
}

impl FileGC {
    /// Sweeps the directory for rotated files left by earlier runs, then
    /// trims to the retention count.
    pub fn new(dir: PathBuf, base_filename: &str, retention_count: usize) -> io::Result<Self> {
        let prefix = format!("{base_filename}.");
        let mut found: Vec<String> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) {
                found.push(name);
            }
        }
        found.sort();

        let mut gc = Self {
            dir,
            retention_count,
            eligible: found.into(),
        };
        gc.cleanup_excess();
        Ok(gc)
    }

    /// Register a just-rotated file and trim the excess.
    pub fn eligible_for_gc(&mut self, file_name: String) {
        self.eligible.push_back(file_name);
        self.cleanup_excess();
    }

    /// Number of rotated files currently tracked.
    pub fn tracked(&self) -> usize {
        self.eligible.len()
    }

    fn cleanup_excess(&mut self) {
        while self.eligible.len() > self.retention_count {
            let oldest = match self.eligible.front() {
                Some(name) => name.clone(),
                None => break,
            };
            let path = self.dir.join(&oldest);
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(file = %path.display(), "deleted rotated store file");
                    self.eligible.pop_front();
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    self.eligible.pop_front();
                }
                Err(err) => {
                    tracing::warn!(
                        file = %path.display(),
                        error = %err,
                        "could not delete rotated store file; will retry on a later rotation"
                    );
                    break;
                }
            }
        }
    }
}
