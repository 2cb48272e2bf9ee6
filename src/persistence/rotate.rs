// src/persistence/rotate.rs
//! Time-based rotation of the live store file.
//!
//! Rotation is driven by elapsed time, never by size: a new file begins
//! every fixed period regardless of write volume, which bounds both the
//! scan cost of historical queries and the blast radius of a corrupted
//! file. Callers pass their own clock reading so rotation decisions are
//! deterministic under test.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::util::rotation_suffix;

pub struct FileRotate {
    live_path: PathBuf,
    rotation_period: Duration,
    /// Creation instant of the current file, epoch millis.
    file_created_ms: i64,
}

impl FileRotate {
    pub fn new(live_path: PathBuf, rotation_period: Duration, now_ms: i64) -> Self {
        Self {
            live_path,
            rotation_period,
            file_created_ms: now_ms,
        }
    }

    pub fn live_path(&self) -> &Path {
        &self.live_path
    }

    pub fn file_created_ms(&self) -> i64 {
        self.file_created_ms
    }

    /// Rotate only when the current file has been open at least one full
    /// rotation period. Returns the rotated path, or `None` when no
    /// rotation happened.
    pub fn try_rotate(&mut self, now_ms: i64) -> io::Result<Option<PathBuf>> {
        let period_ms = self.rotation_period.as_millis() as i64;
        if now_ms - self.file_created_ms >= period_ms {
            self.rotate(now_ms)
        } else {
            Ok(None)
        }
    }

    /// Rotate regardless of elapsed time (startup cleanup, write-failure
    /// recovery).
    pub fn force_rotate(&mut self, now_ms: i64) -> io::Result<Option<PathBuf>> {
        self.rotate(now_ms)
    }

    fn rotate(&mut self, now_ms: i64) -> io::Result<Option<PathBuf>> {
        self.file_created_ms = now_ms;
        if !self.live_path.exists() {
            // First boot, or the live file vanished underneath us; either
            // way there is nothing to rename and the caller starts fresh.
            return Ok(None);
        }

        let target = self.rotation_target(now_ms);
        fs::rename(&self.live_path, &target)?;
        tracing::info!(
            from = %self.live_path.display(),
            to = %target.display(),
            "rotated store file"
        );
        Ok(Some(target))
    }

    /// `<base>.<year-month-day-hour-minute-second>`, uniquified with a
    /// numeric tail when two rotations land in the same second.
    fn rotation_target(&self, now_ms: i64) -> PathBuf {
        let dir = self.live_path.parent().unwrap_or_else(|| Path::new("."));
        let base = self
            .live_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = rotation_suffix(now_ms);

        let mut candidate = dir.join(format!("{base}.{suffix}"));
        let mut n = 1;
        while candidate.exists() {
            candidate = dir.join(format!("{base}.{suffix}.{n}"));
            n += 1;
        }
        candidate
    }
}
