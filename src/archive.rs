//! Backup Archive
//!
//! Stores backup blobs as timestamped files in a directory, the on-disk
//! counterpart of offering a backup as a file download. Old backups are
//! rotated away so the directory does not grow without bound.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{ArchiveError, DecodeError};

/// Default prefix for backup filenames.
pub const DEFAULT_BACKUP_PREFIX: &str = "backup_";

/// Extension for backup files.
const BACKUP_EXTENSION: &str = ".json";

/// Timestamp layout embedded in backup filenames.
const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Default maximum number of backups to retain.
pub const DEFAULT_MAX_BACKUPS: usize = 10;

/// A directory of timestamped backup files.
#[derive(Debug, Clone)]
pub struct BackupArchive {
    /// Directory holding the backups.
    dir: PathBuf,

    /// Filename prefix identifying backups in `dir`.
    prefix: String,

    /// Maximum number of backup files to retain.
    max_backups: usize,
}

impl BackupArchive {
    /// Create an archive in `dir` with the default prefix and retention.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_BACKUP_PREFIX.to_string(),
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }

    /// Use a custom filename prefix, e.g. `MatchDayCoach_Backup_`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Keep at most `max` backups after each write.
    pub fn with_retention(mut self, max: usize) -> Self {
        self.max_backups = max;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Filename a backup taken at `at` is stored under.
    pub fn filename_for(&self, at: DateTime<Utc>) -> String {
        format!(
            "{}{}{}",
            self.prefix,
            at.format(FILENAME_TIMESTAMP_FORMAT),
            BACKUP_EXTENSION
        )
    }

    /// Write `blob` as a new backup file and rotate old ones.
    ///
    /// A second backup within the same second replaces the first.
    ///
    /// # Returns
    /// The path of the written file.
    pub fn write(&self, blob: &str, at: DateTime<Utc>) -> Result<PathBuf, ArchiveError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| ArchiveError::DirectoryCreate {
                path: self.dir.clone(),
                source: e,
            })?;
        }

        let path = self.dir.join(self.filename_for(at));

        fs::write(&path, blob).map_err(|e| ArchiveError::FileWrite {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), bytes = blob.len(), "wrote backup");

        self.rotate()?;

        Ok(path)
    }

    /// List backup files, newest first.
    ///
    /// A missing directory is an empty archive.
    pub fn list(&self) -> Result<Vec<PathBuf>, ArchiveError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups: Vec<(DateTime<Utc>, PathBuf)> = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| ArchiveError::FileRead {
                path: self.dir.clone(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(timestamp) = self.parse_timestamp(entry.path()) {
                backups.push((timestamp, entry.into_path()));
            }
        }

        backups.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(backups.into_iter().map(|(_, path)| path).collect())
    }

    /// The most recent backup, if any.
    pub fn latest(&self) -> Result<Option<PathBuf>, ArchiveError> {
        Ok(self.list()?.into_iter().next())
    }

    /// Delete the oldest backups beyond the retention limit.
    ///
    /// # Returns
    /// The number of files removed.
    pub fn rotate(&self) -> Result<usize, ArchiveError> {
        let mut backups = self.list()?;
        let mut removed = 0;

        // Newest first, so the oldest are at the end.
        while backups.len() > self.max_backups {
            if let Some(oldest) = backups.pop() {
                fs::remove_file(&oldest).map_err(|e| ArchiveError::FileWrite {
                    path: oldest.clone(),
                    source: e,
                })?;
                debug!(path = %oldest.display(), "rotated out old backup");
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Read a backup file, refusing files larger than `max_bytes` before
    /// reading their contents.
    pub fn read_blob(&self, path: &Path, max_bytes: u64) -> Result<Vec<u8>, DecodeError> {
        let metadata = fs::metadata(path).map_err(|e| DecodeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        if metadata.len() > max_bytes {
            return Err(DecodeError::TooLarge {
                size: metadata.len(),
                limit: max_bytes,
            });
        }

        fs::read(path).map_err(|e| DecodeError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Timestamp embedded in a backup filename, or `None` if `path` is not
    /// one of this archive's backups.
    pub fn parse_timestamp(&self, path: &Path) -> Option<DateTime<Utc>> {
        let filename = path.file_name()?.to_str()?;
        let stamp = filename
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(BACKUP_EXTENSION)?;

        let naive = NaiveDateTime::parse_from_str(stamp, FILENAME_TIMESTAMP_FORMAT).ok()?;
        Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
    }
}
