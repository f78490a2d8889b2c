//! JSON-lines file sink.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};
use crate::sink::AuditSink;

/// Append-only audit log stored as one JSON object per line.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditLog {
    /// Open (or create) the log at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] if the directory or file cannot be created.
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| io_err(&path, source))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| io_err(&path, source))?;
        debug!(path = %path.display(), "opened audit log");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the newest `limit` entries from a log file, oldest first.
    ///
    /// Lines that fail to parse are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] if the file cannot be read.
    pub fn read_recent(path: impl AsRef<Path>, limit: usize) -> AuditResult<Vec<AuditEntry>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| io_err(path, source))?;
        let mut entries = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| io_err(path, source))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(path = %path.display(), line = idx, error = %e, "skipping malformed audit line"),
            }
        }
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.into_iter().skip(skip).collect())
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, entry: AuditEntry) -> AuditResult<()> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .map_err(|e| AuditError::StorageError(e.to_string()))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| io_err(&self.path, source))
    }
}

fn io_err(path: &Path, source: std::io::Error) -> AuditError {
    AuditError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditOutcome;
    use warden_core::{Action, Scope};

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");

        let log = JsonlAuditLog::open(&path).unwrap();
        for outcome in [AuditOutcome::Granted, AuditOutcome::Denied, AuditOutcome::Revoked] {
            log.record(AuditEntry::new(Scope::File, Action::Write, outcome).with_resource("/tmp/a"))
                .unwrap();
        }

        let all = JsonlAuditLog::read_recent(&path, 100).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].outcome, AuditOutcome::Granted);

        let last = JsonlAuditLog::read_recent(&path, 1).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].outcome, AuditOutcome::Revoked);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        JsonlAuditLog::open(&path)
            .unwrap()
            .record(AuditEntry::new(Scope::Git, Action::Push, AuditOutcome::Granted))
            .unwrap();
        JsonlAuditLog::open(&path)
            .unwrap()
            .record(AuditEntry::new(Scope::Git, Action::Push, AuditOutcome::Expired))
            .unwrap();

        assert_eq!(JsonlAuditLog::read_recent(&path, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        std::fs::write(&path, "not json\n\n").unwrap();
        JsonlAuditLog::open(&path)
            .unwrap()
            .record(AuditEntry::new(Scope::File, Action::Read, AuditOutcome::Denied))
            .unwrap();

        let entries = JsonlAuditLog::read_recent(&path, 10).unwrap();
        assert_eq!(entries.len(), 1);
    }
}
