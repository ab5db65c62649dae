//! Backup and rollback store.
//!
//! Sidecar persistence of pre-migration file content, keyed by project
//! path and run id. The ordering rule is absolute: no file is overwritten
//! before its backup entry is committed to durable storage. Restores are
//! re-entrant, and restoring a whole run walks entries in reverse
//! migration order, continuing past individual failures.

use crate::error::{Error, Result};
use crate::paths;
use crate::utils::io;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

// ============================================================================
// Types
// ============================================================================

/// One persisted original, keyed by file and run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    /// Project-relative path of the migrated file.
    pub file: String,
    /// Backup file path relative to the run directory.
    pub backup_path: String,
    /// SHA-256 of the original content.
    pub original_hash: String,
    pub run_id: String,
    /// Migration order within the run; restores run in reverse.
    pub sequence: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupIndex {
    run_id: String,
    entries: Vec<BackupEntry>,
    /// Files already restored; keeps restore re-entrant.
    restored: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    /// The file was restored earlier; a second restore is a no-op.
    AlreadyRestored,
}

/// A file that could not be restored during a run-wide rollback.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreFailure {
    pub file: String,
    pub error: String,
}

/// Outcome of `restore_run`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRestoreSummary {
    pub run_id: String,
    pub restored: Vec<String>,
    pub failed: Vec<RestoreFailure>,
}

// ============================================================================
// BackupStore
// ============================================================================

#[derive(Debug)]
pub struct BackupStore {
    project_root: PathBuf,
    run_dir: PathBuf,
    index: BackupIndex,
}

impl BackupStore {
    /// Create the store for a new run. Failure here is fatal to the run:
    /// migrating without a working backup store is never allowed.
    pub fn create(project_root: &Path, run_id: &str) -> Result<Self> {
        let run_dir = paths::run_dir(project_root, run_id);
        let backups = paths::backups_dir(&run_dir);

        std::fs::create_dir_all(&backups)
            .map_err(|e| Error::store_unavailable(backups.display().to_string(), e.to_string()))?;

        let store = BackupStore {
            project_root: project_root.to_path_buf(),
            run_dir,
            index: BackupIndex {
                run_id: run_id.to_string(),
                entries: Vec::new(),
                restored: Vec::new(),
            },
        };
        store.persist_index()?;
        Ok(store)
    }

    /// Open the store of a previously recorded run.
    pub fn open(project_root: &Path, run_id: &str) -> Result<Self> {
        let run_dir = paths::run_dir(project_root, run_id);
        let index_path = paths::backup_index_path(&run_dir);

        if !index_path.exists() {
            return Err(Error::run_not_found(run_id));
        }

        let raw = io::read_file(&index_path, "read backup index")?;
        let index: BackupIndex = serde_json::from_str(&raw).map_err(|e| {
            Error::internal_json(e.to_string(), Some(format!("parse {}", index_path.display())))
        })?;

        Ok(BackupStore {
            project_root: project_root.to_path_buf(),
            run_dir,
            index,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.index.run_id
    }

    pub fn entries(&self) -> &[BackupEntry] {
        &self.index.entries
    }

    pub fn entry_for(&self, relative: &str) -> Option<&BackupEntry> {
        self.index.entries.iter().find(|e| e.file == relative)
    }

    /// Persist the original content of `relative` before it is touched.
    ///
    /// Within one run the store is append-only: a second backup request
    /// for the same file returns the existing entry untouched.
    pub fn backup(&mut self, relative: &str) -> Result<BackupEntry> {
        if let Some(existing) = self.entry_for(relative) {
            return Ok(existing.clone());
        }

        let source = self.project_root.join(relative);
        let data = io::read_bytes(&source, &format!("read {} for backup", relative))?;

        let sequence = self.index.entries.len();
        let backup_rel = format!("backups/{:04}_{}", sequence, sanitize(relative));
        let backup_abs = self.run_dir.join(&backup_rel);

        std::fs::write(&backup_abs, &data).map_err(|e| {
            Error::store_unavailable(backup_abs.display().to_string(), e.to_string())
        })?;

        let entry = BackupEntry {
            file: relative.to_string(),
            backup_path: backup_rel,
            original_hash: hash_bytes(&data),
            run_id: self.index.run_id.clone(),
            sequence,
        };
        self.index.entries.push(entry.clone());

        // The entry is only real once the index write lands
        self.persist_index()?;
        Ok(entry)
    }

    /// Restore one file byte-for-byte and retire its backup entry.
    pub fn restore(&mut self, relative: &str) -> Result<RestoreOutcome> {
        let Some(pos) = self.index.entries.iter().position(|e| e.file == relative) else {
            if self.index.restored.iter().any(|f| f == relative) {
                return Ok(RestoreOutcome::AlreadyRestored);
            }
            return Err(Error::backup_not_found(relative));
        };

        let entry = self.index.entries[pos].clone();
        let backup_abs = self.run_dir.join(&entry.backup_path);
        let target = self.project_root.join(relative);

        let data = io::read_bytes(&backup_abs, &format!("read backup of {}", relative))?;
        std::fs::write(&target, &data).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("restore {}", relative)))
        })?;

        self.index.entries.remove(pos);
        self.index.restored.push(relative.to_string());
        self.persist_index()?;

        let _ = std::fs::remove_file(&backup_abs);
        Ok(RestoreOutcome::Restored)
    }

    /// Restore every file touched by the run, in reverse migration order.
    /// Individual failures are reported, not fatal.
    pub fn restore_run(&mut self) -> RunRestoreSummary {
        let mut ordered: Vec<(usize, String)> = self
            .index
            .entries
            .iter()
            .map(|e| (e.sequence, e.file.clone()))
            .collect();
        ordered.sort_by_key(|(sequence, _)| std::cmp::Reverse(*sequence));

        let mut summary = RunRestoreSummary {
            run_id: self.index.run_id.clone(),
            restored: Vec::new(),
            failed: Vec::new(),
        };

        for (_, file) in ordered {
            match self.restore(&file) {
                Ok(_) => summary.restored.push(file),
                Err(e) => summary.failed.push(RestoreFailure {
                    file,
                    error: e.message.clone(),
                }),
            }
        }

        summary
    }

    /// Drop a file's backup entry without restoring. Used by the
    /// on-failure-only retention policy after validation passes.
    pub fn discard(&mut self, relative: &str) -> Result<bool> {
        let Some(pos) = self.index.entries.iter().position(|e| e.file == relative) else {
            return Ok(false);
        };

        let entry = self.index.entries.remove(pos);
        self.persist_index()?;
        let _ = std::fs::remove_file(self.run_dir.join(&entry.backup_path));
        Ok(true)
    }

    fn persist_index(&self) -> Result<()> {
        let path = paths::backup_index_path(&self.run_dir);
        let json = serde_json::to_string_pretty(&self.index)
            .map_err(|e| Error::internal_json(e.to_string(), Some("serialize backup index".to_string())))?;
        io::write_file_atomic(&path, &json, "write backup index")
            .map_err(|e| Error::store_unavailable(path.display().to_string(), e.message))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn sanitize(relative: &str) -> String {
    relative.replace(['/', '\\'], "__")
}

/// SHA-256 hex digest.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
