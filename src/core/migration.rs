//! Per-component migration: scan, backup, rewrite, record.
//!
//! Files are processed sequentially; the write-after-backup ordering is
//! enforced here. File-level errors land in the file's MigrationRecord
//! and never cross this boundary; only a failing backup store propagates,
//! because continuing without backups is never allowed.

use crate::backup::BackupStore;
use crate::component::{self, ComponentMap, ComponentTag};
use crate::error::{Error, Result};
use crate::rewriter::{self, SkippedSite};
use crate::scanner;
use crate::utils::io;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// Types
// ============================================================================

/// Classification of a single file's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Every found call site was migrated (or there were none).
    Success,
    /// Some call sites migrated, others left for manual review.
    Partial,
    Failed,
}

/// Per-file outcome. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub file: String,
    pub component: ComponentTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_hash: Option<String>,
    pub sites_found: usize,
    pub migrated: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub patterns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skipped_sites: Vec<SkippedSite>,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationRecord {
    pub fn success(&self) -> bool {
        self.status == FileStatus::Success
    }
}

/// What happens to backups after a file validates cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionPolicy {
    /// Keep every backup until explicit cleanup (default).
    Always,
    /// Drop a file's backup once its validation passes.
    OnFailureOnly,
}

impl RetentionPolicy {
    pub fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "always" => Ok(RetentionPolicy::Always),
            "on-failure-only" => Ok(RetentionPolicy::OnFailureOnly),
            _ => Err(crate::error::Error::validation_invalid_argument(
                "retention",
                format!("Unknown retention policy '{}'. Use: always, on-failure-only", s),
                None,
            )),
        }
    }
}

/// Options for a migration run.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Scan and report only; no backups, no writes.
    pub dry_run: bool,
    /// Restrict the run to one component.
    pub component: Option<ComponentTag>,
    pub retention: RetentionPolicy,
    pub verbose: bool,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        MigrateOptions {
            dry_run: false,
            component: None,
            retention: RetentionPolicy::Always,
            verbose: false,
        }
    }
}

/// Cooperative cancellation, checked between files (never mid-file).
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of migrating one component.
#[derive(Debug, Clone)]
pub struct ComponentOutcome {
    pub component: ComponentTag,
    pub records: Vec<MigrationRecord>,
    /// True when the cancel flag stopped the loop early.
    pub cancelled: bool,
}

// ============================================================================
// Component migration
// ============================================================================

/// Migrate every candidate file of one component.
///
/// `store` is `None` in dry-run mode. The only error that propagates is a
/// backup-store failure; everything file-scoped is captured in records.
pub fn migrate_component(
    root: &Path,
    tag: ComponentTag,
    map: &ComponentMap,
    mut store: Option<&mut BackupStore>,
    cancel: &CancelFlag,
) -> Result<ComponentOutcome> {
    let files = component::candidate_files(root, map, tag);
    let mut records = Vec::with_capacity(files.len());
    let mut cancelled = false;

    for file in &files {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let relative = component::relative_path(root, file);
        records.push(migrate_file(root, &relative, tag, store.as_deref_mut())?);
    }

    Ok(ComponentOutcome {
        component: tag,
        records,
        cancelled,
    })
}

fn record_failed(relative: &str, tag: ComponentTag, error: String) -> MigrationRecord {
    MigrationRecord {
        file: relative.to_string(),
        component: tag,
        original_hash: None,
        sites_found: 0,
        migrated: 0,
        skipped: 0,
        patterns: Vec::new(),
        skipped_sites: Vec::new(),
        status: FileStatus::Failed,
        error: Some(error),
    }
}

fn migrate_file(
    root: &Path,
    relative: &str,
    tag: ComponentTag,
    store: Option<&mut BackupStore>,
) -> Result<MigrationRecord> {
    let path = root.join(relative);

    let bytes = match io::read_bytes(&path, &format!("read {}", relative)) {
        Ok(b) => b,
        Err(e) => return Ok(record_failed(relative, tag, e.message)),
    };

    // ScanError: undecodable file. Non-fatal to the run, fatal to this
    // file; it is left untouched and gets no backup.
    let content = match String::from_utf8(bytes) {
        Ok(c) => c,
        Err(_) => {
            let err = Error::scan_unreadable_file(relative, "invalid UTF-8");
            return Ok(record_failed(relative, tag, err.message));
        }
    };

    let original_hash = crate::backup::hash_bytes(content.as_bytes());
    let sites = scanner::scan_source(&content, relative);
    let resolved = sites.iter().filter(|s| s.resolved).count();
    let unresolved = sites.len() - resolved;

    // Zero call sites (or an already-migrated file): success, no backup
    if sites.is_empty() {
        return Ok(MigrationRecord {
            file: relative.to_string(),
            component: tag,
            original_hash: Some(original_hash),
            sites_found: 0,
            migrated: 0,
            skipped: 0,
            patterns: Vec::new(),
            skipped_sites: Vec::new(),
            status: FileStatus::Success,
            error: None,
        });
    }

    // Nothing rewritable: report the skips, leave the file untouched
    if resolved == 0 {
        let outcome = rewriter::rewrite_file(&content, &sites, tag);
        return Ok(MigrationRecord {
            file: relative.to_string(),
            component: tag,
            original_hash: Some(original_hash),
            sites_found: sites.len(),
            migrated: 0,
            skipped: unresolved,
            patterns: Vec::new(),
            skipped_sites: outcome.skipped,
            status: FileStatus::Partial,
            error: None,
        });
    }

    let Some(store) = store else {
        // Dry run: report what a real run would do
        let outcome = rewriter::rewrite_file(&content, &sites, tag);
        let status = if outcome.skipped.is_empty() {
            FileStatus::Success
        } else {
            FileStatus::Partial
        };
        return Ok(MigrationRecord {
            file: relative.to_string(),
            component: tag,
            original_hash: Some(original_hash),
            sites_found: sites.len(),
            migrated: outcome.rewritten,
            skipped: outcome.skipped.len(),
            patterns: outcome.patterns,
            skipped_sites: outcome.skipped,
            status,
            error: None,
        });
    };

    // Write-after-backup: the backup entry must be durable before any
    // byte of the file changes. A store failure here aborts the run.
    store.backup(relative)?;

    let outcome = rewriter::rewrite_file(&content, &sites, tag);

    if let Err(write_err) = io::write_file(&path, &outcome.content, &format!("write {}", relative))
    {
        // Never leave a corrupted file behind: roll back immediately
        let _ = store.restore(relative);
        return Ok(record_failed(
            relative,
            tag,
            format!("write failed after backup, file restored: {}", write_err.message),
        ));
    }

    let status = if outcome.skipped.is_empty() {
        FileStatus::Success
    } else {
        FileStatus::Partial
    };

    Ok(MigrationRecord {
        file: relative.to_string(),
        component: tag,
        original_hash: Some(original_hash),
        sites_found: sites.len(),
        migrated: outcome.rewritten,
        skipped: outcome.skipped.len(),
        patterns: outcome.patterns,
        skipped_sites: outcome.skipped,
        status,
        error: None,
    })
}

// ============================================================================
// Tests
// ============================================================================
