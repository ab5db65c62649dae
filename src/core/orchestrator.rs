//! End-to-end migration runs.
//!
//! The orchestrator drives components in a fixed order through the
//! stages IDLE → SCANNING → MIGRATING → VALIDATING → REPORTING →
//! COMPLETE, with FAILED reachable from the two mutating stages. File
//! and call-site errors stay inside MigrationRecords; the only error
//! that leaves `run` is an orchestration failure, and even then a report
//! describing the mutated state is persisted first.

use crate::backup::BackupStore;
use crate::component::{self, ComponentMap, ComponentTag};
use crate::error::{Error, Result};
use crate::migration::{
    migrate_component, CancelFlag, FileStatus, MigrateOptions, RetentionPolicy,
};
use crate::paths;
use crate::report::{ComponentSection, MigrationReport};
use crate::utils::io;
use crate::validator::{
    MigrationValidator, PerfBaseline, ValidationIssue, ValidationSummary, ValidatorConfig,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Stages and progress
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    Idle,
    Scanning,
    Migrating,
    Validating,
    Reporting,
    Complete,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Idle => "idle",
            RunStage::Scanning => "scanning",
            RunStage::Migrating => "migrating",
            RunStage::Validating => "validating",
            RunStage::Reporting => "reporting",
            RunStage::Complete => "complete",
            RunStage::Failed => "failed",
        }
    }
}

/// Emitted after each stage change and after each component finishes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub stage: RunStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentTag>,
    pub processed_files: usize,
    pub total_files: usize,
}

/// External observers (the CLI) subscribe to run progress through this.
pub trait ProgressObserver {
    fn on_progress(&self, event: &ProgressEvent);
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct MigrationOrchestrator<'a> {
    project_root: PathBuf,
    map: ComponentMap,
    options: MigrateOptions,
    validator_config: ValidatorConfig,
    observer: Option<&'a dyn ProgressObserver>,
    baseline: Option<&'a dyn PerfBaseline>,
    cancel: CancelFlag,
    stage: RunStage,
}

impl<'a> MigrationOrchestrator<'a> {
    pub fn new(project_root: &Path, map: ComponentMap, options: MigrateOptions) -> Self {
        MigrationOrchestrator {
            project_root: project_root.to_path_buf(),
            map,
            options,
            validator_config: ValidatorConfig::default(),
            observer: None,
            baseline: None,
            cancel: CancelFlag::new(),
            stage: RunStage::Idle,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_baseline(mut self, baseline: &'a dyn PerfBaseline) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn with_validator_config(mut self, config: ValidatorConfig) -> Self {
        self.validator_config = config;
        self
    }

    /// Cooperative cancellation handle; checked between files.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    fn emit(&self, component: Option<ComponentTag>, processed: usize, total: usize) {
        let event = ProgressEvent {
            stage: self.stage,
            component,
            processed_files: processed,
            total_files: total,
        };
        if let Some(observer) = self.observer {
            observer.on_progress(&event);
        }
    }

    fn components(&self) -> Vec<ComponentTag> {
        match self.options.component {
            Some(tag) => vec![tag],
            None => ComponentTag::ALL.to_vec(),
        }
    }

    /// Execute the full run. Returns the assembled report; the report is
    /// also persisted for non-dry runs. Only orchestration failures
    /// error out, and those persist a failure report first.
    pub fn run(&mut self) -> Result<MigrationReport> {
        let run_id = uuid::Uuid::new_v4().to_string();

        // SCANNING: size the run up front so progress has a denominator
        self.stage = RunStage::Scanning;
        let components = self.components();
        let total_files: usize = components
            .iter()
            .map(|&tag| component::candidate_files(&self.project_root, &self.map, tag).len())
            .sum();
        self.emit(None, 0, total_files);
        log_status!("migrate", "Run {}: {} candidate files", run_id, total_files);

        let mut store = if self.options.dry_run {
            None
        } else {
            // Store init failure is fatal before anything was mutated
            match BackupStore::create(&self.project_root, &run_id) {
                Ok(s) => Some(s),
                Err(e) => {
                    self.stage = RunStage::Failed;
                    return Err(e);
                }
            }
        };

        // MIGRATING
        self.stage = RunStage::Migrating;
        let mut sections: Vec<ComponentSection> = Vec::new();
        let mut processed = 0usize;
        let mut cancelled = false;

        for &tag in &components {
            if cancelled {
                break;
            }

            let outcome =
                match migrate_component(&self.project_root, tag, &self.map, store.as_mut(), &self.cancel)
                {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        return self.abort(&run_id, sections, e);
                    }
                };

            processed += outcome.records.len();
            cancelled = outcome.cancelled;
            log_status!(
                "migrate",
                "{}: {}/{} files",
                tag,
                processed,
                total_files
            );
            sections.push(ComponentSection {
                component: tag,
                records: outcome.records,
            });
            self.emit(Some(tag), processed, total_files);
        }

        // VALIDATING: skipped for dry and cancelled runs
        let validation = if !self.options.dry_run && !cancelled {
            self.stage = RunStage::Validating;
            self.emit(None, processed, total_files);
            let store = store.as_mut().expect("store exists for non-dry runs");
            Some(self.validate_and_rollback(&mut sections, store))
        } else {
            None
        };

        // REPORTING
        self.stage = RunStage::Reporting;
        let mut report = MigrationReport::assemble(
            &run_id,
            &self.project_root,
            self.options.dry_run,
            !cancelled,
            sections,
        );
        report.validation = validation;

        if !self.options.dry_run {
            report.rollback_script = Some(self.write_rollback_script(&run_id)?);
            report.save(&self.project_root)?;
        }
        self.emit(None, processed, total_files);

        self.stage = RunStage::Complete;
        log_status!(
            "migrate",
            "Run {} complete: {} calls migrated, {} skipped",
            run_id,
            report.totals.calls_migrated,
            report.totals.calls_skipped
        );
        Ok(report)
    }

    /// Run every check over every migrated file; a failing file is
    /// rolled back and re-recorded as failed.
    fn validate_and_rollback(
        &self,
        sections: &mut [ComponentSection],
        store: &mut BackupStore,
    ) -> ValidationSummary {
        let validator = match self.baseline {
            Some(b) => MigrationValidator::new(self.validator_config.clone()).with_baseline(b),
            None => MigrationValidator::new(self.validator_config.clone()),
        };

        let mut issues: Vec<ValidationIssue> = Vec::new();
        let mut files_checked = 0usize;

        for section in sections.iter_mut() {
            for record in section.records.iter_mut() {
                if record.migrated == 0 || record.status == FileStatus::Failed {
                    continue;
                }
                files_checked += 1;

                let failures: Vec<ValidationIssue> =
                    match validator.validate_file(&self.project_root, record) {
                        Ok(outcomes) => outcomes
                            .into_iter()
                            .filter(|o| !o.passed)
                            .map(|o| ValidationIssue {
                                file: record.file.clone(),
                                check: o.check,
                                message: o.message,
                            })
                            .collect(),
                        Err(e) => vec![ValidationIssue {
                            file: record.file.clone(),
                            check: "read".to_string(),
                            message: e.message,
                        }],
                    };

                if failures.is_empty() {
                    if self.options.retention == RetentionPolicy::OnFailureOnly {
                        let _ = store.discard(&record.file);
                    }
                    continue;
                }

                // Automatic single-file rollback, then re-record
                let restore_note = match store.restore(&record.file) {
                    Ok(_) => "file restored from backup".to_string(),
                    Err(e) => format!("rollback also failed: {}", e.message),
                };
                let checks: Vec<&str> = failures.iter().map(|i| i.check.as_str()).collect();
                record.status = FileStatus::Failed;
                record.error = Some(format!(
                    "validation-failed ({}); {}",
                    checks.join(", "),
                    restore_note
                ));
                log_status!("validate", "{}: rolled back ({})", record.file, checks.join(", "));

                issues.extend(failures);
            }
        }

        ValidationSummary {
            passed: issues.is_empty(),
            files_checked,
            issues,
        }
    }

    fn write_rollback_script(&self, run_id: &str) -> Result<String> {
        let run_dir = paths::run_dir(&self.project_root, run_id);
        let path = paths::rollback_script_path(&run_dir);

        let script = format!(
            "#!/bin/sh\n# Rollback for logshift run {run_id}\n# Restores every file recorded in backups.json, in reverse migration order.\nexec logshift rollback --all --run '{run_id}' '{root}'\n",
            run_id = run_id,
            root = self.project_root.display(),
        );
        io::write_file(&path, &script, "write rollback script")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755));
        }

        Ok(path.display().to_string())
    }

    /// Orchestration-fatal path: persist what we know, then propagate.
    fn abort(
        &mut self,
        run_id: &str,
        sections: Vec<ComponentSection>,
        error: Error,
    ) -> Result<MigrationReport> {
        self.stage = RunStage::Failed;

        let mut report =
            MigrationReport::assemble(run_id, &self.project_root, self.options.dry_run, false, sections);
        report.error = Some(error.message.clone());

        let hint = match report.save(&self.project_root) {
            Ok(path) => format!("Partial report written to {}", path.display()),
            Err(_) => "Partial report could not be persisted".to_string(),
        };

        Err(error.with_hint(hint))
    }
}

// ============================================================================
// Entry point used by the CLI
// ============================================================================

/// Run a migration over a project tree with the directory→component
/// mapping resolved from the project itself.
pub fn migrate(project_root: &Path, options: MigrateOptions) -> Result<MigrationReport> {
    let map = ComponentMap::load(project_root)?;
    MigrationOrchestrator::new(project_root, map, options).run()
}

// ============================================================================
// Tests
// ============================================================================
