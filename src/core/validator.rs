//! Post-migration validation.
//!
//! Four independent checks per migrated file: structural syntax, import
//! correctness, functional equivalence against a capturing logger mock,
//! and performance overhead against an externally supplied baseline.
//! A failing file fails the aggregate but never stops the sweep.

use crate::error::Result;
use crate::migration::{FileStatus, MigrationRecord};
use crate::scanner;
use crate::utils::io;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Types
// ============================================================================

pub const CHECK_SYNTAX: &str = "syntax";
pub const CHECK_IMPORTS: &str = "imports";
pub const CHECK_EQUIVALENCE: &str = "equivalence";
pub const CHECK_PERFORMANCE: &str = "performance";

/// Pass/fail for one check on one file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub check: String,
    pub passed: bool,
    pub message: String,
}

impl CheckOutcome {
    fn pass(check: &str, message: impl Into<String>) -> Self {
        CheckOutcome {
            check: check.to_string(),
            passed: true,
            message: message.into(),
        }
    }

    fn fail(check: &str, message: impl Into<String>) -> Self {
        CheckOutcome {
            check: check.to_string(),
            passed: false,
            message: message.into(),
        }
    }
}

/// One human-readable validation problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub file: String,
    pub check: String,
    pub message: String,
}

/// Aggregate over all files of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub passed: bool,
    pub files_checked: usize,
    pub issues: Vec<ValidationIssue>,
}

/// Tunables for the validator.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Maximum allowed instrumentation overhead relative to baseline.
    pub max_overhead_ratio: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            max_overhead_ratio: 0.10,
        }
    }
}

/// Baseline timings come from outside the engine; the performance check
/// only compares.
pub trait PerfBaseline {
    /// Pre-migration timing for a file, if one was captured.
    fn baseline(&self, file: &str) -> Option<Duration>;
    /// Post-migration timing for the same file.
    fn measure(&self, file: &str) -> Option<Duration>;
}

// ============================================================================
// Capturing mock
// ============================================================================

/// Records structured-logger invocations during equivalence replay.
#[derive(Debug, Default)]
pub struct CapturingLogger {
    calls: RefCell<Vec<(String, String)>>,
}

impl CapturingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoke(&self, method: &str, args: &str) {
        self.calls
            .borrow_mut()
            .push((method.to_string(), args.to_string()));
    }

    pub fn count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn count_for(&self, method: &str) -> usize {
        self.calls.borrow().iter().filter(|(m, _)| m == method).count()
    }
}

// ============================================================================
// Validator
// ============================================================================

pub struct MigrationValidator<'a> {
    config: ValidatorConfig,
    baseline: Option<&'a dyn PerfBaseline>,
}

impl<'a> MigrationValidator<'a> {
    pub fn new(config: ValidatorConfig) -> Self {
        MigrationValidator {
            config,
            baseline: None,
        }
    }

    pub fn with_baseline(mut self, baseline: &'a dyn PerfBaseline) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Run all four checks on one migrated file.
    pub fn validate_file(&self, root: &Path, record: &MigrationRecord) -> Result<Vec<CheckOutcome>> {
        let content = io::read_file(&root.join(&record.file), &format!("read {}", record.file))?;

        Ok(vec![
            check_syntax(&content, record),
            check_imports(&content, record),
            check_equivalence(&content, record),
            self.check_performance(record),
        ])
    }

    /// Aggregate validation across a run's records. A failing file fails
    /// the aggregate but checking continues through the rest.
    pub fn validate_migration(&self, root: &Path, records: &[MigrationRecord]) -> ValidationSummary {
        let mut issues = Vec::new();
        let mut files_checked = 0usize;

        for record in records {
            if record.migrated == 0 || record.status == FileStatus::Failed {
                continue;
            }
            files_checked += 1;

            match self.validate_file(root, record) {
                Ok(outcomes) => {
                    for outcome in outcomes.into_iter().filter(|o| !o.passed) {
                        issues.push(ValidationIssue {
                            file: record.file.clone(),
                            check: outcome.check,
                            message: outcome.message,
                        });
                    }
                }
                Err(e) => issues.push(ValidationIssue {
                    file: record.file.clone(),
                    check: CHECK_SYNTAX.to_string(),
                    message: format!("file could not be read for validation: {}", e.message),
                }),
            }
        }

        ValidationSummary {
            passed: issues.is_empty(),
            files_checked,
            issues,
        }
    }

    fn check_performance(&self, record: &MigrationRecord) -> CheckOutcome {
        let Some(provider) = self.baseline else {
            return CheckOutcome::pass(CHECK_PERFORMANCE, "no baseline provider; check skipped");
        };

        let (Some(base), Some(measured)) =
            (provider.baseline(&record.file), provider.measure(&record.file))
        else {
            return CheckOutcome::pass(
                CHECK_PERFORMANCE,
                "no baseline captured for file; check skipped",
            );
        };

        let budget = base.mul_f64(1.0 + self.config.max_overhead_ratio);
        if measured <= budget {
            CheckOutcome::pass(
                CHECK_PERFORMANCE,
                format!("{:?} within budget {:?}", measured, budget),
            )
        } else {
            CheckOutcome::fail(
                CHECK_PERFORMANCE,
                format!(
                    "overhead exceeds bound: measured {:?}, baseline {:?}, allowed {:?}",
                    measured, base, budget
                ),
            )
        }
    }
}

// ============================================================================
// Checks
// ============================================================================

/// The rewritten file must still balance its delimiters; the scan that
/// produced the migration has to be repeatable on its own output.
///
/// A file with explicitly skipped call sites carried its imbalance
/// before the rewrite, so the check cannot demand better than the input
/// it was given.
fn check_syntax(content: &str, record: &MigrationRecord) -> CheckOutcome {
    match scanner::check_delimiters(content) {
        Ok(()) => CheckOutcome::pass(CHECK_SYNTAX, "delimiters balanced"),
        Err(msg) if record.skipped > 0 => CheckOutcome::pass(
            CHECK_SYNTAX,
            format!(
                "imbalance predates migration ({} site(s) skipped): {}",
                record.skipped, msg
            ),
        ),
        Err(msg) => CheckOutcome::fail(CHECK_SYNTAX, msg),
    }
}

/// Exactly one logger import per migrated file, and no logger references
/// without one.
fn check_imports(content: &str, record: &MigrationRecord) -> CheckOutcome {
    let import_count = content.matches(scanner::LOGGER_MODULE).count();
    let logger_calls = scanner::scan_logger_calls(content).len();

    if record.migrated > 0 && import_count == 0 {
        return CheckOutcome::fail(
            CHECK_IMPORTS,
            "migrated file is missing the logger import".to_string(),
        );
    }
    if import_count > 1 {
        return CheckOutcome::fail(
            CHECK_IMPORTS,
            format!("duplicate logger imports: found {}", import_count),
        );
    }
    if logger_calls > 0 && import_count == 0 {
        return CheckOutcome::fail(
            CHECK_IMPORTS,
            "logger is referenced but never imported".to_string(),
        );
    }

    CheckOutcome::pass(CHECK_IMPORTS, "exactly one logger import")
}

/// Replay the migrated file's logger calls against a capturing mock; the
/// invocation count plus any leftover diagnostic prints must equal the
/// original call count.
fn check_equivalence(content: &str, record: &MigrationRecord) -> CheckOutcome {
    let mock = CapturingLogger::new();
    for call in scanner::scan_logger_calls(content) {
        mock.invoke(&call.method, call.args_text.as_deref().unwrap_or(""));
    }

    let leftover = scanner::count_console_calls(content);
    let replayed = mock.count();

    if replayed + leftover == record.sites_found {
        CheckOutcome::pass(
            CHECK_EQUIVALENCE,
            format!(
                "{} logger invocations + {} leftover prints match {} original calls",
                replayed, leftover, record.sites_found
            ),
        )
    } else {
        CheckOutcome::fail(
            CHECK_EQUIVALENCE,
            format!(
                "call count mismatch: {} logger invocations + {} leftover prints != {} original calls",
                replayed, leftover, record.sites_found
            ),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupStore;
    use crate::component::{ComponentMap, ComponentTag};
    use crate::migration::{migrate_component, CancelFlag};
    use std::path::PathBuf;

    fn setup(test_name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("logshift_validator_{}", test_name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("src/core")).unwrap();
        dir
    }

    fn migrate(root: &Path) -> Vec<MigrationRecord> {
        let map = ComponentMap::default();
        let mut store = BackupStore::create(root, "run-1").unwrap();
        migrate_component(root, ComponentTag::Core, &map, Some(&mut store), &CancelFlag::new())
            .unwrap()
            .records
    }

    #[test]
    fn capturing_logger_counts_by_method() {
        let mock = CapturingLogger::new();
        mock.invoke("info", "'a'");
        mock.invoke("error", "'b'");
        mock.invoke("info", "'c'");
        assert_eq!(mock.count(), 3);
        assert_eq!(mock.count_for("info"), 2);
        assert_eq!(mock.count_for("debug"), 0);
    }

    #[test]
    fn clean_migration_passes_all_checks() {
        let root = setup("clean");
        std::fs::write(
            root.join("src/core/a.js"),
            "console.info('a');\nconsole.error('b');\nconsole.message('c');\n",
        )
        .unwrap();

        let records = migrate(&root);
        let validator = MigrationValidator::new(ValidatorConfig::default());
        let outcomes = validator.validate_file(&root, &records[0]).unwrap();

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| o.passed), "{:?}", outcomes);

        let summary = validator.validate_migration(&root, &records);
        assert!(summary.passed);
        assert_eq!(summary.files_checked, 1);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn partial_migration_still_validates() {
        let root = setup("partial");
        std::fs::write(
            root.join("src/core/mixed.js"),
            "console.info('ok');\nconsole.error('broken', {\n",
        )
        .unwrap();

        let records = migrate(&root);
        assert_eq!(records[0].migrated, 1);
        assert_eq!(records[0].skipped, 1);

        let validator = MigrationValidator::new(ValidatorConfig::default());
        let outcomes = validator.validate_file(&root, &records[0]).unwrap();

        // Equivalence holds: 1 logger call + 1 leftover == 2 found. The
        // pre-existing imbalance behind the skipped site is tolerated by
        // the syntax check, so a partial file stays partial.
        assert!(outcomes.iter().all(|o| o.passed), "{:?}", outcomes);

        let summary = validator.validate_migration(&root, &records);
        assert!(summary.passed);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn duplicate_import_fails_import_check() {
        let root = setup("dup_import");
        std::fs::write(root.join("src/core/a.js"), "console.info('x');\n").unwrap();
        let records = migrate(&root);

        // Corrupt the migrated file with a second import
        let path = root.join("src/core/a.js");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("import { getComponentLogger } from '@logshift/logging';\n");
        std::fs::write(&path, content).unwrap();

        let validator = MigrationValidator::new(ValidatorConfig::default());
        let outcomes = validator.validate_file(&root, &records[0]).unwrap();
        let imports = outcomes.iter().find(|o| o.check == CHECK_IMPORTS).unwrap();
        assert!(!imports.passed);
        assert!(imports.message.contains("duplicate"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn dropped_invocation_fails_equivalence() {
        let root = setup("dropped_call");
        std::fs::write(
            root.join("src/core/a.js"),
            "console.info('a');\nconsole.error('b');\n",
        )
        .unwrap();
        let records = migrate(&root);

        // Delete one migrated call
        let path = root.join("src/core/a.js");
        let content = std::fs::read_to_string(&path).unwrap();
        let stripped: String = content
            .lines()
            .filter(|l| !l.contains("logger.error"))
            .map(|l| format!("{}\n", l))
            .collect();
        std::fs::write(&path, stripped).unwrap();

        let validator = MigrationValidator::new(ValidatorConfig::default());
        let outcomes = validator.validate_file(&root, &records[0]).unwrap();
        let equivalence = outcomes.iter().find(|o| o.check == CHECK_EQUIVALENCE).unwrap();
        assert!(!equivalence.passed);

        let summary = validator.validate_migration(&root, &records);
        assert!(!summary.passed);
        assert!(summary.issues.iter().any(|i| i.check == CHECK_EQUIVALENCE));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn unbalanced_rewrite_fails_syntax_check() {
        let root = setup("unbalanced");
        std::fs::write(root.join("src/core/a.js"), "console.info('x');\n").unwrap();
        let records = migrate(&root);

        let path = root.join("src/core/a.js");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("function oops() {\n");
        std::fs::write(&path, content).unwrap();

        let validator = MigrationValidator::new(ValidatorConfig::default());
        let outcomes = validator.validate_file(&root, &records[0]).unwrap();
        let syntax = outcomes.iter().find(|o| o.check == CHECK_SYNTAX).unwrap();
        assert!(!syntax.passed);

        let _ = std::fs::remove_dir_all(&root);
    }

    struct StubBaseline {
        base: Duration,
        measured: Duration,
    }

    impl PerfBaseline for StubBaseline {
        fn baseline(&self, _file: &str) -> Option<Duration> {
            Some(self.base)
        }
        fn measure(&self, _file: &str) -> Option<Duration> {
            Some(self.measured)
        }
    }

    #[test]
    fn performance_within_bound_passes() {
        let root = setup("perf_pass");
        std::fs::write(root.join("src/core/a.js"), "console.info('x');\n").unwrap();
        let records = migrate(&root);

        let baseline = StubBaseline {
            base: Duration::from_millis(100),
            measured: Duration::from_millis(105),
        };
        let validator =
            MigrationValidator::new(ValidatorConfig::default()).with_baseline(&baseline);
        let outcomes = validator.validate_file(&root, &records[0]).unwrap();
        let perf = outcomes.iter().find(|o| o.check == CHECK_PERFORMANCE).unwrap();
        assert!(perf.passed, "{}", perf.message);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn performance_over_bound_fails() {
        let root = setup("perf_fail");
        std::fs::write(root.join("src/core/a.js"), "console.info('x');\n").unwrap();
        let records = migrate(&root);

        let baseline = StubBaseline {
            base: Duration::from_millis(100),
            measured: Duration::from_millis(150),
        };
        let validator =
            MigrationValidator::new(ValidatorConfig::default()).with_baseline(&baseline);
        let outcomes = validator.validate_file(&root, &records[0]).unwrap();
        let perf = outcomes.iter().find(|o| o.check == CHECK_PERFORMANCE).unwrap();
        assert!(!perf.passed);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_baseline_is_not_a_failure() {
        let root = setup("perf_skip");
        std::fs::write(root.join("src/core/a.js"), "console.info('x');\n").unwrap();
        let records = migrate(&root);

        let validator = MigrationValidator::new(ValidatorConfig::default());
        let outcomes = validator.validate_file(&root, &records[0]).unwrap();
        let perf = outcomes.iter().find(|o| o.check == CHECK_PERFORMANCE).unwrap();
        assert!(perf.passed);
        assert!(perf.message.contains("skipped"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn records_without_migrated_calls_are_not_checked() {
        let root = setup("skip_empty");
        std::fs::write(root.join("src/core/plain.js"), "export const x = 1;\n").unwrap();
        let records = migrate(&root);

        let validator = MigrationValidator::new(ValidatorConfig::default());
        let summary = validator.validate_migration(&root, &records);
        assert!(summary.passed);
        assert_eq!(summary.files_checked, 0);

        let _ = std::fs::remove_dir_all(&root);
    }
}
