//! Migration reports: assembly, persistence, listing, rendering.
//!
//! One report per run, written to the run's directory once the run
//! finishes (or fails) and never mutated afterwards. Status, rollback
//! and analytics all read these.

use crate::component::ComponentTag;
use crate::error::{Error, Result};
use crate::migration::{FileStatus, MigrationRecord};
use crate::paths;
use crate::utils::io;
use crate::validator::ValidationSummary;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Types
// ============================================================================

/// Aggregate counters over every record of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTotals {
    pub files_processed: usize,
    pub calls_migrated: usize,
    pub calls_skipped: usize,
    pub success_files: usize,
    pub partial_files: usize,
    pub failed_files: usize,
}

/// All records produced for one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSection {
    pub component: ComponentTag,
    pub records: Vec<MigrationRecord>,
}

/// The per-run report. Created once, persisted, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub run_id: String,
    pub created_at: String,
    pub project_root: String,
    pub dry_run: bool,
    /// False when the run was cancelled or aborted partway.
    pub complete: bool,
    pub components: Vec<ComponentSection>,
    pub totals: ReportTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_script: Option<String>,
    /// Present only when an orchestration error aborted the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationReport {
    pub fn assemble(
        run_id: &str,
        project_root: &Path,
        dry_run: bool,
        complete: bool,
        components: Vec<ComponentSection>,
    ) -> Self {
        let totals = compute_totals(&components);
        MigrationReport {
            run_id: run_id.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            project_root: project_root.display().to_string(),
            dry_run,
            complete,
            components,
            totals,
            validation: None,
            rollback_script: None,
            error: None,
        }
    }

    pub fn save(&self, project_root: &Path) -> Result<PathBuf> {
        let run_dir = paths::run_dir(project_root, &self.run_id);
        std::fs::create_dir_all(&run_dir).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("create {}", run_dir.display())))
        })?;

        let path = paths::report_path(&run_dir);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::internal_json(e.to_string(), Some("serialize report".to_string())))?;
        io::write_file_atomic(&path, &json, "write report")?;
        Ok(path)
    }

    pub fn load(project_root: &Path, run_id: &str) -> Result<Self> {
        let path = paths::report_path(&paths::run_dir(project_root, run_id));
        if !path.exists() {
            return Err(Error::run_not_found(run_id));
        }
        let raw = io::read_file(&path, "read report")?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::internal_json(e.to_string(), Some(format!("parse {}", path.display())))
        })
    }
}

fn compute_totals(components: &[ComponentSection]) -> ReportTotals {
    let mut totals = ReportTotals::default();
    for section in components {
        for record in &section.records {
            totals.files_processed += 1;
            totals.calls_migrated += record.migrated;
            totals.calls_skipped += record.skipped;
            match record.status {
                FileStatus::Success => totals.success_files += 1,
                FileStatus::Partial => totals.partial_files += 1,
                FileStatus::Failed => totals.failed_files += 1,
            }
        }
    }
    totals
}

// ============================================================================
// Run listing
// ============================================================================

/// Summary line for one prior run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub created_at: String,
    pub dry_run: bool,
    pub complete: bool,
    pub files_processed: usize,
    pub calls_migrated: usize,
    pub calls_skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_passed: Option<bool>,
}

impl RunSummary {
    fn from_report(report: &MigrationReport) -> Self {
        RunSummary {
            run_id: report.run_id.clone(),
            created_at: report.created_at.clone(),
            dry_run: report.dry_run,
            complete: report.complete,
            files_processed: report.totals.files_processed,
            calls_migrated: report.totals.calls_migrated,
            calls_skipped: report.totals.calls_skipped,
            validation_passed: report.validation.as_ref().map(|v| v.passed),
        }
    }
}

/// List all recorded runs, newest first. A project with no store yields
/// an empty list, not an error.
pub fn list_runs(project_root: &Path) -> Result<Vec<RunSummary>> {
    let runs_dir = paths::runs_dir(project_root);
    if !runs_dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(&runs_dir).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", runs_dir.display())))
    })?;

    let mut summaries = Vec::new();
    for entry in entries.flatten() {
        let run_id = entry.file_name().to_string_lossy().to_string();
        // Tolerate stray files and half-written run dirs
        if let Ok(report) = MigrationReport::load(project_root, &run_id) {
            summaries.push(RunSummary::from_report(&report));
        }
    }

    summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(summaries)
}

/// The most recent recorded run, if any.
pub fn latest_run(project_root: &Path) -> Result<Option<MigrationReport>> {
    let summaries = list_runs(project_root)?;
    match summaries.first() {
        Some(s) => Ok(Some(MigrationReport::load(project_root, &s.run_id)?)),
        None => Ok(None),
    }
}

// ============================================================================
// Rendering
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Html,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "html" => Ok(ReportFormat::Html),
            _ => Err(Error::validation_invalid_argument(
                "format",
                format!("Unknown format '{}'. Use: text, json, html", s),
                None,
            )),
        }
    }
}

pub fn render(report: &MigrationReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| Error::internal_json(e.to_string(), Some("render report".to_string()))),
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Html => Ok(render_html(report)),
    }
}

fn render_text(report: &MigrationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Migration run {}\n", report.run_id));
    out.push_str(&format!("Created: {}\n", report.created_at));
    if report.dry_run {
        out.push_str("Mode: dry run (no files written)\n");
    }
    if !report.complete {
        out.push_str("Status: INCOMPLETE\n");
    }
    if let Some(err) = &report.error {
        out.push_str(&format!("Aborted: {}\n", err));
    }
    out.push('\n');

    for section in &report.components {
        if section.records.is_empty() {
            continue;
        }
        out.push_str(&format!("[{}]\n", section.component));
        for record in &section.records {
            let status = match record.status {
                FileStatus::Success => "ok",
                FileStatus::Partial => "partial",
                FileStatus::Failed => "FAILED",
            };
            out.push_str(&format!(
                "  {:<8} {} ({} migrated, {} skipped)\n",
                status, record.file, record.migrated, record.skipped
            ));
            if let Some(err) = &record.error {
                out.push_str(&format!("           {}\n", err));
            }
            for skip in &record.skipped_sites {
                out.push_str(&format!(
                    "           line {}: console.{} {}\n",
                    skip.line, skip.method, skip.reason
                ));
            }
        }
        out.push('\n');
    }

    let t = &report.totals;
    out.push_str(&format!(
        "Totals: {} files ({} ok, {} partial, {} failed), {} calls migrated, {} skipped\n",
        t.files_processed,
        t.success_files,
        t.partial_files,
        t.failed_files,
        t.calls_migrated,
        t.calls_skipped
    ));

    if let Some(validation) = &report.validation {
        out.push_str(&format!(
            "Validation: {} ({} files checked)\n",
            if validation.passed { "passed" } else { "FAILED" },
            validation.files_checked
        ));
        for issue in &validation.issues {
            out.push_str(&format!("  {} [{}]: {}\n", issue.file, issue.check, issue.message));
        }
    }

    if let Some(script) = &report.rollback_script {
        out.push_str(&format!("Rollback script: {}\n", script));
    }

    out
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render_html(report: &MigrationReport) -> String {
    let mut rows = String::new();
    for section in &report.components {
        for record in &section.records {
            let status = match record.status {
                FileStatus::Success => "success",
                FileStatus::Partial => "partial",
                FileStatus::Failed => "failed",
            };
            rows.push_str(&format!(
                "<tr class=\"{status}\"><td>{}</td><td>{}</td><td>{status}</td><td>{}</td><td>{}</td></tr>\n",
                html_escape(section.component.as_str()),
                html_escape(&record.file),
                record.migrated,
                record.skipped,
            ));
        }
    }

    let t = &report.totals;
    let validation = match &report.validation {
        Some(v) if v.passed => "passed".to_string(),
        Some(v) => format!("failed ({} issues)", v.issues.len()),
        None => "not run".to_string(),
    };

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\n<title>Migration run {id}</title>\n<style>\nbody {{ font-family: sans-serif; margin: 2em; }}\ntable {{ border-collapse: collapse; }}\ntd, th {{ border: 1px solid #ccc; padding: 4px 8px; }}\ntr.failed td {{ background: #fdd; }}\ntr.partial td {{ background: #ffd; }}\n</style></head><body>\n<h1>Migration run {id}</h1>\n<p>Created {created} — {files} files, {migrated} calls migrated, {skipped} skipped. Validation: {validation}.</p>\n<table>\n<tr><th>Component</th><th>File</th><th>Status</th><th>Migrated</th><th>Skipped</th></tr>\n{rows}</table>\n</body></html>\n",
        id = html_escape(&report.run_id),
        created = html_escape(&report.created_at),
        files = t.files_processed,
        migrated = t.calls_migrated,
        skipped = t.calls_skipped,
        validation = validation,
        rows = rows,
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file: &str, migrated: usize, skipped: usize, status: FileStatus) -> MigrationRecord {
        MigrationRecord {
            file: file.to_string(),
            component: ComponentTag::Core,
            original_hash: Some("hash".to_string()),
            sites_found: migrated + skipped,
            migrated,
            skipped,
            patterns: Vec::new(),
            skipped_sites: Vec::new(),
            status,
            error: None,
        }
    }

    fn sample_report(run_id: &str) -> MigrationReport {
        MigrationReport::assemble(
            run_id,
            Path::new("/tmp/project"),
            false,
            true,
            vec![ComponentSection {
                component: ComponentTag::Core,
                records: vec![
                    record("src/core/a.js", 3, 0, FileStatus::Success),
                    record("src/core/b.js", 2, 1, FileStatus::Partial),
                    record("src/core/c.js", 0, 0, FileStatus::Failed),
                ],
            }],
        )
    }

    #[test]
    fn totals_obey_conservation() {
        let report = sample_report("r1");
        let t = &report.totals;
        assert_eq!(t.files_processed, 3);
        assert_eq!(t.calls_migrated, 5);
        assert_eq!(t.calls_skipped, 1);
        assert_eq!(
            t.success_files + t.partial_files + t.failed_files,
            t.files_processed
        );
    }

    #[test]
    fn save_load_round_trip() {
        let root = std::env::temp_dir().join("logshift_report_round_trip");
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();

        let report = sample_report("run-42");
        let path = report.save(&root).unwrap();
        assert!(path.exists());

        let loaded = MigrationReport::load(&root, "run-42").unwrap();
        assert_eq!(loaded.run_id, "run-42");
        assert_eq!(loaded.totals.calls_migrated, 5);
        assert_eq!(loaded.components[0].records.len(), 3);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn load_missing_run_errors() {
        let root = std::env::temp_dir().join("logshift_report_missing");
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();

        let err = MigrationReport::load(&root, "ghost").unwrap_err();
        assert_eq!(err.code.as_str(), "run.not_found");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn list_runs_newest_first() {
        let root = std::env::temp_dir().join("logshift_report_list");
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();

        let mut older = sample_report("run-old");
        older.created_at = "2026-01-01T00:00:00Z".to_string();
        older.save(&root).unwrap();

        let mut newer = sample_report("run-new");
        newer.created_at = "2026-06-01T00:00:00Z".to_string();
        newer.save(&root).unwrap();

        let runs = list_runs(&root).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "run-new");
        assert_eq!(runs[1].run_id, "run-old");

        let latest = latest_run(&root).unwrap().unwrap();
        assert_eq!(latest.run_id, "run-new");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn list_runs_without_store_is_empty() {
        let root = std::env::temp_dir().join("logshift_report_empty_store");
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();

        assert!(list_runs(&root).unwrap().is_empty());
        assert!(latest_run(&root).unwrap().is_none());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn text_rendering_lists_files_and_totals() {
        let report = sample_report("r1");
        let text = render(&report, ReportFormat::Text).unwrap();
        assert!(text.contains("src/core/a.js"));
        assert!(text.contains("partial"));
        assert!(text.contains("5 calls migrated"));
    }

    #[test]
    fn html_rendering_escapes_and_tabulates() {
        let mut report = sample_report("r<1>");
        report.components[0].records[0].file = "src/<odd>.js".to_string();
        let html = render(&report, ReportFormat::Html).unwrap();
        assert!(html.contains("r&lt;1&gt;"));
        assert!(html.contains("src/&lt;odd&gt;.js"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn format_parsing() {
        assert_eq!(ReportFormat::from_str("json").unwrap(), ReportFormat::Json);
        assert!(ReportFormat::from_str("pdf").is_err());
    }
}
