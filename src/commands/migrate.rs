use clap::Args;
use serde::Serialize;

use logshift::log_status;
use logshift::migration::{FileStatus, MigrateOptions, RetentionPolicy};
use logshift::orchestrator::{self, ProgressEvent, ProgressObserver};
use logshift::component::ComponentTag;
use logshift::report::ReportTotals;
use logshift::rewriter::SkippedSite;

use crate::commands::CmdResult;

#[derive(Args)]
pub struct MigrateArgs {
    /// Project root to migrate
    #[arg(default_value = ".")]
    pub path: String,

    /// Restrict the run to one component (CLI, Core, MCP, ...)
    #[arg(short, long)]
    pub component: Option<String>,

    /// Scan and report without creating backups or writing files
    #[arg(long)]
    pub dry_run: bool,

    /// Backup retention: always, on-failure-only
    #[arg(long, default_value = "always")]
    pub retention: String,

    /// Emit per-component progress to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum MigrateOutput {
    #[serde(rename = "migrate")]
    #[serde(rename_all = "camelCase")]
    Migrate {
        run_id: String,
        dry_run: bool,
        complete: bool,
        totals: ReportTotals,
        #[serde(skip_serializing_if = "Option::is_none")]
        validation_passed: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rollback_script: Option<String>,
        components: Vec<ComponentSummary>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        needs_review: Vec<ReviewItem>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSummary {
    pub component: String,
    pub files: usize,
    pub migrated: usize,
    pub skipped: usize,
    pub failed_files: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub file: String,
    pub sites: Vec<SkippedSite>,
}

/// Progress sink wired to stderr for --verbose runs.
struct StderrProgress;

impl ProgressObserver for StderrProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match event.component {
            Some(component) => log_status!(
                "progress",
                "{} {}: {}/{} files",
                event.stage.as_str(),
                component,
                event.processed_files,
                event.total_files
            ),
            None => log_status!("progress", "{}", event.stage.as_str()),
        }
    }
}

pub fn run(args: MigrateArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<MigrateOutput> {
    let root = crate::commands::resolve_project_root(&args.path)?;

    let component = args
        .component
        .as_deref()
        .map(ComponentTag::from_str)
        .transpose()?;
    let retention = RetentionPolicy::from_str(&args.retention)?;

    let options = MigrateOptions {
        dry_run: args.dry_run,
        component,
        retention,
        verbose: args.verbose,
    };

    let map = logshift::component::ComponentMap::load(&root)?;
    let observer = StderrProgress;
    let mut runner = orchestrator::MigrationOrchestrator::new(&root, map, options);
    if args.verbose {
        runner = runner.with_observer(&observer);
    }

    let report = runner.run()?;

    let components: Vec<ComponentSummary> = report
        .components
        .iter()
        .filter(|s| !s.records.is_empty())
        .map(|s| ComponentSummary {
            component: s.component.as_str().to_string(),
            files: s.records.len(),
            migrated: s.records.iter().map(|r| r.migrated).sum(),
            skipped: s.records.iter().map(|r| r.skipped).sum(),
            failed_files: s.records.iter().filter(|r| r.status == FileStatus::Failed).count(),
        })
        .collect();

    let needs_review: Vec<ReviewItem> = report
        .components
        .iter()
        .flat_map(|s| s.records.iter())
        .filter(|r| !r.skipped_sites.is_empty())
        .map(|r| ReviewItem {
            file: r.file.clone(),
            sites: r.skipped_sites.clone(),
        })
        .collect();

    let validation_passed = report.validation.as_ref().map(|v| v.passed);
    let failed = report.totals.failed_files > 0 || validation_passed == Some(false);
    let exit_code = if failed { 1 } else { 0 };

    Ok((
        MigrateOutput::Migrate {
            run_id: report.run_id.clone(),
            dry_run: report.dry_run,
            complete: report.complete,
            totals: report.totals.clone(),
            validation_passed,
            rollback_script: report.rollback_script.clone(),
            components,
            needs_review,
        },
        exit_code,
    ))
}
