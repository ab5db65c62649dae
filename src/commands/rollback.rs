use clap::Args;
use serde::Serialize;

use logshift::backup::{BackupStore, RestoreOutcome};
use logshift::component::{ComponentMap, ComponentTag};
use logshift::report;
use logshift::{Error, ErrorCode};

use crate::commands::CmdResult;

#[derive(Args)]
pub struct RollbackArgs {
    /// Project root to roll back
    #[arg(default_value = ".")]
    pub path: String,

    /// Run id to roll back (defaults to the most recent run)
    #[arg(long)]
    pub run: Option<String>,

    /// Restore every file touched by the run
    #[arg(long, conflicts_with_all = ["component", "file"])]
    pub all: bool,

    /// Restore every file of one component
    #[arg(short, long, conflicts_with = "file")]
    pub component: Option<String>,

    /// Restore a single project-relative file
    #[arg(short, long)]
    pub file: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum RollbackOutput {
    #[serde(rename = "rollback")]
    #[serde(rename_all = "camelCase")]
    Rollback {
        run_id: String,
        target: String,
        restored: Vec<String>,
        already_restored: Vec<String>,
        failed: Vec<RollbackFailure>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackFailure {
    pub file: String,
    pub error: String,
}

fn resolve_run_id(root: &std::path::Path, requested: Option<&str>) -> logshift::Result<String> {
    match requested {
        Some(id) => Ok(id.to_string()),
        None => report::latest_run(root)?
            .map(|r| r.run_id)
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::RunNotFound,
                    "No migration runs recorded for this project",
                    serde_json::Value::Null,
                )
                .with_hint("Run 'logshift status' to see recorded runs")
            }),
    }
}

pub fn run(args: RollbackArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<RollbackOutput> {
    let root = crate::commands::resolve_project_root(&args.path)?;
    let run_id = resolve_run_id(&root, args.run.as_deref())?;
    let mut store = BackupStore::open(&root, &run_id)?;

    let mut restored = Vec::new();
    let mut already_restored = Vec::new();
    let mut failed = Vec::new();

    let target = if args.all {
        let summary = store.restore_run();
        restored = summary.restored;
        failed = summary
            .failed
            .into_iter()
            .map(|f| RollbackFailure {
                file: f.file,
                error: f.error,
            })
            .collect();
        "all".to_string()
    } else if let Some(component) = args.component.as_deref() {
        let tag = ComponentTag::from_str(component)?;
        let map = ComponentMap::load(&root)?;

        // Component entries restore in reverse migration order, same as
        // a whole-run rollback
        let mut files: Vec<(usize, String)> = store
            .entries()
            .iter()
            .filter(|e| map.classify(&e.file) == Some(tag))
            .map(|e| (e.sequence, e.file.clone()))
            .collect();
        files.sort_by_key(|(seq, _)| std::cmp::Reverse(*seq));

        for (_, file) in files {
            match store.restore(&file) {
                Ok(RestoreOutcome::Restored) => restored.push(file),
                Ok(RestoreOutcome::AlreadyRestored) => already_restored.push(file),
                Err(e) => failed.push(RollbackFailure {
                    file,
                    error: e.message,
                }),
            }
        }
        tag.as_str().to_string()
    } else if let Some(file) = args.file.as_deref() {
        match store.restore(file)? {
            RestoreOutcome::Restored => restored.push(file.to_string()),
            RestoreOutcome::AlreadyRestored => already_restored.push(file.to_string()),
        }
        file.to_string()
    } else {
        return Err(Error::validation_invalid_argument(
            "target",
            "Specify a rollback target: --all, --component <tag>, or --file <path>",
            None,
        ));
    };

    let exit_code = if failed.is_empty() { 0 } else { 1 };
    Ok((
        RollbackOutput::Rollback {
            run_id,
            target,
            restored,
            already_restored,
            failed,
        },
        exit_code,
    ))
}
