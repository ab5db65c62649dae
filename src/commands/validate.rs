use clap::Args;
use serde::Serialize;

use logshift::component::ComponentTag;
use logshift::migration::MigrationRecord;
use logshift::report::{self, MigrationReport};
use logshift::validator::{MigrationValidator, ValidationIssue, ValidatorConfig};
use logshift::{Error, ErrorCode};

use crate::commands::CmdResult;

#[derive(Args)]
pub struct ValidateArgs {
    /// Project root to validate
    #[arg(default_value = ".")]
    pub path: String,

    /// Restrict validation to one component
    #[arg(short, long)]
    pub component: Option<String>,

    /// Run id to validate (defaults to the most recent run)
    #[arg(long)]
    pub run: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum ValidateOutput {
    #[serde(rename = "validate")]
    #[serde(rename_all = "camelCase")]
    Validate {
        run_id: String,
        passed: bool,
        files_checked: usize,
        issues: Vec<ValidationIssue>,
    },
}

pub fn run(args: ValidateArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ValidateOutput> {
    let root = crate::commands::resolve_project_root(&args.path)?;
    let component = args
        .component
        .as_deref()
        .map(ComponentTag::from_str)
        .transpose()?;

    let loaded = match &args.run {
        Some(run_id) => MigrationReport::load(&root, run_id)?,
        None => report::latest_run(&root)?.ok_or_else(|| {
            Error::new(
                ErrorCode::RunNotFound,
                "No migration runs recorded for this project",
                serde_json::Value::Null,
            )
            .with_hint("Run 'logshift migrate' first")
        })?,
    };

    let records: Vec<MigrationRecord> = loaded
        .components
        .iter()
        .filter(|s| component.is_none_or(|c| s.component == c))
        .flat_map(|s| s.records.iter().cloned())
        .collect();

    let validator = MigrationValidator::new(ValidatorConfig::default());
    let summary = validator.validate_migration(&root, &records);

    let exit_code = if summary.passed { 0 } else { 1 };
    Ok((
        ValidateOutput::Validate {
            run_id: loaded.run_id,
            passed: summary.passed,
            files_checked: summary.files_checked,
            issues: summary.issues,
        },
        exit_code,
    ))
}
