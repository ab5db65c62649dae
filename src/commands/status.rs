use clap::Args;
use serde::Serialize;

use logshift::report::{self, RunSummary};

use crate::commands::CmdResult;

#[derive(Args)]
pub struct StatusArgs {
    /// Project root to inspect
    #[arg(default_value = ".")]
    pub path: String,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum StatusOutput {
    #[serde(rename = "status")]
    #[serde(rename_all = "camelCase")]
    Status {
        project_root: String,
        runs: Vec<RunSummary>,
    },
}

pub fn run(args: StatusArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<StatusOutput> {
    let root = crate::commands::resolve_project_root(&args.path)?;
    let runs = report::list_runs(&root)?;

    Ok((
        StatusOutput::Status {
            project_root: crate::commands::display_root(&root),
            runs,
        },
        0,
    ))
}
