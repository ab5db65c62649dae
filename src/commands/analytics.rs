use clap::Args;
use serde::Serialize;

use logshift::analytics::{self, AnalyticsReport};

use crate::commands::CmdResult;

#[derive(Args)]
pub struct AnalyticsArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub path: String,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum AnalyticsOutput {
    #[serde(rename = "analytics")]
    #[serde(rename_all = "camelCase")]
    Analytics {
        project_root: String,
        #[serde(flatten)]
        report: AnalyticsReport,
    },
}

pub fn run(args: AnalyticsArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<AnalyticsOutput> {
    let root = crate::commands::resolve_project_root(&args.path)?;
    let report = analytics::analyze(&root)?;

    Ok((
        AnalyticsOutput::Analytics {
            project_root: crate::commands::display_root(&root),
            report,
        },
        0,
    ))
}
