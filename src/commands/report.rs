use clap::Args;
use serde::Serialize;

use logshift::report::{self, MigrationReport, ReportFormat};
use logshift::utils::io;
use logshift::{Error, ErrorCode};

use crate::commands::CmdResult;

#[derive(Args)]
pub struct ReportArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub path: String,

    /// Run id (defaults to the most recent run)
    #[arg(long)]
    pub run: Option<String>,

    /// Output format: text, json, html
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Write the rendering to a file instead of returning it inline
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum ReportOutput {
    #[serde(rename = "report")]
    #[serde(rename_all = "camelCase")]
    Report {
        run_id: String,
        format: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output_path: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
}

pub fn run(args: ReportArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ReportOutput> {
    let root = crate::commands::resolve_project_root(&args.path)?;
    let format = ReportFormat::from_str(&args.format)?;

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

    let rendering = report::render(&loaded, format)?;

    let (output_path, content) = match &args.output {
        Some(path) => {
            let target = std::path::Path::new(path);
            io::write_file(target, &rendering, &format!("write report to {}", path))?;
            (Some(path.clone()), None)
        }
        None => (None, Some(rendering)),
    };

    Ok((
        ReportOutput::Report {
            run_id: loaded.run_id,
            format: args.format,
            output_path,
            content,
        },
        0,
    ))
}
