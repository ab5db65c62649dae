use std::path::{Path, PathBuf};

pub type CmdResult<T> = logshift::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

pub mod analytics;
pub mod migrate;
pub mod report;
pub mod rollback;
pub mod status;
pub mod validate;

/// Resolve and sanity-check the project root argument shared by every
/// subcommand.
pub(crate) fn resolve_project_root(path: &str) -> logshift::Result<PathBuf> {
    let root = PathBuf::from(path);
    if !root.is_dir() {
        return Err(logshift::Error::validation_invalid_argument(
            "path",
            format!("Not a directory: {}", root.display()),
            None,
        ));
    }
    Ok(root)
}

/// Project-relative display path for output payloads.
pub(crate) fn display_root(root: &Path) -> String {
    root.display().to_string()
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (logshift::Result<serde_json::Value>, i32) {
    crate::tty::status("logshift is working...");

    match command {
        crate::Commands::Migrate(args) => dispatch!(args, global, migrate),
        crate::Commands::Validate(args) => dispatch!(args, global, validate),
        crate::Commands::Status(args) => dispatch!(args, global, status),
        crate::Commands::Rollback(args) => dispatch!(args, global, rollback),
        crate::Commands::Report(args) => dispatch!(args, global, report),
        crate::Commands::Analytics(args) => dispatch!(args, global, analytics),
    }
}
