use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{analytics, migrate, report, rollback, status, validate};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "logshift")]
#[command(version = VERSION)]
#[command(about = "Migrate ad-hoc console diagnostics to structured component logging")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate console calls to the structured logger
    Migrate(migrate::MigrateArgs),
    /// Re-run post-migration checks for a recorded run
    Validate(validate::ValidateArgs),
    /// List prior migration runs with summary metrics
    Status(status::StatusArgs),
    /// Restore files from a run's backups
    Rollback(rollback::RollbackArgs),
    /// Render a run's migration report
    Report(report::ReportArgs),
    /// Per-component migration totals and recommendations
    Analytics(analytics::AnalyticsArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    let _ = output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
