mod commands;
mod logging;
mod scenario;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use commands::{cmd_check_config, cmd_run, cmd_table};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Sequential sign-off workflow engine.
#[derive(Parser)]
#[command(name = "signoff", version, about = "Sequential sign-off workflow engine")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted scenario against an in-memory engine
    Run {
        /// Path to the scenario JSON file
        scenario: PathBuf,
        /// Engine configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Parse and validate an engine configuration file
    CheckConfig {
        /// Path to the configuration TOML file
        file: PathBuf,
    },

    /// Print the workflow transition table
    Table,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { scenario, config } => {
            cmd_run(&scenario, config.as_deref(), cli.output, cli.quiet);
        }
        Commands::CheckConfig { file } => {
            cmd_check_config(&file, cli.output, cli.quiet);
        }
        Commands::Table => {
            cmd_table(cli.output);
        }
    }
}

/// Print an error in the selected output format. Suppressed by `--quiet`.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Report `msg` and exit with status 1.
pub(crate) fn fail(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(msg, output, quiet);
    process::exit(1);
}
