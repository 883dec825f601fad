use clap::CommandFactory;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use log::LevelFilter;
use std::{env, io, process};

mod evaluate;
use evaluate::EvaluateOptions;

/// Logging is controlled with RUST_LOG; see docs for the env_logger crate.
/// If RUST_LOG is not set, the log level defaults to Info.
/// Set RUST_LOG=cantus_common::parse=debug to trace the line parser.
#[derive(Parser)]
#[command(version, about, long_about = None, verbatim_doc_comment)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Determine whether the lines of a score are generable under the
    /// rules of tonal line construction, and report the admissible
    /// interpretations.
    EvaluateLines(EvaluateOptions),
    /// Check the counterpoint of a score against the rules of voice
    /// leading. Rule violations are findings, not failures: the exit
    /// code is zero whenever the analysis itself succeeds.
    EvaluateCounterpoint(EvaluateOptions),
    /// Generate shell completion
    Completion {
        /// shell
        shell: Shell,
    },
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut log_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        log_builder.filter_level(LevelFilter::Info);
    }
    log_builder.init();

    match cli.command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::EvaluateLines(options) => evaluate::run_lines(options),
        Commands::EvaluateCounterpoint(options) => evaluate::run_counterpoint(options),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(2);
    }
}
