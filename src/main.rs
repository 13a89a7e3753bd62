use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recordflow::cli::{Cli, Command};
use recordflow::config::RecordflowConfig;
use recordflow::config_file::ConfigFile;
use recordflow::runner;

const LOG_ENV: &str = "RECORDFLOW_LOG";

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("recordflow: Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; RECORDFLOW_LOG wins over -v
fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    if cli.show_config {
        ConfigFile::show_config();
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command.clone() else {
        Cli::command().print_help()?;
        return Ok(ExitCode::from(2));
    };

    let file_config = if cli.ignore_config {
        ConfigFile::default()
    } else {
        ConfigFile::load_with_custom_path(cli.config.as_deref())?
    };
    let config = RecordflowConfig::from_cli(&cli, &file_config);
    tracing::debug!(?config, "configuration resolved");

    let summary = match command {
        Command::Pipeline {
            file,
            token,
            field,
            delimiter,
        } => runner::run_pipeline(&config, &file, &token, &delimiter, field)?,
        Command::Cbrd { dir } => runner::run_cbrd(&config, &dir)?,
        Command::ForkJoin { file } => runner::run_fork_join(&config, &file)?,
        Command::Split { files } => runner::run_split(&config, &files)?,
        Command::Filter { file, split_at } => runner::run_filter(&config, &file, split_at)?,
    };

    summary.print(config.json)?;

    if summary.any_failed() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
