// Command-line interface definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::job::ErrorStrategy;

#[derive(Parser, Debug)]
#[command(name = "recordflow")]
#[command(about = "Record dispatching and fork/join pipelines over a worker pool")]
#[command(
    long_about = "Record dispatching and fork/join pipelines over a worker pool\n\nEach subcommand wires one pipeline shape: a single grep/cut/count job, content-based\ndispatch of files to typed workers, a round-robin fork/join, or parallel jobs whose\nreports are merged into one.\n\nCOMMON EXAMPLES:\n  recordflow pipeline data/tweets.csv\n  recordflow fork-join data/tweets.csv --threads 4\n  recordflow split data/tweets-part1.csv data/tweets-part2.csv --json"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Worker threads in the pool (default: number of CPUs, or the config file's value)
    #[arg(long = "threads", global = true, help_heading = "Executor Options")]
    pub threads: Option<usize>,

    /// What a job does when a stage fails on a record
    #[arg(long = "on-error", value_enum, global = true, help_heading = "Executor Options")]
    pub on_error: Option<ErrorStrategy>,

    /// Give up on a queue that stays empty this long, e.g. "5s" or "1m" (default: wait forever)
    #[arg(
        long = "read-timeout",
        value_parser = humantime::parse_duration,
        global = true,
        help_heading = "Executor Options"
    )]
    pub read_timeout: Option<Duration>,

    /// Print reports as JSON
    #[arg(long = "json", global = true, help_heading = "Output Options")]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RECORDFLOW_LOG overrides.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true, help_heading = "Output Options")]
    pub verbose: u8,

    /// Read configuration from this file instead of searching for .recordflowrc
    #[arg(long = "config", global = true, help_heading = "Configuration Options")]
    pub config: Option<PathBuf>,

    /// Ignore configuration files
    #[arg(long = "ignore-config", global = true, help_heading = "Configuration Options")]
    pub ignore_config: bool,

    /// Show configuration file locations and active settings, then exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Grep lines for a token, cut one field, and count the words left
    Pipeline {
        /// Delimited input file
        file: PathBuf,
        /// Literal text a line must contain
        #[arg(long = "token", default_value = "#EasyBatch")]
        token: String,
        /// Field to keep (1-based)
        #[arg(
            long = "field",
            default_value_t = 3,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        field: usize,
        /// Field delimiter
        #[arg(long = "delimiter", default_value = ",")]
        delimiter: String,
    },
    /// Dispatch files by extension to a csv worker and an xml worker
    Cbrd {
        /// Directory to scan (default: current directory)
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Fork tweets round-robin to two workers and join their output
    ForkJoin {
        /// Tweets CSV file (id,user,message)
        file: PathBuf,
    },
    /// Run one job per file in parallel and merge the reports
    Split {
        /// Tweets CSV files (id,user,message)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Run two jobs over one file, split by record number, and merge the reports
    Filter {
        /// Tweets CSV file (id,user,message)
        file: PathBuf,
        /// Last record number handled by the first job
        #[arg(long = "split-at", default_value_t = 3)]
        split_at: u64,
    },
}
