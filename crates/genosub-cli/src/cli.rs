//! CLI argument definitions for the submission validator.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "genosub",
    version,
    about = "Genomic submission validator - check submission files against a dictionary",
    long_about = "Validate tab-separated genomic submission files (donor, specimen, sample,\n\
                  and experimental feature files) against a versioned dictionary:\n\
                  structural checks, field restrictions, and cross-file key integrity."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow donor-level values in trace logs (off by default: submission
    /// rows may carry identifying data).
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a submission directory against a dictionary.
    Validate(ValidateArgs),

    /// List the file schemas a dictionary declares.
    Schemas(SchemasArgs),
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Directory holding the submission's TSV files.
    #[arg(value_name = "SUBMISSION_DIR")]
    pub submission_dir: PathBuf,

    /// Dictionary JSON document to validate against.
    #[arg(long = "dictionary", value_name = "PATH")]
    pub dictionary: PathBuf,

    /// Project key the submission belongs to.
    #[arg(long = "project-key", value_name = "KEY")]
    pub project_key: String,

    /// Release the submission is part of.
    #[arg(long = "release", value_name = "NAME")]
    pub release_name: String,

    /// Exclusion dictionary JSON (grandfathered records to skip).
    #[arg(long = "exclusions", value_name = "PATH")]
    pub exclusions: Option<PathBuf>,

    /// Restrict validation to these data types (e.g. clinical, ssm).
    #[arg(long = "data-type", value_name = "TYPE")]
    pub data_types: Vec<String>,

    /// Run independent file checks on the thread pool.
    #[arg(long = "parallel")]
    pub parallel: bool,

    /// Partition relational key checks into N co-groups.
    #[arg(long = "partitions", value_name = "N")]
    pub partitions: Option<usize>,

    /// Write the full report as JSON to this path.
    #[arg(long = "report-out", value_name = "PATH")]
    pub report_out: Option<PathBuf>,
}

#[derive(Parser)]
pub struct SchemasArgs {
    /// Dictionary JSON document to describe.
    #[arg(long = "dictionary", value_name = "PATH")]
    pub dictionary: PathBuf,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
