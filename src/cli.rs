//! Command-line argument parsing for rsload.

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use clap::Parser;
use std::path::PathBuf;

/// Synthetic query load tester for a query-serving HTTP API.
#[derive(Parser, Debug)]
#[command(name = "rsload")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// YAML or TOML configuration file with test parameters
    #[arg(short = 'c', long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Print result and summary tables, and log at debug level
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Append results and summaries to the CSV history files
    #[arg(long)]
    pub log_output: bool,

    /// Directory for CSV history files
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// File name for per-query history records
    #[arg(long, value_name = "NAME")]
    pub details_name: Option<String>,

    /// File name for per-set summary records
    #[arg(long, value_name = "NAME")]
    pub summary_name: Option<String>,

    /// Number of cycles to run (overrides `iterations` in the config file)
    #[arg(short = 'n', long, value_name = "N", allow_negative_numbers = true)]
    pub iterations: Option<i64>,

    /// Skip the connectivity and capacity check before the run
    #[arg(long)]
    pub skip_preflight: bool,

    /// Exit with status 2 if any query set summary has warnings
    #[arg(long)]
    pub fail_on_warnings: bool,

    /// Disable coloured table output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Applies flags that override values from the config file.
    pub fn apply_to(&self, config: &mut Config) {
        if self.verbose {
            config.verbose = true;
        }
        if self.log_output {
            config.log_output = true;
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(name) = &self.details_name {
            config.output.details_name = name.clone();
        }
        if let Some(name) = &self.summary_name {
            config.output.summary_name = name.clone();
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
    }
}
