//! A2A Analyzer CLI
//!
//! Post-mortem analysis of alltoallv profiler output.
//! Finds communication patterns, builds heat maps and bins, flags timing
//! outliers and renders plots.

use a2a_analyzer::commands::{
    bins, display_schema, display_version, execute_analyze, execute_bins, execute_call,
    validate_args, validate_summary_file, AnalyzeArgs, BinsArgs, CallArgs,
};
use a2a_analyzer::plot::Gnuplot;
use a2a_analyzer::utils::config::{load_config, AnalysisConfig};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

/// A2A Analyzer - post-mortem analysis of alltoallv profiles
#[derive(Parser, Debug)]
#[command(name = "a2a-analyzer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the analysis pipeline over a profiler output directory
    Analyze {
        /// Directory holding counter and timing files
        #[arg(short, long, env = "A2A_INPUT_DIR")]
        dir: PathBuf,

        /// Where results are written (defaults to the input directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Small/large message split in bytes, -1 to disable
        #[arg(long, visible_alias = "msg-size-threshold", allow_hyphen_values = true)]
        size_threshold: Option<i64>,

        /// Comma-separated bin thresholds in bytes
        #[arg(long)]
        bins: Option<String>,

        /// Steps to run, e.g. "1-3,7" (dependencies are added)
        #[arg(long)]
        steps: Option<String>,

        /// TOML file with analysis settings; flags take precedence
        #[arg(short, long, env = "A2A_CONFIG")]
        config: Option<PathBuf>,

        /// Max number of plots rendered at once
        #[arg(long)]
        plot_batch_size: Option<usize>,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Bin the messages of a single counter file by size
    Bins {
        /// Send or recv counter file
        #[arg(short, long)]
        file: PathBuf,

        /// Comma-separated bin thresholds in bytes
        #[arg(long)]
        bins: Option<String>,

        /// Write one file per bin into this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Job ID used in bin file names (read from the file name if omitted)
        #[arg(long, visible_alias = "jobid")]
        job: Option<usize>,

        /// Rank used in bin file names (read from the file name if omitted)
        #[arg(long, visible_alias = "pid")]
        rank: Option<usize>,
    },

    /// Show the counts and timings of one call
    Call {
        /// Directory holding counter and timing files
        #[arg(short, long)]
        dir: PathBuf,

        /// Call ID
        #[arg(short, long)]
        call: usize,

        /// Only search the communicator led by this rank
        #[arg(short, long)]
        rank: Option<usize>,

        /// Small/large message split in bytes, -1 to disable
        #[arg(long, visible_alias = "msg-size-threshold", allow_hyphen_values = true)]
        size_threshold: Option<i64>,
    },

    /// Validate a summary JSON file
    Validate {
        /// Path to summary JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Analyze {
            dir,
            output_dir,
            size_threshold,
            bins,
            steps,
            config,
            plot_batch_size,
            summary,
        } => {
            let config = match config {
                Some(path) => load_config(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => AnalysisConfig::default(),
            };

            // Flags override the config file, which overrides defaults
            let args = AnalyzeArgs {
                dir,
                output_dir: output_dir.or(config.output_dir),
                size_threshold: size_threshold.unwrap_or(config.size_threshold),
                bins: bins.unwrap_or(config.bins),
                steps: steps.or(config.steps),
                plot_batch_size: plot_batch_size.unwrap_or(config.plot_batch_size),
                print_summary: summary,
            };

            // Validate args first
            validate_args(&args)?;

            let renderer = Gnuplot::detect();
            execute_analyze(args, &renderer)?;
        }

        Commands::Bins {
            file,
            bins: thresholds,
            output_dir,
            job,
            rank,
        } => {
            let args = BinsArgs {
                file,
                bins: thresholds.unwrap_or_else(|| BinsArgs::default().bins),
                output_dir,
                job,
                rank,
            };
            bins::validate_args(&args)?;
            execute_bins(args)?;
        }

        Commands::Call {
            dir,
            call,
            rank,
            size_threshold,
        } => {
            let threshold = size_threshold.unwrap_or(AnalysisConfig::default().size_threshold);
            execute_call(CallArgs {
                dir,
                call,
                rank,
                size_threshold: (threshold != -1).then_some(threshold),
            })?;
        }

        Commands::Validate { file } => {
            validate_summary_file(file)?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
