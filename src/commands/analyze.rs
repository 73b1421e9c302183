//! Analyze command implementation.
//!
//! The analyze command:
//! 1. Resolves thresholds and the step list
//! 2. Runs the step pipeline over the profiler output
//! 3. Writes the JSON run summary
//! 4. Optionally prints a text summary

use super::models::AnalyzeArgs;
use crate::bins::parse_thresholds;
use crate::output::{write_summary, AnalysisSummary};
use crate::pipeline::{parse_steps, Pipeline, PipelineOptions, PlotStatus, Step};
use crate::plot::PlotRenderer;
use crate::utils::config::SUMMARY_FILE_NAME;
use anyhow::{Context, Result};
use colored::Colorize;
use log::info;
use std::time::Instant;

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `args` - Analyze command arguments
/// * `renderer` - Plot renderer used by the plot step
///
/// # Returns
/// The summary that was written to `analysis-summary.json`
///
/// # Errors
/// * Invalid thresholds or step list
/// * Any pipeline step failure
/// * Summary write errors
pub fn execute_analyze(args: AnalyzeArgs, renderer: &dyn PlotRenderer) -> Result<AnalysisSummary> {
    let start_time = Instant::now();

    let options = build_options(&args)?;
    let output_dir = options.output_dir.clone();

    info!("Analyzing profiler output in: {}", args.dir.display());
    if output_dir != args.dir {
        info!("Results go to: {}", output_dir.display());
    }

    let results = Pipeline::new(options, renderer)
        .run()
        .context("Analysis failed")?;

    let summary = AnalysisSummary::from_results(&args.dir, &results);
    let summary_path = output_dir.join(SUMMARY_FILE_NAME);
    write_summary(&summary, &summary_path).context("Failed to write run summary")?;
    info!("✓ Summary written to: {}", summary_path.display());

    if args.print_summary {
        print_summary(&summary);
    }

    info!(
        "Analysis completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(summary)
}

/// Turn command arguments into pipeline options
///
/// **Private** - shared by `execute_analyze` and `validate_args`
fn build_options(args: &AnalyzeArgs) -> Result<PipelineOptions> {
    let mut options = PipelineOptions::new(&args.dir);

    if let Some(output_dir) = &args.output_dir {
        options.output_dir = output_dir.clone();
    }
    options.size_threshold = (args.size_threshold != -1).then_some(args.size_threshold);
    options.bin_thresholds = parse_thresholds(&args.bins)
        .with_context(|| format!("Invalid --bins value `{}`", args.bins))?;
    options.plot_batch_size = args.plot_batch_size;

    if let Some(steps) = &args.steps {
        options.steps =
            parse_steps(steps).with_context(|| format!("Invalid --steps value `{}`", steps))?;
    }

    Ok(options)
}

/// Validate analyze arguments
///
/// **Public** - called before execution
///
/// # Errors
/// * Input directory missing or not a directory
/// * Size threshold below -1
/// * Zero plot batch size
/// * Unparseable bins or steps
pub fn validate_args(args: &AnalyzeArgs) -> Result<()> {
    if !args.dir.exists() {
        anyhow::bail!("Input directory does not exist: {}", args.dir.display());
    }
    if !args.dir.is_dir() {
        anyhow::bail!("Input path is not a directory: {}", args.dir.display());
    }

    if args.size_threshold < -1 {
        anyhow::bail!(
            "Size threshold must be -1 (disabled) or positive, got {}",
            args.size_threshold
        );
    }

    if args.plot_batch_size == 0 {
        anyhow::bail!("Plot batch size must be at least 1");
    }

    build_options(args)?;

    Ok(())
}

/// Print a text summary of a run
///
/// **Private** - `--summary` output
fn print_summary(summary: &AnalysisSummary) {
    println!("\n{}", "=".repeat(80));
    println!("{}", "ANALYSIS SUMMARY".bold());
    println!("{}", "=".repeat(80));
    println!("Input:       {}", summary.input_dir);
    if let Some(job_id) = summary.job_id {
        println!("Job:         {}", job_id);
    }
    if let Some(total) = summary.total_num_calls {
        println!("Total calls: {}", total);
    }

    println!("\nSteps:");
    for step in &summary.steps {
        let label = Step::from_number(step.step).map_or(step.label.as_str(), |s| s.label());
        println!("  {}. {:<32} {:>10.2} ms", step.step, label, step.duration_ms);
    }

    if !summary.communicators.is_empty() {
        println!("\nCommunicators:");
        println!(
            "  {:>9} {:>7} {:>9} {:>7} {:>7} {:>7} {:>6}",
            "lead rank", "calls", "patterns", "1->N", "N->N", "N->1", "empty"
        );
        for comm in &summary.communicators {
            println!(
                "  {:>9} {:>7} {:>9} {:>7} {:>7} {:>7} {:>6}",
                comm.lead_rank,
                comm.num_calls,
                comm.patterns,
                comm.one_to_n,
                comm.n_to_n,
                comm.n_to_one,
                comm.empty
            );
        }
    }

    if !summary.outliers.is_empty() {
        println!(
            "\n{}",
            format!("{} call(s) with outlier timings:", summary.outliers.len()).yellow()
        );
        for outlier in &summary.outliers {
            println!(
                "  rank {} call {} ({}): {} groups",
                outlier.comm.lead_rank,
                outlier.call,
                outlier.kind,
                outlier.groups.len()
            );
        }
    }

    match &summary.plots {
        Some(PlotStatus::Rendered { images }) => println!("\nPlots: {} image(s)", images),
        Some(PlotStatus::Skipped { reason }) => {
            println!("\n{}", format!("Plots skipped: {}", reason).yellow())
        }
        None => {}
    }

    if let Some(highlights) = &summary.highlights {
        println!("Highlights:  {}", highlights);
    }
    println!("{}", "=".repeat(80));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn args_in(dir: &std::path::Path) -> AnalyzeArgs {
        AnalyzeArgs {
            dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_args_valid() {
        let dir = tempdir().unwrap();
        assert!(validate_args(&args_in(dir.path())).is_ok());
    }

    #[test]
    fn test_validate_args_missing_dir() {
        let args = AnalyzeArgs {
            dir: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_file_instead_of_dir() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(validate_args(&args_in(file.path())).is_err());
    }

    #[test]
    fn test_validate_args_bad_threshold() {
        let dir = tempdir().unwrap();
        let mut args = args_in(dir.path());
        args.size_threshold = -5;
        assert!(validate_args(&args).is_err());

        args.size_threshold = -1;
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_zero_batch() {
        let dir = tempdir().unwrap();
        let mut args = args_in(dir.path());
        args.plot_batch_size = 0;
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_bad_bins() {
        let dir = tempdir().unwrap();
        let mut args = args_in(dir.path());
        args.bins = "100,50".to_string();
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_bad_steps() {
        let dir = tempdir().unwrap();
        let mut args = args_in(dir.path());
        args.steps = Some("1,9".to_string());
        assert!(validate_args(&args).is_err());

        args.steps = Some("1-3,7".to_string());
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_build_options_disabled_threshold() {
        let dir = tempdir().unwrap();
        let mut args = args_in(dir.path());
        args.size_threshold = -1;
        args.output_dir = Some(dir.path().join("out"));

        let options = build_options(&args).unwrap();
        assert_eq!(options.size_threshold, None);
        assert_eq!(options.output_dir, dir.path().join("out"));
        assert_eq!(options.bin_thresholds, vec![200, 1024, 2048, 4096]);
    }
}
