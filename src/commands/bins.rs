//! Bins command implementation.
//!
//! Distributes the messages of a single counter file into size bins,
//! without running the full pipeline.

use super::models::BinsArgs;
use crate::bins::{self, parse_thresholds, Bin};
use crate::counts::parse_count_file_name;
use anyhow::{Context, Result};
use log::info;

/// Execute the bins command
///
/// **Public** - main entry point called from main.rs
///
/// # Returns
/// The filled bins, in ascending size order
///
/// # Errors
/// * Invalid thresholds
/// * Unreadable or malformed counter file
/// * Bin file write errors
pub fn execute_bins(args: BinsArgs) -> Result<Vec<Bin>> {
    let thresholds = parse_thresholds(&args.bins)
        .with_context(|| format!("Invalid --bins value `{}`", args.bins))?;

    let filled = bins::from_count_file(&args.file, &thresholds)
        .with_context(|| format!("Failed to bin {}", args.file.display()))?;

    println!("Bins for {}:", args.file.display());
    for bin in &filled {
        let range = match bin.max {
            Some(max) => format!("[{}, {})", bin.min, max),
            None => format!("[{}, +inf)", bin.min),
        };
        println!("  {:<20} {}", range, bin.size);
    }

    if let Some(output_dir) = &args.output_dir {
        let (job, rank) = resolve_ids(&args)?;
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;
        let files = bins::save(output_dir, job, rank, &filled)
            .context("Failed to write bin files")?;
        info!("✓ {} bin files written to: {}", files.len(), output_dir.display());
    }

    Ok(filled)
}

/// Job and rank used in bin file names
///
/// **Private** - explicit arguments win over the counter file name
fn resolve_ids(args: &BinsArgs) -> Result<(usize, usize)> {
    let from_name = args
        .file
        .file_name()
        .and_then(|name| parse_count_file_name(&name.to_string_lossy()));

    match (args.job, args.rank, from_name) {
        (Some(job), Some(rank), _) => Ok((job, rank)),
        (job, rank, Some((name_job, name_rank))) => {
            Ok((job.unwrap_or(name_job), rank.unwrap_or(name_rank)))
        }
        _ => anyhow::bail!(
            "Cannot tell job and rank from {}; pass --job and --rank",
            args.file.display()
        ),
    }
}

/// Validate bins arguments
///
/// **Public** - called before execution
pub fn validate_args(args: &BinsArgs) -> Result<()> {
    if !args.file.is_file() {
        anyhow::bail!("Counter file does not exist: {}", args.file.display());
    }
    parse_thresholds(&args.bins)
        .with_context(|| format!("Invalid --bins value `{}`", args.bins))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const COUNTS: &str = "# Raw counters\n\n\
        Number of ranks: 2\n\
        Datatype size: 1\n\
        Alltoallv calls 0-1\n\
        Count: 2 calls - 0-1\n\n\n\
        BEGINNING DATA\n\
        Rank(s) 0-1: 100 3000 \n\
        END DATA\n";

    #[test]
    fn test_resolve_ids_from_file_name() {
        let args = BinsArgs {
            file: PathBuf::from("/data/send-counters.job4.rank8.txt"),
            ..Default::default()
        };
        assert_eq!(resolve_ids(&args).unwrap(), (4, 8));

        let args = BinsArgs {
            rank: Some(2),
            ..args
        };
        assert_eq!(resolve_ids(&args).unwrap(), (4, 2));
    }

    #[test]
    fn test_resolve_ids_unknown_name() {
        let args = BinsArgs {
            file: PathBuf::from("counts.txt"),
            ..Default::default()
        };
        assert!(resolve_ids(&args).is_err());

        let args = BinsArgs {
            job: Some(1),
            rank: Some(0),
            ..args
        };
        assert_eq!(resolve_ids(&args).unwrap(), (1, 0));
    }

    #[test]
    fn test_validate_args_missing_file() {
        let args = BinsArgs {
            file: PathBuf::from("/nope/send-counters.job0.rank0.txt"),
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_execute_bins_writes_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("send-counters.job0.rank0.txt");
        std::fs::write(&file, COUNTS).unwrap();

        let args = BinsArgs {
            file,
            output_dir: Some(dir.path().join("bins")),
            ..Default::default()
        };
        validate_args(&args).unwrap();
        let filled = execute_bins(args).unwrap();

        let sizes: Vec<usize> = filled.iter().map(|b| b.size).collect();
        // Two ranks, two calls: 100 bytes lands in [0,200), 3000 in [2048,4096)
        assert_eq!(sizes, vec![4, 0, 0, 4, 0]);
        assert!(dir.path().join("bins/bin.job0.rank0_0-200.txt").exists());
        assert!(dir.path().join("bins/bin.job0.rank0_4096+.txt").exists());
    }
}
