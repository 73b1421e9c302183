//! Call command implementation.
//!
//! Looks up the counts of one call and prints its statistics, along with
//! its timings when timing files are present.

use super::models::CallArgs;
use crate::counts::{count_file_paths, find_call, find_count_files, Data};
use crate::timings::{analyze_timings, find_timing_files, TimingKind, TimingStats};
use anyhow::{Context, Result};
use colored::Colorize;
use log::debug;

/// Send and recv sides of a call found in one communicator
#[derive(Debug)]
pub struct CallLookup {
    pub lead_rank: usize,
    pub send: Data,
    pub recv: Data,
}

/// Execute the call command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * No counter files in the directory
/// * The call is in none of the searched files
/// * Malformed counter or timing files
pub fn execute_call(args: CallArgs) -> Result<CallLookup> {
    let lookup = lookup_call(&args)?;

    println!(
        "{}",
        format!("Call {} (communicator led by rank {})", args.call, lookup.lead_rank).bold()
    );
    println!(
        "  Ranks: {}   Datatype size: {} / {} bytes",
        lookup.send.header.num_ranks,
        lookup.send.header.datatype_size,
        lookup.recv.header.datatype_size
    );
    print_side("Send", &lookup.send);
    print_side("Recv", &lookup.recv);

    if !find_timing_files(&args.dir)?.is_empty() {
        let timings = analyze_timings(&args.dir).context("Failed to read timing files")?;
        for kind in [TimingKind::Execution, TimingKind::LateArrival] {
            let stats = timings
                .call_by_lead(kind, lookup.lead_rank, args.call)
                .and_then(|times| TimingStats::from_values(times));
            match stats {
                Some(s) => println!(
                    "  {} time: min {:.6}  max {:.6}  mean {:.6}",
                    kind, s.min, s.max, s.mean
                ),
                None => println!("  {} time: n/a", kind),
            }
        }
    }

    Ok(lookup)
}

/// Find the call, searching every communicator unless one is given
///
/// **Public** - a call missing from a communicator is not an error as
/// long as another one has it
pub fn lookup_call(args: &CallArgs) -> Result<CallLookup> {
    let files = find_count_files(&args.dir)
        .with_context(|| format!("No usable counter files in {}", args.dir.display()))?;

    let leads = match args.rank {
        Some(rank) => vec![rank],
        None => files.lead_ranks.clone(),
    };

    for lead_rank in leads {
        let (send_path, recv_path) = count_file_paths(&args.dir, files.job_id, lead_rank);
        let send = match find_call(&send_path, args.call, args.size_threshold) {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                debug!("{}", e);
                continue;
            }
            Err(e) => return Err(e).context("Failed to read send counts"),
        };
        let recv = find_call(&recv_path, args.call, args.size_threshold)
            .context("Call has send counts but no recv counts")?;
        return Ok(CallLookup {
            lead_rank,
            send,
            recv,
        });
    }

    anyhow::bail!("Call {} not found in {}", args.call, args.dir.display())
}

fn print_side(label: &str, data: &Data) {
    let stats = &data.statistics;
    println!("  {}:", label);
    println!(
        "    sum {}  min {}  max {}  min (non-zero) {}",
        stats.sum, stats.min, stats.max, stats.min_without_zero
    );
    println!(
        "    zero counts {}  non-zero counts {}",
        stats.total_zero_counts, stats.total_non_zero_counts
    );
    println!(
        "    small messages {} ({} non-zero)  large messages {}",
        stats.small_msgs, stats.small_not_zero_msgs, stats.large_msgs
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn block(calls: &str, counts: &str) -> String {
        format!(
            "# Raw counters\n\n\
                Number of ranks: 2\n\
                Datatype size: 4\n\
                Alltoallv calls 0-1\n\
                Count: 1 calls - {}\n\n\n\
                BEGINNING DATA\n\
                Rank(s) 0-1: {} \n\
                END DATA\n",
            calls, counts
        )
    }

    fn write_comm(dir: &std::path::Path, rank: usize, calls: &str) {
        let (send, recv) = count_file_paths(dir, 0, rank);
        fs::write(send, block(calls, "1 2")).unwrap();
        fs::write(recv, block(calls, "1 2")).unwrap();
    }

    #[test]
    fn test_lookup_skips_communicators_without_call() {
        let dir = tempdir().unwrap();
        write_comm(dir.path(), 0, "0");
        write_comm(dir.path(), 2, "1");

        let lookup = lookup_call(&CallArgs {
            dir: dir.path().to_path_buf(),
            call: 1,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(lookup.lead_rank, 2);
        assert_eq!(lookup.send.statistics.sum, 3);
    }

    #[test]
    fn test_lookup_missing_call() {
        let dir = tempdir().unwrap();
        write_comm(dir.path(), 0, "0");

        let result = lookup_call(&CallArgs {
            dir: dir.path().to_path_buf(),
            call: 5,
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_lookup_restricted_to_rank() {
        let dir = tempdir().unwrap();
        write_comm(dir.path(), 0, "0");
        write_comm(dir.path(), 2, "1");

        let result = lookup_call(&CallArgs {
            dir: dir.path().to_path_buf(),
            call: 1,
            rank: Some(0),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
