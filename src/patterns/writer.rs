//! Markdown reports for patterns and communicator statistics.
//!
//! Distributions are printed sorted by key so reports are stable across
//! runs and diffable.

use super::{CallPattern, Classification, PatternsCollection};
use crate::codec::compress_int_array;
use crate::counts::SendRecvStats;
use log::info;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub fn pattern_file_path(dir: &Path, job_id: usize, rank: usize) -> PathBuf {
    dir.join(format!("patterns-job{}-rank{}.md", job_id, rank))
}

pub fn summary_file_path(dir: &Path, job_id: usize, rank: usize) -> PathBuf {
    dir.join(format!("patterns-summary-job{}-rank{}.md", job_id, rank))
}

pub fn stats_file_path(dir: &Path, job_id: usize, rank: usize) -> PathBuf {
    dir.join(format!("stats-job{}-rank{}.md", job_id, rank))
}

/// Write the send/recv distributions of a pattern
///
/// **Public** - shared with the multi-communicator report
pub fn write_distributions<W: Write>(w: &mut W, pattern: &CallPattern) -> io::Result<()> {
    for (num_peers, num_ranks) in &pattern.send {
        write!(w, "{} ranks sent to {} other ranks\n\n", num_ranks, num_peers)?;
    }
    for (num_peers, num_ranks) in &pattern.recv {
        write!(w, "{} ranks recv'd from {} other ranks\n\n", num_ranks, num_peers)?;
    }
    Ok(())
}

fn write_pattern<W: Write>(
    w: &mut W,
    num: usize,
    total_num_calls: usize,
    pattern: &CallPattern,
) -> io::Result<()> {
    write!(
        w,
        "## Pattern #{} ({}/{} alltoallv calls)\n\n",
        num, pattern.count, total_num_calls
    )?;
    write!(w, "Alltoallv calls: {}\n\n", compress_int_array(&pattern.calls))?;
    write_distributions(w, pattern)?;
    writeln!(w)
}

/// Write every distinct pattern
///
/// **Public** - content of `patterns-job<J>-rank<R>.md`
pub fn write_patterns<W: Write>(
    w: &mut W,
    collection: &PatternsCollection,
    total_num_calls: usize,
) -> io::Result<()> {
    writeln!(w, "# Patterns")?;
    for (num, pattern) in collection.all_patterns.iter().enumerate() {
        write_pattern(w, num, total_num_calls, pattern)?;
    }
    Ok(())
}

/// Write the classified buckets
///
/// **Public** - content of `patterns-summary-job<J>-rank<R>.md`
pub fn write_summary<W: Write>(
    w: &mut W,
    collection: &PatternsCollection,
    total_num_calls: usize,
) -> io::Result<()> {
    if !collection.has_summary() {
        return write!(w, "Nothing special detected; no summary");
    }

    let mut first = true;
    for class in [
        Classification::OneToN,
        Classification::NToOne,
        Classification::NToN,
    ] {
        let patterns = collection.bucket(class);
        if patterns.is_empty() {
            continue;
        }
        if !first {
            writeln!(w)?;
        }
        first = false;

        let title = match class {
            Classification::OneToN => "# 1 to N patterns",
            Classification::NToOne => "# N to 1 patterns",
            Classification::NToN => "# N to n patterns",
        };
        write!(w, "{}\n\n", title)?;
        for (num, pattern) in patterns.into_iter().enumerate() {
            write_pattern(w, num, total_num_calls, pattern)?;
        }
    }
    Ok(())
}

fn write_distribution<W: Write, K: std::fmt::Display>(
    w: &mut W,
    map: &BTreeMap<K, usize>,
    total_num_calls: usize,
    describe: impl Fn(&K) -> String,
) -> io::Result<()> {
    for (key, n) in map {
        writeln!(w, "{}/{} {}", n, total_num_calls, describe(key))?;
    }
    Ok(())
}

/// Write the communicator-wide statistics report
///
/// **Public** - content of `stats-job<J>-rank<R>.md`
pub fn write_stats_report<W: Write>(w: &mut W, stats: &SendRecvStats) -> io::Result<()> {
    let calls = stats.total_num_calls;
    let threshold = stats
        .msg_size_threshold
        .map(|t| t.to_string())
        .unwrap_or_else(|| "none".to_string());

    write!(w, "Total number of alltoallv calls: {}\n\n", calls)?;

    write!(w, "# Datatypes\n\n")?;
    write_distribution(w, &stats.datatypes_send, calls, |size| {
        format!("calls use a datatype of size {} while sending data", size)
    })?;
    write_distribution(w, &stats.datatypes_recv, calls, |size| {
        format!("calls use a datatype of size {} while receiving data", size)
    })?;
    writeln!(w)?;

    write!(w, "# Communicator size(s)\n\n")?;
    write_distribution(w, &stats.comm_sizes, calls, |size| {
        format!("calls use a communicator size of {}", size)
    })?;
    writeln!(w)?;

    write!(w, "# Message sizes\n\n")?;
    let total_send_msgs = stats.send_small_msgs + stats.send_large_msgs;
    writeln!(
        w,
        "{}/{} of all messages are large (threshold = {})",
        stats.send_large_msgs, total_send_msgs, threshold
    )?;
    writeln!(
        w,
        "{}/{} of all messages are small (threshold = {})",
        stats.send_small_msgs, total_send_msgs, threshold
    )?;
    writeln!(
        w,
        "{}/{} of all messages are small, but not 0-size (threshold = {})",
        stats.send_small_not_zero_msgs, total_send_msgs, threshold
    )?;

    write!(w, "\n# Sparsity\n\n")?;
    write_distribution(w, &stats.call_send_sparsity, calls, |zeros| {
        format!("of all calls have {} send counts equals to zero", zeros)
    })?;
    write_distribution(w, &stats.call_recv_sparsity, calls, |zeros| {
        format!("of all calls have {} recv counts equals to zero", zeros)
    })?;

    write!(w, "\n# Min/max\n\n")?;
    write_distribution(w, &stats.send_mins, calls, |v| {
        format!("calls have a send count min of {}", v)
    })?;
    write_distribution(w, &stats.recv_mins, calls, |v| {
        format!("calls have a recv count min of {}", v)
    })?;
    write_distribution(w, &stats.send_not_zero_mins, calls, |v| {
        format!("calls have a send count min of {} (excluding zero)", v)
    })?;
    write_distribution(w, &stats.recv_not_zero_mins, calls, |v| {
        format!("calls have a recv count min of {} (excluding zero)", v)
    })?;
    write_distribution(w, &stats.send_maxs, calls, |v| {
        format!("calls have a send count max of {}", v)
    })?;
    write_distribution(w, &stats.recv_maxs, calls, |v| {
        format!("calls have a recv count max of {}", v)
    })?;

    Ok(())
}

/// Write the stats, patterns and summary files of one lead rank
///
/// **Public** - used by step 1
///
/// # Returns
/// Paths of the three files, in that order
pub fn save_reports(
    dir: &Path,
    job_id: usize,
    rank: usize,
    collection: &PatternsCollection,
    stats: &SendRecvStats,
) -> io::Result<[PathBuf; 3]> {
    let paths = [
        stats_file_path(dir, job_id, rank),
        pattern_file_path(dir, job_id, rank),
        summary_file_path(dir, job_id, rank),
    ];

    let mut w = BufWriter::new(File::create(&paths[0])?);
    write_stats_report(&mut w, stats)?;
    w.flush()?;

    let mut w = BufWriter::new(File::create(&paths[1])?);
    write_patterns(&mut w, collection, stats.total_num_calls)?;
    w.flush()?;

    let mut w = BufWriter::new(File::create(&paths[2])?);
    write_summary(&mut w, collection, stats.total_num_calls)?;
    w.flush()?;

    for path in &paths {
        info!("-> {}", path.display());
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::Distribution;
    use pretty_assertions::assert_eq;

    fn collection() -> PatternsCollection {
        let mut c = PatternsCollection::new();
        let d: Distribution = [(4, 4)].into_iter().collect();
        c.add_pattern(0, &d, &d);
        c.add_pattern(1, &d, &d);
        c
    }

    #[test]
    fn test_pattern_file_layout() {
        let mut buf = Vec::new();
        write_patterns(&mut buf, &collection(), 2).unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "# Patterns\n\
             ## Pattern #0 (2/2 alltoallv calls)\n\n\
             Alltoallv calls: 0-1\n\n\
             4 ranks sent to 4 other ranks\n\n\
             4 ranks recv'd from 4 other ranks\n\n\
             \n"
        );
    }

    #[test]
    fn test_summary_without_buckets() {
        let mut c = PatternsCollection::new();
        let d: Distribution = [(2, 8)].into_iter().collect();
        c.add_pattern(0, &d, &d);

        let mut buf = Vec::new();
        write_summary(&mut buf, &c, 1).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Nothing special detected; no summary"
        );
    }

    #[test]
    fn test_summary_lists_n_to_n() {
        let mut buf = Vec::new();
        write_summary(&mut buf, &collection(), 2).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("# N to n patterns\n\n## Pattern #0 (2/2 alltoallv calls)"));
    }
}
