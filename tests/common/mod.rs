//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use a2a_analyzer::codec::{write_block, CountHeader, CountRecord};
use a2a_analyzer::counts::count_file_paths;
use a2a_analyzer::timings::{timing_file_name, TimingKind};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One block of a counter file: the calls it stands for and its records
pub struct Block {
    pub calls: Vec<usize>,
    pub records: Vec<CountRecord>,
}

pub fn record(ranks: &str, counts: &[i64]) -> CountRecord {
    CountRecord {
        ranks: ranks.to_string(),
        counts: counts.to_vec(),
    }
}

/// Every rank of a `num_ranks` communicator sends `count` to every peer but itself
pub fn all_but_self(num_ranks: usize, count: i64) -> Vec<CountRecord> {
    (0..num_ranks)
        .map(|rank| {
            let counts: Vec<i64> = (0..num_ranks)
                .map(|peer| if peer == rank { 0 } else { count })
                .collect();
            record(&rank.to_string(), &counts)
        })
        .collect()
}

/// Write identical send and recv counter files for one communicator
pub fn write_counts(
    dir: &Path,
    job_id: usize,
    lead_rank: usize,
    num_ranks: usize,
    datatype_size: i64,
    blocks: &[Block],
) {
    let total_num_calls = blocks.iter().map(|b| b.calls.len()).sum();
    let (send, recv) = count_file_paths(dir, job_id, lead_rank);

    for path in [send, recv] {
        let mut w = BufWriter::new(File::create(path).unwrap());
        for block in blocks {
            let header = CountHeader {
                total_num_calls,
                call_ids: block.calls.clone(),
                num_ranks,
                datatype_size,
            };
            write_block(&mut w, &header, &block.records).unwrap();
        }
        w.flush().unwrap();
    }
}

/// Write a timing file; `calls[i]` holds the per-rank times of call `i`
pub fn write_timings(
    dir: &Path,
    kind: TimingKind,
    lead_rank: usize,
    job_id: usize,
    calls: &[Vec<f64>],
) {
    let name = timing_file_name("alltoallv", kind, lead_rank, 0, job_id);
    let mut text = String::from("FORMAT_VERSION: 0\n\n");
    for (call, times) in calls.iter().enumerate() {
        text.push_str(&format!("# Call {}\n", call));
        for time in times {
            text.push_str(&format!("{}\n", time));
        }
        text.push('\n');
    }
    std::fs::write(dir.join(name), text).unwrap();
}
