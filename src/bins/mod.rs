//! Message-size histogram bins.
//!
//! A bin accumulates how many rank-message occurrences fall in its byte
//! range. One count line stands for every rank in its rank list and every
//! call of its block, so each count is weighted accordingly.

use crate::codec::{count_elements, CountRecord};
use crate::counts::{read_blocks, CallsData};
use crate::utils::error::{BinsError, CountsError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A `[min, max)` byte range, unbounded when `max` is `None`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bin {
    pub min: i64,
    pub max: Option<i64>,
    pub size: usize,
}

impl Bin {
    pub fn contains(&self, bytes: i64) -> bool {
        match self.max {
            Some(max) => self.min <= bytes && bytes < max,
            None => self.min <= bytes,
        }
    }
}

/// Parse a comma-separated threshold list such as `200,1024,2048`
///
/// # Errors
/// * `BinsError::InvalidThresholds` - empty list, non-numeric entry, or
///   values that are not strictly ascending and positive
pub fn parse_thresholds(list: &str) -> Result<Vec<i64>, BinsError> {
    let invalid = || BinsError::InvalidThresholds(list.to_string());

    let thresholds = list
        .split(',')
        .map(|token| token.trim().parse::<i64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;

    let ascending = thresholds.windows(2).all(|w| w[0] < w[1]);
    if thresholds.is_empty() || !ascending || thresholds[0] <= 0 {
        return Err(invalid());
    }
    Ok(thresholds)
}

/// Build empty bins `[0, t0), [t0, t1), ..., [t_last, +inf)`
pub fn create(thresholds: &[i64]) -> Vec<Bin> {
    let mut bins = Vec::with_capacity(thresholds.len() + 1);
    let mut min = 0;
    for &threshold in thresholds {
        bins.push(Bin {
            min,
            max: Some(threshold),
            size: 0,
        });
        min = threshold;
    }
    bins.push(Bin {
        min,
        max: None,
        size: 0,
    });
    bins
}

/// Add every count of a record set to the bins
///
/// **Public** - each count is converted to bytes and weighted by
/// `num_calls` times the number of ranks on its line
///
/// # Arguments
/// * `bins` - Bins built by [`create`]
/// * `records` - Raw `Rank(s) ...` lines of one block
/// * `datatype_size` - Element size in bytes
/// * `num_calls` - Number of calls the block stands for
pub fn add_records(
    bins: &mut [Bin],
    records: &[String],
    datatype_size: i64,
    num_calls: usize,
) -> Result<(), BinsError> {
    for line in records {
        let record = CountRecord::parse(line).map_err(CountsError::from)?;
        let weight = num_calls * count_elements(&record.ranks).map_err(CountsError::from)?;

        for &count in &record.counts {
            let bytes = count * datatype_size;
            match bins.iter_mut().find(|bin| bin.contains(bytes)) {
                Some(bin) => bin.size += weight,
                None => debug!("Count {} falls outside every bin", bytes),
            }
        }
    }
    Ok(())
}

/// Bins over the distinct send blocks of a communicator
///
/// **Public** - step 7 entry point
pub fn from_calls(calls: &CallsData, thresholds: &[i64]) -> Result<Vec<Bin>, BinsError> {
    let mut bins = create(thresholds);
    for data in calls.distinct() {
        let send = &data.send;
        add_records(
            &mut bins,
            &send.raw_counts,
            send.header.datatype_size,
            send.header.call_ids.len(),
        )?;
    }
    Ok(bins)
}

/// Bins over every block of a single counter file
pub fn from_count_file(path: &Path, thresholds: &[i64]) -> Result<Vec<Bin>, BinsError> {
    let mut bins = create(thresholds);
    for block in read_blocks(path)? {
        add_records(
            &mut bins,
            &block.records,
            block.header.datatype_size,
            block.header.call_ids.len(),
        )?;
    }
    Ok(bins)
}

/// `bin.job<J>.rank<R>_<min>-<max>.txt`, or `_<min>+.txt` for the last bin
pub fn bin_file_name(job_id: usize, rank: usize, bin: &Bin) -> String {
    match bin.max {
        Some(max) => format!("bin.job{}.rank{}_{}-{}.txt", job_id, rank, bin.min, max),
        None => format!("bin.job{}.rank{}_{}+.txt", job_id, rank, bin.min),
    }
}

/// Write one file per bin holding its size
///
/// # Returns
/// Paths of the written files, in bin order
pub fn save(
    dir: &Path,
    job_id: usize,
    rank: usize,
    bins: &[Bin],
) -> Result<Vec<PathBuf>, BinsError> {
    let mut paths = Vec::with_capacity(bins.len());
    for bin in bins {
        let path = dir.join(bin_file_name(job_id, rank, bin));
        fs::write(&path, format!("{}\n", bin.size))?;
        paths.push(path);
    }
    info!("Wrote {} bin files for rank {}", paths.len(), rank);
    Ok(paths)
}
