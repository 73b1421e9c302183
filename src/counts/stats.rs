//! Per-call statistics over decoded count records.

use crate::codec::CountRecord;
use crate::utils::error::CountsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rank → counts in peer order
pub type RankCounts = BTreeMap<usize, Vec<i64>>;

/// Aggregate statistics of one side (send or recv) of a call
///
/// Counts are element counts; bytes are only computed when classifying
/// small vs large messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub sum: i64,

    /// Smallest count, -1 until a count is seen
    pub min: i64,

    /// Largest count, -1 until a count is seen
    pub max: i64,

    /// Smallest non-zero count, -1 until one is seen
    pub min_without_zero: i64,

    pub small_msgs: usize,
    pub small_not_zero_msgs: usize,
    pub large_msgs: usize,

    pub total_zero_counts: usize,
    pub total_non_zero_counts: usize,

    /// Number of communicating peers → number of ranks
    pub patterns: BTreeMap<usize, usize>,

    /// Number of zero-count peers → number of ranks
    pub zeros_per_rank: BTreeMap<usize, usize>,

    /// Number of non-zero-count peers → number of ranks
    pub non_zeros_per_rank: BTreeMap<usize, usize>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            sum: 0,
            min: -1,
            max: -1,
            min_without_zero: -1,
            small_msgs: 0,
            small_not_zero_msgs: 0,
            large_msgs: 0,
            total_zero_counts: 0,
            total_non_zero_counts: 0,
            patterns: BTreeMap::new(),
            zeros_per_rank: BTreeMap::new(),
            non_zeros_per_rank: BTreeMap::new(),
        }
    }
}

impl Statistics {
    fn observe(&mut self, count: i64) {
        self.sum += count;
        if self.min == -1 || count < self.min {
            self.min = count;
        }
        if count > self.max {
            self.max = count;
        }
        if count > 0 && (self.min_without_zero == -1 || count < self.min_without_zero) {
            self.min_without_zero = count;
        }
    }
}

/// Compute the statistics of one side of a call
///
/// **Public** - main entry point of the statistics engine
///
/// # Arguments
/// * `records` - Raw `Rank(s) ...` lines of one block
/// * `size_threshold` - Byte size separating small from large messages,
///   `None` to skip the classification
/// * `datatype_size` - Element size in bytes
///
/// # Returns
/// The statistics and the per-rank count vectors
///
/// # Errors
/// * `CountsError::InvalidDatatypeSize` - `datatype_size` is not positive
/// * `CountsError::Codec` - a record or its rank list cannot be decoded
pub fn analyze_counts(
    records: &[String],
    size_threshold: Option<i64>,
    datatype_size: i64,
) -> Result<(Statistics, RankCounts), CountsError> {
    if datatype_size <= 0 {
        return Err(CountsError::InvalidDatatypeSize(datatype_size));
    }

    let mut stats = Statistics::default();
    let mut data = RankCounts::new();

    for line in records {
        let record = CountRecord::parse(line)?;
        let ranks = record.rank_list()?;
        let n_ranks = ranks.len();

        let mut zeros = 0;
        let mut non_zeros = 0;

        for &count in &record.counts {
            stats.observe(count);

            if count == 0 {
                zeros += 1;
                stats.total_zero_counts += n_ranks;
            } else {
                non_zeros += 1;
                stats.total_non_zero_counts += n_ranks;
            }

            if let Some(threshold) = size_threshold {
                if count * datatype_size <= threshold {
                    stats.small_msgs += n_ranks;
                    if count > 0 {
                        stats.small_not_zero_msgs += n_ranks;
                    }
                } else {
                    stats.large_msgs += n_ranks;
                }
            }
        }

        for &rank in &ranks {
            data.entry(rank)
                .or_default()
                .extend_from_slice(&record.counts);
        }

        if non_zeros > 0 {
            *stats.patterns.entry(non_zeros).or_insert(0) += n_ranks;
        }
        if zeros > 0 {
            *stats.zeros_per_rank.entry(zeros).or_insert(0) += n_ranks;
        }
        *stats.non_zeros_per_rank.entry(non_zeros).or_insert(0) += n_ranks;
    }

    Ok((stats, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn records(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_basic_statistics() {
        let records = records(&["Rank(s) 0-1: 0 10 300", "Rank(s) 2: 5 5 0"]);
        let (stats, data) = analyze_counts(&records, Some(200), 1).unwrap();

        assert_eq!(stats.sum, 320);
        assert_eq!(stats.min, 0);
        assert_eq!(stats.max, 300);
        assert_eq!(stats.min_without_zero, 5);
        assert_eq!(stats.total_zero_counts, 3);
        assert_eq!(stats.total_non_zero_counts, 6);
        // 0 and 10 for ranks 0-1, then 5, 5, 0 for rank 2
        assert_eq!(stats.small_msgs, 7);
        assert_eq!(stats.small_not_zero_msgs, 4);
        assert_eq!(stats.large_msgs, 2);

        assert_eq!(stats.patterns, BTreeMap::from([(2, 3)]));
        assert_eq!(stats.zeros_per_rank, BTreeMap::from([(1, 3)]));
        assert_eq!(stats.non_zeros_per_rank, BTreeMap::from([(2, 3)]));

        assert_eq!(data[&0], vec![0, 10, 300]);
        assert_eq!(data[&2], vec![5, 5, 0]);
    }

    #[test]
    fn test_datatype_size_scales_threshold() {
        let records = records(&["Rank(s) 0: 30 60"]);
        let (stats, _) = analyze_counts(&records, Some(200), 4).unwrap();
        assert_eq!(stats.small_msgs, 1);
        assert_eq!(stats.large_msgs, 1);
        // Sum stays in elements
        assert_eq!(stats.sum, 90);
    }

    #[test]
    fn test_disabled_threshold_skips_classification() {
        let records = records(&["Rank(s) 0: 1 2"]);
        let (stats, _) = analyze_counts(&records, None, 1).unwrap();
        assert_eq!(stats.small_msgs + stats.large_msgs, 0);
    }

    #[test]
    fn test_all_zero_record() {
        let records = records(&["Rank(s) 0-3: 0 0 0 0"]);
        let (stats, _) = analyze_counts(&records, Some(200), 8).unwrap();
        assert!(stats.patterns.is_empty());
        assert_eq!(stats.min_without_zero, -1);
        assert_eq!(stats.non_zeros_per_rank, BTreeMap::from([(0, 4)]));
        assert_eq!(stats.total_non_zero_counts, 0);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let records = records(&["Rank(s) 0-2: 1 0 4", "Rank(s) 3: 9 9 9"]);
        let first = analyze_counts(&records, Some(16), 2).unwrap();
        let second = analyze_counts(&records, Some(16), 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_bad_input() {
        let records = records(&["Rank(s) 0: 1 two"]);
        assert!(analyze_counts(&records, None, 1).is_err());
        assert!(matches!(
            analyze_counts(&[], None, 0),
            Err(CountsError::InvalidDatatypeSize(0))
        ));
    }
}
