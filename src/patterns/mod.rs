//! Communication pattern classification.
//!
//! A call's pattern is the pair of distributions "number of peers →
//! number of ranks talking to that many peers", one for the send side and
//! one for the recv side. Calls with identical pairs share one
//! [`CallPattern`]. New patterns are also filed into the 1-to-N, N-to-N
//! and N-to-1 buckets based on the send distribution only; in an
//! alltoallv a 1-to-N send shape implies the N-to-1 recv shape.

pub mod multicomm;
pub mod writer;

use crate::counts::CallsData;
use crate::utils::config::{N_TO_N_BAND, PATTERN_RATIO};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use multicomm::{analyze_sub_comms, LeadRankPatterns};
pub use writer::{
    pattern_file_path, save_reports, stats_file_path, summary_file_path, write_patterns,
    write_stats_report, write_summary,
};

/// Number of peers → number of ranks
pub type Distribution = BTreeMap<usize, usize>;

/// A distinct communication shape and the calls that share it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPattern {
    pub send: Distribution,
    pub recv: Distribution,

    /// Number of calls with this shape
    pub count: usize,

    /// IDs of those calls, in insertion order
    pub calls: Vec<usize>,
}

/// Shape buckets a pattern can be filed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    OneToN,
    NToN,
    NToOne,
}

impl Classification {
    pub const ALL: [Classification; 3] = [
        Classification::OneToN,
        Classification::NToN,
        Classification::NToOne,
    ];
}

/// Side of a call a distribution describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Send,
    Recv,
}

/// All patterns of one communicator
///
/// The classified buckets reference entries of `all_patterns` by index,
/// so a shape is stored once however many buckets it lands in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternsCollection {
    pub all_patterns: Vec<CallPattern>,
    one_to_n: Vec<usize>,
    n_to_n: Vec<usize>,
    n_to_one: Vec<usize>,

    /// Calls that exchange no data at all, one entry per call
    pub empty: Vec<CallPattern>,
}

/// Buckets matched by a send distribution
///
/// **Public** - the three ratio rules, applied to every
/// `(num_peers, num_ranks)` entry
pub fn classify(send: &Distribution) -> Vec<Classification> {
    let mut matched = Vec::new();

    for (&num_peers, &num_ranks) in send {
        let peers = num_peers as f64;
        let ranks = num_ranks as f64;

        let class = if num_peers > num_ranks * PATTERN_RATIO {
            Some(Classification::OneToN)
        } else if peers * (1.0 - N_TO_N_BAND) <= ranks && ranks <= peers * (1.0 + N_TO_N_BAND) {
            Some(Classification::NToN)
        } else if num_peers * PATTERN_RATIO < num_ranks {
            Some(Classification::NToOne)
        } else {
            None
        };

        if let Some(class) = class {
            if !matched.contains(&class) {
                matched.push(class);
            }
        }
    }

    matched
}

impl PatternsCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the collection of every call of a communicator
    ///
    /// **Public** - step 1 entry point
    pub fn from_calls(calls: &CallsData) -> Self {
        let mut collection = Self::new();
        for (call, data) in calls.iter() {
            collection.add_pattern(
                call,
                &data.send.statistics.patterns,
                &data.recv.statistics.patterns,
            );
            if data.send.statistics.total_non_zero_counts == 0
                && data.recv.statistics.total_non_zero_counts == 0
            {
                collection.add_empty(call);
            }
        }
        collection
    }

    /// Record the shape of one call
    ///
    /// **Public** - merges into an existing pattern when both
    /// distributions are equal, otherwise creates and classifies a new one
    pub fn add_pattern(&mut self, call: usize, send: &Distribution, recv: &Distribution) {
        if let Some((idx, pattern)) = self
            .all_patterns
            .iter_mut()
            .enumerate()
            .find(|(_, p)| &p.send == send && &p.recv == recv)
        {
            debug!("Call {} - adding call to pattern {}", call, idx);
            pattern.count += 1;
            pattern.calls.push(call);
            return;
        }

        debug!("Call {} - adding new pattern", call);
        let idx = self.all_patterns.len();
        self.all_patterns.push(CallPattern {
            send: send.clone(),
            recv: recv.clone(),
            count: 1,
            calls: vec![call],
        });

        for class in classify(send) {
            self.bucket_indices_mut(class).push(idx);
        }
    }

    /// Record a call that exchanged no data
    pub fn add_empty(&mut self, call: usize) {
        self.empty.push(CallPattern {
            send: Distribution::new(),
            recv: Distribution::new(),
            count: 1,
            calls: vec![call],
        });
    }

    /// Patterns filed in a bucket, in insertion order
    pub fn bucket(&self, class: Classification) -> Vec<&CallPattern> {
        let indices = match class {
            Classification::OneToN => &self.one_to_n,
            Classification::NToN => &self.n_to_n,
            Classification::NToOne => &self.n_to_one,
        };
        indices
            .iter()
            .filter_map(|&idx| self.all_patterns.get(idx))
            .collect()
    }

    pub fn one_to_n(&self) -> Vec<&CallPattern> {
        self.bucket(Classification::OneToN)
    }

    pub fn n_to_n(&self) -> Vec<&CallPattern> {
        self.bucket(Classification::NToN)
    }

    pub fn n_to_one(&self) -> Vec<&CallPattern> {
        self.bucket(Classification::NToOne)
    }

    fn bucket_indices_mut(&mut self, class: Classification) -> &mut Vec<usize> {
        match class {
            Classification::OneToN => &mut self.one_to_n,
            Classification::NToN => &mut self.n_to_n,
            Classification::NToOne => &mut self.n_to_one,
        }
    }

    /// Whether any classified bucket is populated
    pub fn has_summary(&self) -> bool {
        !(self.one_to_n.is_empty() && self.n_to_n.is_empty() && self.n_to_one.is_empty())
    }

    /// Compare the shapes of two collections
    ///
    /// Every `(num_peers, num_ranks)` entry of our patterns must appear in
    /// some pattern of `other`. Differing call counts are only reported.
    pub fn same_patterns(&self, other: &PatternsCollection) -> bool {
        for side in [Side::Send, Side::Recv] {
            for pattern in &self.all_patterns {
                let dist = match side {
                    Side::Send => &pattern.send,
                    Side::Recv => &pattern.recv,
                };
                for (&num_peers, &num_ranks) in dist {
                    match pattern_is_in_list(num_peers, num_ranks, side, &other.all_patterns) {
                        None => return false,
                        Some(count) if count != pattern.count => {
                            warn!(
                                "{:?} counts differ: {} vs. {}",
                                side, pattern.count, count
                            );
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        true
    }
}

/// Count of the first pattern holding `num_peers → num_ranks`
///
/// **Private** - helper of `same_patterns`
fn pattern_is_in_list(
    num_peers: usize,
    num_ranks: usize,
    side: Side,
    patterns: &[CallPattern],
) -> Option<usize> {
    patterns
        .iter()
        .find(|p| {
            let dist = match side {
                Side::Send => &p.send,
                Side::Recv => &p.recv,
            };
            dist.get(&num_peers) == Some(&num_ranks)
        })
        .map(|p| p.count)
}
