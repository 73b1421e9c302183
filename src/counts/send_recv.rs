//! Statistics gathered across all calls of one communicator.

use super::loader::CallsData;
use crate::utils::error::CountsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Totals and per-call distributions for the send and recv sides
///
/// Totals are summed over calls; every `BTreeMap` counts how many calls
/// share a given value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRecvStats {
    pub msg_size_threshold: Option<i64>,
    pub total_num_calls: usize,

    pub send_small_msgs: usize,
    pub send_small_not_zero_msgs: usize,
    pub send_large_msgs: usize,
    pub recv_small_msgs: usize,
    pub recv_small_not_zero_msgs: usize,
    pub recv_large_msgs: usize,

    pub total_send_zero_counts: usize,
    pub total_send_non_zero_counts: usize,
    pub total_recv_zero_counts: usize,
    pub total_recv_non_zero_counts: usize,

    pub comm_sizes: BTreeMap<usize, usize>,
    pub datatypes_send: BTreeMap<i64, usize>,
    pub datatypes_recv: BTreeMap<i64, usize>,
    pub send_mins: BTreeMap<i64, usize>,
    pub recv_mins: BTreeMap<i64, usize>,
    pub send_maxs: BTreeMap<i64, usize>,
    pub recv_maxs: BTreeMap<i64, usize>,
    pub send_not_zero_mins: BTreeMap<i64, usize>,
    pub recv_not_zero_mins: BTreeMap<i64, usize>,

    /// Zero-count total → calls
    pub call_send_sparsity: BTreeMap<usize, usize>,
    pub call_recv_sparsity: BTreeMap<usize, usize>,

    pub send_not_zero_counts: BTreeMap<usize, usize>,
    pub recv_not_zero_counts: BTreeMap<usize, usize>,
    pub send_sums: BTreeMap<i64, usize>,
    pub recv_sums: BTreeMap<i64, usize>,
}

fn bump<K: Ord>(map: &mut BTreeMap<K, usize>, key: K) {
    *map.entry(key).or_insert(0) += 1;
}

/// Gather send/recv statistics over every call of a communicator
///
/// **Public** - consumed by the stats report and the JSON summary
///
/// # Errors
/// * `CountsError::Fatal` - calls were analyzed with different size
///   thresholds
pub fn gather_stats(
    calls: &CallsData,
    size_threshold: Option<i64>,
) -> Result<SendRecvStats, CountsError> {
    let mut cs = SendRecvStats {
        msg_size_threshold: size_threshold,
        total_num_calls: calls.len(),
        ..Default::default()
    };

    for (call, data) in calls.iter() {
        if data.msg_size_threshold != size_threshold {
            return Err(CountsError::Fatal(format!(
                "inconsistent data, call {} uses message size threshold {:?} instead of {:?}",
                call, data.msg_size_threshold, size_threshold
            )));
        }

        let send = &data.send.statistics;
        let recv = &data.recv.statistics;

        cs.send_small_msgs += send.small_msgs;
        cs.send_small_not_zero_msgs += send.small_not_zero_msgs;
        cs.send_large_msgs += send.large_msgs;
        cs.recv_small_msgs += recv.small_msgs;
        cs.recv_small_not_zero_msgs += recv.small_not_zero_msgs;
        cs.recv_large_msgs += recv.large_msgs;

        cs.total_send_zero_counts += send.total_zero_counts;
        cs.total_send_non_zero_counts += send.total_non_zero_counts;
        cs.total_recv_zero_counts += recv.total_zero_counts;
        cs.total_recv_non_zero_counts += recv.total_non_zero_counts;

        bump(&mut cs.comm_sizes, data.comm_size);
        bump(&mut cs.datatypes_send, data.send.header.datatype_size);
        bump(&mut cs.datatypes_recv, data.recv.header.datatype_size);
        bump(&mut cs.send_mins, send.min);
        bump(&mut cs.recv_mins, recv.min);
        bump(&mut cs.send_maxs, send.max);
        bump(&mut cs.recv_maxs, recv.max);
        bump(&mut cs.send_not_zero_mins, send.min_without_zero);
        bump(&mut cs.recv_not_zero_mins, recv.min_without_zero);
        bump(&mut cs.call_send_sparsity, send.total_zero_counts);
        bump(&mut cs.call_recv_sparsity, recv.total_zero_counts);
        bump(&mut cs.send_not_zero_counts, send.total_non_zero_counts);
        bump(&mut cs.recv_not_zero_counts, recv.total_non_zero_counts);
        bump(&mut cs.send_sums, send.sum);
        bump(&mut cs.recv_sums, recv.sum);
    }

    Ok(cs)
}
