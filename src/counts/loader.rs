//! Loading per-call data from a pair of send/recv counter files.
//!
//! The profiler folds calls with identical counts into one block, so a
//! single [`CallData`] is shared (via `Arc`) by every call ID that its
//! send and recv blocks list.

use super::stats::{analyze_counts, RankCounts, Statistics};
use crate::codec::{CountBlock, CountHeader, CountReader};
use crate::utils::error::{CodecError, CountsError};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One side (send or recv) of a block, with its statistics
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    /// File the block was read from
    pub file: PathBuf,
    pub header: CountHeader,
    pub raw_counts: Vec<String>,
    pub counts: RankCounts,
    pub statistics: Statistics,
}

impl Data {
    fn from_block(
        file: &Path,
        block: CountBlock,
        size_threshold: Option<i64>,
    ) -> Result<Self, CountsError> {
        let (statistics, counts) =
            analyze_counts(&block.records, size_threshold, block.header.datatype_size)?;
        Ok(Self {
            file: file.to_path_buf(),
            header: block.header,
            raw_counts: block.records,
            counts,
            statistics,
        })
    }
}

/// Everything known about one call
#[derive(Debug, Clone, PartialEq)]
pub struct CallData {
    pub comm_size: usize,
    pub msg_size_threshold: Option<i64>,
    pub send: Data,
    pub recv: Data,
}

/// Call ID → call data; several IDs may share one `CallData`
#[derive(Debug, Clone, Default)]
pub struct CallsData {
    calls: BTreeMap<usize, Arc<CallData>>,
}

impl CallsData {
    pub fn get(&self, call: usize) -> Option<&Arc<CallData>> {
        self.calls.get(&call)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Calls in ascending ID order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Arc<CallData>)> {
        self.calls.iter().map(|(id, data)| (*id, data))
    }

    pub fn call_ids(&self) -> Vec<usize> {
        self.calls.keys().copied().collect()
    }

    /// Each shared `CallData` once, in order of its first call
    pub fn distinct(&self) -> Vec<&Arc<CallData>> {
        let mut seen: Vec<&Arc<CallData>> = Vec::new();
        for data in self.calls.values() {
            if !seen.iter().any(|s| Arc::ptr_eq(s, data)) {
                seen.push(data);
            }
        }
        seen
    }
}

impl FromIterator<(usize, Arc<CallData>)> for CallsData {
    fn from_iter<I: IntoIterator<Item = (usize, Arc<CallData>)>>(iter: I) -> Self {
        Self {
            calls: iter.into_iter().collect(),
        }
    }
}

/// Read every block of a counter file
///
/// # Errors
/// * `CountsError::Io` - file cannot be opened or read
/// * `CountsError::Format` - malformed header or missing end sentinel
pub fn read_blocks(path: &Path) -> Result<Vec<CountBlock>, CountsError> {
    let file = File::open(path).map_err(|source| CountsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = CountReader::new(BufReader::new(file));

    let mut blocks = Vec::new();
    while let Some(block) = reader.next_block().map_err(|e| codec_error(path, e))? {
        blocks.push(block);
    }

    debug!("Read {} blocks from {}", blocks.len(), path.display());
    Ok(blocks)
}

/// Attach the file name to a codec error
///
/// **Private** - internal conversion
fn codec_error(path: &Path, err: CodecError) -> CountsError {
    match err {
        CodecError::Io(source) => CountsError::Io {
            path: path.display().to_string(),
            source,
        },
        other => CountsError::Format(format!("{}: {}", path.display(), other)),
    }
}

/// Load and analyze all calls described by a send/recv file pair
///
/// **Public** - main entry point of step 1 for one lead rank
///
/// # Arguments
/// * `send_path` - Send counters file
/// * `recv_path` - Recv counters file
/// * `size_threshold` - Small/large split in bytes, `None` to disable
///
/// # Returns
/// Call ID → shared call data
///
/// # Errors
/// * `CountsError::Fatal` - a call is missing on one side, listed twice,
///   or the two sides disagree on the communicator size
/// * any error of [`read_blocks`] or [`analyze_counts`]
pub fn load_calls_data(
    send_path: &Path,
    recv_path: &Path,
    size_threshold: Option<i64>,
) -> Result<CallsData, CountsError> {
    info!(
        "Loading counters from {} and {}",
        send_path.display(),
        recv_path.display()
    );

    let send_data = analyze_blocks(send_path, size_threshold)?;
    let recv_data = analyze_blocks(recv_path, size_threshold)?;

    let mut recv_index = BTreeMap::new();
    for (idx, data) in recv_data.iter().enumerate() {
        for &call in &data.header.call_ids {
            if recv_index.insert(call, idx).is_some() {
                return Err(CountsError::Fatal(format!(
                    "call {} listed twice in {}",
                    call,
                    recv_path.display()
                )));
            }
        }
    }

    let mut shared: HashMap<(usize, usize), Arc<CallData>> = HashMap::new();
    let mut calls = BTreeMap::new();

    for (send_idx, send) in send_data.iter().enumerate() {
        for &call in &send.header.call_ids {
            let recv_idx = *recv_index.get(&call).ok_or_else(|| {
                CountsError::Fatal(format!(
                    "call {} has send counts but no receive counts in {}",
                    call,
                    recv_path.display()
                ))
            })?;

            let data = match shared.get(&(send_idx, recv_idx)) {
                Some(data) => Arc::clone(data),
                None => {
                    let recv = &recv_data[recv_idx];
                    if send.header.num_ranks != recv.header.num_ranks {
                        return Err(CountsError::Fatal(format!(
                            "call {}: communicator size {} for send counts but {} for receive counts",
                            call, send.header.num_ranks, recv.header.num_ranks
                        )));
                    }
                    let data = Arc::new(CallData {
                        comm_size: send.header.num_ranks,
                        msg_size_threshold: size_threshold,
                        send: send.clone(),
                        recv: recv.clone(),
                    });
                    shared.insert((send_idx, recv_idx), Arc::clone(&data));
                    data
                }
            };

            if calls.insert(call, data).is_some() {
                return Err(CountsError::Fatal(format!(
                    "call {} listed twice in {}",
                    call,
                    send_path.display()
                )));
            }
        }
    }

    if calls.len() != recv_index.len() {
        return Err(CountsError::Fatal(format!(
            "{} describes {} calls but {} describes {}",
            send_path.display(),
            calls.len(),
            recv_path.display(),
            recv_index.len()
        )));
    }

    info!("Loaded {} calls ({} distinct count sets)", calls.len(), shared.len());
    Ok(CallsData { calls })
}

fn analyze_blocks(path: &Path, size_threshold: Option<i64>) -> Result<Vec<Data>, CountsError> {
    read_blocks(path)?
        .into_iter()
        .map(|block| Data::from_block(path, block, size_threshold))
        .collect()
}

/// Find the block describing one call in a counter file
///
/// **Public** - lookup used by the `call` command
///
/// # Errors
/// * `CountsError::NotFound` - the call is not in this file; callers
///   should keep searching other files
pub fn find_call(
    path: &Path,
    call: usize,
    size_threshold: Option<i64>,
) -> Result<Data, CountsError> {
    let block = read_blocks(path)?
        .into_iter()
        .find(|block| block.header.call_ids.contains(&call))
        .ok_or_else(|| CountsError::NotFound {
            call,
            file: path.display().to_string(),
        })?;
    Data::from_block(path, block, size_threshold)
}
