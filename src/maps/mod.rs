//! Heat maps: bytes sent and received per rank.
//!
//! Ranks are reported as communicator ranks; without host/location data a
//! communicator rank is taken to be the world rank.

use crate::counts::{CallData, CallsData, RankCounts};
use crate::utils::error::MapsError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Rank → bytes
pub type RankMap = BTreeMap<usize, i64>;

/// Send and recv volumes of one call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallMaps {
    pub send: RankMap,
    pub recv: RankMap,
}

/// All heat maps of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatMaps {
    /// Lead rank → call → per-call maps
    pub per_call: BTreeMap<usize, BTreeMap<usize, CallMaps>>,

    /// Volumes summed over every call of every communicator
    pub global_send: RankMap,
    pub global_recv: RankMap,

    /// Rank → number of calls the rank took part in
    pub rank_num_calls: BTreeMap<usize, usize>,
}

fn volumes(counts: &RankCounts, datatype_size: i64) -> RankMap {
    counts
        .iter()
        .map(|(&rank, counts)| (rank, counts.iter().sum::<i64>() * datatype_size))
        .collect()
}

/// Bytes per rank for both sides of a call
pub fn call_maps(data: &CallData) -> CallMaps {
    CallMaps {
        send: volumes(&data.send.counts, data.send.header.datatype_size),
        recv: volumes(&data.recv.counts, data.recv.header.datatype_size),
    }
}

/// Write `Rank <r>: <bytes> bytes` lines, ascending by rank
pub fn write_rank_map<W: Write>(w: &mut W, map: &RankMap) -> io::Result<()> {
    for (rank, bytes) in map {
        writeln!(w, "Rank {}: {} bytes", rank, bytes)?;
    }
    Ok(())
}

fn save_rank_map(path: &Path, map: &RankMap) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_rank_map(&mut w, map)?;
    w.flush()
}

pub fn call_map_paths(dir: &Path, lead_rank: usize, call: usize) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("heat-map.rank{}-send.call{}.txt", lead_rank, call)),
        dir.join(format!("heat-map.rank{}-recv.call{}.txt", lead_rank, call)),
    )
}

impl HeatMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build, save and accumulate the maps of every call of a communicator
    ///
    /// **Public** - step 3, called once per lead rank
    ///
    /// # Errors
    /// * `MapsError::Io` - a map file cannot be written
    pub fn add_communicator(
        &mut self,
        dir: &Path,
        lead_rank: usize,
        calls: &CallsData,
    ) -> Result<(), MapsError> {
        let mut per_call = BTreeMap::new();

        for (call, data) in calls.iter() {
            let maps = call_maps(data);
            let (send_path, recv_path) = call_map_paths(dir, lead_rank, call);
            save_rank_map(&send_path, &maps.send)?;
            save_rank_map(&recv_path, &maps.recv)?;

            for (&rank, &bytes) in &maps.send {
                *self.global_send.entry(rank).or_insert(0) += bytes;
                *self.rank_num_calls.entry(rank).or_insert(0) += 1;
            }
            for (&rank, &bytes) in &maps.recv {
                *self.global_recv.entry(rank).or_insert(0) += bytes;
            }

            debug!("Heat maps of call {} saved for rank {}", call, lead_rank);
            per_call.insert(call, maps);
        }

        info!("Created {} heat maps for lead rank {}", per_call.len() * 2, lead_rank);
        self.per_call.insert(lead_rank, per_call);
        Ok(())
    }

    /// Write `heat-map-send.txt` and `heat-map-recv.txt`
    pub fn save_global(&self, dir: &Path) -> Result<[PathBuf; 2], MapsError> {
        let paths = [dir.join("heat-map-send.txt"), dir.join("heat-map-recv.txt")];
        save_rank_map(&paths[0], &self.global_send)?;
        save_rank_map(&paths[1], &self.global_recv)?;
        Ok(paths)
    }

    /// Maps of one call of one communicator
    pub fn call(&self, lead_rank: usize, call: usize) -> Option<&CallMaps> {
        self.per_call.get(&lead_rank)?.get(&call)
    }
}

/// Global volumes divided by the total number of calls
pub fn average_map(global: &RankMap, total_num_calls: usize) -> BTreeMap<usize, f64> {
    if total_num_calls == 0 {
        return BTreeMap::new();
    }
    global
        .iter()
        .map(|(&rank, &bytes)| (rank, bytes as f64 / total_num_calls as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counts::load_calls_data;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    const COUNTS: &str = "# Raw counters\n\n\
        Number of ranks: 2\n\
        Datatype size: 4\n\
        Alltoallv calls 0-1\n\
        Count: 2 calls - 0-1\n\n\n\
        BEGINNING DATA\n\
        Rank(s) 0: 1 2 \n\
        Rank(s) 1: 0 3 \n\
        END DATA\n";

    #[test]
    fn test_maps_per_call_and_global() {
        let dir = tempdir().unwrap();
        let send = dir.path().join("send.txt");
        let recv = dir.path().join("recv.txt");
        fs::write(&send, COUNTS).unwrap();
        fs::write(&recv, COUNTS).unwrap();
        let calls = load_calls_data(&send, &recv, None).unwrap();

        let mut maps = HeatMaps::new();
        maps.add_communicator(dir.path(), 0, &calls).unwrap();

        let call = maps.call(0, 1).unwrap();
        assert_eq!(call.send, RankMap::from([(0, 12), (1, 12)]));
        assert_eq!(maps.global_send, RankMap::from([(0, 24), (1, 24)]));
        assert_eq!(maps.rank_num_calls, BTreeMap::from([(0, 2), (1, 2)]));

        let (send_map, _) = call_map_paths(dir.path(), 0, 1);
        assert_eq!(
            fs::read_to_string(send_map).unwrap(),
            "Rank 0: 12 bytes\nRank 1: 12 bytes\n"
        );

        let [global_send, _] = maps.save_global(dir.path()).unwrap();
        assert!(fs::read_to_string(global_send).unwrap().starts_with("Rank 0: 24 bytes"));
    }

    #[test]
    fn test_average_map() {
        let global = RankMap::from([(0, 30), (1, 15)]);
        assert_eq!(
            average_map(&global, 3),
            BTreeMap::from([(0, 10.0), (1, 5.0)])
        );
        assert!(average_map(&global, 0).is_empty());
    }
}
