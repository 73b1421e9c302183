//! Writer for the compact counter format.
//!
//! Produces the same bytes as the profiler, so files written here can be
//! fed back to [`CountReader`](super::CountReader).

use super::notation::compress_int_array;
use super::reader::{CountHeader, CountRecord};
use crate::utils::config::{
    BEGIN_DATA_MARKER, CALL_RANGE_PREFIX, COUNT_PREFIX, DATATYPE_SIZE_PREFIX, END_DATA_MARKER,
    HEADER_MARKER, NUM_RANKS_PREFIX, RANK_LIST_PREFIX,
};
use std::io::{self, Write};

/// Write one header + records block
///
/// **Public** - used to produce counter files and test fixtures
///
/// # Arguments
/// * `writer` - Destination
/// * `header` - Block metadata; the call range is derived from `call_ids`
/// * `records` - Count records in output order
pub fn write_block<W: Write>(
    writer: &mut W,
    header: &CountHeader,
    records: &[CountRecord],
) -> io::Result<()> {
    let first = header.call_ids.first().copied().unwrap_or(0);
    let last = header.call_ids.last().copied().unwrap_or(0);

    write!(writer, "{}\n\n", HEADER_MARKER)?;
    writeln!(writer, "{}{}", NUM_RANKS_PREFIX, header.num_ranks)?;
    writeln!(writer, "{}{}", DATATYPE_SIZE_PREFIX, header.datatype_size)?;
    writeln!(writer, "{}{}-{}", CALL_RANGE_PREFIX, first, last)?;
    writeln!(
        writer,
        "{}{} calls - {}",
        COUNT_PREFIX,
        header.call_ids.len(),
        compress_int_array(&header.call_ids)
    )?;
    write!(writer, "\n\n{}\n", BEGIN_DATA_MARKER)?;

    for record in records {
        write!(writer, "{}{}: ", RANK_LIST_PREFIX, record.ranks)?;
        for count in &record.counts {
            write!(writer, "{} ", count)?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "{}", END_DATA_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CountReader;
    use std::io::Cursor;

    #[test]
    fn test_written_block_reads_back() {
        let header = CountHeader {
            total_num_calls: 3,
            call_ids: vec![0, 1, 2],
            num_ranks: 2,
            datatype_size: 4,
        };
        let records = vec![CountRecord {
            ranks: "0-1".to_string(),
            counts: vec![0, 7],
        }];

        let mut buf = Vec::new();
        write_block(&mut buf, &header, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Count: 3 calls - 0-2\n\n\nBEGINNING DATA\n"));
        assert!(text.contains("Rank(s) 0-1: 0 7 \n"));

        let block = CountReader::new(Cursor::new(text)).next_block().unwrap().unwrap();
        assert_eq!(block.header, header);
        assert_eq!(block.records, vec!["Rank(s) 0-1: 0 7"]);
    }
}
