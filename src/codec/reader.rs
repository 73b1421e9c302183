//! Streaming reader for compact counter files.
//!
//! A counter file is a sequence of blocks:
//!
//! ```text
//! # Raw counters
//!
//! Number of ranks: 4
//! Datatype size: 8
//! Alltoallv calls 0-2
//! Count: 3 calls - 0-2
//!
//!
//! BEGINNING DATA
//! Rank(s) 0-3: 0 1 1 1
//! END DATA
//! ```
//!
//! Parsing is driven by an explicit [`ParserState`] machine with a single
//! transition function. The reader only moves forward.

use crate::codec::notation::{count_elements, decode_compressed_list};
use crate::utils::config::{
    BEGIN_DATA_MARKER, CALL_RANGE_PREFIX, COUNT_CALLS_SEPARATOR, COUNT_PREFIX,
    DATATYPE_SIZE_PREFIX, END_DATA_MARKER, HEADER_MARKER, NUM_RANKS_PREFIX, RANK_LIST_PREFIX,
};
use crate::utils::error::CodecError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// Metadata preceding the count records of one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountHeader {
    /// Number of calls in the `Alltoallv calls start-end` range
    pub total_num_calls: usize,

    /// Calls whose counts are described by this block
    pub call_ids: Vec<usize>,

    /// Communicator size
    pub num_ranks: usize,

    /// Element size in bytes
    pub datatype_size: i64,
}

/// One `Rank(s) <list>: <counts>` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountRecord {
    /// Compressed list of ranks sharing the count vector
    pub ranks: String,

    /// Counts in peer-rank order
    pub counts: Vec<i64>,
}

impl CountRecord {
    /// Parse a raw record line
    ///
    /// # Errors
    /// * `CodecError::Format` - missing prefix/separator or non-numeric count
    pub fn parse(line: &str) -> Result<Self, CodecError> {
        let (ranks, counts) = line
            .trim_end()
            .strip_prefix(RANK_LIST_PREFIX)
            .and_then(|rest| rest.split_once(':'))
            .ok_or_else(|| CodecError::Format(format!("not a count record: `{}`", line)))?;

        let counts = counts
            .split_whitespace()
            .map(|token| {
                token.parse::<i64>().map_err(|_| {
                    CodecError::Format(format!("invalid count `{}` in `{}`", token, line))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            ranks: ranks.trim().to_string(),
            counts,
        })
    }

    /// Ranks represented by this record
    pub fn rank_list(&self) -> Result<Vec<usize>, CodecError> {
        decode_compressed_list(&self.ranks)
    }

    /// Number of ranks represented by this record
    pub fn num_ranks(&self) -> Result<usize, CodecError> {
        count_elements(&self.ranks)
    }
}

/// A header together with its raw record lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountBlock {
    pub header: CountHeader,
    pub records: Vec<String>,
}

/// Where the reader currently is within a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Skipping blank lines until the header marker
    AwaitingHeader,
    /// Collecting metadata lines
    InHeader,
    /// Collecting count records
    InData,
    /// End-of-data sentinel seen
    Done,
}

/// Header fields collected so far
#[derive(Debug, Default)]
struct HeaderFields {
    num_ranks: Option<usize>,
    datatype_size: Option<i64>,
    call_range: Option<(usize, usize)>,
    calls: Option<(usize, Vec<usize>)>,
}

impl HeaderFields {
    fn build(&mut self) -> Result<CountHeader, CodecError> {
        let fields = std::mem::take(self);

        let num_ranks = fields
            .num_ranks
            .ok_or_else(|| CodecError::Format("header without rank count".to_string()))?;
        let (announced, call_ids) = fields
            .calls
            .ok_or_else(|| CodecError::Format("header without call list".to_string()))?;

        if announced != call_ids.len() {
            warn!(
                "Header announces {} calls but lists {}",
                announced,
                call_ids.len()
            );
        }

        let total_num_calls = match fields.call_range {
            Some((start, end)) => end - start + 1,
            None => call_ids.len(),
        };

        Ok(CountHeader {
            total_num_calls,
            call_ids,
            num_ranks,
            datatype_size: fields.datatype_size.unwrap_or(0),
        })
    }
}

impl ParserState {
    /// Consume one line and return the next state plus any record produced
    ///
    /// **Private** - the only place where state changes
    fn next(
        self,
        line: &str,
        fields: &mut HeaderFields,
    ) -> Result<(ParserState, Option<String>), CodecError> {
        match self {
            ParserState::AwaitingHeader | ParserState::Done => {
                let line = line.trim();
                if line.is_empty() {
                    Ok((ParserState::AwaitingHeader, None))
                } else if line == HEADER_MARKER {
                    Ok((ParserState::InHeader, None))
                } else {
                    Err(CodecError::Format(format!(
                        "expected `{}`, found `{}`",
                        HEADER_MARKER, line
                    )))
                }
            }
            ParserState::InHeader => {
                let line = line.trim_end();
                if let Some(value) = line.strip_prefix(NUM_RANKS_PREFIX) {
                    fields.num_ranks = Some(parse_number(value, line)?);
                } else if let Some(value) = line.strip_prefix(DATATYPE_SIZE_PREFIX) {
                    fields.datatype_size = Some(parse_number(value, line)?);
                } else if let Some(value) = line.strip_prefix(CALL_RANGE_PREFIX) {
                    fields.call_range = Some(parse_call_range(value, line)?);
                } else if let Some(value) = line.strip_prefix(COUNT_PREFIX) {
                    fields.calls = Some(parse_call_list(value, line)?);
                } else if line.starts_with(BEGIN_DATA_MARKER) {
                    return Ok((ParserState::InData, None));
                }
                // Unknown metadata lines are ignored
                Ok((ParserState::InHeader, None))
            }
            ParserState::InData => {
                let line = line.trim_end_matches(['\n', '\r', ' ']);
                if line.contains(END_DATA_MARKER) {
                    Ok((ParserState::Done, None))
                } else if line.trim().is_empty() {
                    Ok((ParserState::InData, None))
                } else {
                    Ok((ParserState::InData, Some(line.to_string())))
                }
            }
        }
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, line: &str) -> Result<T, CodecError> {
    value
        .trim()
        .parse()
        .map_err(|_| CodecError::Format(format!("invalid number in `{}`", line)))
}

/// `start-end` after the call-range prefix
fn parse_call_range(value: &str, line: &str) -> Result<(usize, usize), CodecError> {
    let (start, end) = value
        .trim()
        .split_once('-')
        .ok_or_else(|| CodecError::Format(format!("invalid call range in `{}`", line)))?;
    let start: usize = parse_number(start, line)?;
    let end: usize = parse_number(end, line)?;
    if start > end {
        return Err(CodecError::Format(format!(
            "call range runs backwards in `{}`",
            line
        )));
    }
    Ok((start, end))
}

/// `N calls - <list>` with an optional ` (...)` annotation
fn parse_call_list(value: &str, line: &str) -> Result<(usize, Vec<usize>), CodecError> {
    let (count, list) = value
        .split_once(COUNT_CALLS_SEPARATOR)
        .ok_or_else(|| CodecError::Format(format!("invalid count line `{}`", line)))?;
    let list = match list.find(" (") {
        Some(idx) => &list[..idx],
        None => list,
    };
    Ok((parse_number(count, line)?, decode_compressed_list(list)?))
}

/// Forward-only reader over the blocks of a counter file
pub struct CountReader<R> {
    reader: R,
    state: ParserState,
    fields: HeaderFields,
    line_no: usize,
}

impl<R: BufRead> CountReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: ParserState::AwaitingHeader,
            fields: HeaderFields::default(),
            line_no: 0,
        }
    }

    /// Current parser state
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Read the next header, up to and including the begin-data sentinel
    ///
    /// **Public** - first half of reading one block
    ///
    /// # Returns
    /// `Ok(None)` when the stream ends before a complete header
    ///
    /// # Errors
    /// * `CodecError::Format` - the first non-blank line is not the header
    ///   marker, or a recognized metadata line is malformed
    /// * `CodecError::Io` - underlying read failure
    pub fn read_header(&mut self) -> Result<Option<CountHeader>, CodecError> {
        if self.state == ParserState::InData {
            return Err(CodecError::Format(
                "records of the previous block were not consumed".to_string(),
            ));
        }
        self.state = ParserState::AwaitingHeader;
        self.fields = HeaderFields::default();

        while let Some(line) = self.next_line()? {
            let (state, _) = self.state.next(&line, &mut self.fields)?;
            self.state = state;
            if state == ParserState::InData {
                return self.fields.build().map(Some);
            }
        }

        if self.state == ParserState::InHeader {
            debug!("Stream ended inside a header at line {}", self.line_no);
        }
        Ok(None)
    }

    /// Read the count records following a header
    ///
    /// **Public** - second half of reading one block
    ///
    /// # Errors
    /// * `CodecError::Format` - no header was read, or the stream ends
    ///   before the end-data sentinel
    pub fn read_records(&mut self) -> Result<Vec<String>, CodecError> {
        if self.state != ParserState::InData {
            return Err(CodecError::Format(format!(
                "records requested while in state {:?}",
                self.state
            )));
        }

        let mut records = Vec::new();
        while let Some(line) = self.next_line()? {
            let (state, record) = self.state.next(&line, &mut self.fields)?;
            self.state = state;
            records.extend(record);
            if state == ParserState::Done {
                return Ok(records);
            }
        }

        Err(CodecError::Format(format!(
            "missing `{}` before end of stream (line {})",
            END_DATA_MARKER, self.line_no
        )))
    }

    /// Read a whole block, `Ok(None)` at end of stream
    pub fn next_block(&mut self) -> Result<Option<CountBlock>, CodecError> {
        match self.read_header()? {
            Some(header) => {
                let records = self.read_records()?;
                Ok(Some(CountBlock { header, records }))
            }
            None => Ok(None),
        }
    }

    fn next_line(&mut self) -> Result<Option<String>, CodecError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BLOCK: &str = "# Raw counters\n\n\
        Number of ranks: 4\n\
        Datatype size: 8\n\
        Alltoallv calls 0-2\n\
        Count: 2 calls - 0,2\n\n\n\
        BEGINNING DATA\n\
        Rank(s) 0-1: 0 1 1 1 \n\
        Rank(s) 2-3: 1 1 1 0 \n\
        END DATA\n";

    #[test]
    fn test_reads_one_block() {
        let mut reader = CountReader::new(Cursor::new(BLOCK));

        let header = reader.read_header().unwrap().unwrap();
        assert_eq!(header.num_ranks, 4);
        assert_eq!(header.datatype_size, 8);
        assert_eq!(header.total_num_calls, 3);
        assert_eq!(header.call_ids, vec![0, 2]);
        assert_eq!(reader.state(), ParserState::InData);

        let records = reader.read_records().unwrap();
        assert_eq!(records, vec!["Rank(s) 0-1: 0 1 1 1", "Rank(s) 2-3: 1 1 1 0"]);
        assert_eq!(reader.state(), ParserState::Done);

        assert!(reader.read_header().unwrap().is_none());
    }

    #[test]
    fn test_reads_consecutive_blocks() {
        let input = format!("{}{}", BLOCK, BLOCK.replace("0,2", "1"));
        let mut reader = CountReader::new(Cursor::new(input));

        let first = reader.next_block().unwrap().unwrap();
        let second = reader.next_block().unwrap().unwrap();
        assert_eq!(first.header.call_ids, vec![0, 2]);
        assert_eq!(second.header.call_ids, vec![1]);
        assert!(reader.next_block().unwrap().is_none());
    }

    #[test]
    fn test_garbage_before_marker_is_format_error() {
        let mut reader = CountReader::new(Cursor::new("hello\n# Raw counters\n"));
        assert!(matches!(reader.read_header(), Err(CodecError::Format(_))));
    }

    #[test]
    fn test_unknown_metadata_is_ignored() {
        let input = BLOCK.replace("Datatype size: 8\n", "Datatype size: 8\nCompiler: gcc\n");
        let mut reader = CountReader::new(Cursor::new(input));
        assert_eq!(reader.read_header().unwrap().unwrap().datatype_size, 8);
    }

    #[test]
    fn test_truncated_header_is_eof() {
        let mut reader = CountReader::new(Cursor::new("\n# Raw counters\nNumber of ranks: 4\n"));
        assert!(reader.read_header().unwrap().is_none());
    }

    #[test]
    fn test_missing_end_marker_is_fatal() {
        let input = BLOCK.replace("END DATA\n", "");
        let mut reader = CountReader::new(Cursor::new(input));
        reader.read_header().unwrap();
        assert!(matches!(reader.read_records(), Err(CodecError::Format(_))));
    }

    #[test]
    fn test_count_line_annotation_is_ignored() {
        let input = BLOCK.replace("0,2\n", "0,2 (first and last)\n");
        let mut reader = CountReader::new(Cursor::new(input));
        assert_eq!(reader.read_header().unwrap().unwrap().call_ids, vec![0, 2]);
    }

    #[test]
    fn test_parse_record() {
        let record = CountRecord::parse("Rank(s) 0-2,5: 1 0 3").unwrap();
        assert_eq!(record.ranks, "0-2,5");
        assert_eq!(record.counts, vec![1, 0, 3]);
        assert_eq!(record.num_ranks().unwrap(), 4);
        assert!(CountRecord::parse("Rank(s) 0: 1 x").is_err());
        assert!(CountRecord::parse("0: 1").is_err());
    }
}
