//! Cross-communicator pattern comparison.
//!
//! When alltoallv runs on several sub-communicators, each lead rank gets
//! its own [`PatternsCollection`]. If they all show the same shapes, a
//! highlights report is written.

use super::writer::write_distributions;
use super::{Classification, PatternsCollection};
use crate::utils::config::MULTICOMM_HIGHLIGHTS_FILE_NAME;
use log::{debug, info};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Patterns of one communicator, identified by its lead rank
#[derive(Debug, Clone, Copy)]
pub struct LeadRankPatterns<'a> {
    pub lead_rank: usize,
    pub patterns: &'a PatternsCollection,
    pub total_num_calls: usize,
}

/// Whether every communicator shows the same patterns as the first one
///
/// **Public** - bucket sizes must match, then shapes are compared with
/// [`PatternsCollection::same_patterns`]
pub fn same_on_all(leads: &[LeadRankPatterns]) -> bool {
    let Some((reference, others)) = leads.split_first() else {
        return false;
    };
    let shape = |p: &PatternsCollection| {
        (
            p.all_patterns.len(),
            p.n_to_one().len(),
            p.n_to_n().len(),
            p.one_to_n().len(),
        )
    };

    others.iter().all(|lead| {
        if shape(lead.patterns) != shape(reference.patterns) {
            debug!("Lead rank {} has a different number of patterns", lead.lead_rank);
            return false;
        }
        reference.patterns.same_patterns(lead.patterns)
    })
}

/// Compare communicators and write the highlights report when they agree
///
/// **Public** - step 2 entry point
///
/// # Arguments
/// * `dir` - Output directory
/// * `leads` - One entry per lead rank, ascending
///
/// # Returns
/// Path of the report, `None` when there is nothing to highlight
pub fn analyze_sub_comms(dir: &Path, leads: &[LeadRankPatterns]) -> io::Result<Option<PathBuf>> {
    if leads.len() < 2 {
        debug!("Single communicator, no cross-communicator analysis");
        return Ok(None);
    }
    if !same_on_all(leads) {
        info!("Patterns differ between sub-communicators");
        return Ok(None);
    }

    info!("All patterns on all sub-communicators are similar");
    let path = dir.join(MULTICOMM_HIGHLIGHTS_FILE_NAME);
    let mut w = BufWriter::new(File::create(&path)?);
    write_highlights(&mut w, leads)?;
    w.flush()?;

    Ok(Some(path))
}

/// Write the highlights report
pub fn write_highlights<W: Write>(w: &mut W, leads: &[LeadRankPatterns]) -> io::Result<()> {
    write!(w, "Alltoallv on sub-communicators detected.\n\n# Patterns summary\n\n")?;

    let Some(reference) = leads.first() else {
        return Ok(());
    };

    for class in [
        Classification::NToN,
        Classification::OneToN,
        Classification::NToOne,
    ] {
        if reference.patterns.bucket(class).is_empty() {
            continue;
        }
        let title = match class {
            Classification::NToN => "## N to n patterns",
            Classification::OneToN => "## 1 to n patterns",
            Classification::NToOne => "## N to 1 patterns",
        };
        write!(w, "{}\n\n", title)?;

        write!(w, "\n### Pattern(s) description\n\n")?;
        for pattern in reference.patterns.bucket(class) {
            write_distributions(w, pattern)?;
        }

        write!(w, "\n\n### Sub-communicator(s) information\n\n")?;
        for lead in leads {
            writeln!(w, "-> Subcommunicator led by rank {}:", lead.lead_rank)?;
            for (num, pattern) in lead.patterns.bucket(class).into_iter().enumerate() {
                writeln!(
                    w,
                    "\tpattern #{}: {}/{} alltoallv calls",
                    num, pattern.count, lead.total_num_calls
                )?;
            }
        }
    }

    write!(w, "\n## All 0 counts pattern; no data exchanged\n\n")?;
    for lead in leads {
        if !lead.patterns.empty.is_empty() {
            writeln!(
                w,
                "-> Sub-communicator led by rank {}: {}/{} alltoallv calls",
                lead.lead_rank,
                lead.patterns.empty.len(),
                lead.total_num_calls
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::Distribution;
    use tempfile::tempdir;

    fn collection(peers: usize, ranks: usize) -> PatternsCollection {
        let mut c = PatternsCollection::new();
        let d: Distribution = [(peers, ranks)].into_iter().collect();
        c.add_pattern(0, &d, &d);
        c
    }

    #[test]
    fn test_identical_communicators_are_highlighted() {
        let dir = tempdir().unwrap();
        let a = collection(8, 8);
        let b = collection(8, 8);
        let leads = [
            LeadRankPatterns { lead_rank: 0, patterns: &a, total_num_calls: 1 },
            LeadRankPatterns { lead_rank: 8, patterns: &b, total_num_calls: 1 },
        ];

        let path = analyze_sub_comms(dir.path(), &leads).unwrap().unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("Alltoallv on sub-communicators detected."));
        assert!(text.contains("## N to n patterns"));
        assert!(
            text.contains("-> Subcommunicator led by rank 8:\n\tpattern #0: 1/1 alltoallv calls")
        );
    }

    #[test]
    fn test_different_communicators_are_not_highlighted() {
        let dir = tempdir().unwrap();
        let a = collection(8, 8);
        let b = collection(4, 8);
        let leads = [
            LeadRankPatterns { lead_rank: 0, patterns: &a, total_num_calls: 1 },
            LeadRankPatterns { lead_rank: 8, patterns: &b, total_num_calls: 1 },
        ];

        assert!(analyze_sub_comms(dir.path(), &leads).unwrap().is_none());
        assert!(!dir.path().join(MULTICOMM_HIGHLIGHTS_FILE_NAME).exists());
    }
}
