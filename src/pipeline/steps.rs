//! Bodies of the pipeline steps.

use super::{
    AverageResults, BinsResults, CountsResults, PipelineOptions, PlotResults, PlotStatus,
    SubCommsResults,
};
use crate::bins;
use crate::counts::{find_count_files, gather_stats, load_calls_data};
use crate::maps::{average_map, HeatMaps, RankMap};
use crate::patterns::{analyze_sub_comms, save_reports, LeadRankPatterns, PatternsCollection};
use crate::plot::{build_rows, render_averages, render_calls, times_by_rank, CallPlot, PlotRenderer};
use crate::timings::{self, TimingKind, Timings};
use crate::utils::error::PipelineError;
use log::{debug, info, warn};
use std::collections::BTreeMap;

pub(super) fn analyze_counts(opts: &PipelineOptions) -> Result<CountsResults, PipelineError> {
    let files = find_count_files(&opts.input_dir)?;
    info!(
        "Job {}: {} communicator(s) led by ranks {:?}",
        files.job_id,
        files.lead_ranks.len(),
        files.lead_ranks
    );

    let mut results = CountsResults {
        job_id: files.job_id,
        lead_ranks: files.lead_ranks.clone(),
        ..Default::default()
    };

    for &lead in &files.lead_ranks {
        let (send_path, recv_path) = files.paths(&opts.input_dir, lead);
        let calls = load_calls_data(&send_path, &recv_path, opts.size_threshold)?;
        let patterns = PatternsCollection::from_calls(&calls);
        let stats = gather_stats(&calls, opts.size_threshold)?;

        let reports = save_reports(&opts.output_dir, files.job_id, lead, &patterns, &stats)?;
        debug!(
            "Rank {}: {} calls, {} patterns",
            lead,
            calls.len(),
            patterns.all_patterns.len()
        );

        results.total_num_calls += calls.len();
        results.reports.extend(reports);
        results.calls.insert(lead, calls);
        results.stats.insert(lead, stats);
        results.patterns.insert(lead, patterns);
    }

    Ok(results)
}

pub(super) fn compare_sub_comms(
    opts: &PipelineOptions,
    counts: &CountsResults,
) -> Result<SubCommsResults, PipelineError> {
    let leads: Vec<LeadRankPatterns> = counts
        .patterns
        .iter()
        .map(|(&lead_rank, patterns)| LeadRankPatterns {
            lead_rank,
            patterns,
            total_num_calls: counts.calls.get(&lead_rank).map_or(0, |c| c.len()),
        })
        .collect();

    let highlights = analyze_sub_comms(&opts.output_dir, &leads)?;
    Ok(SubCommsResults { highlights })
}

pub(super) fn create_maps(
    opts: &PipelineOptions,
    counts: &CountsResults,
) -> Result<HeatMaps, PipelineError> {
    let mut maps = HeatMaps::new();
    for (&lead, calls) in &counts.calls {
        maps.add_communicator(&opts.output_dir, lead, calls)?;
    }
    maps.save_global(&opts.output_dir)?;
    Ok(maps)
}

pub(super) fn analyze_timings(
    opts: &PipelineOptions,
    counts: &CountsResults,
) -> Result<Timings, PipelineError> {
    let timings = timings::analyze_timings(&opts.input_dir)?;
    if timings.is_empty() {
        warn!("No timing files in {}", opts.input_dir.display());
    }

    for (comm, calls) in &timings.exec {
        let expected = counts.calls.get(&comm.lead_rank).map_or(0, |c| c.len());
        if calls.len() != expected {
            warn!(
                "Rank {}: {} timed calls but {} calls with counts",
                comm.lead_rank,
                calls.len(),
                expected
            );
        }
    }
    if !timings.outliers.is_empty() {
        info!("{} call(s) with outlier ranks", timings.outliers.len());
    }
    Ok(timings)
}

/// Per-rank time divided by the number of calls the rank took part in
fn per_call_average(
    totals: &BTreeMap<usize, f64>,
    rank_num_calls: &BTreeMap<usize, usize>,
) -> BTreeMap<usize, f64> {
    totals
        .iter()
        .filter_map(|(&rank, &total)| match rank_num_calls.get(&rank) {
            Some(&n) if n > 0 => Some((rank, total / n as f64)),
            _ => None,
        })
        .collect()
}

pub(super) fn compute_averages(
    counts: &CountsResults,
    maps: &HeatMaps,
    timings: &Timings,
) -> AverageResults {
    AverageResults {
        send: average_map(&maps.global_send, counts.total_num_calls),
        recv: average_map(&maps.global_recv, counts.total_num_calls),
        exec: per_call_average(&timings.total_exec, &maps.rank_num_calls),
        late: per_call_average(&timings.total_late, &maps.rank_num_calls),
    }
}

fn as_f64(map: &RankMap) -> BTreeMap<usize, f64> {
    map.iter().map(|(&rank, &bytes)| (rank, bytes as f64)).collect()
}

pub(super) fn generate_plots(
    opts: &PipelineOptions,
    renderer: &dyn PlotRenderer,
    maps: &HeatMaps,
    timings: &Timings,
    averages: &AverageResults,
) -> Result<PlotResults, PipelineError> {
    if !renderer.is_available() {
        let reason = format!("{} is not available", renderer.name());
        warn!("Skipping plots: {}", reason);
        return Ok(PlotResults {
            status: PlotStatus::Skipped { reason },
            images: Vec::new(),
        });
    }

    let mut plots = Vec::new();
    for (&lead_rank, calls) in &maps.per_call {
        for (&call, call_maps) in calls {
            let exec = times_by_rank(timings.call_by_lead(TimingKind::Execution, lead_rank, call));
            let late =
                times_by_rank(timings.call_by_lead(TimingKind::LateArrival, lead_rank, call));
            plots.push(CallPlot {
                lead_rank,
                call,
                rows: build_rows(&as_f64(&call_maps.send), &as_f64(&call_maps.recv), &exec, &late),
            });
        }
    }

    let mut images = render_calls(renderer, &opts.output_dir, &plots, opts.plot_batch_size)?;
    let avg_rows = build_rows(&averages.send, &averages.recv, &averages.exec, &averages.late);
    images.push(render_averages(renderer, &opts.output_dir, &avg_rows)?);

    Ok(PlotResults {
        status: PlotStatus::Rendered {
            images: images.len(),
        },
        images,
    })
}

pub(super) fn create_bins(
    opts: &PipelineOptions,
    counts: &CountsResults,
) -> Result<BinsResults, PipelineError> {
    let mut results = BinsResults::default();
    for (&lead, calls) in &counts.calls {
        let lead_bins = bins::from_calls(calls, &opts.bin_thresholds)?;
        let files = bins::save(&opts.output_dir, counts.job_id, lead, &lead_bins)?;
        results.files.extend(files);
        results.bins.insert(lead, lead_bins);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_time_averages_use_rank_participation() {
        let totals = BTreeMap::from([(0, 6.0), (1, 4.0), (2, 1.0)]);
        let rank_num_calls = BTreeMap::from([(0, 3), (1, 2)]);
        assert_eq!(
            per_call_average(&totals, &rank_num_calls),
            BTreeMap::from([(0, 2.0), (1, 2.0)])
        );
    }
}
