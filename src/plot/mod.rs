//! Per-call and average plots.
//!
//! Each plot is a whitespace-separated data file plus a gnuplot script
//! referencing it by relative name; the renderer runs with the output
//! directory as its working directory. Calls are rendered concurrently in
//! bounded batches.

pub mod gnuplot;

use crate::utils::error::PlotError;
use crossbeam::channel::unbounded;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub use gnuplot::Gnuplot;

const SCRIPT_PRELUDE: &str = "set term png size 800,600\nset key outside\nset key right top\n";

/// Something able to turn a plot script into an image
pub trait PlotRenderer: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the renderer can run on this host
    fn is_available(&self) -> bool;

    /// Render `script` with `workdir` as the current directory
    fn render(&self, script: &Path, workdir: &Path) -> Result<(), PlotError>;
}

/// One line of a plot data file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotRow {
    pub rank: usize,
    pub send: f64,
    pub recv: f64,
    pub exec: f64,
    pub late: f64,
}

/// Data of one call's plot
#[derive(Debug, Clone, PartialEq)]
pub struct CallPlot {
    pub lead_rank: usize,
    pub call: usize,
    pub rows: Vec<PlotRow>,
}

/// Merge per-rank series into plot rows
///
/// **Public** - ranks missing from a series get 0
pub fn build_rows(
    send: &BTreeMap<usize, f64>,
    recv: &BTreeMap<usize, f64>,
    exec: &BTreeMap<usize, f64>,
    late: &BTreeMap<usize, f64>,
) -> Vec<PlotRow> {
    let ranks: BTreeSet<usize> = send.keys().chain(recv.keys()).copied().collect();
    let get = |m: &BTreeMap<usize, f64>, rank| m.get(&rank).copied().unwrap_or(0.0);

    ranks
        .into_iter()
        .map(|rank| PlotRow {
            rank,
            send: get(send, rank),
            recv: get(recv, rank),
            exec: get(exec, rank),
            late: get(late, rank),
        })
        .collect()
}

/// Rank-ordered times as a rank map
pub fn times_by_rank(times: Option<&Vec<f64>>) -> BTreeMap<usize, f64> {
    times
        .map(|t| t.iter().copied().enumerate().collect())
        .unwrap_or_default()
}

pub fn write_data<W: Write>(w: &mut W, rows: &[PlotRow]) -> io::Result<()> {
    writeln!(w, "# Rank send_size recv_size exec_time late_time")?;
    for row in rows {
        writeln!(
            w,
            "{} {} {} {:.6} {:.6}",
            row.rank, row.send, row.recv, row.exec, row.late
        )?;
    }
    Ok(())
}

/// Gnuplot script plotting the four columns of `data_file` into `png_file`
pub fn write_script<W: Write>(
    w: &mut W,
    data_file: &str,
    png_file: &str,
    num_ranks: usize,
) -> io::Result<()> {
    write!(w, "{}", SCRIPT_PRELUDE)?;
    write!(w, "set output \"{}\"\n\nset pointsize 2\n\n", png_file)?;
    writeln!(w, "set xrange [-1:{}]", num_ranks)?;
    writeln!(w, "set xtics\n")?;
    for (idx, pt) in [2, 1, 4, 9].iter().enumerate() {
        writeln!(w, "set style line {} lc rgb 'black' pt {}", idx + 1, pt)?;
    }
    writeln!(w)?;
    writeln!(
        w,
        "plot \"{0}\" using 2:xtic(1) with points ls 1 title \"data sent (B)\", \\\n\
         \"{0}\" using 3 with points ls 2 title \"data received (B)\", \\\n\
         \"{0}\" using 4 with points ls 3 title \"execution time (seconds)\", \\\n\
         \"{0}\" using 5 with points ls 4 title \"late arrival timing (seconds)\"",
        data_file
    )
}

/// Base name shared by a call's data file, script and image
pub fn call_plot_name(lead_rank: usize, call: usize) -> String {
    format!("profiler_rank{}_call{}", lead_rank, call)
}

pub const AVGS_PLOT_NAME: &str = "profiler_avgs";

/// Write `<name>.txt` and `<name>.gnuplot`
///
/// # Returns
/// Path of the script
pub fn write_plot_files(dir: &Path, name: &str, rows: &[PlotRow]) -> io::Result<PathBuf> {
    let data_file = format!("{}.txt", name);
    let mut w = BufWriter::new(File::create(dir.join(&data_file))?);
    write_data(&mut w, rows)?;
    w.flush()?;

    let script = dir.join(format!("{}.gnuplot", name));
    let mut w = BufWriter::new(File::create(&script)?);
    write_script(&mut w, &data_file, &format!("{}.png", name), rows.len())?;
    w.flush()?;

    Ok(script)
}

fn plot_call<R: PlotRenderer + ?Sized>(
    renderer: &R,
    dir: &Path,
    plot: &CallPlot,
) -> Result<PathBuf, PlotError> {
    let name = call_plot_name(plot.lead_rank, plot.call);
    let script = write_plot_files(dir, &name, &plot.rows)?;
    renderer.render(&script, dir)?;
    Ok(dir.join(format!("{}.png", name)))
}

/// Render every call plot, at most `batch_size` at a time
///
/// **Public** - step 6 fan-out
///
/// Workers report on a success channel or an error channel; the collector
/// waits for every worker of a batch before starting the next one.
///
/// # Returns
/// Paths of the images, in completion order
///
/// # Errors
/// The first error reported, once its batch has drained
pub fn render_calls<R: PlotRenderer + ?Sized>(
    renderer: &R,
    dir: &Path,
    plots: &[CallPlot],
    batch_size: usize,
) -> Result<Vec<PathBuf>, PlotError> {
    let mut images = Vec::with_capacity(plots.len());

    for batch in plots.chunks(batch_size.max(1)) {
        debug!("Rendering a batch of {} plots", batch.len());
        let (done_tx, done_rx) = unbounded::<PathBuf>();
        let (err_tx, err_rx) = unbounded::<PlotError>();

        let outcome = crossbeam::thread::scope(|scope| {
            for plot in batch {
                let done_tx = done_tx.clone();
                let err_tx = err_tx.clone();
                scope.spawn(move |_| {
                    // A send only fails once the collector is gone
                    let _ = match plot_call(renderer, dir, plot) {
                        Ok(image) => done_tx.send(image).map_err(|_| ()),
                        Err(e) => err_tx.send(e).map_err(|_| ()),
                    };
                });
            }
            drop(done_tx);
            drop(err_tx);

            let mut first_error = None;
            for _ in 0..batch.len() {
                let received = crossbeam::select! {
                    recv(done_rx) -> msg => msg.map(Ok),
                    recv(err_rx) -> msg => msg.map(Err),
                };
                match received {
                    Ok(Ok(image)) => images.push(image),
                    Ok(Err(e)) => {
                        first_error.get_or_insert(e);
                    }
                    // Every worker is gone, some without reporting
                    Err(_) => break,
                }
            }
            images.extend(done_rx.try_iter());
            if let Some(e) = err_rx.try_iter().next() {
                first_error.get_or_insert(e);
            }
            first_error
        });

        match outcome {
            Ok(None) => {}
            Ok(Some(e)) => return Err(e),
            Err(_) => return Err(PlotError::WorkerPanicked),
        }
    }

    info!("Rendered {} call plots with {}", images.len(), renderer.name());
    Ok(images)
}

/// Write and render the average plot
pub fn render_averages<R: PlotRenderer + ?Sized>(
    renderer: &R,
    dir: &Path,
    rows: &[PlotRow],
) -> Result<PathBuf, PlotError> {
    let script = write_plot_files(dir, AVGS_PLOT_NAME, rows)?;
    renderer.render(&script, dir)?;
    Ok(dir.join(format!("{}.png", AVGS_PLOT_NAME)))
}
