//! Gnuplot renderer.

use super::PlotRenderer;
use crate::utils::error::PlotError;
use log::debug;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Renders scripts by piping them into `gnuplot`
#[derive(Debug, Clone, Default)]
pub struct Gnuplot {
    binary: Option<PathBuf>,
}

impl Gnuplot {
    /// Look `gnuplot` up on `PATH`
    pub fn detect() -> Self {
        let binary = find_in_path("gnuplot");
        debug!("gnuplot binary: {:?}", binary);
        Self { binary }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }
}

/// First `PATH` entry holding an executable called `name`
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

impl PlotRenderer for Gnuplot {
    fn name(&self) -> &str {
        "gnuplot"
    }

    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    fn render(&self, script: &Path, workdir: &Path) -> Result<(), PlotError> {
        let failed = |reason: String| PlotError::RenderFailed {
            script: script.display().to_string(),
            reason,
        };
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| failed("gnuplot not found".to_string()))?;
        let content = fs::read(script)?;

        let mut child = Command::new(binary)
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin while stderr drains; the child is reaped on every path
        let stdin = child.stdin.take();
        let (written, output) = crossbeam::thread::scope(|scope| {
            let writer = scope.spawn(move |_| match stdin {
                Some(mut stdin) => stdin.write_all(&content),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        })
        .map_err(|_| PlotError::WorkerPanicked)?;

        let output = output?;
        if !output.status.success() {
            return Err(failed(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        written.map_err(|_| PlotError::WorkerPanicked)??;
        Ok(())
    }
}
