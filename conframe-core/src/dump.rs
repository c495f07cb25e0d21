use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

use crate::error::DumpError;
use crate::extension::{DrawExtension, FrameInfo};
use crate::grid::{Grid, GridRepr};

/// Writes the live grid to a timestamped JSON file once per dumped frame.
///
/// Files are named `<YYYYmmdd-HHMMSS.ffffff>_<frame>.json` inside `dir`.
/// Write failures are logged and otherwise ignored; a broken dump must never
/// stop the draw loop.
pub struct FrameDumpExtension {
    dir: PathBuf,
    every: u64,
    written: u64,
}

impl FrameDumpExtension {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            every: 1,
            written: 0,
        }
    }

    /// Only dump frames whose number is a multiple of `n` (0 is treated as 1).
    pub fn every(mut self, n: u64) -> Self {
        self.every = n.max(1);
        self
    }

    /// Number of dump files written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn path_for(&self, frame: u64) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d-%H%M%S%.6f");
        self.dir.join(format!("{stamp}_{frame}.json"))
    }
}

impl DrawExtension for FrameDumpExtension {
    fn run_extension(&mut self, grid: &mut Grid, info: &FrameInfo) {
        if info.frame % self.every != 0 {
            return;
        }
        let path = self.path_for(info.frame);
        match write_dump(&path, grid) {
            Ok(()) => {
                self.written += 1;
                debug!(path = %path.display(), "frame dumped");
            }
            Err(err) => warn!(path = %path.display(), %err, "frame dump failed"),
        }
    }
}

/// Serialize `grid` as pretty-printed JSON.
pub fn write_dump(path: impl AsRef<Path>, grid: &Grid) -> Result<(), DumpError> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, grid)?;
    out.flush()?;
    Ok(())
}

/// Read a grid written by [`write_dump`].
pub fn load_dump(path: impl AsRef<Path>) -> Result<Grid, DumpError> {
    let repr: GridRepr = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    Ok(Grid::try_from(repr)?)
}
