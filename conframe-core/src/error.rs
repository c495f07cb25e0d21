use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid frame limit {0}: must be greater than 1")]
    InvalidFrameLimit(u32),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("could not load {}: make sure your image is valid", path.display())]
    InvalidImage { path: PathBuf },

    #[error("image is {width}x{height}, larger than the 65535x65535 cell limit")]
    TooLarge { width: u32, height: u32 },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("draw loop is already running")]
    AlreadyRunning,

    #[error("frame buffer has been disposed")]
    Disposed,

    #[error("failed to spawn draw thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A grid whose cell count disagrees with its dimensions.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("grid declares {width}x{height} but holds {cells} cells")]
pub struct GridShapeError {
    pub width: u16,
    pub height: u16,
    pub cells: usize,
}

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("dump i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("dump is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dump {0}")]
    Mismatch(#[from] GridShapeError),
}
