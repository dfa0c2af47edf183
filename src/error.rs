use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum DualsubError {
    #[error("Failed to read subtitle file '{path}'")]
    SubtitleRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Subtitle file not found: '{0}'")]
    SubtitleMissing(PathBuf),

    #[error("Failed to write session file '{path}'")]
    SessionWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode session data")]
    SessionEncode(#[source] serde_json::Error),

    #[error("No media is loaded")]
    NoMedia,

    #[error("'{tool}' is not installed or not in your PATH")]
    ToolMissing { tool: &'static str },

    #[error("'{tool}' exited with {status}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("Failed to decode ffprobe output")]
    ProbeDecode(#[source] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, DualsubError>;
