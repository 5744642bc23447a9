use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{tool} exited with {status}: {stderr}")]
    CommandFailure {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("{tool} did not finish within {timeout:?}")]
    Timeout { tool: String, timeout: Duration },
    #[error("io error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("unparseable probe output: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;
