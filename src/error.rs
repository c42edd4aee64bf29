use std::ffi::NulError;
use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Reasons a single stage cannot be launched. The rest of the pipeline
/// still runs.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("empty command in pipeline")]
    Empty,
    #[error("no command given for output to {0}")]
    MissingCommand(String),
    #[error("argument contains a NUL byte")]
    Nul(#[from] NulError),
}

/// Errors that abort the current pipeline. Children spawned before the
/// failure have already been reaped when this is returned.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to create pipe: {0}")]
    Pipe(#[source] Errno),
    #[error("failed to forward output: {0}")]
    Forward(#[source] io::Error),
}
