// src/errors.rs

//! Crate-wide error types and aliases.

use thiserror::Error;

/// Outcome of a [`Runner::run`](crate::runner::Runner::run) call that did not
/// finish the whole batch.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunError {
    /// `run` was called while another run on the same runner was active.
    #[error("already running")]
    AlreadyRunning,

    /// `stop` was called before the batch finished.
    #[error("stop called")]
    Stopped,

    /// A command exited non-zero and the runner was built with
    /// `stop_on_error = true`.
    #[error("non-zero exit (command {index} exited {exit})")]
    NonZeroExit { index: usize, exit: i32 },
}

/// Errors reported by the process primitive.
///
/// Stored in [`CmdStatus::error`](crate::types::CmdStatus::error) and returned
/// from `stop`, so it has to be cheap to clone and compare.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CmdError {
    #[error("failed to spawn process: {0}")]
    Spawn(String),

    #[error("failed to wait for process: {0}")]
    Wait(String),

    #[error("signal: {0}")]
    Signaled(String),

    #[error("failed to terminate process: {0}")]
    Terminate(String),
}

#[derive(Error, Debug)]
pub enum SeqrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SeqrunError>;
