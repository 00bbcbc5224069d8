// src/runner/mod.rs

//! Strategies for running a batch of commands behind one interface.
//!
//! The [`Runner`] trait is deliberately narrow: run a batch, look at its
//! status, stop it. How commands are run (one after another, in parallel,
//! with retries, ...) is up to the implementation. The only strategy shipped
//! here is [`SequentialRunner`].

pub mod sequential;

use std::future::Future;
use std::pin::Pin;

use crate::errors::{CmdError, RunError};
use crate::types::{CmdSpec, CmdStatus};

pub use sequential::SequentialRunner;

/// Runs a batch of commands.
pub trait Runner: Send + Sync {
    /// Run the batch to completion (or until stopped / a failure ends it).
    fn run<'a>(
        &'a self,
        cmds: &'a [CmdSpec],
    ) -> Pin<Box<dyn Future<Output = Result<(), RunError>> + Send + 'a>>;

    /// Stop the active batch, if any.
    fn stop(&self) -> Result<(), CmdError>;

    /// Status of every command in the current (or last) batch, plus the index
    /// of the command running right now.
    fn status(&self) -> (Vec<CmdStatus>, Option<usize>);
}
