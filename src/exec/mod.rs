// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running commands, using
//! `tokio::process::Command`, and exposing their live status to runners.
//!
//! - [`backend`] provides the [`Process`] / [`Spawner`] traits the runner
//!   depends on, plus the [`OsSpawner`] used in production.
//! - [`os_process`] implements [`Process`] for real OS processes: output
//!   capture, exit handling, and termination.

pub mod backend;
pub mod os_process;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use backend::{OsSpawner, Process, Spawner};
pub use os_process::OsProcess;

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Critical sections in this crate never leave the guarded state half-updated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
