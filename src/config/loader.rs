// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{BatchFile, RawBatchFile};
use crate::errors::Result;

/// Load a batch file from a given path and return the raw `RawBatchFile`.
///
/// This only performs TOML deserialization; it does **not** validate the
/// commands. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawBatchFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawBatchFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), commands = config.command.len(), "batch file parsed");

    Ok(config)
}

/// Load a batch file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks that there is at least one command and that every command has
///   a program name.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<BatchFile> {
    let raw = load_from_path(&path)?;
    let batch = BatchFile::try_from(raw)?;
    Ok(batch)
}

/// Default batch file location: `Seqrun.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Seqrun.toml")
}
