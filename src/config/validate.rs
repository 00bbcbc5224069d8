// src/config/validate.rs

use crate::config::model::{BatchFile, RawBatchFile};
use crate::errors::{Result, SeqrunError};

impl TryFrom<RawBatchFile> for BatchFile {
    type Error = SeqrunError;

    fn try_from(raw: RawBatchFile) -> std::result::Result<Self, Self::Error> {
        validate_batch(&raw)?;
        Ok(BatchFile::new_unchecked(raw.runner, raw.command))
    }
}

/// Check a raw batch file without consuming it.
pub fn validate_batch(cfg: &RawBatchFile) -> Result<()> {
    ensure_has_commands(cfg)?;
    validate_command_names(cfg)?;
    Ok(())
}

fn ensure_has_commands(cfg: &RawBatchFile) -> Result<()> {
    if cfg.command.is_empty() {
        return Err(SeqrunError::ConfigError(
            "batch file must contain at least one [[command]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_command_names(cfg: &RawBatchFile) -> Result<()> {
    for (index, cmd) in cfg.command.iter().enumerate() {
        if cmd.name.trim().is_empty() {
            return Err(SeqrunError::ConfigError(format!(
                "command {index} has an empty `name`"
            )));
        }
    }
    Ok(())
}
