#![allow(dead_code)]

use seqrun::config::{BatchFile, RawBatchFile, RunnerSection};
use seqrun::types::{CmdSpec, LogLevel};

/// Builder for a batch (`Vec<CmdSpec>`).
#[derive(Default)]
pub struct BatchBuilder {
    cmds: Vec<CmdSpec>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cmd(mut self, name: &str, args: &[&str]) -> Self {
        self.cmds.push(CmdSpec::new(name, args.iter().copied()));
        self
    }

    /// `sh -c <script>`, for tests that need shell features.
    pub fn sh(self, script: &str) -> Self {
        self.cmd("sh", &["-c", script])
    }

    pub fn build(self) -> Vec<CmdSpec> {
        self.cmds
    }
}

/// Builder for `RawBatchFile` / `BatchFile`.
pub struct BatchFileBuilder {
    config: RawBatchFile,
}

impl BatchFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawBatchFile {
                runner: RunnerSection::default(),
                command: Vec::new(),
            },
        }
    }

    pub fn stop_on_error(mut self, val: bool) -> Self {
        self.config.runner.stop_on_error = val;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.runner.log_level = Some(level);
        self
    }

    pub fn with_command(mut self, name: &str, args: &[&str]) -> Self {
        self.config
            .command
            .push(CmdSpec::new(name, args.iter().copied()));
        self
    }

    pub fn build_raw(self) -> RawBatchFile {
        self.config
    }

    pub fn build(self) -> BatchFile {
        BatchFile::try_from(self.config).expect("Failed to build valid batch file from builder")
    }
}

impl Default for BatchFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
