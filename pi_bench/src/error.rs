use std::io;

use thiserror::Error;

/// Rejected run configuration. The controller's state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("batch size must be positive, got {0}")]
    BatchSize(u64),
    #[error("foreground batch size must be positive when foreground sampling is enabled")]
    ForegroundBatch,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn {what}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
