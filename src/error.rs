// Probe error handling

use std::path::PathBuf;
use thiserror::Error;

pub type ProbeResult<T> = Result<T, ProbeError>;

/// Fatal errors. Decode problems inside a well-formed buffer are not errors;
/// they surface as anomalies and violations in the report instead.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Story file too short for header: {len} bytes, need at least {needed}")]
    Format { len: usize, needed: usize },

    #[error("Cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Usage(String),
}

impl ProbeError {
    /// Process exit status for this error. Violation counts use 1..=100,
    /// so fatal errors start above that range.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProbeError::Format { .. } => 101,
            ProbeError::Io { .. } => 102,
            ProbeError::Config(_) | ProbeError::Usage(_) => 103,
        }
    }
}

impl From<toml::de::Error> for ProbeError {
    fn from(e: toml::de::Error) -> Self {
        ProbeError::Config(e.to_string())
    }
}
