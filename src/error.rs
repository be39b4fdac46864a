use std::fmt;

use thiserror::Error;

/// One entry drained from an instrument's `SYST:ERR?` queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentErrorEntry {
    pub code: i32,
    pub message: String,
}

impl fmt::Display for InstrumentErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, \"{}\"", self.code, self.message)
    }
}

fn join_entries(entries: &[InstrumentErrorEntry]) -> String {
    entries
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum ScpiError {
    #[error("IO error ({context}): {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("Connection timeout")]
    Timeout,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Type error: {0}")]
    Type(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Lookup error: {0}")]
    Lookup(String),
    #[error("Capacity exceeded: {0}")]
    Capacity(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Instrument reported: {}", join_entries(.0))]
    Instrument(Vec<InstrumentErrorEntry>),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ScpiError {
    /// Wrap an IO error with a short description of what was being attempted.
    pub fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> ScpiError {
        let context = context.into();
        move |source| {
            if matches!(
                source.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) {
                ScpiError::Timeout
            } else {
                ScpiError::Io { source, context }
            }
        }
    }

    /// Instrument-side failure that is not backed by an error-queue entry.
    pub fn instrument(message: impl Into<String>) -> ScpiError {
        ScpiError::Instrument(vec![InstrumentErrorEntry {
            code: 0,
            message: message.into(),
        }])
    }
}
