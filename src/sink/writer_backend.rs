//! Sink trait for emitted findings
//!
//! The alert-emission sink is external; these backends are what the runtime
//! binary ships with.

use crate::findings::Finding;
use async_trait::async_trait;

#[derive(Debug)]
pub enum SinkError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Serialization(err)
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "IO error: {}", e),
            SinkError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

#[async_trait]
pub trait FindingSink: Send {
    /// Emit a single finding
    async fn write_finding(&mut self, finding: &Finding) -> Result<(), SinkError>;

    /// Flush pending writes
    async fn flush(&mut self) -> Result<(), SinkError>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}
