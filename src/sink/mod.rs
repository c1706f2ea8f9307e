//! Finding sinks: where emitted findings go

pub mod jsonl_writer;
pub mod log_writer;
pub mod writer_backend;

pub use jsonl_writer::JsonlFindingWriter;
pub use log_writer::LogFindingWriter;
pub use writer_backend::{FindingSink, SinkError};

use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendType {
    Jsonl,
    Log,
}

impl BackendType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "jsonl" => Some(BackendType::Jsonl),
            "log" => Some(BackendType::Log),
            _ => None,
        }
    }
}

/// Build the configured backend
pub fn create_sink(backend: &BackendType, path: impl AsRef<Path>) -> Result<Box<dyn FindingSink>, SinkError> {
    match backend {
        BackendType::Jsonl => Ok(Box::new(JsonlFindingWriter::new(path)?)),
        BackendType::Log => Ok(Box::new(LogFindingWriter::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Finding, ALERT_HUGE_TRANSFERS_TECH};

    #[test]
    fn test_backend_from_str() {
        assert_eq!(BackendType::from_str("JSONL"), Some(BackendType::Jsonl));
        assert_eq!(BackendType::from_str("log"), Some(BackendType::Log));
        assert_eq!(BackendType::from_str("sqlite"), None);
    }

    #[tokio::test]
    async fn test_log_sink_counts_findings() {
        let mut sink = LogFindingWriter::new();
        sink.write_finding(&Finding::info("n", "d", ALERT_HUGE_TRANSFERS_TECH))
            .await
            .unwrap();
        assert_eq!(sink.written(), 1);
    }

    #[test]
    fn test_create_sink_picks_backend() {
        let dir = tempfile::tempdir().unwrap();
        let sink = create_sink(&BackendType::Jsonl, dir.path().join("f.jsonl")).unwrap();
        assert_eq!(sink.backend_type(), "JSONL");

        let sink = create_sink(&BackendType::Log, dir.path().join("unused")).unwrap();
        assert_eq!(sink.backend_type(), "log");
    }
}
