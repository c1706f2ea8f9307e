//! Log backend - findings go to the process log only

use super::writer_backend::{FindingSink, SinkError};
use crate::findings::Finding;
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct LogFindingWriter {
    written: u64,
}

impl LogFindingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

#[async_trait]
impl FindingSink for LogFindingWriter {
    async fn write_finding(&mut self, finding: &Finding) -> Result<(), SinkError> {
        let metadata = serde_json::to_string(&finding.metadata)?;
        log::info!(
            "🚨 [{}] {} | {} | metadata={}",
            finding.alert_id,
            finding.name,
            finding.description.replace('\n', " ⏎ "),
            metadata
        );
        self.written += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "log"
    }
}
