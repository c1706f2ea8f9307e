//! JSONL writer - one serialized finding per line, append-only

use super::writer_backend::{FindingSink, SinkError};
use crate::findings::Finding;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

pub struct JsonlFindingWriter {
    writer: BufWriter<std::fs::File>,
    last_flush: Instant,
    flush_interval: Duration,
}

impl JsonlFindingWriter {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::info!("📝 Writing findings to: {}", path.display());

        Ok(Self {
            writer: BufWriter::new(file),
            last_flush: Instant::now(),
            flush_interval: Duration::from_secs(5),
        })
    }

    fn write_line(&mut self, finding: &Finding) -> Result<(), SinkError> {
        let json = serde_json::to_string(finding)?;
        writeln!(self.writer, "{}", json)?;

        if self.last_flush.elapsed() > self.flush_interval {
            self.writer.flush()?;
            self.last_flush = Instant::now();
        }

        Ok(())
    }
}

impl Drop for JsonlFindingWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[async_trait]
impl FindingSink for JsonlFindingWriter {
    async fn write_finding(&mut self, finding: &Finding) -> Result<(), SinkError> {
        self.write_line(finding)
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        self.last_flush = Instant::now();
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::ALERT_VAULT_BALANCE_CHANGE;

    #[tokio::test]
    async fn test_findings_appended_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("findings.jsonl");

        let mut writer = JsonlFindingWriter::new(&path).unwrap();
        writer
            .write_finding(&Finding::info("a", "first", ALERT_VAULT_BALANCE_CHANGE))
            .await
            .unwrap();
        writer
            .write_finding(&Finding::info("b", "second\nline", ALERT_VAULT_BALANCE_CHANGE))
            .await
            .unwrap();
        writer.flush().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: Finding = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.description, "second\nline");
        assert_eq!(writer.backend_type(), "JSONL");
    }
}
