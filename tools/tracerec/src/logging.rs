use crate::errors::RecorderError;
use crate::runtime::FileSystem;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

#[derive(Clone)]
pub struct JsonlLogger {
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
    fs: Arc<dyn FileSystem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            fs,
        }
    }

    pub fn disabled(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: None,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            fs,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), RecorderError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs.create_dir_all(parent)?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| RecorderError::Io(e.to_string()))?;
        self.fs.append_line(path, &line)
    }

    /// Fire-and-forget: a broken event log must not abort a recording.
    pub fn emit(&self, level: &str, event_type: &str, payload: Value) {
        let _ = self.append(&LogEvent {
            level,
            event_type,
            payload,
        });
    }
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}

#[cfg(test)]
mod tests {
    use super::{JsonlLogger, LogEvent};
    use crate::runtime::{FakeFileSystem, ProductionFileSystem};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn logger_truncates_large_payloads_and_writes_jsonl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs/run.jsonl");
        let mut logger = JsonlLogger::new(Arc::new(ProductionFileSystem), &path);
        logger.max_payload_bytes = 20;

        logger
            .append(&LogEvent {
                level: "info",
                event_type: "step_captured",
                payload: json!({"text": "abcdefghijklmnopqrstuvwxyz"}),
            })
            .expect("append");

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"event_type\":\"step_captured\""));
        assert!(text.contains("..."));
    }

    #[test]
    fn disabled_logger_writes_nothing() {
        let fs = FakeFileSystem::default();
        let logger = JsonlLogger::disabled(Arc::new(fs.clone()));
        logger.emit("info", "context_started", json!({}));
        assert!(fs.created_dirs().is_empty());
    }

    #[test]
    fn emit_appends_one_line_per_event() {
        let fs = FakeFileSystem::default();
        let logger = JsonlLogger::new(Arc::new(fs.clone()), "/logs/run.jsonl");
        logger.emit("info", "context_started", json!({"context": "0_0"}));
        logger.emit("info", "context_finished", json!({"context": "0_0"}));
        let text = fs
            .file_contents(Path::new("/logs/run.jsonl"))
            .expect("log written");
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["payload"]["context"], "0_0");
    }
}
