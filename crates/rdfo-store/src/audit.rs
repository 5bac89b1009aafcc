use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Kind of change an audit event records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    /// Batch of metadata edits committed together.
    MetadataDelta,
}

impl AuditAction {
    pub fn name(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::MetadataDelta => "metadatadelta",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One audit record. Free-form `fields` are flattened into the JSON object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub object_id: String,
    pub action: AuditAction,
    pub label: String,
    pub uri_base: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl AuditEvent {
    pub fn new(
        object_id: impl Into<String>,
        action: AuditAction,
        label: impl Into<String>,
        uri_base: impl Into<String>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            action,
            label: label.into(),
            uri_base: uri_base.into(),
            timestamp: Utc::now(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn publish(&self, event: &AuditEvent) -> StoreResult<()>;
}

/// Collects events in memory. Useful for tests and embedding.
#[derive(Default)]
pub struct InMemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().expect("lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().expect("lock poisoned").is_empty()
    }

    pub fn clear(&self) {
        self.events.write().expect("lock poisoned").clear();
    }
}

impl AuditSink for InMemoryAuditLog {
    fn publish(&self, event: &AuditEvent) -> StoreResult<()> {
        self.events.write().expect("lock poisoned").push(event.clone());
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAuditLog")
            .field("event_count", &self.len())
            .finish()
    }
}

/// Appends events to a file, one JSON object per line.
pub struct JsonLinesAuditSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesAuditSink {
    /// Open (or create) the log file, creating parent directories.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event back. Lines that fail to parse (torn writes) are
    /// skipped.
    pub fn read_all(path: &Path) -> StoreResult<Vec<AuditEvent>> {
        let reader = BufReader::new(File::open(path)?);
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(line = index + 1, error = %e, "skipping malformed audit line"),
            }
        }
        debug!(path = %path.display(), count = events.len(), "read audit log");
        Ok(events)
    }
}

impl AuditSink for JsonLinesAuditSink {
    fn publish(&self, event: &AuditEvent) -> StoreResult<()> {
        let line = serde_json::to_string(event)?;
        let mut w = self.writer.lock().expect("lock poisoned");
        writeln!(w, "{line}").map_err(|e| StoreError::Audit(e.to_string()))?;
        w.flush().map_err(|e| StoreError::Audit(e.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Debug for JsonLinesAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesAuditSink")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuditEvent {
        AuditEvent::new("obj1", AuditAction::Create, "Creating a part", "info:local/")
            .with_field("part_id", "data.csv")
            .with_field("version", 1)
    }

    #[test]
    fn event_json_is_flat() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["action"], "create");
        assert_eq!(json["part_id"], "data.csv");
        assert_eq!(json["version"], 1);
        assert_eq!(json["uri_base"], "info:local/");
        let back: AuditEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_with_ts(back.timestamp));
    }

    fn sample_with_ts(ts: DateTime<Utc>) -> AuditEvent {
        let mut e = sample();
        e.timestamp = ts;
        e
    }

    #[test]
    fn metadata_delta_name() {
        assert_eq!(AuditAction::MetadataDelta.to_string(), "metadatadelta");
        assert_eq!(
            serde_json::to_string(&AuditAction::MetadataDelta).unwrap(),
            "\"metadatadelta\""
        );
    }

    #[test]
    fn in_memory_log_collects() {
        let log = InMemoryAuditLog::new();
        log.publish(&sample()).unwrap();
        log.publish(&sample()).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].label, "Creating a part");
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn json_lines_sink_appends_and_skips_torn_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs").join("audit.jsonl");
        {
            let sink = JsonLinesAuditSink::open(&path).unwrap();
            sink.publish(&sample()).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(b"{\"object_id\": \"trunc").unwrap();
            f.write_all(b"\n").unwrap();
        }
        let sink = JsonLinesAuditSink::open(&path).unwrap();
        sink.publish(&AuditEvent::new("obj2", AuditAction::Delete, "Deleting an object", "info:local/"))
            .unwrap();

        let events = JsonLinesAuditSink::read_all(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].object_id, "obj1");
        assert_eq!(events[1].action, AuditAction::Delete);
    }
}
