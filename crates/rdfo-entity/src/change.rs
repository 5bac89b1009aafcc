use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of a buffered metadata edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    AddNamespace,
    DelNamespace,
    Add,
    Del,
    AddType,
    DelType,
    DelItem,
}

impl ChangeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChangeKind::AddNamespace => "addnamespace",
            ChangeKind::DelNamespace => "delnamespace",
            ChangeKind::Add => "add",
            ChangeKind::Del => "del",
            ChangeKind::AddType => "addtype",
            ChangeKind::DelType => "deltype",
            ChangeKind::DelItem => "delitem",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub args: Vec<String>,
}

/// Edits made since the last commit, in the order they happened.
///
/// Flushed to the audit sink as one `metadatadelta` event per commit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeContext {
    records: Vec<ChangeRecord>,
}

impl ChangeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<I, S>(&mut self, kind: ChangeKind, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.records.push(ChangeRecord {
            kind,
            args: args.into_iter().map(Into::into).collect(),
        });
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records grouped by kind: `{"add": [[s, p, o], ...], "addtype": [[t]]}`.
    pub fn to_json(&self) -> Value {
        let mut grouped = Map::new();
        for record in &self.records {
            let entry = grouped
                .entry(record.kind.name())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = entry {
                list.push(Value::from(record.args.clone()));
            }
        }
        Value::Object(grouped)
    }
}

/// What a commit wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    /// `(part_id, version)` of every named graph written.
    pub graphs: Vec<(String, u32)>,
    pub root_version: Option<u32>,
    pub manifest_version: Option<u32>,
    /// Number of change records flushed to the audit sink.
    pub changes: usize,
}

impl CommitSummary {
    /// Nothing was persisted or audited.
    pub fn is_noop(&self) -> bool {
        self.graphs.is_empty()
            && self.root_version.is_none()
            && self.manifest_version.is_none()
            && self.changes == 0
    }
}
