pub mod parser;

use serde::{Deserialize, Serialize};

pub use parser::parse_artifact;

/// Kind of build action a step describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepType {
    CreateFile,
    CreateFolder,
    EditFile,
    DeleteFile,
    RunScript,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

/// One atomic build instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub id: u64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: StepType,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl StepRecord {
    pub fn create_file(path: &str, content: &str) -> Self {
        StepRecord {
            id: 0,
            title: format!("Create {path}"),
            kind: StepType::CreateFile,
            status: StepStatus::Pending,
            path: Some(path.to_string()),
            content: Some(content.to_string()),
        }
    }

    pub fn create_folder(path: &str) -> Self {
        StepRecord {
            id: 0,
            title: format!("Create {path}"),
            kind: StepType::CreateFolder,
            status: StepStatus::Pending,
            path: Some(path.to_string()),
            content: None,
        }
    }

    pub fn run_script(command: &str) -> Self {
        StepRecord {
            id: 0,
            title: "Run command".to_string(),
            kind: StepType::RunScript,
            status: StepStatus::Pending,
            path: None,
            content: Some(command.to_string()),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }
}

/// Append-only history of every step the session has received.
///
/// Records are never removed; the synthesizer only flips their status.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepLog {
    records: Vec<StepRecord>,
    next_id: u64,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a batch as Pending records and returns how many were added.
    pub fn append(&mut self, records: impl IntoIterator<Item = StepRecord>) -> usize {
        let before = self.records.len();
        for mut record in records {
            self.next_id += 1;
            record.id = self.next_id;
            record.status = StepStatus::Pending;
            self.records.push(record);
        }
        self.records.len() - before
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [StepRecord] {
        &mut self.records
    }

    pub fn pending_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_pending()).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
