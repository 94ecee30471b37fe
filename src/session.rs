use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::commands::backend::ChatMessage;
use crate::error::Result;
use crate::steps::{StepLog, StepRecord};
use crate::tree::{BatchReport, ConflictPolicy, FileNode, Synthesizer, TreeSnapshot};

/// Per-project directory holding the session file and logs.
pub const SESSION_DIR: &str = ".codeplay";
const SESSION_FILE: &str = "session.json";

/// Owns everything one project build accumulates: the step history, the chat
/// history and the canonical tree.
///
/// The tree lives behind an `Arc` so snapshots can be handed to projectors and
/// renderers; `ingest` copies it first whenever a snapshot is still alive.
#[derive(Debug)]
pub struct BuilderSession {
    prompt: String,
    steps: StepLog,
    messages: Vec<ChatMessage>,
    tree: Arc<Vec<FileNode>>,
    revision: u64,
    synthesizer: Synthesizer,
}

/// On-disk form of a session.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionFile {
    version: u32,
    prompt: String,
    steps: StepLog,
    messages: Vec<ChatMessage>,
    files: Vec<FileNode>,
    revision: u64,
}

impl BuilderSession {
    pub fn new(prompt: &str, policy: ConflictPolicy) -> Self {
        Self {
            prompt: prompt.to_string(),
            steps: StepLog::new(),
            messages: Vec::new(),
            tree: Arc::new(Vec::new()),
            revision: 0,
            synthesizer: Synthesizer::new(policy),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn steps(&self) -> &StepLog {
        &self.steps
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            revision: self.revision,
            nodes: Arc::clone(&self.tree),
        }
    }

    /// Appends a batch to the step log and runs one synthesis pass over every
    /// pending record. The revision moves only when the tree actually changed.
    pub fn ingest(&mut self, records: Vec<StepRecord>) -> BatchReport {
        self.steps.append(records);
        self.synthesize()
    }

    /// Runs a synthesis pass; with no pending steps this is a no-op and the
    /// tree is not copied.
    pub fn synthesize(&mut self) -> BatchReport {
        if self.steps.pending_count() == 0 {
            return BatchReport::default();
        }

        let tree = Arc::make_mut(&mut self.tree);
        let report = self.synthesizer.apply(tree, self.steps.records_mut());
        if report.changed {
            self.revision += 1;
        }
        tracing::info!(
            processed = report.processed,
            applied = report.applied,
            warnings = report.warnings.len(),
            revision = self.revision,
            "applied step batch"
        );
        report
    }

    pub fn session_path(project_dir: &Path) -> PathBuf {
        project_dir.join(SESSION_DIR).join(SESSION_FILE)
    }

    /// Loads a saved session, `None` if the project has none yet.
    pub async fn load(project_dir: &Path, policy: ConflictPolicy) -> Result<Option<Self>> {
        let path = Self::session_path(project_dir);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        let file: SessionFile = serde_json::from_str(&raw)?;

        // Projection checks structure, so a tampered file fails there rather
        // than corrupting the next mount.
        crate::projection::project(&file.files)?;

        Ok(Some(Self {
            prompt: file.prompt,
            steps: file.steps,
            messages: file.messages,
            tree: Arc::new(file.files),
            revision: file.revision,
            synthesizer: Synthesizer::new(policy),
        }))
    }

    pub async fn save(&self, project_dir: &Path) -> Result<PathBuf> {
        let path = Self::session_path(project_dir);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = SessionFile {
            version: 1,
            prompt: self.prompt.clone(),
            steps: self.steps.clone(),
            messages: self.messages.clone(),
            files: self.tree.as_ref().clone(),
            revision: self.revision,
        };
        tokio::fs::write(&path, serde_json::to_string_pretty(&file)?).await?;
        Ok(path)
    }
}
