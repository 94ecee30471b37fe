use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::commands::backend::{BackendClient, ChatMessage, Role};
use crate::commands::sandbox::{MountTarget, MountWorker};
use crate::error::Result;
use crate::projection;
use crate::session::BuilderSession;
use crate::steps::{parse_artifact, StepRecord};
use crate::tree::{BatchReport, Resolution};

/// Progress events streamed to whatever renders the build.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "event", content = "data")]
pub enum BuildEvent {
    #[serde(rename_all = "camelCase")]
    RequestStarted { endpoint: String },
    #[serde(rename_all = "camelCase")]
    StepsReceived { count: usize },
    #[serde(rename_all = "camelCase")]
    StepWarning {
        step_id: u64,
        path: Option<String>,
        message: String,
        skipped: bool,
    },
    #[serde(rename_all = "camelCase")]
    BatchApplied {
        applied: usize,
        passed_through: usize,
        revision: u64,
    },
    #[serde(rename_all = "camelCase")]
    MountSubmitted { revision: u64 },
    #[serde(rename_all = "camelCase")]
    Mounted { revision: u64 },
    Finished,
}

/// On batch arrival, synthesize; on tree change, project and mount.
pub struct BuildPipeline {
    session: BuilderSession,
    mount: MountWorker,
    events: mpsc::UnboundedSender<BuildEvent>,
    last_submitted: u64,
}

impl BuildPipeline {
    /// Wraps a session and spawns its mount worker. An existing tree is
    /// mounted immediately so the runtime matches the loaded session.
    pub fn new(
        session: BuilderSession,
        target: Arc<dyn MountTarget>,
        events: mpsc::UnboundedSender<BuildEvent>,
    ) -> Result<Self> {
        let mut pipeline = Self {
            session,
            mount: MountWorker::spawn(target),
            events,
            last_submitted: 0,
        };
        if pipeline.session.revision() > 0 {
            pipeline.project_and_submit()?;
        }
        Ok(pipeline)
    }

    pub fn session(&self) -> &BuilderSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut BuilderSession {
        &mut self.session
    }

    pub fn is_previewable(&self) -> bool {
        self.mount.is_previewable()
    }

    fn emit(&self, event: BuildEvent) {
        // The renderer may have gone away; the build carries on regardless.
        let _ = self.events.send(event);
    }

    /// Feeds one batch of parsed steps through the synthesizer and, if the
    /// tree changed, submits a fresh mount descriptor.
    pub fn ingest(&mut self, records: Vec<StepRecord>) -> Result<BatchReport> {
        self.emit(BuildEvent::StepsReceived {
            count: records.len(),
        });

        let report = self.session.ingest(records);
        for warning in &report.warnings {
            self.emit(BuildEvent::StepWarning {
                step_id: warning.step_id,
                path: warning.path.clone(),
                message: warning.error.to_string(),
                skipped: warning.resolution == Resolution::Skipped,
            });
        }
        self.emit(BuildEvent::BatchApplied {
            applied: report.applied,
            passed_through: report.passed_through,
            revision: self.session.revision(),
        });

        if report.changed {
            self.project_and_submit()?;
        }
        Ok(report)
    }

    /// Parses backend text and ingests the resulting steps.
    pub fn ingest_text(&mut self, text: &str) -> Result<BatchReport> {
        let records = parse_artifact(text);
        if records.is_empty() {
            tracing::warn!("response contained no build steps");
        }
        self.ingest(records)
    }

    fn project_and_submit(&mut self) -> Result<()> {
        let snapshot = self.session.snapshot();
        let descriptor = projection::project(snapshot.nodes())?;
        self.mount.submit(snapshot.revision, descriptor);
        self.last_submitted = snapshot.revision;
        self.emit(BuildEvent::MountSubmitted {
            revision: snapshot.revision,
        });
        Ok(())
    }

    /// Waits for the latest submitted descriptor to be mounted.
    pub async fn settle(&self) -> Result<()> {
        if self.last_submitted == 0 {
            return Ok(());
        }
        self.mount.wait_for(self.last_submitted).await?;
        self.emit(BuildEvent::Mounted {
            revision: self.last_submitted,
        });
        Ok(())
    }

    pub async fn shutdown(self) -> BuilderSession {
        self.emit(BuildEvent::Finished);
        self.mount.stop().await;
        self.session
    }
}

/// Initial build: template, then the first chat turn.
pub async fn run_build(
    pipeline: &mut BuildPipeline,
    backend: &BackendClient,
    prompt: &str,
) -> Result<()> {
    pipeline.emit(BuildEvent::RequestStarted {
        endpoint: "template".into(),
    });
    let template = backend.template(prompt).await?;
    if let Some(starter) = template.ui_prompts.first() {
        pipeline.ingest_text(starter)?;
    }

    let mut messages: Vec<ChatMessage> = template
        .prompts
        .iter()
        .map(|p| ChatMessage::new(Role::User, p.as_str()))
        .collect();
    messages.push(ChatMessage::new(Role::User, prompt));

    pipeline.emit(BuildEvent::RequestStarted {
        endpoint: "chat".into(),
    });
    let response = backend.chat(&messages).await?;
    pipeline.ingest_text(&response)?;

    let session = pipeline.session_mut();
    for message in messages {
        session.push_message(message);
    }
    session.push_message(ChatMessage::new(Role::Assistant, response));

    pipeline.settle().await
}

/// Follow-up instructions on an existing conversation.
pub async fn run_chat(
    pipeline: &mut BuildPipeline,
    backend: &BackendClient,
    instructions: &str,
) -> Result<()> {
    let instructions = instructions.trim();
    if instructions.is_empty() {
        return Ok(());
    }

    let mut messages = pipeline.session().messages().to_vec();
    messages.push(ChatMessage::new(Role::User, instructions));

    pipeline.emit(BuildEvent::RequestStarted {
        endpoint: "chat".into(),
    });
    let response = backend.chat(&messages).await?;
    pipeline.ingest_text(&response)?;

    let session = pipeline.session_mut();
    session.push_message(ChatMessage::new(Role::User, instructions));
    session.push_message(ChatMessage::new(Role::Assistant, response));

    pipeline.settle().await
}

/// Applies a local artifact file without talking to the backend.
pub async fn run_apply(pipeline: &mut BuildPipeline, artifact: &str) -> Result<BatchReport> {
    let report = pipeline.ingest_text(artifact)?;
    pipeline.settle().await?;
    Ok(report)
}
