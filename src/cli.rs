//! Command-line front end: wires config, logging, the backend client and the
//! build pipeline together for one invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use crate::commands::backend::BackendClient;
use crate::commands::build::{run_apply, run_build, run_chat, BuildEvent, BuildPipeline};
use crate::commands::config::{load_config, save_project, CodeplayConfig, ProjectEntry};
use crate::commands::export::export_archive;
use crate::commands::logs::{init_logging, prepare_session_log, unix_timestamp};
use crate::commands::sandbox::DirectoryMount;
use crate::projection::{self, ArchiveOptions};
use crate::session::BuilderSession;
use crate::tree;
use crate::util::project_name;

/// CodePlay - build runnable projects from a prompt
#[derive(Parser)]
#[command(name = "codeplay")]
#[command(about = "Builds a project file tree from AI instruction steps")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (defaults to ~/.codeplay/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level or filter directive (overrides config)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, global = true)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new project from a prompt
    Build {
        prompt: String,
        /// Project directory the files are mounted into
        #[arg(long, default_value = ".")]
        project: PathBuf,
        /// Also write the zip archive when done
        #[arg(long)]
        export: bool,
    },
    /// Send follow-up instructions for an existing project
    Chat {
        instructions: String,
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
    /// Apply an artifact file without contacting the backend
    Apply {
        file: PathBuf,
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
    /// Write the project as a zip archive
    Export {
        #[arg(long, default_value = ".")]
        project: PathBuf,
        /// Archive path (defaults to <project>/<archiveName>)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the current tree
    Show {
        #[arg(long, default_value = ".")]
        project: PathBuf,
        /// Print the mount descriptor as JSON instead of the outline
        #[arg(long)]
        mount: bool,
        /// Print one file's content
        #[arg(long, conflicts_with = "mount")]
        file: Option<String>,
    },
}

impl Commands {
    fn project(&self) -> &Path {
        match self {
            Commands::Build { project, .. }
            | Commands::Chat { project, .. }
            | Commands::Apply { project, .. }
            | Commands::Export { project, .. }
            | Commands::Show { project, .. } => project,
        }
    }
}

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref());

    let project = cli.command.project().to_path_buf();
    if matches!(cli.command, Commands::Build { .. }) {
        tokio::fs::create_dir_all(&project)
            .await
            .with_context(|| format!("Failed to create {}", project.display()))?;
    }
    let project = tokio::fs::canonicalize(&project)
        .await
        .with_context(|| format!("Project directory {} not found", project.display()))?;

    let log_file = prepare_session_log(&project).await;
    init_logging(
        cli.log_level.as_deref().unwrap_or(&config.log_level),
        cli.log_format.as_deref().unwrap_or(&config.log_format),
        log_file.as_deref(),
    )?;
    tracing::info!(project = %project.display(), backend = %config.backend_url, "codeplay starting");

    match cli.command {
        Commands::Build {
            prompt, export, ..
        } => {
            if BuilderSession::session_path(&project).exists() {
                tracing::warn!("replacing the existing session in this project");
            }
            let session = BuilderSession::new(&prompt, config.conflict_policy);
            let backend = backend(&config)?;
            let session = drive(session, &project, |pipeline| {
                Box::pin(async move { run_build(pipeline, &backend, &prompt).await })
            })
            .await?;
            finish(&cli.config, &config, &project, &session, export).await
        }
        Commands::Chat { instructions, .. } => {
            let session = require_session(&project, &config).await?;
            let backend = backend(&config)?;
            let session = drive(session, &project, |pipeline| {
                Box::pin(async move { run_chat(pipeline, &backend, &instructions).await })
            })
            .await?;
            finish(&cli.config, &config, &project, &session, false).await
        }
        Commands::Apply { file, .. } => {
            let artifact = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let session = match BuilderSession::load(&project, config.conflict_policy).await? {
                Some(session) => session,
                None => BuilderSession::new(&file.display().to_string(), config.conflict_policy),
            };
            let session = drive(session, &project, |pipeline| {
                Box::pin(async move { run_apply(pipeline, &artifact).await.map(|_| ()) })
            })
            .await?;
            finish(&cli.config, &config, &project, &session, false).await
        }
        Commands::Export { output, .. } => {
            let session = require_session(&project, &config).await?;
            let dest = output.unwrap_or_else(|| project.join(&config.archive_name));
            let path = export_archive(&session.snapshot(), &dest, archive_options(&config)).await?;
            println!("Exported {}", path.display());
            Ok(())
        }
        Commands::Show { mount, file, .. } => {
            let session = require_session(&project, &config).await?;
            let snapshot = session.snapshot();
            if let Some(path) = file {
                let node = tree::find(snapshot.nodes(), &path)
                    .with_context(|| format!("{path} is not in the project"))?;
                match node.content() {
                    Some(content) => println!("{content}"),
                    None if node.kind() == tree::NodeKind::Folder => bail!("{path} is a folder"),
                    None => {}
                }
            } else if mount {
                let descriptor = projection::project(snapshot.nodes())?;
                println!("{}", serde_json::to_string_pretty(&descriptor)?);
            } else {
                println!("{} (revision {})", session.prompt(), snapshot.revision);
                print!("{}", tree::outline(snapshot.nodes()));
            }
            Ok(())
        }
    }
}

type StepFuture<'a> =
    std::pin::Pin<Box<dyn std::future::Future<Output = crate::error::Result<()>> + 'a>>;

/// Runs one pipeline operation with a console renderer attached and hands the
/// session back. On failure the partial session is saved before the error is
/// returned.
async fn drive<F>(session: BuilderSession, project: &Path, op: F) -> anyhow::Result<BuilderSession>
where
    F: for<'a> FnOnce(&'a mut BuildPipeline) -> StepFuture<'a>,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(render_events(rx));

    let target = Arc::new(DirectoryMount::new(project));
    let mut pipeline = BuildPipeline::new(session, target, tx)?;
    let outcome = op(&mut pipeline).await;
    let previewable = pipeline.is_previewable();
    let session = pipeline.shutdown().await;
    let _ = renderer.await;

    match outcome {
        Ok(()) => {
            if previewable {
                println!("Project is ready in {}", project.display());
            }
            Ok(session)
        }
        Err(e) => {
            if let Err(save_err) = session.save(project).await {
                tracing::warn!("could not save partial session: {save_err}");
            }
            let hint = if e.is_retryable() { " (try again later)" } else { "" };
            Err(anyhow::Error::new(e).context(format!("Build step failed{hint}")))
        }
    }
}

async fn render_events(mut rx: mpsc::UnboundedReceiver<BuildEvent>) {
    while let Some(event) = rx.recv().await {
        let line = match event {
            BuildEvent::RequestStarted { endpoint } => format!("Requesting /{endpoint}..."),
            BuildEvent::StepsReceived { count } => format!("Received {count} steps"),
            BuildEvent::StepWarning {
                step_id,
                path,
                message,
                skipped,
            } => {
                let action = if skipped { "skipped" } else { "coerced" };
                let path = path.unwrap_or_default();
                format!("  step {step_id} {path}: {message} ({action})")
            }
            BuildEvent::BatchApplied {
                applied,
                passed_through,
                revision,
            } => format!("Applied {applied} steps, {passed_through} passed through (revision {revision})"),
            BuildEvent::Mounted { revision } => format!("Mounted revision {revision}"),
            BuildEvent::MountSubmitted { .. } | BuildEvent::Finished => continue,
        };
        println!("{line}");
    }
}

fn backend(config: &CodeplayConfig) -> anyhow::Result<BackendClient> {
    BackendClient::new(
        &config.backend_url,
        config.request_timeout(),
        config.max_response_bytes,
    )
    .context("Failed to create HTTP client")
}

fn archive_options(config: &CodeplayConfig) -> ArchiveOptions {
    ArchiveOptions {
        directory_entries: config.archive_directory_entries,
    }
}

async fn require_session(project: &Path, config: &CodeplayConfig) -> anyhow::Result<BuilderSession> {
    BuilderSession::load(project, config.conflict_policy)
        .await
        .with_context(|| format!("Failed to load session in {}", project.display()))?
        .with_context(|| format!("No project in {}; run `codeplay build` first", project.display()))
}

async fn finish(
    config_path: &Option<PathBuf>,
    config: &CodeplayConfig,
    project: &Path,
    session: &BuilderSession,
    export: bool,
) -> anyhow::Result<()> {
    let saved = session.save(project).await?;
    tracing::debug!(path = %saved.display(), "session saved");

    let entry = ProjectEntry {
        name: project_name(project),
        path: project.to_string_lossy().to_string(),
        created_at: unix_timestamp().to_string(),
    };
    if let Err(e) = save_project(config_path.as_deref(), entry) {
        tracing::warn!("could not record project in config: {e}");
    }

    if export {
        let dest = project.join(&config.archive_name);
        let path = export_archive(&session.snapshot(), &dest, archive_options(config)).await?;
        println!("Exported {}", path.display());
    }
    Ok(())
}
