use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::error::{BuilderError, Result};
use crate::projection::{MountDescriptor, MountEntry};
use crate::session::SESSION_DIR;

const SERVICE: &str = "sandbox runtime";

/// The sandbox runtime's mount capability.
#[async_trait]
pub trait MountTarget: Send + Sync {
    async fn mount(&self, descriptor: &MountDescriptor) -> Result<()>;
}

// ── Directory target ────────────────────────────────────────────────────────

/// Materializes descriptors as real files under a root directory, so a local
/// dev server can run the project.
///
/// Mounting overlays: files missing from the descriptor are left in place,
/// but an entry whose kind changed replaces what is on disk. The session
/// directory at the root is never written.
pub struct DirectoryMount {
    root: PathBuf,
}

impl DirectoryMount {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl MountTarget for DirectoryMount {
    async fn mount(&self, descriptor: &MountDescriptor) -> Result<()> {
        let root = self.root.clone();
        let descriptor = descriptor.clone();
        // Plain std::fs recursion is simplest; keep it off the async workers.
        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&root)?;
            for (name, entry) in descriptor.entries() {
                if name == SESSION_DIR {
                    tracing::warn!("not mounting reserved entry {name}");
                    continue;
                }
                write_entry(&root, name, entry)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| BuilderError::upstream(SERVICE, format!("mount task failed: {e}")))?
    }
}

fn write_entry(dir: &Path, name: &str, entry: &MountEntry) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(BuilderError::MalformedNode {
            path: name.to_string(),
            reason: "name would escape the mount root".into(),
        });
    }
    let path = dir.join(name);
    let existing = std::fs::symlink_metadata(&path).ok().map(|m| m.file_type());
    match entry {
        MountEntry::File { contents } => {
            match existing {
                Some(kind) if kind.is_dir() => std::fs::remove_dir_all(&path)?,
                Some(kind) if kind.is_symlink() => std::fs::remove_file(&path)?,
                _ => {}
            }
            std::fs::write(&path, contents)?;
        }
        MountEntry::Directory(children) => {
            if existing.is_some_and(|kind| !kind.is_dir()) {
                std::fs::remove_file(&path)?;
            }
            std::fs::create_dir_all(&path)?;
            for (child, entry) in children {
                write_entry(&path, child, entry)?;
            }
        }
    }
    Ok(())
}

// ── Mount worker ────────────────────────────────────────────────────────────

#[derive(Clone)]
struct MountRequest {
    revision: u64,
    descriptor: Arc<MountDescriptor>,
}

/// Result of the most recent mount the worker finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountAck {
    pub revision: u64,
    pub outcome: std::result::Result<(), MountFailure>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountFailure {
    pub message: String,
    /// False for local failures that repeating the mount will not clear.
    pub retryable: bool,
}

impl MountFailure {
    fn into_error(self) -> BuilderError {
        if self.retryable {
            BuilderError::upstream(SERVICE, self.message)
        } else {
            BuilderError::Custom(format!("Mount failed: {}", self.message))
        }
    }
}

/// Delivers descriptors to a `MountTarget` one at a time.
///
/// Submissions go through a watch channel, so while a mount is in flight only
/// the newest pending descriptor survives; superseded ones are never
/// delivered.
pub struct MountWorker {
    requests: watch::Sender<Option<MountRequest>>,
    acks: watch::Receiver<MountAck>,
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    previewable: Arc<AtomicBool>,
}

impl MountWorker {
    /// Spawns the delivery task on the current tokio runtime.
    pub fn spawn(target: Arc<dyn MountTarget>) -> Self {
        let (requests, mut incoming) = watch::channel(None::<MountRequest>);
        let (ack_tx, acks) = watch::channel(MountAck {
            revision: 0,
            outcome: Ok(()),
        });
        let previewable = Arc::new(AtomicBool::new(false));
        let flag = previewable.clone();

        let handle = tokio::spawn(async move {
            while incoming.changed().await.is_ok() {
                let request = incoming.borrow_and_update().clone();
                let Some(request) = request else {
                    continue;
                };

                let outcome = target.mount(&request.descriptor).await;
                match &outcome {
                    Ok(()) => {
                        flag.store(true, Ordering::SeqCst);
                        tracing::info!(revision = request.revision, "project mounted");
                    }
                    Err(e) => {
                        tracing::warn!(revision = request.revision, "mount failed: {e}");
                    }
                }
                ack_tx.send_replace(MountAck {
                    revision: request.revision,
                    outcome: outcome.map_err(|e| MountFailure {
                        message: e.to_string(),
                        retryable: e.is_retryable(),
                    }),
                });
            }
        });

        Self {
            requests,
            acks,
            handle: Arc::new(Mutex::new(Some(handle))),
            previewable,
        }
    }

    /// Queues a descriptor, replacing any not yet delivered.
    pub fn submit(&self, revision: u64, descriptor: MountDescriptor) {
        self.requests.send_replace(Some(MountRequest {
            revision,
            descriptor: Arc::new(descriptor),
        }));
    }

    /// Waits until a mount at or beyond `revision` has finished and returns
    /// its outcome.
    pub async fn wait_for(&self, revision: u64) -> Result<()> {
        let mut acks = self.acks.clone();
        loop {
            {
                let ack = acks.borrow_and_update();
                if ack.revision >= revision {
                    return ack.outcome.clone().map_err(MountFailure::into_error);
                }
            }
            acks.changed()
                .await
                .map_err(|_| BuilderError::upstream(SERVICE, "mount worker stopped"))?;
        }
    }

    /// Most recent acknowledgment.
    pub fn last_ack(&self) -> MountAck {
        self.acks.borrow().clone()
    }

    /// True once any mount has succeeded.
    pub fn is_previewable(&self) -> bool {
        self.previewable.load(Ordering::SeqCst)
    }

    /// Abort the delivery task asynchronously.
    pub async fn stop(&self) {
        let mut guard = self.handle.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }

    /// Abort the delivery task synchronously (for drop paths).
    pub fn kill_sync(&self) {
        if let Ok(mut guard) = self.handle.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for MountWorker {
    fn drop(&mut self) {
        self.kill_sync();
    }
}
