use serde::{Deserialize, Serialize};

use super::path::{decompose, join};
use super::{FileNode, NodeKind};
use crate::error::{BuilderError, Result};
use crate::steps::{StepRecord, StepStatus, StepType};

/// What to do when a step needs a folder where a file exists, or vice versa.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Replace the existing node with the expected kind, discarding its
    /// content or children.
    #[default]
    Coerce,
    /// Skip the step and leave the tree untouched.
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Skipped,
    Coerced,
}

/// A per-step problem surfaced to the caller without aborting the batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepWarning {
    pub step_id: u64,
    pub path: Option<String>,
    pub error: BuilderError,
    pub resolution: Resolution,
}

/// Outcome of one synthesis pass.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Pending steps picked up by this pass (all now Completed).
    pub processed: usize,
    /// Create steps whose effect is now in the tree.
    pub applied: usize,
    /// Steps with no tree effect (shell commands, path-less steps, ...).
    pub passed_through: usize,
    pub warnings: Vec<StepWarning>,
    /// Whether the tree differs from before the pass.
    pub changed: bool,
}

/// Effect of a single applied step.
struct StepEffect {
    mutated: bool,
    coerced: Option<BuilderError>,
}

/// Applies pending create-file / create-folder steps to a tree.
#[derive(Clone, Copy, Debug, Default)]
pub struct Synthesizer {
    policy: ConflictPolicy,
}

impl Synthesizer {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Applies every Pending step in arrival order, then marks the whole batch
    /// Completed. Completed steps are ignored, so re-running is a no-op.
    pub fn apply(&self, tree: &mut Vec<FileNode>, steps: &mut [StepRecord]) -> BatchReport {
        let mut report = BatchReport::default();
        let batch: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.is_pending())
            .map(|(index, _)| index)
            .collect();

        for &index in &batch {
            let step = &steps[index];
            report.processed += 1;

            let target = match (step.kind, step.path.as_deref()) {
                (StepType::CreateFile, Some(path)) => Target::File(path, step.content.as_deref()),
                (StepType::CreateFolder, Some(path)) => Target::Folder(path),
                _ => {
                    tracing::debug!(step = step.id, kind = ?step.kind, "step has no tree effect");
                    report.passed_through += 1;
                    continue;
                }
            };

            match self.apply_one(tree, target) {
                Ok(effect) => {
                    report.applied += 1;
                    report.changed |= effect.mutated;
                    if let Some(conflict) = effect.coerced {
                        tracing::warn!(step = step.id, "{conflict}; coerced");
                        report.warnings.push(StepWarning {
                            step_id: step.id,
                            path: step.path.clone(),
                            error: conflict,
                            resolution: Resolution::Coerced,
                        });
                    }
                }
                Err(error) => {
                    tracing::warn!(step = step.id, "{error}; step skipped");
                    report.warnings.push(StepWarning {
                        step_id: step.id,
                        path: step.path.clone(),
                        error,
                        resolution: Resolution::Skipped,
                    });
                }
            }
        }

        for &index in &batch {
            steps[index].status = StepStatus::Completed;
        }
        report
    }

    fn apply_one(&self, tree: &mut Vec<FileNode>, target: Target<'_>) -> Result<StepEffect> {
        let segments = segments_of(target.path())?;

        // Conflicts are found before anything is created, so a rejected step
        // never leaves half-built folders behind.
        let conflict = find_conflict(tree, &segments, target.kind());
        if let Some(conflict) = conflict {
            if self.policy == ConflictPolicy::Reject {
                return Err(conflict);
            }
            return write(tree, &segments, target).map(|mutated| StepEffect {
                mutated,
                coerced: Some(conflict),
            });
        }

        write(tree, &segments, target).map(|mutated| StepEffect {
            mutated,
            coerced: None,
        })
    }
}

#[derive(Clone, Copy)]
enum Target<'a> {
    File(&'a str, Option<&'a str>),
    Folder(&'a str),
}

impl Target<'_> {
    fn path(&self) -> &str {
        match self {
            Target::File(path, _) | Target::Folder(path) => path,
        }
    }

    fn kind(&self) -> NodeKind {
        match self {
            Target::File(..) => NodeKind::File,
            Target::Folder(_) => NodeKind::Folder,
        }
    }
}

fn segments_of(path: &str) -> Result<Vec<String>> {
    let segments = decompose(path);
    if segments.is_empty() || segments.iter().any(|s| s == "." || s == "..") {
        return Err(BuilderError::MalformedPath {
            path: path.to_string(),
        });
    }
    Ok(segments)
}

/// Read-only walk reporting the first node whose kind differs from what the
/// step needs.
fn find_conflict(tree: &[FileNode], segments: &[String], target: NodeKind) -> Option<BuilderError> {
    let (last, parents) = segments.split_last()?;
    let mut container = tree;
    let mut prefix = String::new();

    for segment in parents {
        prefix = join(&prefix, segment);
        let node = container.iter().find(|n| n.name() == segment)?;
        match node {
            FileNode::Folder { children, .. } => container = children,
            FileNode::File { .. } => {
                return Some(BuilderError::PathKindConflict {
                    path: prefix,
                    expected: NodeKind::Folder,
                    found: NodeKind::File,
                })
            }
        }
    }

    let node = container.iter().find(|n| n.name() == last)?;
    (node.kind() != target).then(|| BuilderError::PathKindConflict {
        path: join(&prefix, last),
        expected: target,
        found: node.kind(),
    })
}

/// Walks and creates nodes segment by segment, replacing any node of the wrong
/// kind. Returns whether the tree changed.
fn write(tree: &mut Vec<FileNode>, segments: &[String], target: Target<'_>) -> Result<bool> {
    let Some((last, parents)) = segments.split_last() else {
        return Ok(false);
    };
    let mut container = tree;
    let mut prefix = String::new();
    let mut mutated = false;

    for segment in parents {
        prefix = join(&prefix, segment);
        let index = match container.iter().position(|n| n.name() == segment) {
            Some(index) => {
                if container[index].kind() == NodeKind::File {
                    container[index] = FileNode::folder(segment, &prefix);
                    mutated = true;
                }
                index
            }
            None => {
                container.push(FileNode::folder(segment, &prefix));
                mutated = true;
                container.len() - 1
            }
        };
        container = container[index]
            .children_mut()
            .ok_or_else(|| BuilderError::Custom(format!("{prefix} is not a folder")))?;
    }

    let path = join(&prefix, last);
    let existing = container.iter().position(|n| n.name() == last);

    match (target, existing) {
        (Target::File(_, content), Some(index)) => {
            let replacement = FileNode::file(last, &path, content.map(str::to_string));
            if container[index] != replacement {
                container[index] = replacement;
                mutated = true;
            }
        }
        (Target::File(_, content), None) => {
            container.push(FileNode::file(last, &path, content.map(str::to_string)));
            mutated = true;
        }
        (Target::Folder(_), Some(index)) => {
            if container[index].kind() == NodeKind::File {
                container[index] = FileNode::folder(last, &path);
                mutated = true;
            }
        }
        (Target::Folder(_), None) => {
            container.push(FileNode::folder(last, &path));
            mutated = true;
        }
    }

    Ok(mutated)
}
