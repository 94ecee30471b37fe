pub mod path;
pub mod synth;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use path::decompose;
pub use synth::{BatchReport, ConflictPolicy, Resolution, StepWarning, Synthesizer};

/// The two shapes a node can take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => f.write_str("file"),
            NodeKind::Folder => f.write_str("folder"),
        }
    }
}

/// One entry of the project tree.
///
/// `path` is the full slash-delimited path from the root (no leading slash),
/// so a child's path is always `parent.path + "/" + child.name`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileNode {
    File {
        name: String,
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    Folder {
        name: String,
        path: String,
        #[serde(default)]
        children: Vec<FileNode>,
    },
}

impl FileNode {
    pub fn file(name: &str, path: &str, content: Option<String>) -> Self {
        FileNode::File {
            name: name.to_string(),
            path: path.to_string(),
            content,
        }
    }

    pub fn folder(name: &str, path: &str) -> Self {
        FileNode::Folder {
            name: name.to_string(),
            path: path.to_string(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FileNode::File { name, .. } | FileNode::Folder { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileNode::File { path, .. } | FileNode::Folder { path, .. } => path,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            FileNode::File { .. } => NodeKind::File,
            FileNode::Folder { .. } => NodeKind::Folder,
        }
    }

    /// File content, `None` for folders and for files created without content.
    pub fn content(&self) -> Option<&str> {
        match self {
            FileNode::File { content, .. } => content.as_deref(),
            FileNode::Folder { .. } => None,
        }
    }

    pub fn children(&self) -> &[FileNode] {
        match self {
            FileNode::Folder { children, .. } => children,
            FileNode::File { .. } => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<FileNode>> {
        match self {
            FileNode::Folder { children, .. } => Some(children),
            FileNode::File { .. } => None,
        }
    }
}

/// Read-only view of the tree at one revision.
///
/// Snapshots share the node list with the session; the session copies it
/// before mutating while a snapshot is alive.
#[derive(Clone, Debug)]
pub struct TreeSnapshot {
    pub revision: u64,
    pub nodes: Arc<Vec<FileNode>>,
}

impl TreeSnapshot {
    pub fn nodes(&self) -> &[FileNode] {
        &self.nodes
    }
}

/// Looks up a node by its slash-delimited path.
pub fn find<'a>(nodes: &'a [FileNode], path: &str) -> Option<&'a FileNode> {
    let segments = decompose(path);
    let (last, parents) = segments.split_last()?;
    let mut container = nodes;
    for segment in parents {
        let folder = container
            .iter()
            .find(|n| n.name() == segment && n.kind() == NodeKind::Folder)?;
        container = folder.children();
    }
    container.iter().find(|n| n.name() == last)
}

/// Number of file nodes reachable from the root.
pub fn count_files(nodes: &[FileNode]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            FileNode::File { .. } => 1,
            FileNode::Folder { children, .. } => count_files(children),
        })
        .sum()
}

/// Indented text rendering of the tree, folders suffixed with `/`.
pub fn outline(nodes: &[FileNode]) -> String {
    fn walk(nodes: &[FileNode], depth: usize, out: &mut String) {
        for node in nodes {
            out.push_str(&"  ".repeat(depth));
            out.push_str(node.name());
            if node.kind() == NodeKind::Folder {
                out.push('/');
            }
            out.push('\n');
            walk(node.children(), depth + 1, out);
        }
    }

    let mut out = String::new();
    walk(nodes, 0, &mut out);
    out
}
