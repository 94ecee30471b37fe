use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{BuilderError, Result};
use crate::tree::path::join;
use crate::tree::FileNode;

/// One nested entry of a mount descriptor.
///
/// Serializes as `{"file": {"contents": ...}}` or `{"directory": {...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountEntry {
    File { contents: String },
    Directory(BTreeMap<String, MountEntry>),
}

/// Root manifest handed to the sandbox runtime: one named field per
/// top-level node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountDescriptor(pub BTreeMap<String, MountEntry>);

impl MountDescriptor {
    pub fn get(&self, name: &str) -> Option<&MountEntry> {
        self.0.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &MountEntry)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Projects the tree into the runtime's mount format.
///
/// Root nodes become fields of the manifest; everything below is wrapped in
/// `directory` / `file` entries. A structurally corrupt node fails the whole
/// projection rather than being dropped.
pub fn project(nodes: &[FileNode]) -> Result<MountDescriptor> {
    let mut manifest = BTreeMap::new();
    for node in nodes {
        check_node(node, "")?;
        let entry = project_entry(node)?;
        if manifest.insert(node.name().to_string(), entry).is_some() {
            return Err(duplicate(node));
        }
    }
    Ok(MountDescriptor(manifest))
}

fn project_entry(node: &FileNode) -> Result<MountEntry> {
    match node {
        FileNode::File { content, .. } => Ok(MountEntry::File {
            contents: content.clone().unwrap_or_default(),
        }),
        FileNode::Folder { path, children, .. } => {
            let mut directory = BTreeMap::new();
            for child in children {
                check_node(child, path)?;
                let entry = project_entry(child)?;
                if directory.insert(child.name().to_string(), entry).is_some() {
                    return Err(duplicate(child));
                }
            }
            Ok(MountEntry::Directory(directory))
        }
    }
}

fn check_node(node: &FileNode, parent_path: &str) -> Result<()> {
    let name = node.name();
    if name.is_empty() || name.contains('/') {
        return Err(BuilderError::MalformedNode {
            path: node.path().to_string(),
            reason: format!("invalid node name {name:?}"),
        });
    }
    let expected = join(parent_path, name);
    if node.path() != expected {
        return Err(BuilderError::MalformedNode {
            path: node.path().to_string(),
            reason: format!("path does not match its position, expected {expected:?}"),
        });
    }
    Ok(())
}

fn duplicate(node: &FileNode) -> BuilderError {
    BuilderError::MalformedNode {
        path: node.path().to_string(),
        reason: "duplicate sibling name".to_string(),
    }
}
