use std::collections::BTreeSet;
use std::io::{Cursor, Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::Result;
use crate::tree::FileNode;

/// A file to be written into the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Archive-relative path, no leading slash.
    pub path: String,
    pub content: Vec<u8>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveOptions {
    /// Also write explicit directory entries for every parent of a file.
    pub directory_entries: bool,
}

/// Flattens the tree into file entries, depth-first in tree order.
///
/// Folders contribute no entry of their own; a file's path is its parent's
/// path joined with its name.
pub fn entries(nodes: &[FileNode]) -> Vec<ArchiveEntry> {
    fn walk(nodes: &[FileNode], prefix: &str, out: &mut Vec<ArchiveEntry>) {
        for node in nodes {
            let path = format!("{prefix}{}", node.name());
            match node {
                FileNode::File { content, .. } => out.push(ArchiveEntry {
                    path,
                    content: content.clone().unwrap_or_default().into_bytes(),
                }),
                FileNode::Folder { children, .. } => walk(children, &format!("{path}/"), out),
            }
        }
    }

    let mut out = Vec::new();
    walk(nodes, "", &mut out);
    out
}

/// Streams entries into a zip archive and returns the finished writer.
pub fn write_zip<W: Write + Seek>(
    entries: &[ArchiveEntry],
    writer: W,
    options: ArchiveOptions,
) -> Result<W> {
    // Fixed timestamps keep archives of the same tree byte-identical.
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut zip = ZipWriter::new(writer);

    if options.directory_entries {
        let mut directories = BTreeSet::new();
        for entry in entries {
            let mut parts: Vec<&str> = entry.path.split('/').collect();
            parts.pop();
            for depth in 1..=parts.len() {
                directories.insert(format!("{}/", parts[..depth].join("/")));
            }
        }
        let dir_options = file_options.unix_permissions(0o755);
        for directory in directories {
            zip.add_directory(directory, dir_options)?;
        }
    }

    for entry in entries {
        zip.start_file(entry.path.as_str(), file_options)?;
        zip.write_all(&entry.content)?;
    }

    Ok(zip.finish()?)
}

/// Builds the whole archive in memory.
pub fn to_zip_bytes(nodes: &[FileNode], options: ArchiveOptions) -> Result<Vec<u8>> {
    let cursor = write_zip(&entries(nodes), Cursor::new(Vec::new()), options)?;
    Ok(cursor.into_inner())
}
