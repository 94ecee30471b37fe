use std::path::{Path, PathBuf};

use crate::error::{BuilderError, Result};
use crate::projection::{self, ArchiveOptions};
use crate::tree::TreeSnapshot;

/// Writes the snapshot as a zip archive at `dest` and returns the path.
///
/// An empty tree is refused: the archive would contain nothing a user could
/// run.
pub async fn export_archive(
    snapshot: &TreeSnapshot,
    dest: &Path,
    options: ArchiveOptions,
) -> Result<PathBuf> {
    if snapshot.nodes().is_empty() {
        return Err(BuilderError::Custom("Nothing to export yet".into()));
    }

    let bytes = projection::to_zip_bytes(snapshot.nodes(), options)?;
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, &bytes).await?;

    tracing::info!(
        path = %dest.display(),
        bytes = bytes.len(),
        revision = snapshot.revision,
        "exported archive"
    );
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::BuilderSession;
    use crate::steps::StepRecord;
    use crate::tree::ConflictPolicy;

    #[tokio::test]
    async fn writes_readable_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = BuilderSession::new("demo", ConflictPolicy::Coerce);
        session.ingest(vec![
            StepRecord::create_file("src/index.tsx", "const x=1"),
            StepRecord::create_file("package.json", "{}"),
        ]);

        let dest = dir.path().join("out").join("project-files.zip");
        let path = export_archive(&session.snapshot(), &dest, ArchiveOptions::default())
            .await
            .unwrap();

        let file = std::fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 2);
        assert!(archive.by_name("src/index.tsx").is_ok());
    }

    #[tokio::test]
    async fn empty_tree_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let session = BuilderSession::new("demo", ConflictPolicy::Coerce);
        let err = export_archive(
            &session.snapshot(),
            &dir.path().join("x.zip"),
            ArchiveOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BuilderError::Custom(_)));
        assert!(!dir.path().join("x.zip").exists());
    }
}
