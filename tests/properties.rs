//! Properties of synthesis and projection that must hold for any input.

use std::collections::BTreeMap;

use codeplay_lib::projection::{self, ArchiveOptions};
use codeplay_lib::steps::StepRecord;
use codeplay_lib::tree::{self, ConflictPolicy, FileNode, NodeKind};
use codeplay_lib::BuilderSession;
use proptest::prelude::*;

fn arb_segment() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,8}"
}

fn arb_dir() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_segment(), 0..4)
}

/// File names always carry an extension and directories never do, so a
/// generated file can never collide with a generated folder.
fn arb_file_path() -> impl Strategy<Value = String> {
    (arb_dir(), arb_segment(), "[a-z]{1,3}").prop_map(|(dir, stem, ext)| {
        let mut segments = dir;
        segments.push(format!("{stem}.{ext}"));
        segments.join("/")
    })
}

fn arb_files() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(arb_file_path(), "[ -~]{0,24}", 1..12)
}

fn file_paths(nodes: &[FileNode], out: &mut Vec<String>) {
    for node in nodes {
        match node {
            FileNode::File { path, .. } => out.push(path.clone()),
            FileNode::Folder { children, .. } => file_paths(children, out),
        }
    }
}

fn folder_steps(files: &BTreeMap<String, String>) -> Vec<StepRecord> {
    let mut folders: Vec<String> = files
        .keys()
        .filter_map(|p| p.rsplit_once('/').map(|(dir, _)| dir.to_string()))
        .collect();
    folders.dedup();
    folders.iter().map(|f| StepRecord::create_folder(f)).collect()
}

fn file_steps(files: &BTreeMap<String, String>) -> Vec<StepRecord> {
    files
        .iter()
        .map(|(p, c)| StepRecord::create_file(p, c))
        .collect()
}

proptest! {
    #[test]
    fn single_file_is_reachable(path in arb_file_path(), content in "[ -~]{0,32}") {
        let mut session = BuilderSession::new("p", ConflictPolicy::Coerce);
        session.ingest(vec![StepRecord::create_file(&path, &content)]);
        let snapshot = session.snapshot();

        let node = tree::find(snapshot.nodes(), &path).unwrap();
        prop_assert_eq!(node.kind(), NodeKind::File);
        prop_assert_eq!(node.content(), Some(content.as_str()));

        let segments = tree::decompose(&path);
        for depth in 1..segments.len() {
            let ancestor = segments[..depth].join("/");
            prop_assert_eq!(
                tree::find(snapshot.nodes(), &ancestor).map(FileNode::kind),
                Some(NodeKind::Folder)
            );
        }
    }

    #[test]
    fn folder_and_file_order_is_irrelevant(files in arb_files()) {
        let mut folders_first = BuilderSession::new("p", ConflictPolicy::Reject);
        let mut steps = folder_steps(&files);
        steps.extend(file_steps(&files));
        let report = folders_first.ingest(steps);
        prop_assert!(report.warnings.is_empty());

        let mut files_first = BuilderSession::new("p", ConflictPolicy::Reject);
        let mut steps = file_steps(&files);
        steps.extend(folder_steps(&files));
        let report = files_first.ingest(steps);
        prop_assert!(report.warnings.is_empty());

        prop_assert_eq!(
            projection::project(folders_first.snapshot().nodes()).unwrap(),
            projection::project(files_first.snapshot().nodes()).unwrap()
        );
    }

    #[test]
    fn archive_holds_exactly_the_files(files in arb_files()) {
        let mut session = BuilderSession::new("p", ConflictPolicy::Coerce);
        session.ingest(file_steps(&files));
        let snapshot = session.snapshot();

        let entries = projection::entries(snapshot.nodes());
        prop_assert_eq!(entries.len(), tree::count_files(snapshot.nodes()));

        let mut expected = Vec::new();
        file_paths(snapshot.nodes(), &mut expected);
        let actual: Vec<String> = entries.iter().map(|e| e.path.clone()).collect();
        prop_assert_eq!(actual, expected);

        for entry in &entries {
            prop_assert_eq!(entry.content.as_slice(), files[&entry.path].as_bytes());
        }

        let bytes = projection::to_zip_bytes(snapshot.nodes(), ArchiveOptions::default()).unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        prop_assert_eq!(archive.len(), entries.len());
    }

    #[test]
    fn reapplying_a_batch_changes_nothing(files in arb_files()) {
        let mut session = BuilderSession::new("p", ConflictPolicy::Coerce);
        session.ingest(file_steps(&files));
        let first = session.snapshot();

        let again = session.synthesize();
        prop_assert_eq!(again.processed, 0);

        let report = session.ingest(file_steps(&files));
        prop_assert!(!report.changed);
        let current = session.snapshot();
        prop_assert_eq!(current.nodes(), first.nodes());
        prop_assert_eq!(session.revision(), first.revision);
    }

    #[test]
    fn last_write_wins(path in arb_file_path(), a in "[a-z]{1,8}", b in "[A-Z]{1,8}") {
        let mut session = BuilderSession::new("p", ConflictPolicy::Coerce);
        session.ingest(vec![
            StepRecord::create_file(&path, &a),
            StepRecord::create_file(&path, &b),
        ]);
        let snapshot = session.snapshot();
        prop_assert_eq!(tree::count_files(snapshot.nodes()), 1);
        prop_assert_eq!(tree::find(snapshot.nodes(), &path).unwrap().content(), Some(b.as_str()));
    }
}
