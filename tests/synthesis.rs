//! End-to-end checks of the session: steps in, tree and projections out.

use codeplay_lib::projection::{self, ArchiveOptions, MountEntry};
use codeplay_lib::steps::{parse_artifact, StepRecord, StepStatus};
use codeplay_lib::tree::{self, ConflictPolicy, FileNode, NodeKind, Resolution};
use codeplay_lib::{BuilderError, BuilderSession};
use serde_json::json;

#[test]
fn scenario_builds_expected_tree_and_mount() {
    let mut session = BuilderSession::new("demo", ConflictPolicy::Coerce);
    let report = session.ingest(vec![
        StepRecord::create_folder("src"),
        StepRecord::create_file("src/index.tsx", "const x=1"),
        StepRecord::create_file("package.json", "{}"),
    ]);
    assert!(report.warnings.is_empty());
    assert_eq!(report.applied, 3);

    let snapshot = session.snapshot();
    let nodes = snapshot.nodes();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].kind(), NodeKind::Folder);
    assert_eq!(nodes[0].name(), "src");
    assert_eq!(nodes[0].children().len(), 1);
    assert_eq!(nodes[0].children()[0].content(), Some("const x=1"));
    assert_eq!(nodes[1], FileNode::file("package.json", "package.json", Some("{}".into())));

    let descriptor = projection::project(nodes).unwrap();
    assert_eq!(
        serde_json::to_value(&descriptor).unwrap(),
        json!({
            "src": { "directory": { "index.tsx": { "file": { "contents": "const x=1" } } } },
            "package.json": { "file": { "contents": "{}" } }
        })
    );
}

#[test]
fn mount_shape_for_root_file_and_nested_file() {
    let mut session = BuilderSession::new("demo", ConflictPolicy::Coerce);
    session.ingest(vec![
        StepRecord::create_file("index.html", "<h1>hi</h1>"),
        StepRecord::create_file("src/app.js", "run()"),
    ]);

    let descriptor = projection::project(session.snapshot().nodes()).unwrap();
    assert_eq!(
        descriptor.get("index.html"),
        Some(&MountEntry::File {
            contents: "<h1>hi</h1>".into()
        })
    );
    match descriptor.get("src") {
        Some(MountEntry::Directory(children)) => assert_eq!(
            children.get("app.js"),
            Some(&MountEntry::File {
                contents: "run()".into()
            })
        ),
        other => panic!("expected directory, got {other:?}"),
    }
}

#[test]
fn parsed_artifact_flows_into_archive() {
    let artifact = r#"Here you go.
<boltArtifact id="todo" title="Todo App">
  <boltAction type="file" filePath="package.json">{"name":"todo"}</boltAction>
  <boltAction type="file" filePath="src/App.tsx">
export default function App() {}
  </boltAction>
  <boltAction type="shell">npm install</boltAction>
</boltArtifact>"#;

    let mut session = BuilderSession::new("todo", ConflictPolicy::Coerce);
    let report = session.ingest(parse_artifact(artifact));
    assert_eq!(report.applied, 2);
    assert!(session
        .steps()
        .records()
        .iter()
        .all(|r| r.status == StepStatus::Completed));

    let bytes = projection::to_zip_bytes(session.snapshot().nodes(), ArchiveOptions::default())
        .unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, ["package.json", "src/App.tsx"]);

    let mut app = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("src/App.tsx").unwrap(), &mut app).unwrap();
    assert_eq!(app, "export default function App() {}");
}

#[test]
fn reject_policy_reports_conflict_and_keeps_tree() {
    let mut session = BuilderSession::new("demo", ConflictPolicy::Reject);
    session.ingest(vec![StepRecord::create_file("src", "not a folder")]);
    let before = session.snapshot();

    let report = session.ingest(vec![StepRecord::create_file("src/main.rs", "fn main() {}")]);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].resolution, Resolution::Skipped);
    assert!(matches!(
        report.warnings[0].error,
        BuilderError::PathKindConflict { .. }
    ));
    assert_eq!(session.snapshot().nodes(), before.nodes());
    assert_eq!(session.revision(), before.revision);
}

#[test]
fn malformed_paths_are_skipped() {
    let mut session = BuilderSession::new("demo", ConflictPolicy::Coerce);
    let report = session.ingest(vec![
        StepRecord::create_file("///", "x"),
        StepRecord::create_file("a/../b", "x"),
        StepRecord::create_file("ok.txt", "fine"),
    ]);
    assert_eq!(report.warnings.len(), 2);
    assert!(report
        .warnings
        .iter()
        .all(|w| matches!(w.error, BuilderError::MalformedPath { .. })));
    assert_eq!(tree::count_files(session.snapshot().nodes()), 1);
}
