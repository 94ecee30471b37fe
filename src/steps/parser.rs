use super::{StepRecord, StepStatus, StepType};

const ARTIFACT_OPEN: &str = "<boltArtifact";
const ARTIFACT_CLOSE: &str = "</boltArtifact>";
const ACTION_OPEN: &str = "<boltAction";
const ACTION_CLOSE: &str = "</boltAction>";

/// Parses the artifact markup returned by the instruction backend into steps.
///
/// Each artifact contributes a title step (a path-less CreateFolder), then one
/// CreateFile per `type="file"` action and one RunScript per `type="shell"`
/// action, in document order. Text without a complete artifact yields nothing.
pub fn parse_artifact(text: &str) -> Vec<StepRecord> {
    let mut steps = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(ARTIFACT_OPEN) {
        let after_open = &rest[start + ARTIFACT_OPEN.len()..];
        let Some(tag_end) = after_open.find('>') else {
            break;
        };
        let tag = &after_open[..tag_end];
        let body_and_rest = &after_open[tag_end + 1..];
        let Some(body_end) = body_and_rest.find(ARTIFACT_CLOSE) else {
            break;
        };
        let body = &body_and_rest[..body_end];

        let title = attribute(tag, "title").unwrap_or("Project Files");
        steps.push(StepRecord {
            id: 0,
            title: title.to_string(),
            kind: StepType::CreateFolder,
            status: StepStatus::Pending,
            path: None,
            content: None,
        });
        parse_actions(body, &mut steps);

        rest = &body_and_rest[body_end + ARTIFACT_CLOSE.len()..];
    }

    for (index, step) in steps.iter_mut().enumerate() {
        step.id = index as u64 + 1;
    }
    steps
}

fn parse_actions(body: &str, steps: &mut Vec<StepRecord>) {
    let mut rest = body;
    while let Some(start) = rest.find(ACTION_OPEN) {
        let after_open = &rest[start + ACTION_OPEN.len()..];
        let Some(tag_end) = after_open.find('>') else {
            return;
        };
        let tag = &after_open[..tag_end];
        let content_and_rest = &after_open[tag_end + 1..];
        let Some(content_end) = content_and_rest.find(ACTION_CLOSE) else {
            return;
        };
        let content = content_and_rest[..content_end].trim();

        match attribute(tag, "type") {
            Some("file") => {
                let path = attribute(tag, "filePath");
                steps.push(StepRecord {
                    id: 0,
                    title: format!("Create {}", path.unwrap_or("file")),
                    kind: StepType::CreateFile,
                    status: StepStatus::Pending,
                    path: path.map(str::to_string),
                    content: Some(content.to_string()),
                });
            }
            Some("shell") => steps.push(StepRecord::run_script(content)),
            other => tracing::debug!(action = ?other, "ignoring unknown artifact action"),
        }

        rest = &content_and_rest[content_end + ACTION_CLOSE.len()..];
    }
}

/// Value of `name="..."` inside an opening tag.
fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=\"");
    let mut search = tag;
    while let Some(pos) = search.find(&needle) {
        let at_boundary = pos == 0 || search[..pos].ends_with(char::is_whitespace);
        let value = &search[pos + needle.len()..];
        if at_boundary {
            let end = value.find('"')?;
            return Some(&value[..end]);
        }
        search = value;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"Here is your project.
<boltArtifact id="project-import" title="Todo App">
<boltAction type="file" filePath="package.json">
{"name": "todo"}
</boltAction>
<boltAction type="file" filePath="src/App.tsx">
export default function App() { return <div>hi</div>; }
</boltAction>
<boltAction type="shell">
npm install
</boltAction>
</boltArtifact>
Enjoy!"#;

    #[test]
    fn parses_title_files_and_shell_actions() {
        let steps = parse_artifact(RESPONSE);
        assert_eq!(steps.len(), 4);

        assert_eq!(steps[0].kind, StepType::CreateFolder);
        assert_eq!(steps[0].title, "Todo App");
        assert_eq!(steps[0].path, None);

        assert_eq!(steps[1].kind, StepType::CreateFile);
        assert_eq!(steps[1].path.as_deref(), Some("package.json"));
        assert_eq!(steps[1].content.as_deref(), Some(r#"{"name": "todo"}"#));

        assert_eq!(steps[2].path.as_deref(), Some("src/App.tsx"));
        assert_eq!(
            steps[2].content.as_deref(),
            Some("export default function App() { return <div>hi</div>; }")
        );

        assert_eq!(steps[3].kind, StepType::RunScript);
        assert_eq!(steps[3].content.as_deref(), Some("npm install"));

        assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
        let ids: Vec<u64> = steps.iter().map(|s| s.id).collect();
        assert_eq!(ids, [1, 2, 3, 4]);
    }

    #[test]
    fn text_without_artifact_has_no_steps() {
        assert!(parse_artifact("Sorry, I can't help with that.").is_empty());
        assert!(parse_artifact("<boltArtifact title=\"cut off\"><boltAction").is_empty());
    }

    #[test]
    fn attribute_requires_word_boundary() {
        let tag = r#" type="file" filePath="src/a.ts""#;
        assert_eq!(attribute(tag, "filePath"), Some("src/a.ts"));
        assert_eq!(attribute(tag, "Path"), None);
        assert_eq!(attribute(tag, "type"), Some("file"));
    }
}
