/// Splits a slash-delimited path into its segments.
///
/// Empty segments are dropped, so leading, trailing and doubled slashes are
/// harmless. An empty or separator-only path yields no segments.
pub fn decompose(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins a cumulative prefix and a segment the way node paths are built.
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_nested_path() {
        assert_eq!(decompose("src/components/App.tsx"), ["src", "components", "App.tsx"]);
    }

    #[test]
    fn drops_empty_segments() {
        assert_eq!(decompose("/src//index.ts/"), ["src", "index.ts"]);
    }

    #[test]
    fn empty_and_separator_only_paths_have_no_segments() {
        assert!(decompose("").is_empty());
        assert!(decompose("///").is_empty());
    }

    #[test]
    fn join_at_root_has_no_leading_slash() {
        assert_eq!(join("", "package.json"), "package.json");
        assert_eq!(join("src/lib", "util.ts"), "src/lib/util.ts");
    }
}
