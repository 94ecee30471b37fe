use std::path::Path;

/// Replaces a leading `~` with the home directory. Other paths, and `~user`
/// forms, come back unchanged.
pub fn expand_tilde(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => rest,
        _ => return path.to_string(),
    };
    let Some(home) = dirs::home_dir() else {
        return path.to_string();
    };
    let rest = rest.trim_start_matches(['/', '\\']);
    // `join("")` would leave a trailing separator behind.
    let expanded = if rest.is_empty() { home } else { home.join(rest) };
    expanded.to_string_lossy().to_string()
}

/// Name shown for a project: its directory's last component.
pub fn project_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string())
}
