use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File and directory names
// ---------------------------------------------------------------------------

pub const GIT_DIR: &str = ".git";
pub const CONFIG_FILE: &str = ".agonda/config.yaml";

pub const WORKBENCH_MANIFEST: &str = "workbench.json";
pub const PLUGIN_DESCRIPTOR: &str = ".claude-plugin/plugin.json";
pub const MARKETPLACE_MANIFEST: &str = ".claude-plugin/marketplace.json";
pub const HOOKS_FILE: &str = "hooks/hooks.json";
pub const SKILLS_DIR: &str = "skills";
pub const SKILL_DOC: &str = "SKILL.md";
pub const VERSION_MARKER: &str = ".primitive-version";

/// Token in hook commands that expands to the workbench directory.
pub const PLUGIN_ROOT_PLACEHOLDER: &str = "${CLAUDE_PLUGIN_ROOT}";

/// Directory names never descended into during workbench discovery.
pub const SKIPPED_DIRS: &[&str] = &["node_modules", "target"];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn marketplace_path(root: &Path) -> PathBuf {
    root.join(MARKETPLACE_MANIFEST)
}

pub fn workbench_manifest(dir: &Path) -> PathBuf {
    dir.join(WORKBENCH_MANIFEST)
}

pub fn plugin_descriptor(dir: &Path) -> PathBuf {
    dir.join(PLUGIN_DESCRIPTOR)
}

pub fn hooks_file(dir: &Path) -> PathBuf {
    dir.join(HOOKS_FILE)
}

pub fn skills_dir(dir: &Path) -> PathBuf {
    dir.join(SKILLS_DIR)
}

pub fn primitive_dir(workbench_dir: &Path, primitive: &str) -> PathBuf {
    skills_dir(workbench_dir).join(primitive)
}

pub fn version_marker(workbench_dir: &Path, primitive: &str) -> PathBuf {
    primitive_dir(workbench_dir, primitive).join(VERSION_MARKER)
}

/// Render `path` relative to `root` for reports, falling back to the full path.
pub fn display_relative(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let wb = Path::new("/repo/workbenches/design");
        assert_eq!(
            plugin_descriptor(wb),
            PathBuf::from("/repo/workbenches/design/.claude-plugin/plugin.json")
        );
        assert_eq!(
            version_marker(wb, "visual-explainer"),
            PathBuf::from("/repo/workbenches/design/skills/visual-explainer/.primitive-version")
        );
        assert_eq!(
            marketplace_path(Path::new("/repo")),
            PathBuf::from("/repo/.claude-plugin/marketplace.json")
        );
    }

    #[test]
    fn relative_display() {
        let root = Path::new("/repo");
        assert_eq!(display_relative(Path::new("/repo/a/b"), root), "a/b");
        assert_eq!(display_relative(Path::new("/repo"), root), ".");
        assert_eq!(display_relative(Path::new("/elsewhere"), root), "/elsewhere");
    }
}
