//! Repository root and workbench resolution.
//!
//! A workbench is any directory holding a `workbench.json` manifest. The
//! manifest carries primitive pins; every other key in it is preserved when
//! the pins are rewritten.

use crate::error::{AgondaError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbenchManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Primitive name → pinned version (`v<semver>`).
    #[serde(default)]
    pub primitives: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct Workbench {
    pub name: String,
    pub dir: PathBuf,
    pub manifest: WorkbenchManifest,
}

impl Workbench {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = paths::workbench_manifest(dir);
        if !path.is_file() {
            return Err(AgondaError::not_found("workbench manifest", path.display().to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let manifest: WorkbenchManifest = serde_json::from_str(&data)?;
        let name = manifest
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| dir.display().to_string());
        Ok(Self {
            name,
            dir: dir.to_path_buf(),
            manifest,
        })
    }

    pub fn manifest_path(&self) -> PathBuf {
        paths::workbench_manifest(&self.dir)
    }

    /// Rewrite `workbench.json` (pretty-printed, trailing newline).
    pub fn save_manifest(&self) -> Result<()> {
        crate::io::write_json_pretty(&self.manifest_path(), &self.manifest)
    }

    pub fn pin(&self, primitive: &str) -> Option<&str> {
        self.manifest.primitives.get(primitive).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Scope / target resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every workbench in the repository.
    All,
    /// The workbench containing the working directory.
    Current,
}

#[derive(Debug, Clone)]
pub struct TargetResolution {
    pub dirs: Vec<PathBuf>,
    /// `Current` was requested but the working directory is outside every
    /// workbench, so all workbenches were selected instead.
    pub fell_back: bool,
}

// ---------------------------------------------------------------------------
// RepoContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RepoContext {
    root: PathBuf,
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl RepoContext {
    /// Use `root` as the repository root without searching.
    pub fn new(root: &Path) -> Self {
        Self {
            root: canonical(root),
        }
    }

    /// Walk upward from `start` to the nearest directory containing `.git`.
    pub fn discover(start: &Path) -> Result<Self> {
        let start = canonical(start);
        start
            .ancestors()
            .find(|dir| dir.join(paths::GIT_DIR).exists())
            .map(Self::new)
            .ok_or_else(|| {
                AgondaError::not_found_with_hint(
                    "repository root",
                    start.display().to_string(),
                    "run inside a git repository or pass --root",
                )
            })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All workbench directories under the root, sorted by path.
    pub fn workbench_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        collect_workbench_dirs(&self.root, &mut found)?;
        found.sort();
        Ok(found)
    }

    /// Load every discovered workbench. Unreadable manifests are logged and skipped.
    pub fn workbenches(&self) -> Result<Vec<Workbench>> {
        Ok(load_all(&self.workbench_dirs()?))
    }

    /// The innermost workbench directory containing `path`, not looking above the root.
    pub fn workbench_containing(&self, path: &Path) -> Option<PathBuf> {
        let path = canonical(path);
        if !path.starts_with(&self.root) {
            return None;
        }
        path.ancestors()
            .take_while(|dir| dir.starts_with(&self.root))
            .find(|dir| paths::workbench_manifest(dir).is_file())
            .map(Path::to_path_buf)
    }

    /// Resolve one workbench from an optional selector (path or name) or `cwd`.
    pub fn resolve_workbench(&self, selector: Option<&str>, cwd: &Path) -> Result<Workbench> {
        let Some(sel) = selector else {
            let dir = self.workbench_containing(cwd).ok_or_else(|| {
                AgondaError::not_found_with_hint(
                    "workbench",
                    cwd.display().to_string(),
                    "run inside a workbench or pass --workbench",
                )
            })?;
            return Workbench::load(&dir);
        };

        let as_path = if Path::new(sel).is_absolute() {
            PathBuf::from(sel)
        } else {
            cwd.join(sel)
        };
        if as_path.exists() {
            if let Some(dir) = self.workbench_containing(&as_path) {
                return Workbench::load(&dir);
            }
        }

        self.workbenches()?
            .into_iter()
            .find(|wb| wb.name == sel)
            .ok_or_else(|| {
                AgondaError::not_found_with_hint(
                    "workbench",
                    sel,
                    "pass a workbench name or a path inside one",
                )
            })
    }

    /// Pick the workbenches an operation should act on.
    pub fn resolve_target_workbenches(&self, scope: Scope, cwd: &Path) -> Result<TargetResolution> {
        if scope == Scope::Current {
            if let Some(dir) = self.workbench_containing(cwd) {
                return Ok(TargetResolution {
                    dirs: vec![dir],
                    fell_back: false,
                });
            }
            tracing::debug!(cwd = %cwd.display(), "not inside a workbench, using all workbenches");
        }
        Ok(TargetResolution {
            dirs: self.workbench_dirs()?,
            fell_back: scope == Scope::Current,
        })
    }
}

/// Load each directory's manifest, skipping (with a warning) any that fail.
pub fn load_all(dirs: &[PathBuf]) -> Vec<Workbench> {
    dirs.iter()
        .filter_map(|dir| match Workbench::load(dir) {
            Ok(wb) => Some(wb),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable workbench manifest");
                None
            }
        })
        .collect()
}

fn collect_workbench_dirs(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    if paths::workbench_manifest(dir).is_file() {
        found.push(dir.to_path_buf());
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || paths::SKIPPED_DIRS.contains(&name.as_ref()) {
            continue;
        }
        collect_workbench_dirs(&entry.path(), found)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
