use agonda_core::workbench::RepoContext;
use agonda_core::AgondaError;
use std::path::{Path, PathBuf};

/// Resolve the repository context.
///
/// Priority:
/// 1. `--root` flag / `AGONDA_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.git/`
pub fn resolve_context(explicit: Option<&Path>) -> anyhow::Result<RepoContext> {
    if let Some(p) = explicit {
        if !p.is_dir() {
            return Err(AgondaError::not_found("repository root", p.display().to_string()).into());
        }
        return Ok(RepoContext::new(p));
    }
    Ok(RepoContext::discover(&cwd())?)
}

pub fn cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
