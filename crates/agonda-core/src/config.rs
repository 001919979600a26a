use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const REPO_ENV: &str = "AGONDA_REGISTRY_REPO";
pub const API_ENV: &str = "AGONDA_REGISTRY_API";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// `owner/name` of the repository whose tags make up the registry.
    #[serde(default = "default_repo")]
    pub repo: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Directory inside the registry tree holding one subdirectory per primitive.
    #[serde(default = "default_primitives_path")]
    pub primitives_path: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_repo() -> String {
    "agonda-dev/primitives".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_primitives_path() -> String {
    "primitives".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            api_url: default_api_url(),
            primitives_path: default_primitives_path(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl Config {
    /// Load `.agonda/config.yaml`, using defaults when the file is absent.
    /// Registry environment overrides are applied on top.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        let mut cfg = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_yaml::from_str::<Config>(&data)?
        } else {
            Config::default()
        };
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(repo) = lookup(REPO_ENV).filter(|v| !v.trim().is_empty()) {
            self.registry.repo = repo;
        }
        if let Some(api) = lookup(API_ENV).filter(|v| !v.trim().is_empty()) {
            self.registry.api_url = api;
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let reg = &self.registry;

        let repo_ok = reg
            .repo
            .split_once('/')
            .map(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'))
            .unwrap_or(false);
        if !repo_ok {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("registry.repo '{}' must be in owner/name form", reg.repo),
            });
        }

        if reg.page_size == 0 || reg.page_size > 100 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "registry.page_size={} is outside the accepted range 1..=100",
                    reg.page_size
                ),
            });
        }

        if reg.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "registry.timeout_secs=0 disables the request timeout".to_string(),
            });
        }

        if reg.primitives_path.trim_matches('/').is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "registry.primitives_path is empty; whole registry tree will be extracted"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_file_missing() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.registry.page_size, 100);
        assert_eq!(cfg.registry.primitives_path, "primitives");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let cfg: Config =
            serde_yaml::from_str("registry:\n  repo: acme/skills\n  page_size: 50\n").unwrap();
        assert_eq!(cfg.registry.repo, "acme/skills");
        assert_eq!(cfg.registry.page_size, 50);
        assert_eq!(cfg.registry.api_url, "https://api.github.com");
    }

    #[test]
    fn load_reads_config_file() {
        let dir = TempDir::new().unwrap();
        let path = paths::config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "registry:\n  timeout_secs: 5\n").unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.registry.timeout_secs, 5);
        assert_eq!(cfg.registry.page_size, 100);
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.registry.primitives_path, "primitives");
    }

    #[test]
    fn env_overrides_replace_registry_location() {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(|key| match key {
            REPO_ENV => Some("acme/prims".to_string()),
            API_ENV => Some("http://127.0.0.1:9".to_string()),
            _ => None,
        });
        assert_eq!(cfg.registry.repo, "acme/prims");
        assert_eq!(cfg.registry.api_url, "http://127.0.0.1:9");
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = Config::default();
        cfg.registry.repo = "no-slash".to_string();
        cfg.registry.page_size = 0;
        cfg.registry.timeout_secs = 0;
        let warnings = cfg.validate();
        assert_eq!(
            warnings.iter().filter(|w| w.level == WarnLevel::Error).count(),
            2
        );
        assert!(warnings.iter().any(|w| w.message.contains("timeout_secs")));
    }
}
