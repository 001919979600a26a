//! Tag-based primitive registry.
//!
//! Every published primitive version is a git tag named
//! `<primitive>/v<major>.<minor>.<patch>` on the registry repository. The tag
//! listing is fetched once per client and cached; artifact contents come from
//! the tarball of the tagged commit, of which only
//! `<primitives_path>/<primitive>/` is extracted.
//!
//! All network I/O goes through [`TagSource`] so tests can substitute an
//! in-memory source or seed the cache directly.

use crate::config::RegistryConfig;
use crate::error::{AgondaError, Result};
use crate::semver;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

pub const TOKEN_ENV: &str = "AGONDA_REGISTRY_TOKEN";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCommit {
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub commit: TagCommit,
}

impl Tag {
    pub fn new(name: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit: TagCommit { sha: sha.into() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTag {
    pub primitive: String,
    pub version: String,
}

static TAG_RE: OnceLock<Regex> = OnceLock::new();

fn tag_re() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"^(.+)/v(\d+)\.(\d+)\.(\d+)").unwrap())
}

/// Split `<name>/v<M>.<m>.<p>[...]` into its primitive name and `M.m.p`.
pub fn parse_tag(name: &str) -> Option<ParsedTag> {
    let caps = tag_re().captures(name)?;
    Some(ParsedTag {
        primitive: caps[1].to_string(),
        version: format!("{}.{}.{}", &caps[2], &caps[3], &caps[4]),
    })
}

pub fn tag_name(primitive: &str, version: &str) -> String {
    format!("{primitive}/v{}", semver::strip_v(version))
}

// ---------------------------------------------------------------------------
// TagSource
// ---------------------------------------------------------------------------

/// Remote side of the registry.
pub trait TagSource {
    /// One page of the tag listing, 1-based.
    fn list_tags_page(&self, page: u32, per_page: u32) -> Result<Vec<Tag>>;

    /// Gzipped tarball of the tree at `tag`.
    fn fetch_tarball(&self, tag: &Tag) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// TagCache
// ---------------------------------------------------------------------------

/// Tag listing held for the lifetime of a client. Never expires on its own.
#[derive(Debug, Default)]
pub struct TagCache {
    tags: Mutex<Option<Arc<Vec<Tag>>>>,
}

impl TagCache {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<Vec<Tag>>>> {
        self.tags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the cached listing, running `fetch` to populate it on first use.
    /// A failed fetch leaves the cache empty.
    pub fn get_or_fetch(&self, fetch: impl FnOnce() -> Result<Vec<Tag>>) -> Result<Arc<Vec<Tag>>> {
        let mut slot = self.slot();
        if let Some(tags) = slot.as_ref() {
            return Ok(Arc::clone(tags));
        }
        let tags = Arc::new(fetch()?);
        *slot = Some(Arc::clone(&tags));
        Ok(tags)
    }

    pub fn seed(&self, tags: Vec<Tag>) {
        *self.slot() = Some(Arc::new(tags));
    }

    pub fn clear(&self) {
        *self.slot() = None;
    }

    pub fn is_populated(&self) -> bool {
        self.slot().is_some()
    }
}

// ---------------------------------------------------------------------------
// RegistryClient
// ---------------------------------------------------------------------------

pub struct RegistryClient<S = GithubTagSource> {
    source: S,
    cache: TagCache,
    page_size: u32,
    primitives_path: String,
}

impl RegistryClient<GithubTagSource> {
    /// Client for the GitHub-hosted registry described by `cfg`.
    pub fn from_config(cfg: &RegistryConfig) -> Result<Self> {
        let source = GithubTagSource::new(cfg)?.with_token(resolve_token());
        Ok(Self::new(source, cfg))
    }
}

impl<S: TagSource> RegistryClient<S> {
    pub fn new(source: S, cfg: &RegistryConfig) -> Self {
        Self {
            source,
            cache: TagCache::default(),
            page_size: cfg.page_size.max(1),
            primitives_path: cfg.primitives_path.trim_matches('/').to_string(),
        }
    }

    pub fn cache(&self) -> &TagCache {
        &self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The full tag listing, fetched on first call.
    pub fn tags(&self) -> Result<Arc<Vec<Tag>>> {
        self.cache.get_or_fetch(|| self.fetch_all())
    }

    fn fetch_all(&self) -> Result<Vec<Tag>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.source.list_tags_page(page, self.page_size)?;
            let short = batch.len() < self.page_size as usize;
            all.extend(batch);
            if short {
                break;
            }
            page += 1;
        }
        tracing::debug!(tags = all.len(), pages = page, "fetched registry tag listing");
        Ok(all)
    }

    /// Published versions of `primitive`, newest first. Empty when none match.
    ///
    /// Tags with a suffix after the version triple (`a/v1.1.0-rc1`) are left
    /// out: `download` resolves the exact tag `a/v1.1.0`, so only release tags
    /// name an installable version.
    pub fn list_versions(&self, primitive: &str) -> Result<Vec<String>> {
        let tags = self.tags()?;
        let mut versions: Vec<String> = tags
            .iter()
            .filter_map(|t| {
                parse_tag(&t.name).filter(|p| tag_name(&p.primitive, &p.version) == t.name)
            })
            .filter(|p| p.primitive == primitive)
            .map(|p| p.version)
            .collect();
        semver::sort_descending(&mut versions);
        versions.dedup();
        Ok(versions)
    }

    pub fn latest_version(&self, primitive: &str) -> Result<Option<String>> {
        Ok(self.list_versions(primitive)?.into_iter().next())
    }

    /// Extract `primitive` at exactly `version` into `target`.
    ///
    /// Fails with `NotFound` when the tag `primitive/v<version>` is absent,
    /// even if other versions exist. When the tagged tree has no files under
    /// the primitive's path nothing is written and `target` is not created.
    pub fn download(&self, primitive: &str, version: &str, target: &Path) -> Result<()> {
        let wanted = tag_name(primitive, version);
        let tags = self.tags()?;
        let tag = tags.iter().find(|t| t.name == wanted).ok_or_else(|| {
            AgondaError::not_found_with_hint(
                "primitive tag",
                wanted.clone(),
                "the exact version must be published; see `agonda primitives versions`",
            )
        })?;

        let bytes = self.source.fetch_tarball(tag)?;
        let prefix = if self.primitives_path.is_empty() {
            PathBuf::from(primitive)
        } else {
            Path::new(&self.primitives_path).join(primitive)
        };
        let files = extract_subtree(&bytes, &prefix, target)?;
        tracing::debug!(tag = %wanted, files, target = %target.display(), "extracted primitive");
        Ok(())
    }
}

/// Unpack entries under `prefix` (after the archive's top-level directory)
/// into `target`. Returns the number of files written.
fn extract_subtree(bytes: &[u8], prefix: &Path, target: &Path) -> Result<usize> {
    let corrupt = |e: std::io::Error| AgondaError::Network(format!("corrupt registry tarball: {e}"));

    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    let mut files = 0;

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let path = entry.path().map_err(corrupt)?.into_owned();

        // Drop the `<owner>-<repo>-<sha>/` directory GitHub wraps the tree in.
        let inner: PathBuf = path.components().skip(1).collect();
        let Ok(rel) = inner.strip_prefix(prefix) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            tracing::warn!(entry = %path.display(), "skipping tarball entry with unsafe path");
            continue;
        }

        let dest = target.join(rel);
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else if kind.is_file() {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            entry.unpack(&dest)?;
            files += 1;
        } else {
            tracing::debug!(entry = %path.display(), "skipping non-regular tarball entry");
        }
    }
    Ok(files)
}

// ---------------------------------------------------------------------------
// GitHub source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GithubTagSource {
    http: reqwest::blocking::Client,
    api_url: String,
    repo: String,
    token: Option<String>,
}

impl GithubTagSource {
    pub fn new(cfg: &RegistryConfig) -> Result<Self> {
        let timeout = (cfg.timeout_secs > 0).then(|| Duration::from_secs(cfg.timeout_secs));
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("agonda/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| AgondaError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            repo: cfg.repo.clone(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let mut req = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .map_err(|e| AgondaError::Network(format!("GET {url}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AgondaError::Network(format!("GET {url} returned {status}")));
        }
        Ok(resp)
    }
}

impl TagSource for GithubTagSource {
    fn list_tags_page(&self, page: u32, per_page: u32) -> Result<Vec<Tag>> {
        let url = format!(
            "{}/repos/{}/tags?per_page={per_page}&page={page}",
            self.api_url, self.repo
        );
        self.get(&url)?
            .json::<Vec<Tag>>()
            .map_err(|e| AgondaError::Network(format!("unexpected tag listing from {url}: {e}")))
    }

    fn fetch_tarball(&self, tag: &Tag) -> Result<Vec<u8>> {
        let reference = if tag.commit.sha.is_empty() {
            tag.name.as_str()
        } else {
            tag.commit.sha.as_str()
        };
        let url = format!("{}/repos/{}/tarball/{reference}", self.api_url, self.repo);
        let bytes = self
            .get(&url)?
            .bytes()
            .map_err(|e| AgondaError::Network(format!("GET {url}: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// API token from the environment, or from an authenticated `gh` CLI.
fn resolve_token() -> Option<String> {
    for key in [TOKEN_ENV, GITHUB_TOKEN_ENV] {
        if let Ok(v) = std::env::var(key) {
            if !v.trim().is_empty() {
                return Some(v.trim().to_string());
            }
        }
    }
    let gh = which::which("gh").ok()?;
    let output = std::process::Command::new(gh)
        .args(["auth", "token"])
        .stdin(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        tracing::debug!("gh is installed but not authenticated; using anonymous registry access");
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
