//! Structural checks for a single workbench.
//!
//! Every check runs regardless of what earlier checks found, and nothing on
//! disk is modified. Malformed JSON anywhere is reported as an issue rather
//! than returned as an error.

use crate::error::Result;
use crate::paths;
use crate::workbench::{RepoContext, Scope};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Hook commands longer than this are shortened in rationale warnings.
pub const COMMAND_PREVIEW_CHARS: usize = 60;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Structure,
    Frontmatter,
    ManifestField,
    HookIntegrity,
    McpServerConfig,
    SkillIntegrity,
    CrossReference,
}

impl Check {
    pub fn as_str(&self) -> &'static str {
        match self {
            Check::Structure => "structure",
            Check::Frontmatter => "frontmatter",
            Check::ManifestField => "manifest_field",
            Check::HookIntegrity => "hook_integrity",
            Check::McpServerConfig => "mcp_server_config",
            Check::SkillIntegrity => "skill_integrity",
            Check::CrossReference => "cross_reference",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub level: Level,
    pub check: Check,
    pub message: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkbenchReport {
    pub path: String,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl WorkbenchReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateAllReport {
    pub fell_back: bool,
    pub workbenches: Vec<WorkbenchReport>,
}

impl ValidateAllReport {
    pub fn error_count(&self) -> usize {
        self.workbenches.iter().map(|w| w.errors.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Validate the workbenches selected by `scope`.
pub fn validate_all(ctx: &RepoContext, scope: Scope, cwd: &Path) -> Result<ValidateAllReport> {
    let target = ctx.resolve_target_workbenches(scope, cwd)?;
    let workbenches = target
        .dirs
        .iter()
        .map(|dir| validate_workbench(dir, ctx.root()))
        .collect();
    Ok(ValidateAllReport {
        fell_back: target.fell_back,
        workbenches,
    })
}

/// Run every structural check against the workbench at `dir`.
pub fn validate_workbench(dir: &Path, root: &Path) -> WorkbenchReport {
    let mut v = Validator {
        dir,
        root,
        report: WorkbenchReport {
            path: paths::display_relative(dir, root),
            errors: Vec::new(),
            warnings: Vec::new(),
        },
    };

    v.check_workbench_manifest();
    let descriptor = v.check_descriptor();
    if let Some(desc) = &descriptor {
        v.check_duplicate_hooks(desc);
        v.check_mcp_servers(desc);
    }
    v.check_skills();
    v.check_hooks(descriptor.as_ref());

    tracing::debug!(
        workbench = %v.report.path,
        errors = v.report.errors.len(),
        warnings = v.report.warnings.len(),
        "validated workbench"
    );
    v.report
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

enum JsonFile {
    Missing,
    Invalid(String),
    Parsed(Value),
}

fn read_json(path: &Path) -> JsonFile {
    if !path.is_file() {
        return JsonFile::Missing;
    }
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) => return JsonFile::Invalid(e.to_string()),
    };
    match serde_json::from_str(&data) {
        Ok(v) => JsonFile::Parsed(v),
        Err(e) => JsonFile::Invalid(e.to_string()),
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn has_value(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).is_some_and(|v| !v.is_null())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}...")
    }
}

static CROSS_REF_RE: OnceLock<Regex> = OnceLock::new();

fn cross_ref_re() -> &'static Regex {
    CROSS_REF_RE.get_or_init(|| Regex::new(r"(?i)\.\./[^)]*workbench").unwrap())
}

enum Frontmatter<'a> {
    Missing,
    Unclosed,
    Block(&'a str),
}

fn split_frontmatter(content: &str) -> Frontmatter<'_> {
    let trim = |l: &str| l.trim_end_matches(['\n', '\r']).to_string();
    let mut lines = content.split_inclusive('\n');
    match lines.next() {
        Some(first) if trim(first) == "---" => {}
        _ => return Frontmatter::Missing,
    }
    let start = content.find('\n').map(|i| i + 1).unwrap_or(content.len());
    let mut offset = start;
    for line in lines {
        if trim(line) == "---" {
            return Frontmatter::Block(&content[start..offset]);
        }
        offset += line.len();
    }
    Frontmatter::Unclosed
}

fn declares_key(block: &str, key: &str) -> bool {
    block.lines().any(|line| {
        !line.starts_with(char::is_whitespace)
            && line
                .split_once(':')
                .is_some_and(|(k, _)| k.trim() == key)
    })
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

struct Validator<'a> {
    dir: &'a Path,
    root: &'a Path,
    report: WorkbenchReport,
}

impl Validator<'_> {
    fn rel(&self, path: &Path) -> String {
        // Collecting components drops interior `.` segments from joined paths.
        let normalized: PathBuf = path.components().collect();
        paths::display_relative(&normalized, self.root)
    }

    fn push(&mut self, level: Level, check: Check, file: &Path, message: String) {
        let issue = ValidationIssue {
            level,
            check,
            message,
            file: self.rel(file),
        };
        match level {
            Level::Error => self.report.errors.push(issue),
            Level::Warning => self.report.warnings.push(issue),
        }
    }

    fn error(&mut self, check: Check, file: &Path, message: String) {
        self.push(Level::Error, check, file, message);
    }

    fn warn(&mut self, check: Check, file: &Path, message: String) {
        self.push(Level::Warning, check, file, message);
    }

    // -- workbench.json ---------------------------------------------------

    fn check_workbench_manifest(&mut self) {
        let path = paths::workbench_manifest(self.dir);
        match read_json(&path) {
            JsonFile::Missing => {}
            JsonFile::Invalid(e) => {
                self.error(Check::Structure, &path, format!("workbench.json is not valid JSON: {e}"))
            }
            JsonFile::Parsed(Value::Object(obj)) => match obj.get("primitives") {
                None | Some(Value::Object(_)) => {}
                Some(other) => self.error(
                    Check::Structure,
                    &path,
                    format!("workbench.json primitives must be an object, found {}", json_type(other)),
                ),
            },
            JsonFile::Parsed(other) => self.error(
                Check::Structure,
                &path,
                format!("workbench.json must be a JSON object, found {}", json_type(&other)),
            ),
        }
    }

    // -- plugin.json ------------------------------------------------------

    fn check_descriptor(&mut self) -> Option<Map<String, Value>> {
        let path = paths::plugin_descriptor(self.dir);
        let desc = match read_json(&path) {
            JsonFile::Missing => {
                self.error(
                    Check::Structure,
                    &path,
                    format!("missing plugin descriptor {}", paths::PLUGIN_DESCRIPTOR),
                );
                return None;
            }
            JsonFile::Invalid(e) => {
                self.error(Check::Structure, &path, format!("plugin.json is not valid JSON: {e}"));
                return None;
            }
            JsonFile::Parsed(Value::Object(obj)) => obj,
            JsonFile::Parsed(other) => {
                self.error(
                    Check::Structure,
                    &path,
                    format!("plugin.json must be a JSON object, found {}", json_type(&other)),
                );
                return None;
            }
        };

        let name = desc
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty());
        if name.is_none() {
            self.error(
                Check::ManifestField,
                &path,
                "plugin.json is missing required field 'name'".to_string(),
            );
        }
        if !has_value(&desc, "description") {
            self.warn(
                Check::ManifestField,
                &path,
                "plugin.json has no 'description'".to_string(),
            );
        }
        Some(desc)
    }

    fn check_duplicate_hooks(&mut self, desc: &Map<String, Value>) {
        let hooks_file = paths::hooks_file(self.dir);
        if has_value(desc, "hooks") && hooks_file.is_file() {
            self.warn(
                Check::HookIntegrity,
                &paths::plugin_descriptor(self.dir),
                format!(
                    "hooks declared in both plugin.json and {}; {} takes precedence",
                    paths::HOOKS_FILE,
                    paths::HOOKS_FILE
                ),
            );
        }
    }

    // -- mcpServers -------------------------------------------------------

    fn check_mcp_servers(&mut self, desc: &Map<String, Value>) {
        let descriptor = paths::plugin_descriptor(self.dir);
        match desc.get("mcpServers") {
            None => {}
            Some(Value::Object(servers)) => self.check_mcp_entries(servers, &descriptor),
            Some(Value::String(rel)) => {
                let path = self.dir.join(rel);
                match read_json(&path) {
                    JsonFile::Missing => self.error(
                        Check::McpServerConfig,
                        &descriptor,
                        format!("mcpServers file not found: {rel}"),
                    ),
                    JsonFile::Invalid(e) => self.error(
                        Check::McpServerConfig,
                        &path,
                        format!("mcpServers file {rel} is not valid JSON: {e}"),
                    ),
                    JsonFile::Parsed(value) => match value.get("mcpServers") {
                        Some(Value::Object(servers)) => self.check_mcp_entries(servers, &path),
                        _ => self.error(
                            Check::McpServerConfig,
                            &path,
                            format!("mcpServers file {rel} is missing an mcpServers object"),
                        ),
                    },
                }
            }
            Some(other) => self.error(
                Check::McpServerConfig,
                &descriptor,
                format!(
                    "mcpServers must be an object or a path string, found {}",
                    json_type(other)
                ),
            ),
        }
    }

    fn check_mcp_entries(&mut self, servers: &Map<String, Value>, file: &Path) {
        for (name, cfg) in servers {
            let Some(cfg) = cfg.as_object() else {
                self.error(
                    Check::McpServerConfig,
                    file,
                    format!("mcpServers.{name} config must be an object"),
                );
                continue;
            };
            match (has_value(cfg, "command"), has_value(cfg, "url")) {
                (true, true) => self.error(
                    Check::McpServerConfig,
                    file,
                    format!("mcpServers.{name} has both command and url; use exactly one transport"),
                ),
                (false, false) => self.error(
                    Check::McpServerConfig,
                    file,
                    format!("mcpServers.{name} needs a command (stdio) or url (http)"),
                ),
                _ => {}
            }
        }
    }

    // -- skills -----------------------------------------------------------

    fn check_skills(&mut self) {
        let skills_dir = paths::skills_dir(self.dir);
        let Ok(entries) = std::fs::read_dir(&skills_dir) else {
            return;
        };
        let mut skills: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.path())
            .collect();
        skills.sort();

        for skill in skills {
            let name = skill
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let doc = skill.join(paths::SKILL_DOC);
            if !doc.is_file() {
                self.error(
                    Check::SkillIntegrity,
                    &skill,
                    format!("skill '{name}' is missing {}", paths::SKILL_DOC),
                );
                continue;
            }
            let content = match std::fs::read_to_string(&doc) {
                Ok(c) => c,
                Err(e) => {
                    self.error(
                        Check::SkillIntegrity,
                        &doc,
                        format!("skill '{name}' {} is unreadable: {e}", paths::SKILL_DOC),
                    );
                    continue;
                }
            };
            self.check_frontmatter(&name, &doc, &content);
            self.check_cross_references(&name, &doc, &content);
        }
    }

    fn check_frontmatter(&mut self, skill: &str, doc: &Path, content: &str) {
        match split_frontmatter(content) {
            Frontmatter::Missing => self.error(
                Check::Frontmatter,
                doc,
                format!("skill '{skill}' is missing frontmatter"),
            ),
            Frontmatter::Unclosed => self.error(
                Check::Frontmatter,
                doc,
                format!("skill '{skill}' has unclosed frontmatter"),
            ),
            Frontmatter::Block(block) => {
                for key in ["name", "description"] {
                    if !declares_key(block, key) {
                        self.error(
                            Check::Frontmatter,
                            doc,
                            format!("skill '{skill}' frontmatter is missing '{key}'"),
                        );
                    }
                }
            }
        }
    }

    fn check_cross_references(&mut self, skill: &str, doc: &Path, content: &str) {
        if cross_ref_re().is_match(content) {
            self.warn(
                Check::CrossReference,
                doc,
                format!(
                    "skill '{skill}' references another workbench by relative path; \
                     this breaks when workbenches are moved or packaged alone"
                ),
            );
        }
    }

    // -- hooks ------------------------------------------------------------

    /// The hook configuration in effect: `hooks/hooks.json` wins over inline hooks.
    fn effective_hooks(&mut self, desc: Option<&Map<String, Value>>) -> Option<(Value, PathBuf)> {
        let hooks_file = paths::hooks_file(self.dir);
        match read_json(&hooks_file) {
            JsonFile::Parsed(v) => return Some((v, hooks_file)),
            JsonFile::Invalid(e) => {
                self.error(
                    Check::HookIntegrity,
                    &hooks_file,
                    format!("{} is not valid JSON: {e}", paths::HOOKS_FILE),
                );
                return None;
            }
            JsonFile::Missing => {}
        }

        let descriptor = paths::plugin_descriptor(self.dir);
        match desc?.get("hooks") {
            None | Some(Value::Null) => None,
            Some(v @ Value::Object(_)) => Some((v.clone(), descriptor)),
            Some(Value::String(rel)) => {
                let path = self.dir.join(rel);
                match read_json(&path) {
                    JsonFile::Parsed(v) => Some((v, path)),
                    JsonFile::Missing => {
                        self.error(
                            Check::HookIntegrity,
                            &descriptor,
                            format!("hooks file not found: {rel}"),
                        );
                        None
                    }
                    JsonFile::Invalid(e) => {
                        self.error(
                            Check::HookIntegrity,
                            &path,
                            format!("hooks file {rel} is not valid JSON: {e}"),
                        );
                        None
                    }
                }
            }
            Some(other) => {
                self.error(
                    Check::HookIntegrity,
                    &descriptor,
                    format!("hooks must be an object or a path string, found {}", json_type(other)),
                );
                None
            }
        }
    }

    fn check_hooks(&mut self, desc: Option<&Map<String, Value>>) {
        let Some((config, file)) = self.effective_hooks(desc) else {
            return;
        };
        // Both `{ "hooks": { <event>: [...] } }` and a bare event map are accepted.
        let wrapped = matches!(config.get("hooks"), Some(Value::Object(_)));
        let events = match config {
            Value::Object(mut obj) if wrapped => match obj.remove("hooks") {
                Some(Value::Object(events)) => events,
                _ => Map::new(),
            },
            Value::Object(events) => events,
            other => {
                self.error(
                    Check::HookIntegrity,
                    &file,
                    format!("hooks config must be an object, found {}", json_type(&other)),
                );
                return;
            }
        };

        for (event, groups) in &events {
            let Some(groups) = groups.as_array() else {
                self.error(
                    Check::HookIntegrity,
                    &file,
                    format!("hooks.{event} must be a list of hook groups"),
                );
                continue;
            };
            for group in groups {
                let Some(hooks) = group.get("hooks").and_then(Value::as_array) else {
                    self.error(
                        Check::HookIntegrity,
                        &file,
                        format!("a hook group in {event} has no hooks list"),
                    );
                    continue;
                };
                for hook in hooks {
                    self.check_hook_entry(event, hook, &file);
                }
            }
        }
    }

    fn check_hook_entry(&mut self, event: &str, hook: &Value, file: &Path) {
        let command = hook.get("command").and_then(Value::as_str);

        if let Some(command) = command {
            if let Some(script) = self.script_path(command) {
                if !script.exists() {
                    self.error(
                        Check::HookIntegrity,
                        file,
                        format!(
                            "{event} hook script not found: {}",
                            self.rel(&script)
                        ),
                    );
                }
            }
        }

        let has_rationale = hook
            .get("rationale")
            .and_then(Value::as_str)
            .is_some_and(|r| !r.trim().is_empty());
        if !has_rationale {
            let label = command
                .or_else(|| hook.get("type").and_then(Value::as_str))
                .unwrap_or("(unnamed hook)");
            self.warn(
                Check::HookIntegrity,
                file,
                format!(
                    "{event} hook has no rationale: {}",
                    truncate(label, COMMAND_PREVIEW_CHARS)
                ),
            );
        }
    }

    /// Filesystem path named by the first token of `command`, if it looks like one.
    fn script_path(&self, command: &str) -> Option<PathBuf> {
        let token = command.split_whitespace().next()?;
        let token = token.trim_matches(|c| c == '"' || c == '\'');
        let dir = self.dir.to_string_lossy();
        let token = token.replace(paths::PLUGIN_ROOT_PLACEHOLDER, &dir);
        if token.starts_with('/') {
            Some(PathBuf::from(token))
        } else if token.starts_with('.') {
            Some(self.dir.join(token))
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
