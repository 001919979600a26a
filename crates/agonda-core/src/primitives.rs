//! Primitive pin status, installation and updates.
//!
//! A workbench pins primitives in `workbench.json`. Installed copies live in
//! `skills/<primitive>/` next to a `.primitive-version` marker holding the
//! installed semver; the marker is what makes installs idempotent.
//!
//! Per-primitive failures never abort a batch: registry errors become
//! `UNKNOWN` statuses and download errors become `failed` actions.

use crate::error::{AgondaError, Result};
use crate::io;
use crate::paths;
use crate::registry::{RegistryClient, TagSource};
use crate::semver;
use crate::workbench::{self, RepoContext, Scope, Workbench};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

pub const UNKNOWN_VERSION: &str = "unknown";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Current,
    Behind,
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Current => "CURRENT",
            Status::Behind => "BEHIND",
            Status::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimitiveStatus {
    pub name: String,
    pub pinned: String,
    pub latest: String,
    pub status: Status,
}

pub fn classify(pinned: &str, latest: Option<&str>) -> Status {
    match latest {
        None => Status::Unknown,
        Some(latest) if semver::compare(pinned, latest) != Ordering::Less => Status::Current,
        Some(_) => Status::Behind,
    }
}

/// Latest-version lookups for one batch of pins.
///
/// A failed tag listing is not cached by the client, so every lookup would
/// refetch (and wait out the timeout) again. After the first failure the rest
/// of the batch reports the same error without touching the registry.
struct LatestLookup<'a, S> {
    client: &'a RegistryClient<S>,
    failure: Option<String>,
}

impl<'a, S: TagSource> LatestLookup<'a, S> {
    fn new(client: &'a RegistryClient<S>) -> Self {
        Self {
            client,
            failure: None,
        }
    }

    fn latest(&mut self, primitive: &str) -> std::result::Result<Option<String>, String> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        self.client.latest_version(primitive).map_err(|e| {
            let message = e.to_string();
            self.failure = Some(message.clone());
            message
        })
    }
}

/// Status of every pin in `wb`, in pin-name order.
pub fn check_workbench_primitives<S: TagSource>(
    client: &RegistryClient<S>,
    wb: &Workbench,
) -> Vec<PrimitiveStatus> {
    check_pins(&mut LatestLookup::new(client), wb)
}

fn check_pins<S: TagSource>(lookup: &mut LatestLookup<'_, S>, wb: &Workbench) -> Vec<PrimitiveStatus> {
    wb.manifest
        .primitives
        .iter()
        .map(|(name, pin)| {
            let pinned = semver::strip_v(pin).to_string();
            let latest = match lookup.latest(name) {
                Ok(latest) => latest,
                Err(e) => {
                    tracing::warn!(primitive = %name, error = %e, "could not resolve latest version");
                    None
                }
            };
            PrimitiveStatus {
                name: name.clone(),
                status: classify(&pinned, latest.as_deref()),
                latest: latest.unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
                pinned,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// check_all
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct WorkbenchPrimitives {
    pub workbench: String,
    pub path: String,
    pub primitives: Vec<PrimitiveStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub current: usize,
    pub behind: usize,
    pub unknown: usize,
}

impl Summary {
    fn add(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Current => self.current += 1,
            Status::Behind => self.behind += 1,
            Status::Unknown => self.unknown += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub fell_back: bool,
    pub workbenches: Vec<WorkbenchPrimitives>,
    pub summary: Summary,
}

/// Check pins across the workbenches selected by `scope`.
/// Workbenches without pins are left out of both the list and the counts.
pub fn check_all<S: TagSource>(
    client: &RegistryClient<S>,
    ctx: &RepoContext,
    scope: Scope,
    cwd: &Path,
) -> Result<CheckReport> {
    let target = ctx.resolve_target_workbenches(scope, cwd)?;
    let mut summary = Summary::default();
    let mut workbenches = Vec::new();
    let mut lookup = LatestLookup::new(client);

    for wb in workbench::load_all(&target.dirs) {
        if wb.manifest.primitives.is_empty() {
            continue;
        }
        let primitives = check_pins(&mut lookup, &wb);
        for p in &primitives {
            summary.add(p.status);
        }
        workbenches.push(WorkbenchPrimitives {
            path: paths::display_relative(&wb.dir, ctx.root()),
            workbench: wb.name,
            primitives,
        });
    }

    Ok(CheckReport {
        fell_back: target.fell_back,
        workbenches,
        summary,
    })
}

// ---------------------------------------------------------------------------
// Install actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Skipped,
    WouldInstall,
    WouldUpdate,
    Installed,
    Updated,
    Failed,
    Current,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Skipped => "skipped",
            ActionKind::WouldInstall => "would_install",
            ActionKind::WouldUpdate => "would_update",
            ActionKind::Installed => "installed",
            ActionKind::Updated => "updated",
            ActionKind::Failed => "failed",
            ActionKind::Current => "current",
        }
    }

    /// The on-disk copy matches the target after this action.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            ActionKind::Skipped | ActionKind::Installed | ActionKind::Updated | ActionKind::Current
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallAction {
    pub name: String,
    pub action: ActionKind,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Bump each pin to the registry's latest version first.
    pub update: bool,
    pub dry_run: bool,
}

/// Version recorded in the marker of an installed primitive, if any.
pub fn read_installed_version(workbench_dir: &Path, primitive: &str) -> Option<String> {
    let marker = paths::version_marker(workbench_dir, primitive);
    let raw = std::fs::read_to_string(marker).ok()?;
    let version = semver::strip_v(raw.trim()).to_string();
    (!version.is_empty()).then_some(version)
}

/// Install (or update) every primitive pinned by `wb`.
///
/// With `update`, every pin is moved to the latest published version, also
/// when the pin is ahead of the registry; a pin whose latest cannot be
/// resolved stays as is. After a real
/// (non dry-run) update, only pins whose install settled are written back to
/// `workbench.json`, so the manifest never points at a version that failed to
/// land on disk.
pub fn install_primitives<S: TagSource>(
    client: &RegistryClient<S>,
    wb: &mut Workbench,
    opts: InstallOptions,
) -> Result<Vec<InstallAction>> {
    let mut targets: BTreeMap<String, String> = BTreeMap::new();
    let mut lookup = LatestLookup::new(client);
    for (name, pin) in &wb.manifest.primitives {
        let pinned = semver::strip_v(pin).to_string();
        let target = if opts.update {
            match lookup.latest(name) {
                Ok(Some(latest)) => latest,
                Ok(None) => pinned,
                Err(e) => {
                    tracing::warn!(primitive = %name, error = %e, "keeping pin, latest version unavailable");
                    pinned
                }
            }
        } else {
            pinned
        };
        targets.insert(name.clone(), target);
    }

    let actions: Vec<InstallAction> = targets
        .iter()
        .map(|(name, version)| install_one(client, &wb.dir, name, version, opts.dry_run))
        .collect();

    if opts.update && !opts.dry_run {
        let mut changed = false;
        for action in actions.iter().filter(|a| a.action.is_settled()) {
            let pin = format!("v{}", action.version);
            if wb.manifest.primitives.get(&action.name) != Some(&pin) {
                wb.manifest.primitives.insert(action.name.clone(), pin);
                changed = true;
            }
        }
        if changed {
            wb.save_manifest()?;
            tracing::info!(workbench = %wb.name, "updated primitive pins");
        }
    }

    Ok(actions)
}

fn install_one<S: TagSource>(
    client: &RegistryClient<S>,
    workbench_dir: &Path,
    name: &str,
    version: &str,
    dry_run: bool,
) -> InstallAction {
    let installed = read_installed_version(workbench_dir, name);
    let mut action = InstallAction {
        name: name.to_string(),
        action: ActionKind::Skipped,
        version: version.to_string(),
        from: installed.clone(),
        reason: None,
    };

    if installed.as_deref() == Some(version) {
        action.reason = Some("already installed".to_string());
        return action;
    }

    if dry_run {
        action.action = if installed.is_some() {
            ActionKind::WouldUpdate
        } else {
            ActionKind::WouldInstall
        };
        return action;
    }

    match materialize(client, workbench_dir, name, version) {
        Ok(()) => {
            action.action = if installed.is_some() {
                ActionKind::Updated
            } else {
                ActionKind::Installed
            };
            tracing::info!(primitive = %name, version, "installed primitive");
        }
        Err(e) => {
            tracing::warn!(primitive = %name, version, error = %e, "primitive install failed");
            action.action = ActionKind::Failed;
            action.reason = Some(e.to_string());
        }
    }
    action
}

/// Download into a staging directory next to the target, then swap it in.
/// The staging directory is removed on every exit path when `staging` drops.
fn materialize<S: TagSource>(
    client: &RegistryClient<S>,
    workbench_dir: &Path,
    name: &str,
    version: &str,
) -> Result<()> {
    let skills = paths::skills_dir(workbench_dir);
    std::fs::create_dir_all(&skills)?;
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{name}-"))
        .tempdir_in(&skills)?;
    let payload = staging.path().join("payload");

    client.download(name, version, &payload)?;
    if !io::dir_has_entries(&payload) {
        return Err(AgondaError::not_found(
            "primitive artifact",
            format!("{name} has no files at v{version}"),
        ));
    }

    io::atomic_write(
        &payload.join(paths::VERSION_MARKER),
        format!("{version}\n").as_bytes(),
    )?;
    io::replace_dir(&payload, &paths::primitive_dir(workbench_dir, name))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// update_primitive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct WorkbenchUpdate {
    pub workbench: String,
    pub from: String,
    pub to: String,
    pub action: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum UpdateOutcome {
    NotFound { name: String },
    Updated {
        name: String,
        latest: String,
        results: Vec<WorkbenchUpdate>,
    },
}

/// Move every workbench pinning `name` to the latest published version.
///
/// Workbenches that do not pin `name` are left out of the results. The pin is
/// rewritten only when the install settles.
pub fn update_primitive<S: TagSource>(
    client: &RegistryClient<S>,
    name: &str,
    workbenches: &mut [Workbench],
    dry_run: bool,
) -> Result<UpdateOutcome> {
    let Some(latest) = client.latest_version(name)? else {
        return Ok(UpdateOutcome::NotFound {
            name: name.to_string(),
        });
    };

    let mut results = Vec::new();
    for wb in workbenches.iter_mut() {
        let Some(pin) = wb.pin(name) else {
            continue;
        };
        let from = semver::strip_v(pin).to_string();
        let mut update = WorkbenchUpdate {
            workbench: wb.name.clone(),
            from: from.clone(),
            to: latest.clone(),
            action: ActionKind::Current,
            reason: None,
        };

        if semver::compare(&from, &latest) != Ordering::Less {
            results.push(update);
            continue;
        }
        if dry_run {
            update.action = ActionKind::WouldUpdate;
            results.push(update);
            continue;
        }

        let installed = install_one(client, &wb.dir, name, &latest, false);
        update.action = installed.action;
        update.reason = installed.reason;
        if update.action.is_settled() {
            wb.manifest
                .primitives
                .insert(name.to_string(), format!("v{latest}"));
            if let Err(e) = wb.save_manifest() {
                update.action = ActionKind::Failed;
                update.reason = Some(format!("installed but pin not saved: {e}"));
            }
        }
        results.push(update);
    }

    Ok(UpdateOutcome::Updated {
        name: name.to_string(),
        latest,
        results,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::{client, make_tarball, MemorySource};
    use crate::registry::Tag;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        dir
    }

    fn add_workbench(root: &Path, rel: &str, pins: &[(&str, &str)]) -> Workbench {
        let dir = root.join(rel);
        std::fs::create_dir_all(&dir).unwrap();
        let primitives: serde_json::Map<String, serde_json::Value> = pins
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        let manifest = serde_json::json!({ "primitives": primitives, "owner": "core-team" });
        std::fs::write(dir.join("workbench.json"), manifest.to_string()).unwrap();
        Workbench::load(&dir).unwrap()
    }

    fn registry() -> MemorySource {
        MemorySource::default()
            .with_primitive("visual-explainer", "1.0.0", &[("SKILL.md", "v1.0")])
            .with_primitive("visual-explainer", "1.1.0", &[("SKILL.md", "v1.1")])
            .with_primitive("visual-explainer", "2.0.0", &[("SKILL.md", "v2.0")])
            .with_primitive("compound-learning", "1.0.0", &[("SKILL.md", "c1.0")])
            .with_primitive("compound-learning", "1.1.0", &[("SKILL.md", "c1.1")])
    }

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        fn walk(dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let entry = entry.unwrap();
                let path = entry.path();
                if path.is_dir() {
                    out.insert(path.clone(), Vec::new());
                    walk(&path, out);
                } else {
                    out.insert(path.clone(), std::fs::read(&path).unwrap());
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(dir, &mut out);
        out
    }

    fn staging_leftovers(wb: &Workbench) -> usize {
        std::fs::read_dir(paths::skills_dir(&wb.dir))
            .map(|it| {
                it.filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
                    .count()
            })
            .unwrap_or(0)
    }

    // -- classification --------------------------------------------------

    #[test]
    fn classification_follows_comparator() {
        assert_eq!(classify("1.1.0", Some("2.0.0")), Status::Behind);
        assert_eq!(classify("1.1.0", Some("1.1.0")), Status::Current);
        assert_eq!(classify("3.0.0", Some("2.0.0")), Status::Current);
        assert_eq!(classify("1.1.0", None), Status::Unknown);
    }

    #[test]
    fn behind_primitive_scenario() {
        let dir = repo();
        let wb = add_workbench(dir.path(), "wb/design", &[("visual-explainer", "v1.1.0")]);
        let c = client(registry());
        let statuses = check_workbench_primitives(&c, &wb);
        assert_eq!(
            statuses,
            vec![PrimitiveStatus {
                name: "visual-explainer".into(),
                pinned: "1.1.0".into(),
                latest: "2.0.0".into(),
                status: Status::Behind,
            }]
        );
    }

    #[test]
    fn unknown_primitive_and_registry_failure() {
        let dir = repo();
        let wb = add_workbench(
            dir.path(),
            "wb/design",
            &[("nonexistent", "v1.0.0"), ("visual-explainer", "v2.0.0")],
        );

        let c = client(registry());
        let statuses = check_workbench_primitives(&c, &wb);
        assert_eq!(statuses[0].status, Status::Unknown);
        assert_eq!(statuses[0].latest, "unknown");
        assert_eq!(statuses[1].status, Status::Current);

        let offline = client(MemorySource {
            fail_listing: true,
            ..Default::default()
        });
        let statuses = check_workbench_primitives(&offline, &wb);
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| s.status == Status::Unknown));
        assert_eq!(offline.source().listing_calls.get(), 1);
    }

    #[test]
    fn offline_registry_is_queried_once_per_batch() {
        let dir = repo();
        add_workbench(dir.path(), "wb/a", &[("visual-explainer", "v1.0.0"), ("compound-learning", "v1.0.0")]);
        add_workbench(dir.path(), "wb/b", &[("visual-explainer", "v2.0.0")]);
        let ctx = RepoContext::new(dir.path());
        let offline = client(MemorySource {
            fail_listing: true,
            ..Default::default()
        });

        let report = check_all(&offline, &ctx, Scope::All, dir.path()).unwrap();
        assert_eq!(report.summary.unknown, 3);
        assert_eq!(offline.source().listing_calls.get(), 1);

        // A later batch tries the registry again.
        check_all(&offline, &ctx, Scope::All, dir.path()).unwrap();
        assert_eq!(offline.source().listing_calls.get(), 2);
    }

    #[test]
    fn check_all_counts_instances_and_skips_empty_workbenches() {
        let dir = repo();
        add_workbench(dir.path(), "wb/a", &[("visual-explainer", "v1.1.0"), ("compound-learning", "v1.1.0")]);
        add_workbench(dir.path(), "wb/b", &[("visual-explainer", "v2.0.0")]);
        add_workbench(dir.path(), "wb/empty", &[]);
        let ctx = RepoContext::new(dir.path());
        let c = client(registry());

        let report = check_all(&c, &ctx, Scope::Current, dir.path()).unwrap();
        assert!(report.fell_back);
        assert_eq!(report.workbenches.len(), 2);
        assert_eq!(
            report.summary,
            Summary {
                total: 3,
                current: 2,
                behind: 1,
                unknown: 0
            }
        );

        let scoped = check_all(&c, &ctx, Scope::Current, &dir.path().join("wb/b")).unwrap();
        assert!(!scoped.fell_back);
        assert_eq!(scoped.workbenches.len(), 1);
        assert_eq!(scoped.workbenches[0].path, "wb/b");
        assert_eq!(scoped.summary.total, 1);
    }

    // -- install ---------------------------------------------------------

    #[test]
    fn install_then_reinstall_is_idempotent() {
        let dir = repo();
        let mut wb = add_workbench(dir.path(), "wb/design", &[("visual-explainer", "v1.1.0")]);
        let c = client(registry());

        let first = install_primitives(&c, &mut wb, InstallOptions::default()).unwrap();
        assert_eq!(first[0].action, ActionKind::Installed);
        assert_eq!(first[0].from, None);
        assert_eq!(read_installed_version(&wb.dir, "visual-explainer").as_deref(), Some("1.1.0"));
        let skill = paths::primitive_dir(&wb.dir, "visual-explainer").join("SKILL.md");
        assert_eq!(std::fs::read_to_string(skill).unwrap(), "v1.1");
        assert_eq!(staging_leftovers(&wb), 0);

        let before = snapshot(dir.path());
        let fetches = c.source().tarball_calls.get();
        let second = install_primitives(&c, &mut wb, InstallOptions::default()).unwrap();
        assert_eq!(second[0].action, ActionKind::Skipped);
        assert_eq!(second[0].reason.as_deref(), Some("already installed"));
        assert_eq!(c.source().tarball_calls.get(), fetches);
        assert_eq!(snapshot(dir.path()), before);
    }

    #[test]
    fn changed_pin_updates_and_records_previous_version() {
        let dir = repo();
        let mut wb = add_workbench(dir.path(), "wb/design", &[("visual-explainer", "v1.0.0")]);
        let c = client(registry());
        install_primitives(&c, &mut wb, InstallOptions::default()).unwrap();

        wb.manifest
            .primitives
            .insert("visual-explainer".into(), "v2.0.0".into());
        let actions = install_primitives(&c, &mut wb, InstallOptions::default()).unwrap();
        assert_eq!(actions[0].action, ActionKind::Updated);
        assert_eq!(actions[0].from.as_deref(), Some("1.0.0"));
        let skill = paths::primitive_dir(&wb.dir, "visual-explainer").join("SKILL.md");
        assert_eq!(std::fs::read_to_string(skill).unwrap(), "v2.0");
    }

    #[test]
    fn dry_run_leaves_filesystem_untouched() {
        let dir = repo();
        let mut wb = add_workbench(
            dir.path(),
            "wb/design",
            &[("visual-explainer", "v1.0.0"), ("compound-learning", "v1.0.0")],
        );
        let c = client(registry());
        // Install one so the dry run sees both a fresh and an existing primitive.
        let mut partial = wb.clone();
        partial.manifest.primitives.remove("compound-learning");
        install_primitives(&c, &mut partial, InstallOptions::default()).unwrap();

        let before = snapshot(dir.path());
        let actions = install_primitives(
            &c,
            &mut wb,
            InstallOptions {
                update: true,
                dry_run: true,
            },
        )
        .unwrap();
        assert_eq!(snapshot(dir.path()), before);

        let by_name: BTreeMap<_, _> = actions.iter().map(|a| (a.name.as_str(), a)).collect();
        assert_eq!(by_name["compound-learning"].action, ActionKind::WouldInstall);
        assert_eq!(by_name["compound-learning"].version, "1.1.0");
        assert_eq!(by_name["visual-explainer"].action, ActionKind::WouldUpdate);
        assert_eq!(by_name["visual-explainer"].version, "2.0.0");
        assert_eq!(wb.pin("visual-explainer"), Some("v1.0.0"));
    }

    #[test]
    fn update_persists_only_settled_pins() {
        let dir = repo();
        let mut source = registry();
        // broken/v2.0.0 is tagged but its tree has no primitives/broken directory.
        source.tags.push(Tag::new("broken/v1.0.0", "s1"));
        source.tarballs.insert(
            "broken/v1.0.0".into(),
            make_tarball(&[("primitives/broken/SKILL.md", "ok")]),
        );
        source.tags.push(Tag::new("broken/v2.0.0", "s2"));
        source
            .tarballs
            .insert("broken/v2.0.0".into(), make_tarball(&[("README.md", "empty")]));
        let c = client(source);

        let mut wb = add_workbench(
            dir.path(),
            "wb/design",
            &[("visual-explainer", "v1.0.0"), ("broken", "v1.0.0")],
        );
        let actions = install_primitives(
            &c,
            &mut wb,
            InstallOptions {
                update: true,
                dry_run: false,
            },
        )
        .unwrap();

        let by_name: BTreeMap<_, _> = actions.iter().map(|a| (a.name.as_str(), a)).collect();
        assert_eq!(by_name["visual-explainer"].action, ActionKind::Installed);
        assert_eq!(by_name["broken"].action, ActionKind::Failed);
        assert!(by_name["broken"].reason.as_deref().unwrap().contains("no files"));
        assert_eq!(staging_leftovers(&wb), 0);
        assert!(!paths::primitive_dir(&wb.dir, "broken").exists());

        let on_disk = Workbench::load(&wb.dir).unwrap();
        assert_eq!(on_disk.pin("visual-explainer"), Some("v2.0.0"));
        assert_eq!(on_disk.pin("broken"), Some("v1.0.0"));
        assert_eq!(on_disk.manifest.extra["owner"], "core-team");
    }

    #[test]
    fn update_keeps_pin_when_latest_unresolvable() {
        let dir = repo();
        let mut wb = add_workbench(dir.path(), "wb/design", &[("nonexistent", "v1.0.0")]);
        let c = client(registry());
        let before = std::fs::read_to_string(wb.manifest_path()).unwrap();
        let actions = install_primitives(
            &c,
            &mut wb,
            InstallOptions {
                update: true,
                dry_run: false,
            },
        )
        .unwrap();
        assert_eq!(actions[0].version, "1.0.0");
        assert_eq!(actions[0].action, ActionKind::Failed);
        assert_eq!(std::fs::read_to_string(wb.manifest_path()).unwrap(), before);
    }

    #[test]
    fn update_moves_pin_ahead_of_registry_to_latest() {
        let dir = repo();
        let mut wb = add_workbench(dir.path(), "wb/design", &[("visual-explainer", "v3.0.0")]);
        let c = client(registry());
        let actions = install_primitives(
            &c,
            &mut wb,
            InstallOptions {
                update: true,
                dry_run: false,
            },
        )
        .unwrap();
        assert_eq!(actions[0].action, ActionKind::Installed);
        assert_eq!(actions[0].version, "2.0.0");
        assert_eq!(read_installed_version(&wb.dir, "visual-explainer").as_deref(), Some("2.0.0"));
        let on_disk = Workbench::load(&wb.dir).unwrap();
        assert_eq!(on_disk.pin("visual-explainer"), Some("v2.0.0"));
    }

    // -- update_primitive ------------------------------------------------

    #[test]
    fn update_primitive_failed_install_keeps_pin() {
        let dir = repo();
        let mut source = MemorySource::default().with_primitive("b", "1.0.0", &[("SKILL.md", "b1")]);
        // b/v2.0.0 is tagged but its tree has no primitives/b directory.
        source.tags.push(Tag::new("b/v2.0.0", "s2"));
        source
            .tarballs
            .insert("b/v2.0.0".into(), make_tarball(&[("README.md", "nothing here")]));
        let c = client(source);

        let wb = add_workbench(dir.path(), "wb/design", &[("b", "v1.0.0")]);
        let manifest_before = std::fs::read_to_string(wb.manifest_path()).unwrap();
        let mut wbs = vec![wb];

        let UpdateOutcome::Updated { latest, results, .. } =
            update_primitive(&c, "b", &mut wbs, false).unwrap()
        else {
            panic!("expected updated outcome");
        };
        assert_eq!(latest, "2.0.0");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].action, ActionKind::Failed);
        assert!(results[0].reason.as_deref().unwrap().contains("no files"));
        assert_eq!(wbs[0].pin("b"), Some("v1.0.0"));
        assert_eq!(std::fs::read_to_string(wbs[0].manifest_path()).unwrap(), manifest_before);
        assert_eq!(staging_leftovers(&wbs[0]), 0);
        assert!(!paths::primitive_dir(&wbs[0].dir, "b").exists());
    }

    #[test]
    fn update_primitive_unknown_name_short_circuits() {
        let dir = repo();
        let wb = add_workbench(dir.path(), "wb/design", &[("visual-explainer", "v1.0.0")]);
        let before = snapshot(dir.path());
        let c = client(registry());
        let outcome = update_primitive(&c, "nonexistent", &mut [wb], false).unwrap();
        assert!(matches!(outcome, UpdateOutcome::NotFound { ref name } if name == "nonexistent"));
        assert_eq!(snapshot(dir.path()), before);
    }

    #[test]
    fn update_primitive_across_workbenches() {
        let dir = repo();
        let behind = add_workbench(dir.path(), "wb/behind", &[("visual-explainer", "v1.0.0")]);
        let current = add_workbench(dir.path(), "wb/current", &[("visual-explainer", "v2.0.0")]);
        let other = add_workbench(dir.path(), "wb/other", &[("compound-learning", "v1.0.0")]);
        let c = client(registry());
        let mut wbs = vec![behind, current, other];

        let before = snapshot(dir.path());
        let UpdateOutcome::Updated { latest, results, .. } =
            update_primitive(&c, "visual-explainer", &mut wbs, true).unwrap()
        else {
            panic!("expected updated outcome");
        };
        assert_eq!(latest, "2.0.0");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].action, ActionKind::WouldUpdate);
        assert_eq!(results[1].action, ActionKind::Current);
        assert_eq!(snapshot(dir.path()), before);

        let UpdateOutcome::Updated { results, .. } =
            update_primitive(&c, "visual-explainer", &mut wbs, false).unwrap()
        else {
            panic!("expected updated outcome");
        };
        assert_eq!(results[0].workbench, "behind");
        assert_eq!(results[0].action, ActionKind::Installed);
        assert_eq!(results[0].from, "1.0.0");
        let reloaded = Workbench::load(&wbs[0].dir).unwrap();
        assert_eq!(reloaded.pin("visual-explainer"), Some("v2.0.0"));
        assert_eq!(read_installed_version(&wbs[0].dir, "visual-explainer").as_deref(), Some("2.0.0"));
        assert!(!paths::primitive_dir(&wbs[2].dir, "visual-explainer").exists());
    }

    #[test]
    fn update_primitive_registry_failure_propagates() {
        let c = client(MemorySource {
            fail_listing: true,
            ..Default::default()
        });
        let mut none: Vec<Workbench> = Vec::new();
        let err = update_primitive(&c, "visual-explainer", &mut none, false).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Network);
    }
}
