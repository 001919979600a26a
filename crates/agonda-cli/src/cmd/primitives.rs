use crate::output::{note_fallback, print_json, print_table};
use crate::root::cwd;
use agonda_core::config::Config;
use agonda_core::primitives::{
    check_all, install_primitives, update_primitive, ActionKind, InstallOptions, UpdateOutcome,
};
use agonda_core::registry::RegistryClient;
use agonda_core::workbench::{self, RepoContext, Scope};
use agonda_core::AgondaError;
use anyhow::Context;
use clap::Subcommand;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum PrimitivesSubcommand {
    /// Compare pinned primitive versions against the registry
    Check {
        /// Check every workbench instead of the current one
        #[arg(long)]
        all: bool,
    },

    /// List published versions of a primitive, newest first
    Versions { name: String },

    /// Install the primitives pinned by a workbench
    Install {
        /// Workbench name or a path inside it (default: current workbench)
        #[arg(long)]
        workbench: Option<String>,

        /// Move pins to the latest published version first
        #[arg(long)]
        update: bool,

        /// Report what would change without touching disk
        #[arg(long)]
        dry_run: bool,
    },

    /// Move every workbench pinning a primitive to its latest version
    Update {
        name: String,

        /// Update every workbench instead of the current one
        #[arg(long)]
        all: bool,

        /// Report what would change without touching disk
        #[arg(long)]
        dry_run: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(ctx: &RepoContext, subcmd: PrimitivesSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(ctx.root()).context("failed to load config")?;
    let client =
        RegistryClient::from_config(&config.registry).context("failed to build registry client")?;

    match subcmd {
        PrimitivesSubcommand::Check { all } => check(&client, ctx, all, json),
        PrimitivesSubcommand::Versions { name } => versions(&client, &name, json),
        PrimitivesSubcommand::Install {
            workbench,
            update,
            dry_run,
        } => install(
            &client,
            ctx,
            workbench.as_deref(),
            InstallOptions { update, dry_run },
            json,
        ),
        PrimitivesSubcommand::Update { name, all, dry_run } => {
            update(&client, ctx, &name, all, dry_run, json)
        }
    }
}

fn scope(all: bool) -> Scope {
    if all {
        Scope::All
    } else {
        Scope::Current
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn check(client: &RegistryClient, ctx: &RepoContext, all: bool, json: bool) -> anyhow::Result<()> {
    let report = check_all(client, ctx, scope(all), &cwd())?;
    note_fallback(report.fell_back, json);

    if json {
        return print_json(&report);
    }
    if report.workbenches.is_empty() {
        println!("No workbenches pin any primitives.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = report
        .workbenches
        .iter()
        .flat_map(|wb| {
            wb.primitives.iter().map(move |p| {
                vec![
                    wb.workbench.clone(),
                    p.name.clone(),
                    p.pinned.clone(),
                    p.latest.clone(),
                    p.status.as_str().to_string(),
                ]
            })
        })
        .collect();
    print_table(&["WORKBENCH", "PRIMITIVE", "PINNED", "LATEST", "STATUS"], rows);

    let s = &report.summary;
    println!(
        "\n{} pin(s): {} current, {} behind, {} unknown",
        s.total, s.current, s.behind, s.unknown
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// versions
// ---------------------------------------------------------------------------

fn versions(client: &RegistryClient, name: &str, json: bool) -> anyhow::Result<()> {
    let versions = client.list_versions(name)?;

    if json {
        let value = serde_json::json!({
            "name": name,
            "versions": versions,
        });
        return print_json(&value);
    }
    if versions.is_empty() {
        println!("No published versions of '{name}'.");
    } else {
        for v in &versions {
            println!("{v}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// install
// ---------------------------------------------------------------------------

fn install(
    client: &RegistryClient,
    ctx: &RepoContext,
    selector: Option<&str>,
    opts: InstallOptions,
    json: bool,
) -> anyhow::Result<()> {
    let mut wb = ctx.resolve_workbench(selector, &cwd())?;
    let actions = install_primitives(client, &mut wb, opts)
        .with_context(|| format!("failed to install primitives for '{}'", wb.name))?;

    if json {
        let value = serde_json::json!({
            "workbench": wb.name,
            "dry_run": opts.dry_run,
            "actions": actions,
        });
        print_json(&value)?;
    } else if actions.is_empty() {
        println!("'{}' pins no primitives.", wb.name);
    } else {
        let rows = actions
            .iter()
            .map(|a| {
                vec![
                    a.name.clone(),
                    a.action.as_str().to_string(),
                    a.version.clone(),
                    a.from.clone().unwrap_or_default(),
                    a.reason.clone().unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&["PRIMITIVE", "ACTION", "VERSION", "FROM", "REASON"], rows);
    }

    let failed = actions
        .iter()
        .filter(|a| a.action == ActionKind::Failed)
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} primitive(s) failed to install");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// update
// ---------------------------------------------------------------------------

fn update(
    client: &RegistryClient,
    ctx: &RepoContext,
    name: &str,
    all: bool,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let target = ctx.resolve_target_workbenches(scope(all), &cwd())?;
    note_fallback(target.fell_back, json);
    let mut workbenches = workbench::load_all(&target.dirs);

    let outcome = update_primitive(client, name, &mut workbenches, dry_run)?;
    if json {
        print_json(&outcome)?;
    }

    let results = match outcome {
        UpdateOutcome::NotFound { name } => {
            return Err(AgondaError::not_found_with_hint(
                "primitive",
                name,
                "no matching tags in the registry",
            )
            .into());
        }
        UpdateOutcome::Updated { latest, results, .. } => {
            if !json {
                if results.is_empty() {
                    println!("No workbench pins '{name}'.");
                } else {
                    println!("Latest {name}: {latest}");
                    let rows = results
                        .iter()
                        .map(|r| {
                            vec![
                                r.workbench.clone(),
                                r.from.clone(),
                                r.to.clone(),
                                r.action.as_str().to_string(),
                                r.reason.clone().unwrap_or_default(),
                            ]
                        })
                        .collect();
                    print_table(&["WORKBENCH", "FROM", "TO", "ACTION", "REASON"], rows);
                }
            }
            results
        }
    };

    let failed = results
        .iter()
        .filter(|r| r.action == ActionKind::Failed)
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} workbench(es) failed to update");
    }
    Ok(())
}
