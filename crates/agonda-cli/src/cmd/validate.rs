use crate::output::{note_fallback, print_json};
use crate::root::cwd;
use agonda_core::marketplace::validate_marketplace;
use agonda_core::validate::{validate_all, Level, WorkbenchReport};
use agonda_core::workbench::{RepoContext, Scope};
use agonda_core::AgondaError;
use anyhow::Context;

pub fn run(ctx: &RepoContext, all: bool, marketplace: bool, json: bool) -> anyhow::Result<()> {
    let errors = if marketplace {
        run_marketplace(ctx, json)?
    } else {
        run_workbenches(ctx, all, json)?
    };

    if errors > 0 {
        return Err(AgondaError::ValidationFailed { errors }.into());
    }
    Ok(())
}

fn run_workbenches(ctx: &RepoContext, all: bool, json: bool) -> anyhow::Result<usize> {
    let scope = if all { Scope::All } else { Scope::Current };
    let report = validate_all(ctx, scope, &cwd()).context("failed to validate workbenches")?;
    note_fallback(report.fell_back, json);

    if json {
        print_json(&report)?;
    } else if report.workbenches.is_empty() {
        println!("No workbenches found.");
    } else {
        for wb in &report.workbenches {
            print_workbench(wb);
        }
        print_totals(&report.workbenches, 0);
    }
    Ok(report.error_count())
}

fn run_marketplace(ctx: &RepoContext, json: bool) -> anyhow::Result<usize> {
    let report = validate_marketplace(ctx.root())?;

    if json {
        print_json(&report)?;
    } else {
        for e in &report.errors {
            println!("[error] marketplace: {e}");
        }
        for wb in &report.workbenches {
            print_workbench(wb);
        }
        print_totals(&report.workbenches, report.errors.len());
    }
    Ok(report.error_count())
}

fn print_workbench(wb: &WorkbenchReport) {
    if wb.errors.is_empty() && wb.warnings.is_empty() {
        println!("{}: ok", wb.path);
        return;
    }
    println!("{}:", wb.path);
    for issue in wb.issues() {
        let level = match issue.level {
            Level::Error => "error",
            Level::Warning => "warning",
        };
        println!(
            "  [{level}] {}: {} ({})",
            issue.check.as_str(),
            issue.message,
            issue.file
        );
    }
}

fn print_totals(workbenches: &[WorkbenchReport], manifest_errors: usize) {
    let errors: usize = manifest_errors + workbenches.iter().map(|w| w.errors.len()).sum::<usize>();
    let warnings: usize = workbenches.iter().map(|w| w.warnings.len()).sum();
    println!();
    println!(
        "{} workbench(es) checked: {errors} error(s), {warnings} warning(s)",
        workbenches.len()
    );
}
