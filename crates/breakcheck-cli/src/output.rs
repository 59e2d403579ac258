//! Console rendering

use breakcheck_core::{ChangeKind, Report};
use breakcheck_engine::ModelImpact;
use colored::Colorize;

/// Print the human-readable report to stdout
pub fn print_report(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "dbt Breaking Change Analysis".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{}", "Summary:".bold());
    println!("  Files analyzed:   {}", report.summary.files_analyzed);
    if report.summary.total > 0 {
        println!("  Breaking changes: {}", report.summary.total.to_string().red().bold());
    } else {
        println!("  Breaking changes: {}", report.summary.total.to_string().green());
    }
    if report.summary.warnings > 0 {
        println!("  Warnings:         {}", report.summary.warnings.to_string().yellow());
    }
    if !report.summary.graph_analyzed {
        println!("  Dependency graph: {}", "skipped".yellow());
    }
    println!();

    if report.has_breaking_changes() {
        println!("{}", "Breaking changes detected:".red().bold());
        for change in &report.breaking_changes {
            let label = match change.kind() {
                ChangeKind::CyclicDependency => change.kind().as_str().magenta().bold(),
                _ => change.kind().as_str().red().bold(),
            };
            println!("\n  [{}] {}", label, change.file_path());
            for line in change.details().summary_lines() {
                println!("    {}", line);
            }
        }
    } else {
        println!("{}", "✓ No breaking changes detected.".green().bold());
    }

    if !report.warnings.is_empty() {
        println!();
        println!("{}", "Warnings:".bold());
        for warning in &report.warnings {
            println!(
                "  [{}] {}: {}",
                warning.kind().as_str().yellow(),
                warning.subject(),
                warning.message()
            );
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

/// Print the downstream impact of one model
pub fn print_impact(impact: &ModelImpact) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Downstream Impact Analysis".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{} {}", "Model:".bold(), impact.model.green());
    println!("{} {}", "Direct dependents:".bold(), impact.children.len());
    println!("{} {}", "Downstream models:".bold(), impact.downstream.len());
    println!();

    if impact.downstream.is_empty() {
        println!("{}", "✓ No downstream dependencies".green());
        println!("This model can be modified without affecting other models.");
    } else {
        println!("{}", "Affected models (breadth-first):".bold());
        println!();
        for (i, model) in impact.downstream.iter().enumerate() {
            println!("  {}. {}", i + 1, model.yellow());
        }
        println!();
        println!(
            "{}",
            "⚠ Removing or retyping columns in this model may break downstream models!"
                .yellow()
                .bold()
        );
    }

    for cycle in &impact.cycles {
        let mut path = cycle.clone();
        if let Some(first) = cycle.first() {
            path.push(first.clone());
        }
        println!();
        println!("{} {}", "Dependency cycle:".red().bold(), path.join(" -> "));
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}
