use super::heading;
use crate::env::LoadReport;
use colored::*;

pub fn print_report(report: &LoadReport) -> anyhow::Result<()> {
    let Some(path) = &report.path else {
        println!("{}", "No .env file found; environment left unchanged.".yellow());
        return Ok(());
    };
    println!("{} {}", heading("Env file:"), path.display());
    print_keys("Applied", &report.applied, |k| k.green());
    print_keys("Kept existing", &report.skipped, |k| k.dimmed());
    if !report.invalid_lines.is_empty() {
        let lines: Vec<String> = report.invalid_lines.iter().map(|n| n.to_string()).collect();
        println!(
            "{} {}",
            "Ignored unparsable lines:".yellow(),
            lines.join(", ")
        );
    }
    Ok(())
}

fn print_keys(label: &str, keys: &[String], paint: impl Fn(&str) -> ColoredString) {
    if keys.is_empty() {
        return;
    }
    println!("{} ({}):", heading(label), keys.len());
    for k in keys {
        println!("  - {}", paint(k));
    }
}
