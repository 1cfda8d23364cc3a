use std::path::Path;

use anyhow::Result;

use reelbot_config::{Severity, find_config_file, load_config, validate};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Validate the explicit or discovered config file. Exits with status 1 on errors.
pub fn check(explicit: Option<&Path>) -> Result<()> {
    let path = explicit.map(Path::to_path_buf).or_else(find_config_file);
    let config = match &path {
        Some(path) => {
            eprintln!("Checking {}\n", path.display());
            load_config(path)?
        },
        None => {
            eprintln!("No config file found; checking defaults.\n");
            Default::default()
        },
    };

    let diagnostics = validate(&config);
    for d in &diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };
        eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diagnostics.len() - errors;

    if diagnostics.is_empty() {
        eprintln!("No issues found.");
    } else {
        eprintln!("\n{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}
