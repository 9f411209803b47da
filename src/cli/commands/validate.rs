//! `validate` command: catalog validation without running the engine.

use std::path::Path;

use crate::catalog::{CatalogLoader, LoaderOptions};
use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::error::{ConfigError, Result, StagegateError};

/// Validates each catalog file, printing issues per file.
///
/// # Errors
///
/// Returns a configuration error when any file fails validation; all
/// files are checked before returning.
pub fn run(args: &ValidateArgs) -> Result<()> {
    let loader = CatalogLoader::new(LoaderOptions {
        strict: args.strict,
        ..LoaderOptions::default()
    });

    let mut failures = 0usize;
    let mut reports = Vec::new();

    for file in &args.files {
        match loader.load(file) {
            Ok(result) => {
                reports.push(FileReport {
                    file,
                    ok: true,
                    issues: result.warnings,
                });
            }
            Err(err) => {
                failures += 1;
                let issues = match &err {
                    ConfigError::ValidationError { errors, .. } => {
                        errors.iter().map(ToString::to_string).collect()
                    }
                    other => vec![other.to_string()],
                };
                reports.push(FileReport {
                    file,
                    ok: false,
                    issues,
                });
            }
        }
    }

    print_reports(&reports, args.format);

    if failures > 0 {
        return Err(StagegateError::Config(ConfigError::InvalidValue {
            field: "files".to_string(),
            value: format!("{failures} of {} failed validation", args.files.len()),
            expected: "all files valid".to_string(),
        }));
    }
    Ok(())
}

struct FileReport<'a> {
    file: &'a Path,
    ok: bool,
    issues: Vec<String>,
}

fn print_reports(reports: &[FileReport<'_>], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let value: Vec<serde_json::Value> = reports
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "file": r.file.display().to_string(),
                        "ok": r.ok,
                        "issues": r.issues,
                    })
                })
                .collect();
            println!("{}", serde_json::Value::Array(value));
        }
        OutputFormat::Human => {
            for report in reports {
                let verdict = if report.ok { "ok" } else { "FAILED" };
                println!("{}: {verdict}", report.file.display());
                for issue in &report.issues {
                    println!("  {issue}");
                }
            }
        }
    }
}
