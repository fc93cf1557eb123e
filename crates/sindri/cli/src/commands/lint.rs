use std::{fs, path::PathBuf, str::FromStr};

use anyhow::{Context as _, bail};
use clap::Args;
use serde_json::Value;
use sindri::bundle::find_manifest;
use sindri_types::CircuitType;
use tracing::{debug, error, info, warn};

#[derive(Args, Debug)]
pub struct LintArgs {
    /// The directory, or subdirectory, of the project to lint.
    #[arg(default_value = ".")]
    directory: PathBuf,
}

/// Problems found while linting.
#[derive(Debug, Default, PartialEq, Eq)]
struct Findings {
    errors: usize,
    warnings: usize,
}

pub fn run(args: LintArgs) -> anyhow::Result<()> {
    let directory = std::path::absolute(&args.directory)
        .with_context(|| format!("Failed to resolve {:?}", args.directory))?;
    if !directory.exists() {
        bail!("The {directory:?} directory does not exist. Aborting.");
    }
    let Some(manifest_path) = find_manifest(&directory) else {
        bail!("No \"sindri.json\" file was found in or above {directory:?}. Aborting.");
    };
    debug!(?manifest_path, "Found sindri.json");

    let contents = fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read {manifest_path:?}"))?;
    let manifest: Value = serde_json::from_str(&contents).with_context(|| {
        format!("Error loading {manifest_path:?}, perhaps it is not valid JSON?")
    })?;

    let mut findings = lint_manifest(&manifest, &manifest_path.display().to_string());

    let root = manifest_path.parent().unwrap_or(&directory);
    let readme_path = root.join("README.md");
    if readme_path.exists() {
        debug!(?readme_path, "README file found");
    } else {
        warn!("No project README was found at {readme_path:?}, consider adding one.");
        findings.warnings += 1;
    }

    let Findings { errors, warnings } = findings;
    if errors == 0 && warnings == 0 {
        info!("No issues found, good job!");
        return Ok(());
    }
    warn!(
        "Found {} problems ({errors} errors, {warnings} warnings).",
        errors + warnings
    );
    if errors > 0 {
        bail!("Linting failed with {errors} errors.");
    }
    Ok(())
}

fn lint_manifest(manifest: &Value, display_path: &str) -> Findings {
    let mut findings = Findings::default();

    let Some(fields) = manifest.as_object() else {
        error!("Sindri manifest file \"{display_path}\" must contain a JSON object.");
        findings.errors += 1;
        return findings;
    };

    match fields.get("name") {
        Some(Value::String(name)) if !name.is_empty() => debug!(%name, "Circuit name"),
        _ => {
            error!("No \"name\" field found in \"{display_path}\".");
            findings.errors += 1;
        }
    }

    match fields.get("circuitType").and_then(Value::as_str) {
        None | Some("") => {
            warn!(
                "Circuit type is not configured in \"{display_path}\" so some linting steps \
                 will be skipped. Please set \"circuitType\" in \"sindri.json\"."
            );
            findings.warnings += 1;
        }
        Some(circuit_type) => match CircuitType::from_str(circuit_type) {
            Ok(CircuitType::Unknown) | Err(_) => {
                warn!("Unknown circuit type \"{circuit_type}\" in \"{display_path}\".");
                findings.warnings += 1;
            }
            Ok(circuit_type) => debug!(%circuit_type, "Detected circuit type"),
        },
    }

    if findings.errors == 0 {
        info!("Sindri manifest file \"{display_path}\" is valid.");
    }
    findings
}
