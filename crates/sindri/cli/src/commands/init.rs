use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context as _, bail};
use clap::Args;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use sindri_types::CircuitType;
use tracing::{debug, error, info};

use super::parse_tag;

static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z]+)\s*\}\}").expect("valid regex"));
static PACKAGE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*$").expect("valid regex"));

/// A file of a project template; both the path and the contents are rendered.
struct Template {
    path: &'static str,
    contents: &'static str,
}

const COMMON_TEMPLATES: &[Template] = &[
    Template {
        path: "README.md",
        contents: include_str!("../../templates/common/README.md"),
    },
    Template {
        path: ".sindriignore",
        contents: include_str!("../../templates/common/.sindriignore"),
    },
];

const GNARK_TEMPLATES: &[Template] = &[
    Template {
        path: "sindri.json",
        contents: include_str!("../../templates/gnark/sindri.json"),
    },
    Template {
        path: "go.mod",
        contents: include_str!("../../templates/gnark/go.mod"),
    },
    Template {
        path: "{{ packageName }}.go",
        contents: include_str!("../../templates/gnark/circuit.go"),
    },
    Template {
        path: "input.json",
        contents: include_str!("../../templates/gnark/input.json"),
    },
];

#[derive(Args, Debug)]
pub struct InitArgs {
    /// The directory where the new project should be initialized.
    #[arg(default_value = ".")]
    directory: PathBuf,

    /// Circuit name, derived from the directory name when omitted.
    #[arg(long, value_parser = parse_tag)]
    name: Option<String>,

    /// Proving framework of the circuit.
    #[arg(long, default_value = "gnark")]
    circuit_type: CircuitType,

    /// Go package name for Gnark circuits, derived from the circuit name when omitted.
    #[arg(long)]
    package_name: Option<String>,

    /// Proving scheme for Gnark circuits.
    #[arg(long, default_value = "groth16", value_parser = ["groth16"])]
    proving_scheme: String,

    /// Curve for Gnark circuits.
    #[arg(long, default_value = "bn254", value_parser = ["bn254"])]
    curve: String,

    /// Scaffold even if the directory already contains files, overwriting them.
    #[arg(long)]
    force: bool,

    /// Initialize a git repository with an initial commit.
    #[arg(long)]
    git: bool,
}

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    if args.circuit_type != CircuitType::Gnark {
        bail!("Sorry, {} is not yet supported.", args.circuit_type);
    }
    let directory = std::path::absolute(&args.directory)
        .with_context(|| format!("Failed to resolve {:?}", args.directory))?;
    if directory.exists() && !directory.is_dir() {
        bail!("File {directory:?} exists and is not a directory, aborting.");
    }
    fs::create_dir_all(&directory)
        .with_context(|| format!("Failed to create {directory:?}"))?;
    let has_files = fs::read_dir(&directory)
        .with_context(|| format!("Failed to read {directory:?}"))?
        .next()
        .is_some();
    if has_files && !args.force {
        bail!(
            "The {directory:?} directory already exists and contains files, pass `--force` to \
             overwrite them."
        );
    }

    let circuit_name = match args.name {
        Some(name) => name,
        None => {
            let directory_name = directory
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            parse_tag(&default_circuit_name(&directory_name)).map_err(anyhow::Error::msg)?
        }
    };
    let package_name = args
        .package_name
        .unwrap_or_else(|| default_package_name(&circuit_name));
    if !PACKAGE_NAME.is_match(&package_name) {
        bail!(
            "Invalid package name \"{package_name}\". Package names must begin with a lowercase \
             letter and only be followed by alphanumeric characters."
        );
    }

    let context = BTreeMap::from([
        ("circuitName", circuit_name),
        ("circuitType", args.circuit_type.to_string()),
        ("curveName", args.curve.clone()),
        ("gnarkCurveName", args.curve.to_uppercase()),
        ("packageName", package_name),
        ("provingScheme", args.proving_scheme),
    ]);

    info!("Proceeding to generate scaffolded project in {directory:?}.");
    for template in COMMON_TEMPLATES.iter().chain(GNARK_TEMPLATES) {
        scaffold(template, &directory, &context)?;
    }
    info!("Project scaffolding successful.");

    if args.git && !directory.join(".git").exists() {
        info!("Initializing git repository in {directory:?}.");
        match init_git(&directory) {
            Ok(()) => info!("Successfully initialized git repository."),
            Err(error) => {
                error!("Error occurred while initializing the git repository: {error:#}")
            }
        }
    }
    Ok(())
}

fn scaffold(
    template: &Template,
    directory: &Path,
    context: &BTreeMap<&str, String>,
) -> anyhow::Result<()> {
    let path = directory.join(render(template.path, context)?);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {parent:?}"))?;
    }
    fs::write(&path, render(template.contents, context)?)
        .with_context(|| format!("Failed to write {path:?}"))?;
    debug!(?path, "Rendered template");
    Ok(())
}

/// Substitutes `{{ variable }}` placeholders.
fn render(template: &str, context: &BTreeMap<&str, String>) -> anyhow::Result<String> {
    if let Some(missing) = VARIABLE
        .captures_iter(template)
        .filter_map(|captures| captures.get(1))
        .find(|name| !context.contains_key(name.as_str()))
    {
        bail!("Unknown template variable \"{}\"", missing.as_str());
    }
    Ok(VARIABLE
        .replace_all(template, |captures: &Captures| context[&captures[1]].clone())
        .into_owned())
}

fn default_circuit_name(directory_name: &str) -> String {
    directory_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn default_package_name(circuit_name: &str) -> String {
    let alphanumeric = circuit_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>();
    alphanumeric
        .trim_start_matches(|c: char| !c.is_ascii_lowercase())
        .to_string()
}

fn init_git(directory: &Path) -> anyhow::Result<()> {
    let steps: [&[&str]; 3] = [
        &["init", "."],
        &["add", "."],
        &["commit", "-m", "Initial commit."],
    ];
    for step in steps {
        let output = Command::new("git")
            .args(step)
            .current_dir(directory)
            .output()
            .context("Failed to run git")?;
        if !output.status.success() {
            bail!(
                "`git {}` failed: {}",
                step.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
    }
    Ok(())
}
