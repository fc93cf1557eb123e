use std::{path::PathBuf, time::Instant};

use anyhow::bail;
use clap::Args;
use sindri::{CircuitOptions, ProjectSource};
use sindri_types::JobStatus;
use tracing::info;

use super::{Context, Project, has_status, parse_meta_entry, parse_tag};

const DEFAULT_TAG: &str = "latest";

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// The location of the Sindri project to deploy.
    #[arg(default_value = ".")]
    directory: PathBuf,

    /// Tag to apply to the circuit, `latest` when omitted.
    #[arg(short, long = "tag", value_name = "TAG", value_parser = parse_tag)]
    tags: Vec<String>,

    /// Discard the current circuit after compiling.
    #[arg(short, long, conflicts_with = "tags")]
    untagged: bool,

    /// Metadata key/value to attach to the circuit build.
    #[arg(short, long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta_entry)]
    meta: Vec<(String, String)>,
}

pub async fn run(args: DeployArgs, ctx: &Context) -> anyhow::Result<()> {
    let project = Project::find(&args.directory)?;
    let client = ctx.client()?;

    let tags = match (args.untagged, args.tags.is_empty()) {
        (true, _) => Vec::new(),
        (false, true) => vec![DEFAULT_TAG.to_string()],
        (false, false) => args.tags,
    };
    let options = CircuitOptions {
        tags,
        meta: args.meta.into_iter().collect(),
    };

    info!(name = %project.manifest.name, "Circuit compilation initiated.");
    let start = Instant::now();
    let circuit = match client
        .create_circuit(&ProjectSource::Directory(project.root), options)
        .await
    {
        Ok(circuit) => circuit,
        Err(error) if has_status(&error, 401) => {
            bail!("Your credentials are invalid. Please log in again with `sindri login`.")
        }
        Err(error) => return Err(error.into()),
    };

    let elapsed = start.elapsed().as_secs_f64();
    match circuit.status {
        JobStatus::Failed => bail!(
            "Circuit compilation failed after {elapsed:.1} seconds: {}",
            circuit.error.as_deref().unwrap_or("Unknown error.")
        ),
        _ => {
            info!(
                circuit_id = %circuit.circuit_id,
                "Circuit compiled successfully after {elapsed:.1} seconds."
            );
            Ok(())
        }
    }
}
