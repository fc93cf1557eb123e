use std::{
    fs,
    io::{IsTerminal, Read},
    path::PathBuf,
};

use anyhow::{Context as _, bail};
use clap::{Args, Subcommand};
use serde_json::json;
use sindri::ProofOptions;
use sindri_types::JobStatus;
use tracing::debug;

use super::{Context, Project, has_status, parse_meta_entry, parse_tag};

/// Files tried, in order, when no input is given and stdin is a terminal.
const DEFAULT_INPUT_FILES: [&str; 3] = ["input.json", "example-input.json", "Prover.toml"];

#[derive(Subcommand, Debug)]
pub enum ProofCommand {
    /// Create a proof for the circuit.
    Create(ProofCreateArgs),
}

#[derive(Args, Debug)]
pub struct ProofCreateArgs {
    /// Input file for the proof (defaults to stdin).
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Tag to generate the proof from.
    #[arg(short, long, default_value = "latest", value_parser = parse_tag)]
    tag: String,

    /// Verify the proof on the server after generating it.
    #[arg(long)]
    verify: bool,

    /// Include the proof formatted as smart contract calldata.
    #[arg(long)]
    smart_contract_calldata: bool,

    /// Metadata key/value to attach to the proof.
    #[arg(short, long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta_entry)]
    meta: Vec<(String, String)>,
}

pub async fn create(args: ProofCreateArgs, ctx: &Context) -> anyhow::Result<()> {
    let client = ctx.client()?;
    let current_dir = std::env::current_dir().context("Failed to read the current directory")?;
    let project = Project::find(&current_dir)?;
    let proof_input = read_proof_input(args.input.as_ref(), &project.root)?;

    let name = &project.manifest.name;
    let circuit_id = format!("{name}:{}", args.tag);
    let options = ProofOptions {
        verify: args.verify,
        include_smart_contract_calldata: args.smart_contract_calldata,
        meta: args.meta.into_iter().collect(),
    };
    let proof = match client.prove_circuit(&circuit_id, proof_input, options).await {
        Ok(proof) => proof,
        Err(error) if has_status(&error, 404) => {
            bail!("No circuit found with the name \"{name}\" and tag \"{}\".", args.tag)
        }
        Err(error) if has_status(&error, 401) => {
            bail!("Your credentials are invalid. Please log in again with `sindri login`.")
        }
        Err(error) => return Err(error.into()),
    };
    debug!(proof_id = %proof.proof_id, status = %proof.status, "Proof finished");

    if proof.status == JobStatus::Failed {
        bail!(
            "Proof generation failed: {}",
            proof.error.as_deref().unwrap_or("Unknown error.")
        );
    }

    let mut output = json!({
        "proofId": proof.proof_id,
        "proof": proof.proof,
        "public": proof.public,
        "verificationKey": proof.verification_key,
    });
    if args.smart_contract_calldata {
        output["smartContractCalldata"] = json!(proof.smart_contract_calldata);
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_proof_input(input: Option<&PathBuf>, root: &std::path::Path) -> anyhow::Result<String> {
    if let Some(path) = input {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read proof input from {path:?}"));
    }

    let mut stdin = std::io::stdin();
    if !stdin.is_terminal() {
        let mut input = String::new();
        stdin
            .read_to_string(&mut input)
            .context("Failed to read proof input from stdin")?;
        return Ok(input);
    }

    for file in DEFAULT_INPUT_FILES {
        let path = root.join(file);
        if path.is_file() {
            debug!(?path, "Using default proof input");
            return fs::read_to_string(&path)
                .with_context(|| format!("Failed to read proof input from {path:?}"));
        }
    }
    bail!(
        "No input file specified, none of the default files found, and not in a non-TTY context."
    )
}
