use std::{path::PathBuf, sync::Arc, time::Duration};

use sindri_config::{Config, DEFAULT_BASE_URL};
use sindri_types::{CircuitInfoResponse, JobStatus, Meta, ProofInfoResponse, TeamMeResponse};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::{
    api::{CircuitCreateForm, ProofCreateForm, ProofDetailQuery, SindriApi},
    bundle::{ArchiveWriter, ProjectSource, TarGzWriter, bundle_project},
    error::Result,
    http::HttpTransport,
    meta::MetadataValidator,
    poll::{DEFAULT_POLLING_INTERVAL, poll_until_terminal},
    tag::validate_tags,
};

/// Environment variable holding the API key.
pub const SINDRI_API_KEY_ENV: &str = "SINDRI_API_KEY";
/// Environment variable holding the API base URL.
pub const SINDRI_BASE_URL_ENV: &str = "SINDRI_BASE_URL";
/// Environment variable overriding the config file location.
pub const SINDRI_CONFIG_PATH_ENV: &str = "SINDRI_CONFIG_PATH";

/// Credentials for [`SindriClient::new`]. Unset fields fall back to the environment, then to the
/// config file written by `sindri login`.
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    /// API key used as bearer token.
    pub api_key: Option<String>,
    /// Base URL of the API, `https://sindri.app` by default.
    pub base_url: Option<String>,
}

/// Credentials after applying the fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAuth {
    /// API key, `None` when nothing is configured.
    pub api_key: Option<String>,
    /// Base URL of the API.
    pub base_url: String,
}

impl AuthOptions {
    /// Resolves credentials from the options, `SINDRI_API_KEY`/`SINDRI_BASE_URL` and the config
    /// file, in that order.
    pub fn resolve(&self) -> ResolvedAuth {
        let config_path = std::env::var(SINDRI_CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .ok()
            .or_else(|| Config::default_path().ok());
        let config = config_path
            .map(Config::load_or_default)
            .unwrap_or_default();
        self.resolve_with(|name| std::env::var(name).ok(), &config)
    }

    /// Same as [`AuthOptions::resolve`] with explicit environment and config.
    pub fn resolve_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
        config: &Config,
    ) -> ResolvedAuth {
        let auth = config.auth.as_ref();
        let api_key = self
            .api_key
            .clone()
            .or_else(|| env(SINDRI_API_KEY_ENV))
            .or_else(|| auth.map(|auth| auth.api_key.clone()));
        let base_url = self
            .base_url
            .clone()
            .or_else(|| env(SINDRI_BASE_URL_ENV))
            .or_else(|| auth.map(|auth| auth.base_url.clone()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        ResolvedAuth { api_key, base_url }
    }
}

/// Options for [`SindriClient::create_circuit`].
#[derive(Debug, Clone, Default)]
pub struct CircuitOptions {
    /// Tags for the circuit. Empty means untagged.
    pub tags: Vec<String>,
    /// Metadata, merged over the defaults from `SINDRI_META`.
    pub meta: Meta,
}

/// Options for [`SindriClient::prove_circuit`].
#[derive(Debug, Clone, Default)]
pub struct ProofOptions {
    /// Verify the proof on the server after generating it.
    pub verify: bool,
    /// Also fetch the proof as smart contract calldata, when the framework supports it.
    pub include_smart_contract_calldata: bool,
    /// Metadata, merged over the defaults from `SINDRI_META`.
    pub meta: Meta,
}

/// Client for compiling circuits and generating proofs with Sindri.
///
/// Both flows upload a job, poll its status until it is `Ready` or `Failed`, and return the full
/// job record. A `Failed` job is returned as a normal response, check its `status` and `error`.
pub struct SindriClient<A = HttpTransport> {
    api: A,
    meta: MetadataValidator,
    polling_interval: Duration,
    archive_writer: Arc<dyn ArchiveWriter>,
}

impl SindriClient<HttpTransport> {
    /// Creates a client talking to the Sindri REST API.
    pub fn new(auth: AuthOptions) -> Result<Self> {
        let ResolvedAuth { api_key, base_url } = auth.resolve();
        Ok(Self::with_api(HttpTransport::new(&base_url, api_key)?))
    }

    /// Lists the circuits of the authenticated team.
    pub async fn list_circuits(&self) -> Result<Vec<CircuitInfoResponse>> {
        self.api.list_circuits().await
    }

    /// Deletes a circuit.
    pub async fn delete_circuit(&self, circuit_id: &str) -> Result<()> {
        self.api.delete_circuit(circuit_id).await
    }

    /// Fetches the team the API key belongs to.
    pub async fn team_me(&self) -> Result<TeamMeResponse> {
        self.api.team_me().await
    }
}

impl<A: SindriApi> SindriClient<A> {
    /// Creates a client on top of any transport. Default metadata is read from `SINDRI_META`.
    pub fn with_api(api: A) -> Self {
        Self {
            api,
            meta: MetadataValidator::from_env(),
            polling_interval: DEFAULT_POLLING_INTERVAL,
            archive_writer: Arc::new(TarGzWriter),
        }
    }

    /// Sets the interval between two status queries.
    pub fn with_polling_interval(mut self, polling_interval: Duration) -> Self {
        self.polling_interval = polling_interval;
        self
    }

    /// Replaces the source of default metadata.
    pub fn with_meta_validator(mut self, meta: MetadataValidator) -> Self {
        self.meta = meta;
        self
    }

    /// Replaces the writer used to package project directories and in-memory files.
    pub fn with_archive_writer(mut self, writer: impl ArchiveWriter + 'static) -> Self {
        self.archive_writer = Arc::new(writer);
        self
    }

    /// The underlying transport.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// The metadata validator holding the default metadata.
    pub fn meta_validator(&self) -> &MetadataValidator {
        &self.meta
    }

    /// Uploads and compiles a circuit, waiting for the compilation to finish.
    ///
    /// Tags, metadata and the project are validated before anything is sent. The returned record
    /// excludes the verification key; fetch it with [`SindriClient::get_circuit`].
    pub async fn create_circuit(
        &self,
        source: &ProjectSource,
        options: CircuitOptions,
    ) -> Result<CircuitInfoResponse> {
        let tags = validate_tags(&options.tags)?;
        let meta = self.meta.validate_and_merge(&options.meta)?;
        let bundle = bundle_project(source, self.archive_writer.as_ref())?;

        let start = Instant::now();
        let created = self
            .api
            .circuit_create(CircuitCreateForm { bundle, tags, meta })
            .await?;
        let circuit_id = created.circuit_id;
        info!(%circuit_id, "Circuit uploaded, waiting for compilation");

        let api = &self.api;
        let id = circuit_id.as_str();
        let status = poll_until_terminal(self.polling_interval, move || api.circuit_status(id))
            .await?;

        let circuit = self.api.circuit_detail(&circuit_id, false).await?;
        if status.status == JobStatus::Failed {
            error!(
                %circuit_id,
                "Circuit compilation failed: {}",
                circuit.error.as_deref().unwrap_or("Unknown error.")
            );
        } else {
            debug!(%circuit_id, elapsed = ?start.elapsed(), "Circuit compiled");
        }
        Ok(circuit)
    }

    /// Requests a proof for an existing circuit, waiting for the proof to finish.
    ///
    /// `circuit_id` is a circuit UUID or `<name>:<tag>`. `proof_input` is passed to the server
    /// unparsed (JSON, or TOML for Noir).
    pub async fn prove_circuit(
        &self,
        circuit_id: &str,
        proof_input: impl Into<String>,
        options: ProofOptions,
    ) -> Result<ProofInfoResponse> {
        let meta = self.meta.validate_and_merge(&options.meta)?;

        let start = Instant::now();
        let created = self
            .api
            .proof_create(
                circuit_id,
                ProofCreateForm {
                    proof_input: proof_input.into(),
                    perform_verify: options.verify,
                    meta,
                },
            )
            .await?;
        let proof_id = created.proof_id;
        info!(%proof_id, %circuit_id, "Proof requested, waiting for generation");

        let api = &self.api;
        let id = proof_id.as_str();
        let status =
            poll_until_terminal(self.polling_interval, move || api.proof_status(id)).await?;

        let query = ProofDetailQuery {
            include_smart_contract_calldata: options.include_smart_contract_calldata
                && created.circuit_type.supports_smart_contract_calldata(),
            ..ProofDetailQuery::full()
        };
        let proof = self.api.proof_detail(&proof_id, query).await?;
        if status.status == JobStatus::Failed {
            error!(
                %proof_id,
                "Proof generation failed: {}",
                proof.error.as_deref().unwrap_or("Unknown error.")
            );
        } else {
            debug!(%proof_id, elapsed = ?start.elapsed(), "Proof generated");
        }
        Ok(proof)
    }

    /// Fetches a circuit record.
    pub async fn get_circuit(
        &self,
        circuit_id: &str,
        include_verification_key: bool,
    ) -> Result<CircuitInfoResponse> {
        self.api
            .circuit_detail(circuit_id, include_verification_key)
            .await
    }

    /// Fetches a proof record.
    pub async fn get_proof(
        &self,
        proof_id: &str,
        query: ProofDetailQuery,
    ) -> Result<ProofInfoResponse> {
        self.api.proof_detail(proof_id, query).await
    }
}
