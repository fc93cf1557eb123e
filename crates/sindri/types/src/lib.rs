//! Shared type definitions for the Sindri SDK and CLI.
//!
//! This crate provides the response types returned by the Sindri proving service for circuit
//! compilation and proof generation jobs, plus the account types used by the CLI login flow.
//!
//! ## Overview
//!
//! Both circuits and proofs are asynchronous jobs on the server:
//! - Create - Upload a project (or proof input) and receive a job identifier
//! - Status - Cheap status query used while waiting for the job
//! - Detail - Full job record, fetched once the job reaches a terminal [`JobStatus`]
//!
//! Fields specific to one circuit framework are kept in the `extra` map of the info responses
//! so that new frameworks do not break deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Metadata attached to circuits and proofs.
///
/// A `BTreeMap` keeps serialization order stable, so the same metadata always produces the
/// same request body.
pub type Meta = BTreeMap<String, String>;

/// Status of a circuit compilation or proof generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum JobStatus {
    /// Accepted by the server, waiting for a worker.
    Queued,
    /// A worker is processing the job.
    #[serde(rename = "In Progress")]
    #[strum(serialize = "In Progress")]
    InProgress,
    /// The job finished successfully.
    Ready,
    /// The job finished with an error.
    Failed,
    /// A label this client does not know about yet, treated as still running.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Returns `true` for [`JobStatus::Ready`] and [`JobStatus::Failed`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

/// Anything that reports the status of a remote job.
pub trait JobState {
    /// Current status of the job.
    fn status(&self) -> JobStatus;
}

/// Development framework a circuit is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CircuitType {
    /// zkSync Boojum.
    Boojum,
    /// Circom.
    Circom,
    /// Gnark.
    Gnark,
    /// Halo2 (Axiom and PSE flavors).
    Halo2,
    /// Polygon Hermez.
    Hermez,
    /// a16z Jolt zkVM.
    Jolt,
    /// Aztec Noir.
    Noir,
    /// OpenVM.
    Openvm,
    /// Plonky2.
    Plonky2,
    /// Aleo snarkVM.
    Snarkvm,
    /// Succinct SP1 zkVM.
    Sp1,
    /// A framework this client does not know about yet.
    #[serde(other)]
    #[strum(serialize = "unknown")]
    Unknown,
}

impl CircuitType {
    /// Whether proofs for this framework can be formatted as smart contract calldata.
    pub fn supports_smart_contract_calldata(&self) -> bool {
        matches!(self, Self::Circom | Self::Gnark | Self::Noir)
    }
}

/// Response for getting circuit status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitStatusResponse {
    /// Unique identifier of the circuit. UUID4 format.
    pub circuit_id: String,
    /// The status of the circuit job.
    pub status: JobStatus,
}

impl JobState for CircuitStatusResponse {
    fn status(&self) -> JobStatus {
        self.status
    }
}

/// Response for getting proof status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofStatusResponse {
    /// Unique identifier of the proof. UUID4 format.
    pub proof_id: String,
    /// The status of the proof job.
    pub status: JobStatus,
}

impl JobState for ProofStatusResponse {
    fn status(&self) -> JobStatus {
        self.status
    }
}

/// Response for getting circuit info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitInfoResponse {
    /// Unique identifier of the circuit. UUID4 format.
    pub circuit_id: String,
    /// Name of the circuit, taken from the `name` field of `sindri.json`.
    pub circuit_name: String,
    /// Name of the project the circuit belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Development framework of the circuit.
    pub circuit_type: CircuitType,
    /// UTC datetime the circuit was uploaded in ISO8601 format.
    pub date_created: String,
    /// The status of the circuit job.
    pub status: JobStatus,
    /// Metadata keys and values specified at creation time.
    #[serde(default)]
    pub meta: Meta,
    /// Tags attached to the circuit.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Total compute time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_time_sec: Option<f64>,
    /// The verification key of the circuit, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_key: Option<Value>,
    /// Compilation warnings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    /// The error message for a failed compilation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Framework specific fields (e.g. `num_constraints` for Circom).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobState for CircuitInfoResponse {
    fn status(&self) -> JobStatus {
        self.status
    }
}

/// Response for getting proof info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofInfoResponse {
    /// Unique identifier of the proof. UUID4 format.
    pub proof_id: String,
    /// Identifier of the circuit the proof was generated for.
    pub circuit_id: String,
    /// Name of the circuit the proof was generated for.
    #[serde(default)]
    pub circuit_name: String,
    /// Name of the project the circuit belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Development framework of the circuit.
    pub circuit_type: CircuitType,
    /// UTC datetime the proof was requested in ISO8601 format.
    pub date_created: String,
    /// Metadata keys and values specified at creation time.
    #[serde(default)]
    pub meta: Meta,
    /// Whether the server verified the proof after generating it.
    #[serde(default)]
    pub perform_verify: bool,
    /// The status of the proof job.
    pub status: JobStatus,
    /// Total compute time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_time_sec: Option<f64>,
    /// The succinct argument(s) of knowledge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Value>,
    /// The public outputs of the circuit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<Value>,
    /// The proof and public outputs formatted as smart contract verifier calldata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_contract_calldata: Option<String>,
    /// Whether calldata is available for this proof.
    #[serde(default)]
    pub has_smart_contract_calldata: bool,
    /// Whether the proof's circuit has a verification key available.
    #[serde(default)]
    pub has_verification_key: bool,
    /// The verification key of the circuit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_key: Option<Value>,
    /// Runtime warnings with UTC timestamps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    /// The error message for a failed proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Fields this client does not model explicitly.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobState for ProofInfoResponse {
    fn status(&self) -> JobStatus {
        self.status
    }
}

/// Team details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamDetail {
    /// Numeric team identifier.
    pub id: u64,
    /// Display name of the team.
    pub name: String,
    /// URL safe team identifier.
    pub slug: String,
    /// Whether this is the user's personal team.
    #[serde(default)]
    pub is_personal: bool,
    /// Fields this client does not model explicitly.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response for the team associated with the current API key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMeResponse {
    /// The authenticated team.
    pub team: TeamDetail,
}

/// Request to generate an API key from user credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObtainApiKeyInput {
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Human readable name for the new key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Response containing a newly generated API key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    /// The secret key. Only present in the generation response.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Identifier of the key.
    pub id: String,
    /// Human readable name of the key.
    pub name: String,
    /// UTC datetime the key was created in ISO8601 format.
    #[serde(default)]
    pub date_created: String,
}
