//! The job oriented subset of the Sindri API used by the submission flows.

use std::future::Future;

use sindri_types::{
    CircuitInfoResponse, CircuitStatusResponse, Meta, ProofInfoResponse, ProofStatusResponse,
};

use crate::{bundle::Bundle, error::Result};

/// Body of a circuit upload.
#[derive(Debug, Clone)]
pub struct CircuitCreateForm {
    /// The packaged project.
    pub bundle: Bundle,
    /// Validated tags, `[""]` for untagged uploads.
    pub tags: Vec<String>,
    /// Validated metadata.
    pub meta: Meta,
}

/// Body of a proof request.
#[derive(Debug, Clone)]
pub struct ProofCreateForm {
    /// Raw proof input, passed to the server unparsed.
    pub proof_input: String,
    /// Whether the server should verify the proof after generating it.
    pub perform_verify: bool,
    /// Validated metadata.
    pub meta: Meta,
}

/// Optional fields of the proof detail response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProofDetailQuery {
    /// Include the proof itself.
    pub include_proof: bool,
    /// Include the public outputs.
    pub include_public: bool,
    /// Include smart contract calldata.
    pub include_smart_contract_calldata: bool,
    /// Include the circuit verification key.
    pub include_verification_key: bool,
}

impl ProofDetailQuery {
    /// Proof, public outputs and verification key, without calldata.
    pub fn full() -> Self {
        Self {
            include_proof: true,
            include_public: true,
            include_smart_contract_calldata: false,
            include_verification_key: true,
        }
    }
}

/// Transport for the circuit and proof job endpoints.
///
/// Implementations return [`crate::Error::ErrorStatus`] for non-2xx responses.
pub trait SindriApi: Send + Sync {
    /// Uploads a circuit project and starts its compilation.
    fn circuit_create(
        &self,
        form: CircuitCreateForm,
    ) -> impl Future<Output = Result<CircuitInfoResponse>> + Send;

    /// Fetches the compilation status of a circuit.
    fn circuit_status(
        &self,
        circuit_id: &str,
    ) -> impl Future<Output = Result<CircuitStatusResponse>> + Send;

    /// Fetches the full circuit record.
    fn circuit_detail(
        &self,
        circuit_id: &str,
        include_verification_key: bool,
    ) -> impl Future<Output = Result<CircuitInfoResponse>> + Send;

    /// Requests a proof for an existing circuit.
    fn proof_create(
        &self,
        circuit_id: &str,
        form: ProofCreateForm,
    ) -> impl Future<Output = Result<ProofInfoResponse>> + Send;

    /// Fetches the status of a proof.
    fn proof_status(
        &self,
        proof_id: &str,
    ) -> impl Future<Output = Result<ProofStatusResponse>> + Send;

    /// Fetches the full proof record.
    fn proof_detail(
        &self,
        proof_id: &str,
        query: ProofDetailQuery,
    ) -> impl Future<Output = Result<ProofInfoResponse>> + Send;
}
