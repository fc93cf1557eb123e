//! Sindri SDK.
//!
//! Compiles zero-knowledge circuits and generates proofs with the Sindri proving service.
//!
//! ```no_run
//! use sindri::{AuthOptions, CircuitOptions, ProjectSource, ProofOptions, SindriClient};
//!
//! # async fn run() -> sindri::Result<()> {
//! let client = SindriClient::new(AuthOptions::default())?;
//! let options = CircuitOptions {
//!     tags: vec!["v1".to_string()],
//!     ..Default::default()
//! };
//! let circuit = client
//!     .create_circuit(&ProjectSource::from_path("circuits/multiplier2")?, options)
//!     .await?;
//! let proof = client
//!     .prove_circuit(&circuit.circuit_id, r#"{"a": 3, "b": 4}"#, ProofOptions::default())
//!     .await?;
//! println!("{:?}", proof.proof);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod bundle;
mod client;
mod error;
pub mod http;
pub mod meta;
pub mod poll;
pub mod tag;

pub use api::{ProofDetailQuery, SindriApi};
pub use bundle::{Bundle, ProjectFile, ProjectSource};
pub use client::{
    AuthOptions, CircuitOptions, ProofOptions, ResolvedAuth, SINDRI_API_KEY_ENV,
    SINDRI_BASE_URL_ENV, SINDRI_CONFIG_PATH_ENV, SindriClient,
};
pub use error::{Error, Result};
pub use http::HttpTransport;
pub use meta::MetadataValidator;
pub use sindri_types as types;
