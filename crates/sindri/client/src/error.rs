use std::{io, path::PathBuf};

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Error type for Sindri client operations.
///
/// Validation errors are raised before any network I/O. A job that the server reports as
/// `Failed` is not an error; it is returned as a normal response.
#[derive(Debug, Error)]
pub enum Error {
    /// A tag contains characters outside of `[-a-zA-Z0-9_.]`.
    #[error(
        "\"{tag}\" is not a valid tag. Tags may only contain alphanumeric characters, \
         underscores, hyphens, and periods."
    )]
    InvalidTag {
        /// The offending tag.
        tag: String,
    },
    /// A metadata entry failed validation.
    #[error("{0}")]
    InvalidMeta(String),
    /// The project manifest does not exist.
    #[error("No \"sindri.json\" file was found at {path:?}")]
    ManifestNotFound {
        /// Where the manifest was expected.
        path: PathBuf,
    },
    /// The project manifest is not valid JSON.
    #[error("Error loading {path:?}, perhaps it is not valid JSON? {source}")]
    InvalidManifest {
        /// Path (or in-memory name) of the manifest.
        path: PathBuf,
        /// The parse error.
        source: serde_json::Error,
    },
    /// The project manifest has no string `name` field.
    #[error("No \"name\" field found in {path:?}")]
    MissingManifestName {
        /// Path (or in-memory name) of the manifest.
        path: PathBuf,
    },
    /// The archive path does not have a recognized extension.
    #[error("Unsupported archive format for {path:?}, expected .tar.gz, .tgz or .zip")]
    UnsupportedArchive {
        /// The offending path.
        path: PathBuf,
    },
    /// The project path does not exist.
    #[error("The path {path:?} does not exist")]
    PathNotFound {
        /// The missing path.
        path: PathBuf,
    },
    /// An in-memory project file cannot be packaged.
    #[error("Invalid project file \"{name}\": {reason}")]
    InvalidProjectFile {
        /// Name of the offending entry.
        name: String,
        /// Why the entry was rejected.
        reason: &'static str,
    },
    /// Reading project files or building the archive failed.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        /// The path being read or written.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// No API key is configured.
    #[error("No API key is configured, log in with `sindri login` or set SINDRI_API_KEY")]
    Unauthorized,
    /// The configured base URL cannot be used to build endpoint URLs.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    /// HTTP request failed.
    #[error("Request error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Server returned an error response with status code >= 400.
    #[error(
        "Requested {url} failed with status {status} and msg {}",
        body.as_ref().map(Value::to_string).as_deref().unwrap_or("Unknown")
    )]
    ErrorStatus {
        /// The HTTP status code.
        status: StatusCode,
        /// The requested URL.
        url: Url,
        /// Error body from the server response, parsed as JSON when possible.
        body: Option<Value>,
    },
    /// Serializing a request or deserializing a response failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status code of the failed request, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::ErrorStatus { status, .. } => Some(*status),
            Self::Reqwest(error) => error.status(),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
