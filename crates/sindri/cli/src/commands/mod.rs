//! Subcommands and the helpers they share.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use sindri::{
    AuthOptions, Error, HttpTransport, MetadataValidator, SindriClient,
    bundle::{Manifest, find_manifest},
    meta::{DefaultMetaOptions, validate_meta_entry},
};
use sindri_config::Config;
use tracing::debug;

pub mod deploy;
pub mod init;
pub mod lint;
pub mod login;
pub mod logout;
pub mod proof;
pub mod whoami;

/// Loaded configuration shared by all subcommands.
pub struct Context {
    pub config_path: PathBuf,
    pub config: Config,
}

impl Context {
    pub fn load(config_path: PathBuf) -> Self {
        let config = Config::load_or_default(&config_path);
        Self {
            config_path,
            config,
        }
    }

    /// SDK client for the stored (or environment provided) credentials.
    pub fn client(&self) -> anyhow::Result<SindriClient> {
        let auth =
            AuthOptions::default().resolve_with(|name| std::env::var(name).ok(), &self.config);
        let Some(api_key) = auth.api_key else {
            bail!("You must login first with `sindri login`.");
        };

        // Read the defaults leniently once so that invalid `SINDRI_META` entries only warn.
        let meta = MetadataValidator::from_env();
        meta.default_meta(DefaultMetaOptions::default())?;

        let transport = HttpTransport::new(&auth.base_url, Some(api_key))?;
        Ok(SindriClient::with_api(transport).with_meta_validator(meta))
    }
}

/// A project located from a directory inside it.
pub struct Project {
    pub root: PathBuf,
    pub manifest: Manifest,
}

impl Project {
    pub fn find(directory: &Path) -> anyhow::Result<Self> {
        let directory = std::path::absolute(directory)
            .with_context(|| format!("Failed to resolve {directory:?}"))?;
        if !directory.exists() {
            bail!("The {directory:?} directory does not exist. Aborting.");
        }
        let Some(manifest_path) = find_manifest(&directory) else {
            bail!("No \"sindri.json\" file was found in or above {directory:?}. Aborting.");
        };
        debug!(?manifest_path, "Found sindri.json");

        let manifest = Manifest::load(&manifest_path)?;
        debug!(name = %manifest.name, "Loaded sindri.json");
        let root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(directory);
        Ok(Self { root, manifest })
    }
}

/// Parses `key=value` for `--meta`.
pub fn parse_meta_entry(entry: &str) -> Result<(String, String), String> {
    let Some((key, value)) = entry.split_once('=') else {
        return Err(format!("Invalid metadata entry '{entry}' (missing '=', try 'key=value')."));
    };
    validate_meta_entry(key, value)?;
    Ok((key.to_string(), value.to_string()))
}

/// Parses a tag for `--tag`.
pub fn parse_tag(tag: &str) -> Result<String, String> {
    if !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(tag.to_string())
    } else {
        Err(format!(
            "\"{tag}\" is not a valid tag. Tags may only contain alphanumeric characters, \
             underscores, and hyphens."
        ))
    }
}

/// Whether the error is an HTTP response with the given status code.
pub fn has_status(error: &Error, code: u16) -> bool {
    error.status().is_some_and(|status| status.as_u16() == code)
}
