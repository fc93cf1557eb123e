//! Sindri CLI configuration.
//!
//! Stores the credentials written by `sindri login` so that later commands (and the SDK, when no
//! explicit credentials are given) can authenticate against the Sindri API.
//!
//! The on-disk format is the JSON `sindri.conf.json` file; a TOML file is accepted as well when
//! the path ends in `.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Name of the config file inside the platform config directory.
pub const CONFIG_FILENAME: &str = "sindri.conf.json";

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "https://sindri.app";

/// CLI configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Credentials of the logged in team, `None` when logged out.
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

/// Credentials produced by `sindri login`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// API key used as bearer token.
    pub api_key: String,
    /// Identifier of the API key, when it was generated by the CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<String>,
    /// Name of the API key, when it was generated by the CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_name: Option<String>,
    /// Base URL of the Sindri API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Numeric identifier of the team the key belongs to.
    pub team_id: u64,
    /// Slug of the team the key belongs to.
    pub team_slug: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Config {
    /// Default config location, e.g. `~/.config/sindri/sindri.conf.json` on Linux.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "sindri")
            .context("Failed to determine the user config directory")?;
        Ok(dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// Load config from file (auto-detects format from extension).
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let string = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {path:?}"))?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Self::from_json_str(&string),
            Some("toml") => Self::from_toml_str(&string),
            Some(ext) => bail!("Unsupported config format: .{ext}"),
            None => bail!("Config file must have an extension (e.g., .json)"),
        };
        config.with_context(|| format!("Invalid config at {path:?}"))
    }

    /// Load config from file, falling back to the default config when the file does not exist
    /// or cannot be used.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!(?path, "Config file does not exist, using default config");
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => {
                debug!(?path, "Config loaded");
                config
            }
            Err(error) => {
                warn!(
                    ?path,
                    error = %error,
                    "Config file is invalid and will not be used, remove it to start fresh"
                );
                Self::default()
            }
        }
    }

    /// Write config to file, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent:?}"))?;
        }

        let string = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => self.to_toml()?,
            _ => self.to_json()?,
        };
        std::fs::write(path, string).with_context(|| format!("Failed to write config at {path:?}"))
    }

    /// Parse config from JSON string. The input holds credentials and is never echoed in errors.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        serde_json::from_str(s).context("Failed to deserialize JSON config")
    }

    /// Converts to pretty JSON string.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse config from TOML string.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        // The full TOML error renders the offending source line.
        toml_edit::de::from_str(s)
            .map_err(|error| anyhow!("Failed to deserialize TOML config: {}", error.message()))
    }

    /// Converts to TOML string.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml_edit::ser::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod test {
    use tempfile::tempdir;

    use crate::{AuthConfig, Config, DEFAULT_BASE_URL};

    #[test]
    fn test_from_json_str() {
        let json = r#"
            {
              "auth": {
                "apiKey": "sk-test",
                "apiKeyId": "key-id",
                "apiKeyName": "laptop-sdk",
                "baseUrl": "https://sindri.app",
                "teamId": 7,
                "teamSlug": "zk-team"
              }
            }
        "#;
        assert_eq!(Config::from_json_str(json).unwrap(), sample_config());
    }

    #[test]
    fn test_from_toml_str() {
        let toml = r#"
            [auth]
            apiKey = "sk-test"
            apiKeyId = "key-id"
            apiKeyName = "laptop-sdk"
            baseUrl = "https://sindri.app"
            teamId = 7
            teamSlug = "zk-team"
        "#;
        assert_eq!(Config::from_toml_str(toml).unwrap(), sample_config());
    }

    #[test]
    fn test_logged_out_and_defaults() {
        assert_eq!(Config::from_json_str("{}").unwrap(), Config::default());
        assert_eq!(Config::from_json_str(r#"{"auth": null}"#).unwrap(), Config::default());

        let config = Config::from_json_str(
            r#"{"auth": {"apiKey": "sk", "teamId": 1, "teamSlug": "solo"}}"#,
        )
        .unwrap();
        let auth = config.auth.unwrap();
        assert_eq!(auth.base_url, DEFAULT_BASE_URL);
        assert_eq!(auth.api_key_id, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        for file in ["nested/sindri.conf.json", "sindri.toml"] {
            let path = dir.path().join(file);
            sample_config().save(&path).unwrap();
            assert_eq!(Config::load(&path).unwrap(), sample_config());
        }
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(Config::load_or_default(&missing), Config::default());

        let invalid = dir.path().join("invalid.json");
        std::fs::write(&invalid, r#"{"auth": {"apiKey": 1}}"#).unwrap();
        assert_eq!(Config::load_or_default(&invalid), Config::default());
    }

    #[test]
    fn test_load_errors_hide_credentials() {
        let dir = tempdir().unwrap();
        let files = [
            (
                "sindri.conf.json",
                r#"{"auth": {"apiKey": "sk-SECRET-123", "teamId": "oops", "teamSlug": "zk"}}"#,
            ),
            (
                "sindri.toml",
                "[auth]\napiKey = \"sk-SECRET-123\"\nteamId = \"oops\"\nteamSlug = \"zk\"\n",
            ),
        ];
        for (file, contents) in files {
            let path = dir.path().join(file);
            std::fs::write(&path, contents).unwrap();

            let err = format!("{:#}", Config::load(&path).unwrap_err());
            assert!(err.contains(file), "{err}");
            assert!(!err.contains("sk-SECRET-123"), "{err}");
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sindri.yaml");
        std::fs::write(&path, "auth: null").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported config format: .yaml");
    }

    fn sample_config() -> Config {
        Config {
            auth: Some(AuthConfig {
                api_key: "sk-test".to_string(),
                api_key_id: Some("key-id".to_string()),
                api_key_name: Some("laptop-sdk".to_string()),
                base_url: "https://sindri.app".to_string(),
                team_id: 7,
                team_slug: "zk-team".to_string(),
            }),
        }
    }
}
