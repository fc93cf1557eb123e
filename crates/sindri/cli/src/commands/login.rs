use anyhow::{Context as _, bail};
use clap::Args;
use sindri::{HttpTransport, SINDRI_BASE_URL_ENV};
use sindri_config::{AuthConfig, DEFAULT_BASE_URL};
use sindri_types::ObtainApiKeyInput;
use tracing::{debug, info};

use super::{Context, has_status};

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Existing API key to authorize with, skips generating a new one.
    #[arg(long)]
    api_key: Option<String>,

    /// Username of the Sindri account, used to generate an API key.
    #[arg(long, required_unless_present = "api_key")]
    username: Option<String>,

    /// Password of the Sindri account.
    #[arg(long, env = "SINDRI_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Name for the generated API key, `<hostname>-sdk` by default.
    #[arg(long)]
    name: Option<String>,

    /// Base URL of the Sindri API.
    #[arg(long, env = SINDRI_BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

pub async fn run(args: LoginArgs, mut ctx: Context) -> anyhow::Result<()> {
    let (api_key, api_key_id, api_key_name) = match args.api_key {
        Some(api_key) => (api_key, None, None),
        None => {
            let transport = HttpTransport::new(&args.base_url, None)?;
            let input = ObtainApiKeyInput {
                username: args.username.context("A username is required to log in")?,
                password: args.password.context("A password is required to log in")?,
                name: Some(args.name.unwrap_or_else(default_key_name)),
            };
            let response = match transport.generate_api_key(&input).await {
                Ok(response) => response,
                Err(error) if has_status(&error, 401) => {
                    bail!("Login failed, please check your username and password.")
                }
                Err(error) => return Err(error.into()),
            };
            debug!(id = %response.id, name = %response.name, "Generated API key");
            let api_key = response
                .api_key
                .context("No API key was returned by the server")?;
            (api_key, Some(response.id), Some(response.name))
        }
    };

    let transport = HttpTransport::new(&args.base_url, Some(api_key.clone()))?;
    let team = match transport.team_me().await {
        Ok(response) => response.team,
        Err(error) if has_status(&error, 401) => {
            bail!("Your credentials are invalid. Please log in again with `sindri login`.")
        }
        Err(error) => return Err(error.into()),
    };

    ctx.config.auth = Some(AuthConfig {
        api_key,
        api_key_id,
        api_key_name,
        base_url: args.base_url,
        team_id: team.id,
        team_slug: team.slug,
    });
    ctx.config.save(&ctx.config_path)?;
    info!(
        config_path = ?ctx.config_path,
        "You have successfully authorized the client with your Sindri account."
    );
    Ok(())
}

fn default_key_name() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "sindri".to_string());
    format!("{host}-sdk")
}
