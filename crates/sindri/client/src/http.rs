//! [`SindriApi`] over HTTP.

use std::time::Duration;

use reqwest::{
    Client, RequestBuilder, Response,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sindri_types::{
    ApiKeyResponse, CircuitInfoResponse, CircuitStatusResponse, ObtainApiKeyInput,
    ProofInfoResponse, ProofStatusResponse, TeamMeResponse,
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    api::{CircuitCreateForm, ProofCreateForm, ProofDetailQuery, SindriApi},
    error::{Error, Result},
};

const API_PREFIX: [&str; 2] = ["api", "v1"];

/// reqwest based transport for the Sindri REST API.
///
/// Idempotent GET requests are retried with exponential backoff (1s, 2s, ...) unless the server
/// answered with a 4xx status. Uploads and deletions are sent exactly once.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    base_url: Url,
    api_key: Option<String>,
    client: Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpTransport {
    /// Creates a transport for the API at `base_url`.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        Self::with_client(base_url, api_key, Client::new())
    }

    /// Creates a transport with a custom [`reqwest::Client`].
    pub fn with_client(base_url: &str, api_key: Option<String>, client: Client) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            api_key,
            client,
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Sets how many times a GET request is attempted in total.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the delay before the first retry, doubled for each further retry.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Base URL of the API.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Lists the circuits of the authenticated team.
    pub async fn list_circuits(&self) -> Result<Vec<CircuitInfoResponse>> {
        self.get(self.endpoint(&["circuit", "list"])?).await
    }

    /// Deletes a circuit.
    pub async fn delete_circuit(&self, circuit_id: &str) -> Result<()> {
        let url = self.endpoint(&["circuit", circuit_id, "delete"])?;
        send(self.authorize(self.client.delete(url))?).await?;
        Ok(())
    }

    /// Fetches the team the API key belongs to.
    pub async fn team_me(&self) -> Result<TeamMeResponse> {
        self.get(self.endpoint(&["team", "me"])?).await
    }

    /// Generates a new API key from account credentials. Does not need an API key.
    pub async fn generate_api_key(&self, input: &ObtainApiKeyInput) -> Result<ApiKeyResponse> {
        let url = self.endpoint(&["apikey", "generate"])?;
        let response = send(self.client.post(url).json(input)).await?;
        Ok(response.json().await?)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let api_key = self.api_key.as_deref().ok_or(Error::Unauthorized)?;
        Ok(request.bearer_auth(api_key))
    }

    /// Delay after the failed `attempt`, doubling from `retry_delay`.
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    async fn get<Res: DeserializeOwned>(&self, url: Url) -> Result<Res> {
        let mut attempt = 1;
        loop {
            let request = self.authorize(self.client.get(url.clone()))?;
            match send(request).await {
                Ok(response) => return Ok(response.json().await?),
                Err(error)
                    if attempt >= self.max_attempts
                        || error.status().is_some_and(|status| status.is_client_error()) =>
                {
                    return Err(error);
                }
                Err(error) => {
                    warn!(%url, attempt, error = %error, "GET request failed, retrying");
                    tokio::time::sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn with_flags(mut url: Url, flags: &[(&str, bool)]) -> Url {
    {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in flags {
            pairs.append_pair(name, if *value { "true" } else { "false" });
        }
    }
    url
}

impl SindriApi for HttpTransport {
    async fn circuit_create(&self, form: CircuitCreateForm) -> Result<CircuitInfoResponse> {
        let CircuitCreateForm { bundle, tags, meta } = form;
        let mime = if bundle.filename.to_ascii_lowercase().ends_with(".zip") {
            "application/zip"
        } else {
            "application/gzip"
        };
        let files = Part::bytes(bundle.bytes)
            .file_name(bundle.filename)
            .mime_str(mime)?;
        let mut multipart = Form::new().part("files", files);
        for tag in tags {
            multipart = multipart.text("tags", tag);
        }
        let multipart = multipart.text("meta", serde_json::to_string(&meta)?);

        let url = self.endpoint(&["circuit", "create"])?;
        debug!(%url, "Uploading circuit");
        let response = send(self.authorize(self.client.post(url))?.multipart(multipart)).await?;
        Ok(response.json().await?)
    }

    async fn circuit_status(&self, circuit_id: &str) -> Result<CircuitStatusResponse> {
        self.get(self.endpoint(&["circuit", circuit_id, "status"])?).await
    }

    async fn circuit_detail(
        &self,
        circuit_id: &str,
        include_verification_key: bool,
    ) -> Result<CircuitInfoResponse> {
        let url = with_flags(
            self.endpoint(&["circuit", circuit_id, "detail"])?,
            &[("include_verification_key", include_verification_key)],
        );
        self.get(url).await
    }

    async fn proof_create(
        &self,
        circuit_id: &str,
        form: ProofCreateForm,
    ) -> Result<ProofInfoResponse> {
        let body = [
            ("proof_input", form.proof_input),
            ("perform_verify", form.perform_verify.to_string()),
            ("meta", serde_json::to_string(&form.meta)?),
        ];
        let url = self.endpoint(&["circuit", circuit_id, "prove"])?;
        debug!(%url, "Requesting proof");
        let response = send(self.authorize(self.client.post(url))?.form(&body)).await?;
        Ok(response.json().await?)
    }

    async fn proof_status(&self, proof_id: &str) -> Result<ProofStatusResponse> {
        self.get(self.endpoint(&["proof", proof_id, "status"])?).await
    }

    async fn proof_detail(
        &self,
        proof_id: &str,
        query: ProofDetailQuery,
    ) -> Result<ProofInfoResponse> {
        let url = with_flags(
            self.endpoint(&["proof", proof_id, "detail"])?,
            &[
                ("include_proof", query.include_proof),
                ("include_public", query.include_public),
                (
                    "include_smart_contract_calldata",
                    query.include_smart_contract_calldata,
                ),
                ("include_verification_key", query.include_verification_key),
            ],
        );
        self.get(url).await
    }
}

/// Sends an HTTP request and turns error status codes into [`Error::ErrorStatus`].
async fn send(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response
        .text()
        .await
        .ok()
        .filter(|text| !text.is_empty())
        .map(|text| serde_json::from_str(&text).unwrap_or(Value::String(text)));
    Err(Error::ErrorStatus { status, url, body })
}
