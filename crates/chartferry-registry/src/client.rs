//! Registry HTTP client
//!
//! Talks to the chart API of a Harbor-style registry:
//! - multipart upload of a packaged chart (and its provenance file)
//! - metadata of a single chart version
//! - the list of versions of a chart
//! - archive download

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;

use crate::config::RegistryEndpoint;
use crate::credentials::Credentials;
use crate::error::{RegistryError, Result};
use crate::metadata::{ChartMetadata, ChartVersionDetails};

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub status: u16,
}

/// Result of asking the registry for one chart version
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The version is indexed
    Found(Box<ChartVersionDetails>),
    /// Any non-success response; the registry may still be indexing
    NotFound { status: u16, body: String },
}

/// Lookup of indexed chart versions, the seam the poller works against
#[async_trait]
pub trait ChartIndex: Send + Sync {
    async fn fetch_chart_version(&self, name: &str, version: &str) -> Result<FetchOutcome>;
}

/// HTTP client bound to one registry project
pub struct RegistryClient {
    endpoint: RegistryEndpoint,
    credentials: Option<Credentials>,
    client: reqwest::Client,
}

impl RegistryClient {
    pub fn new(endpoint: RegistryEndpoint, credentials: Option<Credentials>) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Redirects are not followed so credentials stay on this origin
            .redirect(reqwest::redirect::Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self {
            endpoint,
            credentials,
            client,
        })
    }

    pub fn endpoint(&self) -> &RegistryEndpoint {
        &self.endpoint
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(creds) => request.header(reqwest::header::AUTHORIZATION, creds.auth_header()),
            None => request,
        }
    }

    /// Upload a packaged chart.
    ///
    /// Anything but `201 Created` with `saved: true` and no `error` in the
    /// body is a failure. Nothing is retried here.
    pub async fn upload(
        &self,
        chart: &Path,
        provenance: Option<&Path>,
        force: bool,
    ) -> Result<UploadReceipt> {
        let url = self.endpoint.upload_url(force);
        tracing::debug!(url = %url, chart = %chart.display(), "uploading chart");

        let mut form = Form::new().part("chart", file_part(chart).await?);
        if let Some(prov) = provenance {
            form = form.part("prov", file_part(prov).await?);
        }

        let response = self
            .authorize(self.client.post(&url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        classify_upload(status, &body)
    }

    /// Metadata of one chart version; non-success responses are not errors
    pub async fn fetch_chart_version(&self, name: &str, version: &str) -> Result<FetchOutcome> {
        let url = self.endpoint.chart_version_url(name, version);
        tracing::debug!(url = %url, "fetching chart version");

        let response = self.authorize(self.client.get(&url)).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(FetchOutcome::NotFound {
                status: status.as_u16(),
                body,
            });
        }

        let details: ChartVersionDetails = serde_json::from_slice(&response.bytes().await?)?;
        Ok(FetchOutcome::Found(Box::new(details)))
    }

    /// Every version of a chart; an unknown chart has none
    pub async fn list_versions(&self, name: &str) -> Result<Vec<ChartMetadata>> {
        let url = self.endpoint.chart_url(name);
        tracing::debug!(url = %url, "listing chart versions");

        let response = self.authorize(self.client.get(&url)).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(RegistryError::HttpError {
                status: status.as_u16(),
                message: format!("Request to {} failed", url),
            });
        }

        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    /// Download a chart archive from one of its `urls` entries
    pub async fn download(&self, location: &str) -> Result<Vec<u8>> {
        let url = self.endpoint.download_url(location)?;
        tracing::debug!(url = %url, "downloading chart");

        // Absolute locations may point elsewhere; only authorize our server
        let mut request = self.client.get(&url);
        if url.starts_with(self.endpoint.server_url()) {
            request = self.authorize(request);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::HttpError {
                status: status.as_u16(),
                message: format!("Request to {} failed", url),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ChartIndex for RegistryClient {
    async fn fetch_chart_version(&self, name: &str, version: &str) -> Result<FetchOutcome> {
        RegistryClient::fetch_chart_version(self, name, version).await
    }
}

async fn file_part(path: &Path) -> Result<Part> {
    let data = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "chart.tgz".to_string());
    Ok(Part::bytes(data).file_name(file_name))
}

/// Map an upload response onto success or one of the upload errors
fn classify_upload(status: StatusCode, body: &[u8]) -> Result<UploadReceipt> {
    if status != StatusCode::CREATED {
        return Err(RegistryError::UploadRejected {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
        });
    }

    // A body that is not JSON cannot say `saved: true`
    let payload: serde_json::Value =
        serde_json::from_slice(body).unwrap_or(serde_json::Value::Null);

    match payload.get("error") {
        Some(serde_json::Value::Null) | None => {}
        Some(serde_json::Value::String(message)) => {
            return Err(RegistryError::UploadFailed {
                message: message.clone(),
            });
        }
        Some(other) => {
            return Err(RegistryError::UploadFailed {
                message: other.to_string(),
            });
        }
    }

    match payload.get("saved") {
        Some(serde_json::Value::Bool(true)) => Ok(UploadReceipt {
            status: status.as_u16(),
        }),
        Some(other) => Err(RegistryError::NotSaved {
            saved: other.to_string(),
        }),
        None => Err(RegistryError::NotSaved {
            saved: "undefined".to_string(),
        }),
    }
}

/// Hex SHA-256 of data, the format the registry reports digests in
pub fn compute_digest(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Check if two digests match (supports various formats)
pub fn digest_matches(expected: &str, actual: &str) -> bool {
    let normalize = |d: &str| {
        d.trim()
            .to_lowercase()
            .replace("sha256:", "")
            .replace("sha256-", "")
    };
    normalize(expected) == normalize(actual)
}
