//! Registry chart API payloads

use serde::{Deserialize, Serialize};

/// Metadata of one chart version as the registry indexed it.
///
/// Returned on its own by the version list endpoint and wrapped in
/// [`ChartVersionDetails`] by the single-version endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,

    pub version: String,

    #[serde(default)]
    pub app_version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub api_version: String,

    /// Creation timestamp, kept as the registry formats it
    #[serde(default)]
    pub created: String,

    /// SHA-256 of the chart archive
    #[serde(default)]
    pub digest: String,

    /// Download locations, usually relative to the project's chart repository
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Response of `GET .../charts/{name}/{version}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartVersionDetails {
    pub metadata: ChartMetadata,

    #[serde(default)]
    pub security: Option<ChartSecurity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSecurity {
    pub signature: ChartSignature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSignature {
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub prov_file: String,
}

impl ChartVersionDetails {
    pub fn is_signed(&self) -> bool {
        self.security.as_ref().is_some_and(|s| s.signature.signed)
    }
}
