//! Request and response documents exchanged with the pipeline
//!
//! Each invocation reads one JSON document (stdin, or `--input`) and, on
//! success, writes one JSON document to stdout.

use chartferry_registry::{ChartMetadata, Credentials, RegistryEndpoint, normalize_server_url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

use crate::error::{CliError, Result};

/// Registry and chart the resource is configured for
#[derive(Debug, Clone, Deserialize)]
pub struct Source {
    pub server_url: String,
    pub project: String,
    pub chart_name: String,
    #[serde(default)]
    pub version_range: Option<String>,
    #[serde(default)]
    pub basic_auth_username: Option<String>,
    #[serde(default)]
    pub basic_auth_password: Option<String>,
}

impl Source {
    fn validate(&mut self) -> Result<()> {
        for (field, value) in [
            ("source.server_url", &self.server_url),
            ("source.project", &self.project),
            ("source.chart_name", &self.chart_name),
        ] {
            if value.trim().is_empty() {
                return Err(CliError::input(format!("{} must not be empty", field)));
            }
        }
        self.server_url = normalize_server_url(self.server_url.trim());
        Ok(())
    }

    pub fn endpoint(&self) -> Result<RegistryEndpoint> {
        Ok(RegistryEndpoint::new(&self.server_url, self.project.clone())?)
    }

    /// Basic auth, only when both username and password are set
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(
            self.basic_auth_username.as_deref(),
            self.basic_auth_password.as_deref(),
        )
    }
}

/// `params` of the `out` step
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutParams {
    /// Chart directory, relative to the sources directory unless absolute
    pub chart: String,
    #[serde(default)]
    pub sign: bool,
    #[serde(default)]
    pub key_data: Option<String>,
    #[serde(default)]
    pub key_file: Option<String>,
    #[serde(default)]
    pub key_passphrase: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub version_file: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub set_app_version: bool,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutRequest {
    pub source: Source,
    pub params: OutParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    pub source: Source,
    #[serde(default)]
    pub version: Option<VersionRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InParams {
    /// File name of the downloaded archive, without `.tgz`
    #[serde(default)]
    pub target_basename: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InRequest {
    pub source: Source,
    pub version: VersionRef,
    #[serde(default)]
    pub params: InParams,
}

/// A published chart version as the pipeline tracks it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRef {
    pub version: String,
    #[serde(default)]
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataField {
    pub name: String,
    pub value: String,
}

/// Output of `out` and `in`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub version: VersionRef,
    pub metadata: Vec<MetadataField>,
}

impl Response {
    pub fn from_chart(chart: &ChartMetadata) -> Self {
        let field = |name: &str, value: &str| MetadataField {
            name: name.to_string(),
            value: value.to_string(),
        };
        Self {
            version: VersionRef {
                version: chart.version.clone(),
                digest: chart.digest.clone(),
            },
            metadata: vec![
                field("created", &chart.created),
                field("description", &chart.description),
                field("appVersion", &chart.app_version),
            ],
        }
    }
}

/// Requests that carry a [`Source`]
pub trait Envelope: DeserializeOwned {
    fn source_mut(&mut self) -> &mut Source;

    /// Checks beyond the shape of the document
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl Envelope for OutRequest {
    fn source_mut(&mut self) -> &mut Source {
        &mut self.source
    }

    fn validate(&self) -> Result<()> {
        if self.params.chart.trim().is_empty() {
            return Err(CliError::input("params.chart must not be empty"));
        }
        Ok(())
    }
}

impl Envelope for CheckRequest {
    fn source_mut(&mut self) -> &mut Source {
        &mut self.source
    }
}

impl Envelope for InRequest {
    fn source_mut(&mut self) -> &mut Source {
        &mut self.source
    }

    fn validate(&self) -> Result<()> {
        if self.version.version.trim().is_empty() {
            return Err(CliError::input("version.version must not be empty"));
        }
        Ok(())
    }
}

/// Parse a request document and normalize its source
pub fn parse<T: Envelope>(input: &str) -> Result<T> {
    let mut request: T = serde_json::from_str(input).map_err(|e| {
        CliError::input_with_help(
            e.to_string(),
            "the resource expects one JSON document with `source` and `params`",
        )
    })?;
    request.source_mut().validate()?;
    request.validate()?;
    Ok(request)
}

/// Read the request document from a file, or stdin when none is given
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            CliError::input(format!("cannot read {}: {}", path.display(), e))
        }),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .map_err(|e| CliError::input(format!("cannot read stdin: {}", e)))?;
            Ok(input)
        }
    }
}

/// Serialize a document for stdout
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CliError::other(e.to_string()))
}
