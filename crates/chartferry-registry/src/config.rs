//! Registry endpoint configuration
//!
//! Builds the chart API URLs of a Harbor-style registry for one project.

use url::Url;

use crate::error::{RegistryError, Result};

/// Append the trailing slash every URL below is built on
pub fn normalize_server_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// A registry server plus the project charts are published into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoint {
    /// Server base URL, always ending in `/`
    server_url: String,
    /// Project (chart repository) name
    project: String,
}

impl RegistryEndpoint {
    pub fn new(server_url: impl AsRef<str>, project: impl Into<String>) -> Result<Self> {
        let server_url = normalize_server_url(server_url.as_ref());
        let project = project.into();

        let parsed = Url::parse(&server_url).map_err(|e| RegistryError::InvalidUrl {
            url: server_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RegistryError::InvalidUrl {
                url: server_url,
                reason: "URL must start with http:// or https://".to_string(),
            });
        }
        if project.trim().is_empty() || project.contains('/') {
            return Err(RegistryError::InvalidConfig {
                message: format!("invalid project name '{}'", project),
            });
        }

        Ok(Self {
            server_url,
            project,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// `{server}api/chartrepo/{project}/charts`
    pub fn charts_url(&self) -> String {
        format!("{}api/chartrepo/{}/charts", self.server_url, self.project)
    }

    /// Upload endpoint, with `?force=true` to overwrite an existing version
    pub fn upload_url(&self, force: bool) -> String {
        let mut url = self.charts_url();
        if force {
            url.push_str("?force=true");
        }
        url
    }

    /// All versions of one chart
    pub fn chart_url(&self, name: &str) -> String {
        format!("{}/{}", self.charts_url(), name)
    }

    /// Metadata of one chart version
    pub fn chart_version_url(&self, name: &str, version: &str) -> String {
        format!("{}/{}/{}", self.charts_url(), name, version)
    }

    /// Resolve an entry of a chart version's `urls` list.
    ///
    /// Relative entries (`charts/nginx-1.0.0.tgz`) live under the project's
    /// chart repository, `{server}chartrepo/{project}/`.
    pub fn download_url(&self, location: &str) -> Result<String> {
        let base = Url::parse(&format!("{}chartrepo/{}/", self.server_url, self.project))?;
        Ok(base.join(location)?.to_string())
    }
}
