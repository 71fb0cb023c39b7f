//! In command - fetch a published chart archive

use chartferry_registry::{
    FetchOutcome, RegistryClient, RegistryError, compute_digest, digest_matches,
};
use std::path::Path;

use crate::display;
use crate::envelope::{InRequest, Response};
use crate::error::{CliError, Result};
use crate::util::format_size;

/// Download the requested version into `dest`
pub async fn run(request: InRequest, dest: &Path) -> Result<Response> {
    let InRequest {
        source,
        version,
        params,
    } = request;
    let client = RegistryClient::new(source.endpoint()?, source.credentials())?;

    let details = match client
        .fetch_chart_version(&source.chart_name, &version.version)
        .await?
    {
        FetchOutcome::Found(details) => details,
        FetchOutcome::NotFound { status, .. } => {
            return Err(CliError::VersionNotFound {
                name: source.chart_name,
                version: version.version,
                status,
            });
        }
    };
    if details.metadata.version != version.version {
        return Err(RegistryError::VersionMismatch {
            expected: version.version,
            actual: details.metadata.version.clone(),
        }
        .into());
    }

    let location = details
        .metadata
        .urls
        .first()
        .ok_or_else(|| RegistryError::NoDownloadUrl {
            name: source.chart_name.clone(),
            version: version.version.clone(),
        })?;

    let data = client.download(location).await?;
    let actual = compute_digest(&data);
    let expected = if version.digest.is_empty() {
        &details.metadata.digest
    } else {
        &version.digest
    };
    if !expected.is_empty() && !digest_matches(expected, &actual) {
        return Err(RegistryError::IntegrityCheckFailed {
            name: format!("{}-{}", source.chart_name, version.version),
            expected: expected.clone(),
            actual,
        }
        .into());
    }

    let basename = params
        .target_basename
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| format!("{}-{}", source.chart_name, version.version));
    tokio::fs::create_dir_all(dest).await?;
    let target = dest.join(format!("{}.tgz", basename));
    tokio::fs::write(&target, &data).await?;

    display::success(&format!(
        "Fetched {} ({})",
        target.display(),
        format_size(data.len() as u64)
    ));

    Ok(Response::from_chart(&details.metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope;
    use crate::exit_codes;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ARCHIVE: &[u8] = b"chart archive bytes";

    async fn registry() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chartrepo/p/charts/c/1.0.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metadata": {
                    "name": "c",
                    "version": "1.0.0",
                    "appVersion": "1.0.0",
                    "description": "A test chart",
                    "created": "2024-03-01T10:00:00Z",
                    "digest": compute_digest(ARCHIVE),
                    "urls": ["charts/c-1.0.0.tgz"]
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/chartrepo/p/charts/c-1.0.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(ARCHIVE))
            .mount(&server)
            .await;
        server
    }

    fn request(server: &MockServer, digest: &str, params: serde_json::Value) -> InRequest {
        envelope::parse(
            &serde_json::json!({
                "source": {"server_url": server.uri(), "project": "p", "chart_name": "c"},
                "version": {"version": "1.0.0", "digest": digest},
                "params": params
            })
            .to_string(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_writes_archive() {
        let server = registry().await;
        let dest = tempfile::tempdir().unwrap();

        let response = run(
            request(&server, &compute_digest(ARCHIVE), serde_json::json!({})),
            dest.path(),
        )
        .await
        .unwrap();

        assert_eq!(response.version.version, "1.0.0");
        assert_eq!(
            std::fs::read(dest.path().join("c-1.0.0.tgz")).unwrap(),
            ARCHIVE
        );
    }

    #[tokio::test]
    async fn test_target_basename() {
        let server = registry().await;
        let dest = tempfile::tempdir().unwrap();

        run(
            request(&server, "", serde_json::json!({"target_basename": "chart"})),
            dest.path(),
        )
        .await
        .unwrap();

        assert!(dest.path().join("chart.tgz").is_file());
    }

    #[tokio::test]
    async fn test_unpublished_version() {
        let server = registry().await;
        let dest = tempfile::tempdir().unwrap();
        let mut request = request(&server, "", serde_json::json!({}));
        request.version.version = "9.9.9".to_string();

        let err = run(request, dest.path()).await.unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::VERSION_NOT_FOUND);
        assert!(err.to_string().contains("9.9.9"));
        assert!(std::fs::read_dir(dest.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_digest_mismatch() {
        let server = registry().await;
        let dest = tempfile::tempdir().unwrap();

        let err = run(request(&server, "deadbeef", serde_json::json!({})), dest.path())
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::INTEGRITY_ERROR);
        assert!(!dest.path().join("c-1.0.0.tgz").exists());
    }
}
