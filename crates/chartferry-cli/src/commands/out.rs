//! Out command - publish a chart
//!
//! Resolves the version, rewrites Chart.yaml, packages (and signs) the chart,
//! uploads it and waits until the registry serves it.

use chartferry_core::{ChartDescriptor, VersionResolver};
use chartferry_registry::{PollPolicy, RegistryClient, compute_digest, digest_matches, wait_for_chart};
use std::path::Path;

use crate::display;
use crate::envelope::{OutRequest, Response};
use crate::error::{CliError, Result};
use crate::packager::{ChartPackager, PackagingRequest};
use crate::process::{CommandRunner, ToolPaths};
use crate::signing::SigningOptions;
use crate::util::{format_size, resolve_in, short_digest};
use crate::verify::PackageVerifier;

/// Run the publish pipeline.
///
/// Relative paths in the parameters are resolved against `sources`.
pub async fn run<R>(
    request: OutRequest,
    sources: &Path,
    runner: &R,
    tools: &ToolPaths,
    poll: PollPolicy,
) -> Result<Response>
where
    R: CommandRunner + ?Sized,
{
    let OutRequest { source, params } = request;
    let client = RegistryClient::new(source.endpoint()?, source.credentials())?;

    let resolver = VersionResolver::new()
        .with_version(params.version.clone())
        .with_version_file(params.version_file.as_deref().map(|f| resolve_in(sources, f)))
        .with_range(source.version_range.clone())
        .with_app_version(params.app_version.clone())
        .with_set_app_version(params.set_app_version);
    let requested = resolver.requested()?;

    let signing = if params.sign {
        Some(SigningOptions::from_params(
            params.key_data.as_deref(),
            params.key_file.as_deref().map(|f| resolve_in(sources, f)),
            params.key_passphrase.as_deref(),
        )?)
    } else {
        None
    };

    let chart_dir = resolve_in(sources, &params.chart);
    if !chart_dir.is_dir() {
        return Err(CliError::chart(format!(
            "chart directory not found: {}",
            chart_dir.display()
        )));
    }

    let mut descriptor = ChartDescriptor::load(&chart_dir)?;
    let resolved = resolver.resolve(requested, &descriptor);
    descriptor.set_versions(&resolved.version, resolved.app_version.as_deref());
    descriptor.save(&chart_dir)?;

    if descriptor.name != source.chart_name {
        tracing::warn!(
            chart = %descriptor.name,
            source = %source.chart_name,
            "Chart.yaml name differs from source.chart_name"
        );
    }

    display::step(
        "Packaging",
        &format!("{} {}", descriptor.name, resolved.version),
    );
    if let Some(app_version) = &descriptor.app_version {
        display::detail("appVersion", app_version);
    }

    let workdir = tempfile::Builder::new().prefix("chartferry-").tempdir()?;
    let packaging = PackagingRequest {
        chart_dir,
        chart_name: descriptor.name.clone(),
        version: resolved.version.clone(),
        app_version: resolved.app_version.clone(),
        signing,
        force: params.force,
    };

    let mut artifact = ChartPackager::new(runner, tools)
        .package(&packaging, workdir.path())
        .await?;
    PackageVerifier::new(runner, &tools.helm)
        .verify(&mut artifact)
        .await?;

    let archive = tokio::fs::read(&artifact.path).await?;
    let local_digest = compute_digest(&archive);
    display::success(&format!(
        "Packaged {} ({})",
        artifact.file_name(),
        format_size(archive.len() as u64)
    ));
    if let Some(inspected) = &artifact.inspected_version {
        display::detail("inspected", inspected);
    }
    if artifact.provenance.is_some() {
        display::detail("signed", "provenance attached");
    }

    display::step("Uploading", &format!("to {}", client.endpoint().charts_url()));
    client
        .upload(&artifact.path, artifact.provenance.as_deref(), packaging.force)
        .await?;

    let details = wait_for_chart(&client, &source.chart_name, &resolved.version, poll).await?;

    if artifact.provenance.is_some() && !details.is_signed() {
        display::warning("the registry does not report the chart as signed");
    }
    if !digest_matches(&details.metadata.digest, &local_digest) {
        tracing::warn!(
            local = %local_digest,
            registry = %details.metadata.digest,
            "registry digest differs from the packaged archive"
        );
        display::warning("registry digest differs from the packaged archive");
    }
    display::success(&format!(
        "Published {} {} ({})",
        details.metadata.name,
        details.metadata.version,
        short_digest(&details.metadata.digest)
    ));

    Ok(Response::from_chart(&details.metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope;
    use crate::exit_codes;
    use crate::process::ToolCommand;
    use crate::process::fake::{RecordingRunner, ok};
    use std::path::PathBuf;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CHART_YAML: &str = "\
apiVersion: v2
name: c
version: 0.1.0
appVersion: 0.1.0
description: A test chart
keywords:
  - test
";

    fn no_delay() -> PollPolicy {
        PollPolicy::new(3, Duration::ZERO)
    }

    fn sources_with_chart() -> tempfile::TempDir {
        let sources = tempfile::tempdir().unwrap();
        let chart = sources.path().join("charts/c");
        std::fs::create_dir_all(&chart).unwrap();
        std::fs::write(chart.join("Chart.yaml"), CHART_YAML).unwrap();
        sources
    }

    fn request(server_url: &str, params: serde_json::Value) -> OutRequest {
        let document = serde_json::json!({
            "source": {
                "server_url": server_url,
                "project": "p",
                "chart_name": "c",
                "version_range": "^1.0.0"
            },
            "params": params
        });
        envelope::parse(&document.to_string()).unwrap()
    }

    /// helm that writes the archive and reports it on inspect
    fn fake_helm() -> RecordingRunner {
        RecordingRunner::new(|command: &ToolCommand| match command.subcommand() {
            Some("package") => {
                let version = command
                    .args
                    .iter()
                    .position(|a| a == "--version")
                    .map(|i| command.args[i + 1].clone())
                    .unwrap();
                let archive = PathBuf::from(&command.args[2]).join(format!("c-{}.tgz", version));
                std::fs::write(archive, b"packaged chart")?;
                Ok(ok(""))
            }
            Some("inspect") => Ok(ok("apiVersion: v2\nname: c\nversion: 1.2.3\n")),
            _ => Ok(ok("")),
        })
    }

    fn indexed(version: &str, digest: &str) -> serde_json::Value {
        serde_json::json!({
            "metadata": {
                "name": "c",
                "version": version,
                "appVersion": version,
                "description": "A test chart",
                "apiVersion": "v2",
                "created": "2024-03-01T10:00:00Z",
                "digest": digest,
                "urls": [format!("charts/c-{}.tgz", version)]
            },
            "security": {"signature": {"signed": false, "prov_file": ""}}
        })
    }

    #[tokio::test]
    async fn test_publish_end_to_end() {
        let server = MockServer::start().await;
        let digest = compute_digest(b"packaged chart");
        Mock::given(method("POST"))
            .and(path("/api/chartrepo/p/charts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"saved": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/chartrepo/p/charts/c/1.2.3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(indexed("1.2.3", &digest)))
            .mount(&server)
            .await;

        let sources = sources_with_chart();
        let runner = fake_helm();
        let response = run(
            request(&server.uri(), serde_json::json!({"chart": "charts/c", "version": "1.2.3"})),
            sources.path(),
            &runner,
            &ToolPaths::default(),
            no_delay(),
        )
        .await
        .unwrap();

        assert_eq!(response.version.version, "1.2.3");
        assert_eq!(response.version.digest, digest);
        let names: Vec<_> = response.metadata.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["created", "description", "appVersion"]);

        let written =
            ChartDescriptor::load(&sources.path().join("charts/c")).unwrap();
        assert_eq!(written.version, "1.2.3");
        assert_eq!(written.app_version.as_deref(), Some("0.1.0"));
        assert!(written.extra.contains_key("keywords"));
        assert_eq!(
            std::fs::read_to_string(sources.path().join("charts/c/Chart.yaml")).unwrap(),
            CHART_YAML.replacen("version: 0.1.0", "version: 1.2.3", 1)
        );

        let subcommands: Vec<_> = runner
            .calls()
            .iter()
            .filter_map(|c| c.subcommand().map(String::from))
            .collect();
        assert_eq!(subcommands, ["dependency", "package", "inspect"]);
    }

    #[tokio::test]
    async fn test_range_violation_runs_nothing() {
        let sources = sources_with_chart();
        let runner = RecordingRunner::succeeding();

        let err = run(
            request("https://h/", serde_json::json!({"chart": "charts/c", "version": "2.0.0"})),
            sources.path(),
            &runner,
            &ToolPaths::default(),
            no_delay(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::VERSION_RANGE);
        assert!(runner.calls().is_empty());
        let untouched =
            std::fs::read_to_string(sources.path().join("charts/c/Chart.yaml")).unwrap();
        assert_eq!(untouched, CHART_YAML);
    }

    #[tokio::test]
    async fn test_sign_without_key_is_rejected_early() {
        let sources = sources_with_chart();
        let runner = RecordingRunner::succeeding();

        let err = run(
            request(
                "https://h/",
                serde_json::json!({"chart": "charts/c", "version": "1.0.0", "sign": true}),
            ),
            sources.path(),
            &runner,
            &ToolPaths::default(),
            no_delay(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::SIGNING_CONFIG);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_chart_directory() {
        let sources = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::succeeding();

        let err = run(
            request("https://h/", serde_json::json!({"chart": "nowhere", "version": "1.0.0"})),
            sources.path(),
            &runner,
            &ToolPaths::default(),
            no_delay(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::CHART_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_version_file() {
        let sources = sources_with_chart();
        let runner = RecordingRunner::succeeding();

        let err = run(
            request(
                "https://h/",
                serde_json::json!({"chart": "charts/c", "version_file": "version/number"}),
            ),
            sources.path(),
            &runner,
            &ToolPaths::default(),
            no_delay(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::MISSING_VERSION);
    }

    #[tokio::test]
    async fn test_upload_not_saved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chartrepo/p/charts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"saved": false})))
            .mount(&server)
            .await;

        let sources = sources_with_chart();
        let err = run(
            request(&server.uri(), serde_json::json!({"chart": "charts/c", "version": "1.2.3"})),
            sources.path(),
            &fake_helm(),
            &ToolPaths::default(),
            no_delay(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::UPLOAD_NOT_SAVED);
    }

    #[tokio::test]
    async fn test_never_indexed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chartrepo/p/charts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"saved": true})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/chartrepo/p/charts/c/1.2.3"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let sources = sources_with_chart();
        let err = run(
            request(&server.uri(), serde_json::json!({"chart": "charts/c", "version": "1.2.3"})),
            sources.path(),
            &fake_helm(),
            &ToolPaths::default(),
            no_delay(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::NOT_INDEXED);
    }
}
