//! Post-packaging inspection of the archive

use crate::display;
use crate::error::{CliError, Result};
use crate::packager::ArtifactHandle;
use crate::process::{CommandRunner, ToolCommand};

/// Reads the packaged chart back with `helm inspect chart`
pub struct PackageVerifier<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    helm: &'a str,
}

impl<'a, R: CommandRunner + ?Sized> PackageVerifier<'a, R> {
    pub fn new(runner: &'a R, helm: &'a str) -> Self {
        Self { runner, helm }
    }

    /// Inspect the archive and record the version it declares.
    ///
    /// The declared version must be the one the archive was packaged with.
    pub async fn verify(&self, artifact: &mut ArtifactHandle) -> Result<()> {
        let command = ToolCommand::new(self.helm)
            .args(["inspect", "chart"])
            .arg(artifact.path.display().to_string());

        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| CliError::inspection(format!("failed to run {}: {}", self.helm, e)))?;

        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            tracing::warn!(stderr, "helm inspect reported");
            display::warning(&format!("helm inspect: {}", stderr));
        }

        if !output.success() {
            return Err(CliError::inspection(format!(
                "{} failed ({})",
                command,
                output.describe_exit()
            )));
        }

        let inspected = parse_inspect_version(&output.stdout).ok_or_else(|| {
            CliError::inspection(format!(
                "no version found in the inspection of {}",
                artifact.file_name()
            ))
        })?;

        if inspected != artifact.expected_version {
            return Err(CliError::inspection(format!(
                "{} declares version {}, expected {}",
                artifact.file_name(),
                inspected,
                artifact.expected_version
            )));
        }

        tracing::debug!(version = %inspected, "package inspected");
        artifact.inspected_version = Some(inspected);
        Ok(())
    }
}

/// Top-level `version:` of a rendered Chart.yaml
pub fn parse_inspect_version(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("version:"))
        .map(|value| value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes;
    use crate::process::fake::{RecordingRunner, failed, ok};
    use crate::process::ToolOutput;
    use std::path::PathBuf;

    const INSPECTED: &str = "\
apiVersion: v2
appVersion: 1.2.3
dependencies:
- name: redis
  version: 10.0.0
description: A web application
name: webapp
version: 1.2.3
";

    fn artifact() -> ArtifactHandle {
        ArtifactHandle {
            path: PathBuf::from("/tmp/out/webapp-1.2.3.tgz"),
            expected_version: "1.2.3".to_string(),
            provenance: None,
            inspected_version: None,
        }
    }

    #[test]
    fn test_parse_inspect_version() {
        assert_eq!(parse_inspect_version(INSPECTED), Some("1.2.3".to_string()));
        assert_eq!(
            parse_inspect_version("name: c\nversion: \"0.1.0\"\n"),
            Some("0.1.0".to_string())
        );
        assert_eq!(parse_inspect_version("name: c\nappVersion: 1.0\n"), None);
        assert_eq!(parse_inspect_version("version:\n"), None);
    }

    #[tokio::test]
    async fn test_verify_records_version() {
        let runner = RecordingRunner::new(|_| Ok(ok(INSPECTED)));
        let mut artifact = artifact();

        PackageVerifier::new(&runner, "helm")
            .verify(&mut artifact)
            .await
            .unwrap();

        assert_eq!(artifact.inspected_version.as_deref(), Some("1.2.3"));
        assert_eq!(
            runner.rendered(),
            ["helm inspect chart /tmp/out/webapp-1.2.3.tgz"]
        );
    }

    #[tokio::test]
    async fn test_stderr_is_not_fatal() {
        let runner = RecordingRunner::new(|_| {
            Ok(ToolOutput {
                code: Some(0),
                stdout: INSPECTED.to_string(),
                stderr: "WARNING: helm inspect is deprecated".to_string(),
            })
        });
        let mut artifact = artifact();

        PackageVerifier::new(&runner, "helm")
            .verify(&mut artifact)
            .await
            .unwrap();
        assert!(artifact.inspected_version.is_some());
    }

    #[tokio::test]
    async fn test_missing_version_line() {
        let runner = RecordingRunner::new(|_| Ok(ok("name: webapp\n")));
        let err = PackageVerifier::new(&runner, "helm")
            .verify(&mut artifact())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::INSPECT_ERROR);
    }

    #[tokio::test]
    async fn test_version_disagreement() {
        let runner = RecordingRunner::new(|_| Ok(ok("name: webapp\nversion: 1.2.4\n")));
        let err = PackageVerifier::new(&runner, "helm")
            .verify(&mut artifact())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::INSPECT_ERROR);
        assert!(err.to_string().contains("1.2.4"));
    }

    #[tokio::test]
    async fn test_inspect_failure() {
        let runner = RecordingRunner::new(|_| Ok(failed(1, "Error: file does not exist")));
        let err = PackageVerifier::new(&runner, "helm")
            .verify(&mut artifact())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::INSPECT_ERROR);
    }
}
