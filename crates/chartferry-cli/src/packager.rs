//! Chart packaging with helm
//!
//! Registers the repositories the chart's dependencies come from, builds the
//! dependencies and packages the chart, signing it when asked to.

use chartferry_core::{RepositoryReference, load_repositories};
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};
use crate::process::{CommandRunner, ToolCommand, ToolOutput, ToolPaths};
use crate::signing::{EphemeralKeyring, SigningKey, SigningKeyImporter, SigningOptions};

/// What to package. Built once per run from the resolved versions.
#[derive(Debug, Clone)]
pub struct PackagingRequest {
    /// Absolute chart directory
    pub chart_dir: PathBuf,
    pub chart_name: String,
    pub version: String,
    pub app_version: Option<String>,
    pub signing: Option<SigningOptions>,
    /// Overwrite an existing version on upload
    pub force: bool,
}

impl PackagingRequest {
    /// `<name>-<version>.tgz`, the file `helm package` writes
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tgz", self.chart_name, self.version)
    }
}

/// A packaged chart inside the run's temporary directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub path: PathBuf,
    pub expected_version: String,
    /// `<archive>.prov`, present for signed packages
    pub provenance: Option<PathBuf>,
    /// Version `helm inspect` reported, once verified
    pub inspected_version: Option<String>,
}

impl ArtifactHandle {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct ChartPackager<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    tools: &'a ToolPaths,
}

impl<'a, R: CommandRunner + ?Sized> ChartPackager<'a, R> {
    pub fn new(runner: &'a R, tools: &'a ToolPaths) -> Self {
        Self { runner, tools }
    }

    /// Package the chart into `destination`
    pub async fn package(
        &self,
        request: &PackagingRequest,
        destination: &Path,
    ) -> Result<ArtifactHandle> {
        if let Some(repositories) = load_repositories(&request.chart_dir)? {
            for repository in &repositories {
                self.add_repository(repository).await?;
            }
        }

        let build = ToolCommand::new(&self.tools.helm)
            .args(["dependency", "build"])
            .arg(request.chart_dir.display().to_string());
        self.run_step(&build).await?;

        let importer = SigningKeyImporter::new(self.runner, &self.tools.gpg);
        // The keyring lives until `helm package` has read it
        let signing = match &request.signing {
            Some(options) => {
                let keyring = EphemeralKeyring::new()?;
                match importer.import(options, &keyring).await {
                    Ok(key) => Some((keyring, key)),
                    Err(err) => {
                        importer.release(&keyring).await;
                        return Err(err);
                    }
                }
            }
            None => None,
        };

        let package = package_command(
            &self.tools.helm,
            request,
            destination,
            signing.as_ref().map(|(_, key)| key),
        );
        let packaged = self.run_step(&package).await;
        if let Some((keyring, _)) = &signing {
            importer.release(keyring).await;
        }
        drop(signing);
        packaged?;

        let path = destination.join(request.archive_name());
        if !path.is_file() {
            return Err(CliError::packaging(format!(
                "helm package did not produce {}",
                path.display()
            )));
        }

        let mut provenance = path.clone().into_os_string();
        provenance.push(".prov");
        let provenance = PathBuf::from(provenance);

        Ok(ArtifactHandle {
            expected_version: request.version.clone(),
            provenance: provenance.is_file().then_some(provenance),
            path,
            inspected_version: None,
        })
    }

    async fn add_repository(&self, repository: &RepositoryReference) -> Result<()> {
        let command = ToolCommand::new(&self.tools.helm).args([
            "repo",
            "add",
            repository.name.as_str(),
            repository.url.as_str(),
        ]);
        self.run_step(&command).await?;
        Ok(())
    }

    async fn run_step(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let output = self.runner.run(command).await.map_err(|e| CliError::Packaging {
            message: format!(
                "failed to run {} {}: {}",
                self.tools.helm,
                command.subcommand().unwrap_or_default(),
                e
            ),
            help: Some("set --helm or CHARTFERRY_HELM to the helm binary".to_string()),
        })?;

        if !output.success() {
            return Err(CliError::Packaging {
                message: format!(
                    "{} failed ({}): {}",
                    command,
                    output.describe_exit(),
                    output.stderr.trim()
                ),
                help: None,
            });
        }
        Ok(output)
    }
}

/// `helm package` invocation for a request
pub fn package_command(
    helm: &str,
    request: &PackagingRequest,
    destination: &Path,
    key: Option<&SigningKey>,
) -> ToolCommand {
    let mut command = ToolCommand::new(helm)
        .args(["package", "--destination"])
        .arg(destination.display().to_string());

    if let Some(key) = key {
        command = command
            .args(["--sign", "--key"])
            .arg(key.id.clone())
            .arg("--keyring")
            .arg(key.keyring_file.display().to_string());
        if let Some(passphrase_file) = &key.passphrase_file {
            command = command
                .arg("--passphrase-file")
                .arg(passphrase_file.display().to_string());
        }
    }

    command = command.arg("--version").arg(request.version.clone());
    if let Some(app_version) = &request.app_version {
        command = command.arg("--app-version").arg(app_version.clone());
    }

    command.arg(request.chart_dir.display().to_string())
}
