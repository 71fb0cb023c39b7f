//! GPG key import for signed packages
//!
//! helm signs with a key from a legacy `secring.gpg` keyring. The private key
//! from the job parameters is imported into a throwaway GnuPG home, its id is
//! read back from gpg's transcript, and it is exported into that keyring file.
//! The home directory is removed when the [`EphemeralKeyring`] is dropped,
//! after [`SigningKeyImporter::release`] has stopped the agent gpg started
//! for it.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::TempDir;

use crate::error::{CliError, Result};
use crate::process::{CommandRunner, ToolCommand, ToolOutput};

static KEY_IMPORTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^gpg: key (.+?): secret key imported$").expect("valid regex")
});

/// Text every import confirmation line contains, parsable or not
const IMPORT_MARKER: &str = "secret key imported";

/// Where the private key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Armored key passed inline
    Inline(String),
    /// Key file on disk
    File(PathBuf),
}

/// Signing parameters of one run
#[derive(Clone, PartialEq, Eq)]
pub struct SigningOptions {
    pub key: KeySource,
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for SigningOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = match &self.key {
            KeySource::Inline(_) => "inline".to_string(),
            KeySource::File(path) => path.display().to_string(),
        };
        f.debug_struct("SigningOptions")
            .field("key", &key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl SigningOptions {
    /// Exactly one of `key_data` and `key_file` must be set; empty counts as unset
    pub fn from_params(
        key_data: Option<&str>,
        key_file: Option<PathBuf>,
        passphrase: Option<&str>,
    ) -> Result<Self> {
        let key_data = key_data.filter(|d| !d.trim().is_empty());
        let key_file = key_file.filter(|p| !p.as_os_str().is_empty());

        let key = match (key_data, key_file) {
            (Some(data), None) => KeySource::Inline(data.to_string()),
            (None, Some(path)) => KeySource::File(path),
            (None, None) => {
                return Err(CliError::signing_config(
                    "key_data or key_file is required when sign is true",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(CliError::signing_config(
                    "key_data and key_file are mutually exclusive",
                ));
            }
        };

        Ok(Self {
            key,
            passphrase: passphrase.filter(|p| !p.is_empty()).map(String::from),
        })
    }
}

/// Throwaway GnuPG home directory
#[derive(Debug)]
pub struct EphemeralKeyring {
    dir: TempDir,
}

impl EphemeralKeyring {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("chartferry-gpg-keyring-")
            .tempdir()?;
        Ok(Self { dir })
    }

    pub fn home(&self) -> &Path {
        self.dir.path()
    }

    /// Legacy keyring file helm reads the signing key from
    pub fn secring(&self) -> PathBuf {
        self.dir.path().join("secring.gpg")
    }

    pub fn passphrase_file(&self) -> PathBuf {
        self.dir.path().join("passphrase")
    }

    fn inline_key_file(&self) -> PathBuf {
        self.dir.path().join("signing-key.asc")
    }
}

/// Why no key id came out of a successful import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyIdMiss {
    /// gpg never confirmed a secret key import
    LineAbsent,
    /// A confirmation line was there but did not have the expected shape
    Unparsable(String),
}

/// Terminal state of an import transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported(String),
    NoMatch(KeyIdMiss),
    /// gpg exited non-zero (`None` when killed by a signal)
    ProcessError(Option<i32>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TranscriptState {
    Scanning,
    SawUnparsable(String),
    Found(String),
}

/// Consumes gpg's diagnostic output line by line
#[derive(Debug, Clone)]
pub struct TranscriptParser {
    state: TranscriptState,
}

impl Default for TranscriptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptParser {
    pub fn new() -> Self {
        Self {
            state: TranscriptState::Scanning,
        }
    }

    pub fn feed_line(&mut self, line: &str) {
        if matches!(self.state, TranscriptState::Found(_)) || !line.contains(IMPORT_MARKER) {
            return;
        }
        self.state = match parse_key_id(line) {
            Some(id) => TranscriptState::Found(id),
            None => TranscriptState::SawUnparsable(line.trim().to_string()),
        };
    }

    pub fn feed(&mut self, text: &str) {
        for line in text.lines() {
            self.feed_line(line);
        }
    }

    /// Settle the outcome once gpg has exited
    pub fn finish(self, exit_code: Option<i32>) -> ImportOutcome {
        if exit_code != Some(0) {
            return ImportOutcome::ProcessError(exit_code);
        }
        match self.state {
            TranscriptState::Found(id) => ImportOutcome::Imported(id),
            TranscriptState::SawUnparsable(line) => {
                ImportOutcome::NoMatch(KeyIdMiss::Unparsable(line))
            }
            TranscriptState::Scanning => ImportOutcome::NoMatch(KeyIdMiss::LineAbsent),
        }
    }
}

/// Key id from a `gpg: key <ID>: secret key imported` line
pub fn parse_key_id(line: &str) -> Option<String> {
    KEY_IMPORTED
        .captures(line.trim_end())
        .map(|caps| caps[1].to_string())
}

/// `gpgconf` next to the configured gpg binary
fn gpgconf_for(gpg: &str) -> String {
    Path::new(gpg).with_file_name("gpgconf").display().to_string()
}

/// An imported key, ready for `helm package --sign`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    pub id: String,
    pub keyring_file: PathBuf,
    pub passphrase_file: Option<PathBuf>,
}

/// Drives gpg to import the signing key into an [`EphemeralKeyring`]
pub struct SigningKeyImporter<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    gpg: &'a str,
}

impl<'a, R: CommandRunner + ?Sized> SigningKeyImporter<'a, R> {
    pub fn new(runner: &'a R, gpg: &'a str) -> Self {
        Self { runner, gpg }
    }

    pub async fn import(
        &self,
        options: &SigningOptions,
        keyring: &EphemeralKeyring,
    ) -> Result<SigningKey> {
        let key_file = match &options.key {
            KeySource::Inline(data) => {
                let path = keyring.inline_key_file();
                std::fs::write(&path, data)?;
                path
            }
            KeySource::File(path) => {
                if !path.is_file() {
                    return Err(CliError::signing_config(format!(
                        "key file not found: {}",
                        path.display()
                    )));
                }
                path.clone()
            }
        };

        let import = self
            .gpg_command(options, keyring)
            .arg("--import")
            .arg(key_file.display().to_string());
        let output = self.run(&import).await?;

        let mut transcript = TranscriptParser::new();
        transcript.feed(&output.stderr);
        transcript.feed(&output.stdout);

        let id = match transcript.finish(output.code) {
            ImportOutcome::Imported(id) => id,
            ImportOutcome::ProcessError(code) => {
                return Err(CliError::SigningImport {
                    message: format!("gpg --import failed: {}", output.stderr.trim()),
                    code,
                });
            }
            ImportOutcome::NoMatch(KeyIdMiss::LineAbsent) => {
                return Err(CliError::SigningKeyIdNotFound {
                    message: "gpg did not report an imported secret key".to_string(),
                });
            }
            ImportOutcome::NoMatch(KeyIdMiss::Unparsable(line)) => {
                return Err(CliError::SigningKeyIdNotFound {
                    message: format!("unrecognized import line '{}'", line),
                });
            }
        };
        tracing::debug!(key_id = %id, "signing key imported");

        let keyring_file = keyring.secring();
        let export = self
            .gpg_command(options, keyring)
            .arg("--output")
            .arg(keyring_file.display().to_string())
            .arg("--export-secret-keys")
            .arg(id.clone());
        let output = self.run(&export).await?;
        if !output.success() {
            return Err(CliError::SigningImport {
                message: format!("gpg --export-secret-keys failed: {}", output.stderr.trim()),
                code: output.code,
            });
        }

        let passphrase_file = match &options.passphrase {
            Some(passphrase) => {
                let path = keyring.passphrase_file();
                std::fs::write(&path, passphrase)?;
                Some(path)
            }
            None => None,
        };

        Ok(SigningKey {
            id,
            keyring_file,
            passphrase_file,
        })
    }

    /// Stop the gpg-agent serving the keyring's home directory.
    ///
    /// Failures are logged only; the keyring is removed either way.
    pub async fn release(&self, keyring: &EphemeralKeyring) {
        let command = ToolCommand::new(gpgconf_for(self.gpg)).args([
            "--homedir".to_string(),
            keyring.home().display().to_string(),
            "--kill".to_string(),
            "gpg-agent".to_string(),
        ]);
        match self.runner.run(&command).await {
            Ok(output) if output.success() => tracing::debug!("gpg-agent stopped"),
            Ok(output) => tracing::warn!(
                status = %output.describe_exit(),
                stderr = output.stderr.trim(),
                "gpgconf could not stop gpg-agent"
            ),
            Err(e) => tracing::warn!(error = %e, "failed to run gpgconf"),
        }
    }

    fn gpg_command(&self, options: &SigningOptions, keyring: &EphemeralKeyring) -> ToolCommand {
        let command = ToolCommand::new(self.gpg).args([
            "--batch".to_string(),
            "--homedir".to_string(),
            keyring.home().display().to_string(),
        ]);
        match &options.passphrase {
            Some(passphrase) => command
                .args(["--pinentry-mode", "loopback", "--passphrase-fd", "0"])
                .stdin(format!("{}\n", passphrase)),
            None => command,
        }
    }

    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.runner
            .run(command)
            .await
            .map_err(|e| CliError::SigningImport {
                message: format!("failed to run {}: {}", self.gpg, e),
                code: None,
            })
    }
}
