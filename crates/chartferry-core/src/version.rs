//! Version resolution
//!
//! The version a chart is published under comes from, in order of priority:
//!
//! 1. the first line of a version file (when the file exists),
//! 2. an explicit version parameter,
//! 3. the chart's current app version with its patch number incremented.
//!
//! Versions from (1) and (2) are checked against the source's declared
//! range. Ranges use the npm-style syntax chart registries and CI resources
//! commonly use and are translated into [`semver::VersionReq`] sets.

use regex::Regex;
use semver::{Version, VersionReq};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::chart::ChartDescriptor;
use crate::error::{CoreError, Result};

static HYPHEN_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S+)\s+-\s+(\S+)\s*$").expect("valid regex"));

/// Where the resolved version came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    /// `params.version`
    Explicit,
    /// First line of `params.version_file`
    VersionFile,
    /// Patch bump of the descriptor's current version
    PatchBump,
}

/// A version requested by the job parameters, already range-checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedVersion {
    pub version: String,
    pub source: VersionSource,
}

/// The version pair a pipeline run publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersions {
    /// Chart version
    pub version: String,
    /// App version; `None` keeps whatever the descriptor has
    pub app_version: Option<String>,
    pub source: VersionSource,
}

/// Resolves the chart version from parameters, version file and descriptor
#[derive(Debug, Clone, Default)]
pub struct VersionResolver {
    version: Option<String>,
    version_file: Option<PathBuf>,
    range: Option<String>,
    app_version: Option<String>,
    set_app_version: bool,
}

impl VersionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version.filter(|v| !v.trim().is_empty());
        self
    }

    /// The file must already be an absolute path; nothing here consults the
    /// process working directory.
    pub fn with_version_file(mut self, path: Option<PathBuf>) -> Self {
        self.version_file = path;
        self
    }

    pub fn with_range(mut self, range: Option<String>) -> Self {
        self.range = range.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_app_version(mut self, app_version: Option<String>) -> Self {
        self.app_version = app_version.filter(|v| !v.trim().is_empty());
        self
    }

    /// Reuse the chart version as app version when none is given explicitly
    pub fn with_set_app_version(mut self, enabled: bool) -> Self {
        self.set_app_version = enabled;
        self
    }

    /// Version requested through parameters or version file, range-checked.
    ///
    /// Returns `Ok(None)` when neither was given, in which case [`resolve`]
    /// falls back to bumping the descriptor.
    ///
    /// [`resolve`]: Self::resolve
    pub fn requested(&self) -> Result<Option<RequestedVersion>> {
        let requested = match &self.version_file {
            Some(path) if path.is_file() => Some(RequestedVersion {
                version: read_version_file(path)?,
                source: VersionSource::VersionFile,
            }),
            Some(path) if self.version.is_none() => {
                return Err(CoreError::VersionFileMissing {
                    path: path.display().to_string(),
                });
            }
            _ => self.version.as_ref().map(|v| RequestedVersion {
                version: v.trim().to_string(),
                source: VersionSource::Explicit,
            }),
        };

        if let (Some(requested), Some(range)) = (&requested, &self.range) {
            let parsed = VersionRange::parse(range)?;
            if !parsed.satisfied_by(&requested.version) {
                return Err(CoreError::VersionOutOfRange {
                    version: requested.version.clone(),
                    range: range.clone(),
                });
            }
        }

        Ok(requested)
    }

    /// Final version pair for the run
    pub fn resolve(
        &self,
        requested: Option<RequestedVersion>,
        chart: &ChartDescriptor,
    ) -> ResolvedVersions {
        let (version, source) = match requested {
            Some(r) => (r.version, r.source),
            None => {
                let current = chart.app_version.as_deref().unwrap_or(&chart.version);
                let bumped = bump_patch(current);
                tracing::info!(from = current, to = %bumped, "no version given, incrementing patch");
                (bumped, VersionSource::PatchBump)
            }
        };

        let app_version = if let Some(explicit) = &self.app_version {
            Some(explicit.clone())
        } else if self.set_app_version || source == VersionSource::PatchBump {
            Some(version.clone())
        } else {
            None
        };

        ResolvedVersions {
            version,
            app_version,
            source,
        }
    }
}

fn read_version_file(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .ok_or_else(|| CoreError::VersionFileEmpty {
            path: path.display().to_string(),
        })
}

/// Split `major.minor.patch` leniently: a missing or non-numeric component
/// counts as 0, and only leading digits are read (`3-rc1` is 3).
pub fn lenient_components(version: &str) -> (u64, u64, u64) {
    let mut parts = version.trim().split('.').map(leading_number);
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);
    (major, minor, patch)
}

fn leading_number(component: &str) -> u64 {
    let digits: String = component
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// `major.minor.(patch + 1)` of a possibly malformed version
pub fn bump_patch(version: &str) -> String {
    let (major, minor, patch) = lenient_components(version);
    format!("{}.{}.{}", major, minor, patch.saturating_add(1))
}

/// An npm-style version range: `||`-separated comparator sets
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    pub fn parse(range: &str) -> Result<Self> {
        let alternatives = range
            .split("||")
            .map(|set| {
                let normalized = normalize_comparator_set(set);
                VersionReq::parse(&normalized).map_err(|e| CoreError::InvalidRange {
                    range: range.to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: range.to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Like [`matches`](Self::matches) for unparsed input; invalid SemVer never
    /// satisfies a range.
    pub fn satisfied_by(&self, version: &str) -> bool {
        let trimmed = version.trim().trim_start_matches('v');
        Version::parse(trimmed)
            .map(|v| self.matches(&v))
            .unwrap_or(false)
    }
}

/// Turn one npm comparator set into `VersionReq` syntax
fn normalize_comparator_set(set: &str) -> String {
    let set = set.trim();
    if set.is_empty() {
        return "*".to_string();
    }

    if let Some(caps) = HYPHEN_RANGE.captures(set) {
        return format!(">={}, <={}", strip_v(&caps[1]), strip_v(&caps[2]));
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in set.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            pending_op = Some(token);
            continue;
        }
        let token = match pending_op.take() {
            Some(op) => format!("{}{}", op, token),
            None => token.to_string(),
        };
        comparators.push(normalize_comparator(&token));
    }

    comparators.join(", ")
}

fn normalize_comparator(token: &str) -> String {
    let split = token
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '^' | '~'))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(split);
    let version = strip_v(version);

    if !op.is_empty() {
        return format!("{}{}", op, version);
    }

    // npm reads a bare version as exact and a bare partial as a wildcard,
    // VersionReq would read both as caret requirements.
    let core = version.split(['-', '+']).next().unwrap_or(version);
    let parts: Vec<&str> = core.split('.').collect();
    let is_wildcard = parts
        .iter()
        .any(|p| matches!(*p, "x" | "X" | "*"));
    if is_wildcard {
        version.to_string()
    } else if parts.len() >= 3 {
        format!("={}", version)
    } else {
        format!("{}.*", version)
    }
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}
