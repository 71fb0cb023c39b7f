//! Chart descriptor (Chart.yaml) loading and persistence

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Name of the descriptor file at the chart root
pub const CHART_FILE: &str = "Chart.yaml";

/// A chart's Chart.yaml
///
/// Only `version` and `appVersion` are ever rewritten. A descriptor parsed
/// from text remembers that text, and saving it replaces just those two
/// top-level lines, so comments, key order and every other value stay
/// byte-for-byte what the author wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDescriptor {
    /// Chart API version (v1 or v2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Chart name (required)
    pub name: String,

    /// Chart version, kept verbatim so placeholder versions survive loading
    #[serde(with = "scalar_string")]
    pub version: String,

    /// Version of the packaged application
    #[serde(
        default,
        with = "scalar_string::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    /// Everything else (keywords, sources, annotations, type, ...), read-only
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,

    /// Text the descriptor was parsed from
    #[serde(skip)]
    source_text: Option<String>,
}

/// Maintainer information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Chart dependency as declared in Chart.yaml (apiVersion v2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,

    #[serde(with = "scalar_string")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// condition, tags, alias, import-values ...
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl ChartDescriptor {
    /// Parse a descriptor from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut chart: Self = serde_yaml::from_str(content)?;
        if chart.name.trim().is_empty() {
            return Err(CoreError::InvalidChart {
                message: "name must not be empty".to_string(),
            });
        }

        // The parser has already turned `1.10` into the float 1.1
        if let Some(version) = find_top_level_scalar(content, VERSION_KEY) {
            chart.version = version.to_string();
        }
        if let Some(app_version) = find_top_level_scalar(content, APP_VERSION_KEY) {
            chart.app_version = Some(app_version.to_string());
        }
        chart.source_text = Some(content.to_string());
        Ok(chart)
    }

    /// Render the descriptor as YAML.
    ///
    /// A descriptor parsed from text renders as that text with the version
    /// lines replaced. Without text, or when `version` is not a plain
    /// single-line scalar, it is serialized from scratch.
    pub fn to_yaml(&self) -> Result<String> {
        let rewritten = self
            .source_text
            .as_deref()
            .and_then(|text| rewrite_versions(text, &self.version, self.app_version.as_deref()));
        match rewritten {
            Some(text) => Ok(text),
            None => Ok(serde_yaml::to_string(self)?),
        }
    }

    /// Path of the descriptor file inside a chart directory
    pub fn path_in(chart_dir: &Path) -> PathBuf {
        chart_dir.join(CHART_FILE)
    }

    /// Load Chart.yaml from a chart directory
    pub fn load(chart_dir: &Path) -> Result<Self> {
        if !chart_dir.is_dir() {
            return Err(CoreError::ChartNotFound {
                path: chart_dir.display().to_string(),
            });
        }

        let file = Self::path_in(chart_dir);
        if !file.exists() {
            return Err(CoreError::InvalidChart {
                message: format!("{} not found in {}", CHART_FILE, chart_dir.display()),
            });
        }

        let content = std::fs::read_to_string(&file)?;
        Self::from_yaml(&content)
    }

    /// Write Chart.yaml into a chart directory, replacing the existing file
    pub fn save(&self, chart_dir: &Path) -> Result<()> {
        let file = Self::path_in(chart_dir);
        std::fs::write(&file, self.to_yaml()?)?;
        tracing::debug!(path = %file.display(), version = %self.version, "wrote chart descriptor");
        Ok(())
    }

    /// Rewrite the two mutable fields
    pub fn set_versions(&mut self, version: &str, app_version: Option<&str>) {
        self.version = version.to_string();
        if let Some(app_version) = app_version {
            self.app_version = Some(app_version.to_string());
        }
    }
}

const VERSION_KEY: &str = "version";
const APP_VERSION_KEY: &str = "appVersion";

/// A single-line scalar on a top-level `key: value` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalarLine<'a> {
    /// Value text without quotes
    value: &'a str,
    /// Whatever follows the value (closing spaces, a comment)
    rest: &'a str,
}

/// Parse `line` as `key: <scalar>` at column zero.
///
/// Block scalars, flow collections, anchors, tags and escaped strings are
/// not single-line scalars and yield `None`.
fn top_level_scalar<'a>(line: &'a str, key: &str) -> Option<ScalarLine<'a>> {
    let after = line.strip_prefix(key)?.strip_prefix(':')?;
    let trimmed = after.trim_start();
    if trimmed.is_empty() || trimmed.len() == after.len() {
        return None;
    }

    match trimmed.chars().next()? {
        quote @ ('"' | '\'') => {
            let inner = &trimmed[1..];
            let end = inner.find(quote)?;
            let value = &inner[..end];
            let rest = &inner[end + 1..];
            let escaped = match quote {
                '"' => value.contains('\\'),
                _ => rest.starts_with('\''),
            };
            if escaped {
                return None;
            }
            Some(ScalarLine { value, rest })
        }
        '|' | '>' | '&' | '*' | '!' | '{' | '[' | '#' => None,
        _ => {
            let end = trimmed.find(" #").unwrap_or(trimmed.len());
            let value = trimmed[..end].trim_end();
            Some(ScalarLine {
                value,
                rest: &trimmed[value.len()..],
            })
        }
    }
}

fn find_top_level_scalar<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    content
        .lines()
        .find_map(|line| top_level_scalar(line.trim_end_matches('\r'), key))
        .map(|scalar| scalar.value)
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// `value` as a YAML scalar that reads back as the same string
fn render_scalar(value: &str) -> String {
    match serde_yaml::from_str::<serde_yaml::Value>(value) {
        Ok(serde_yaml::Value::String(parsed)) if parsed == value => value.to_string(),
        _ => format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}

/// Replace the value of a scalar line, keeping it verbatim when unchanged
fn replace_scalar(out: &mut String, body: &str, key: &str, scalar: ScalarLine<'_>, value: &str) {
    if scalar.value == value {
        out.push_str(body);
    } else {
        out.push_str(&format!("{}: {}{}", key, render_scalar(value), scalar.rest));
    }
}

/// Set the top-level `version` and `appVersion` lines of Chart.yaml text.
///
/// Other lines are copied unchanged. A missing `appVersion` is inserted
/// right after `version`. `None` when a line that needs editing is not a
/// plain single-line scalar.
fn rewrite_versions(content: &str, version: &str, app_version: Option<&str>) -> Option<String> {
    let app_version_key = format!("{}:", APP_VERSION_KEY);
    let has_app_version = content.lines().any(|line| line.starts_with(&app_version_key));
    let mut pending_app_version = app_version.filter(|_| !has_app_version);
    let mut version_done = false;
    let mut app_version_done = false;
    let mut out = String::with_capacity(content.len() + 32);

    for line in content.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);

        if !version_done {
            if let Some(scalar) = top_level_scalar(body, VERSION_KEY) {
                version_done = true;
                replace_scalar(&mut out, body, VERSION_KEY, scalar, version);
                out.push_str(ending);
                if let Some(app_version) = pending_app_version.take() {
                    if ending.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(&format!("{}: {}", APP_VERSION_KEY, render_scalar(app_version)));
                    out.push_str(ending);
                }
                continue;
            }
        }

        if !app_version_done {
            if let (Some(scalar), Some(app_version)) =
                (top_level_scalar(body, APP_VERSION_KEY), app_version)
            {
                app_version_done = true;
                replace_scalar(&mut out, body, APP_VERSION_KEY, scalar, app_version);
                out.push_str(ending);
                continue;
            }
        }

        out.push_str(line);
    }

    // An appVersion written in a form this does not edit
    if has_app_version && app_version.is_some() && !app_version_done {
        return None;
    }
    version_done.then_some(out)
}

/// YAML scalars as strings. Numbers come back in their canonical form, so
/// top-level versions are re-read from the source text afterwards.
mod scalar_string {
    use serde::{Deserialize, Deserializer, Serializer};

    fn to_text<E: serde::de::Error>(value: serde_yaml::Value) -> Result<String, E> {
        match value {
            serde_yaml::Value::String(s) => Ok(s),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            serde_yaml::Value::Bool(b) => Ok(b.to_string()),
            other => Err(E::custom(format!("expected a scalar, found {:?}", other))),
        }
    }

    pub fn serialize<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        to_text(serde_yaml::Value::deserialize(deserializer)?)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(v) => serializer.serialize_str(v),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match serde_yaml::Value::deserialize(deserializer)? {
                serde_yaml::Value::Null => Ok(None),
                other => super::to_text(other).map(Some),
            }
        }
    }
}
