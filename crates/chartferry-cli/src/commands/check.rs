//! Check command - discover published chart versions

use chartferry_core::VersionRange;
use chartferry_registry::{ChartMetadata, RegistryClient};
use semver::Version;

use crate::envelope::{CheckRequest, VersionRef};
use crate::error::Result;

/// Versions at or after the one the pipeline last saw, oldest first
pub async fn run(request: CheckRequest) -> Result<Vec<VersionRef>> {
    let CheckRequest { source, version } = request;
    let client = RegistryClient::new(source.endpoint()?, source.credentials())?;

    let range = source
        .version_range
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(VersionRange::parse)
        .transpose()?;

    let charts = client.list_versions(&source.chart_name).await?;
    tracing::debug!(chart = %source.chart_name, count = charts.len(), "listed versions");

    Ok(select_versions(
        &charts,
        range.as_ref(),
        version.as_ref().map(|v| v.version.as_str()),
    ))
}

/// Filter by range, sort, and cut at `current`.
///
/// Without a current version, or when it is no longer listed, only the
/// latest version is returned.
pub fn select_versions(
    charts: &[ChartMetadata],
    range: Option<&VersionRange>,
    current: Option<&str>,
) -> Vec<VersionRef> {
    let mut candidates: Vec<(Version, &ChartMetadata)> = charts
        .iter()
        .filter_map(|chart| Version::parse(&chart.version).ok().map(|v| (v, chart)))
        .filter(|(version, _)| range.is_none_or(|r| r.matches(version)))
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    candidates.dedup_by(|a, b| a.0 == b.0);

    let start = current
        .and_then(|current| Version::parse(current).ok())
        .and_then(|current| candidates.iter().position(|(v, _)| *v == current))
        .unwrap_or_else(|| candidates.len().saturating_sub(1));

    candidates[start.min(candidates.len())..]
        .iter()
        .map(|(_, chart)| VersionRef {
            version: chart.version.clone(),
            digest: chart.digest.clone(),
        })
        .collect()
}
