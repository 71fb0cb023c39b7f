//! chartferry core - chart types and version handling
//!
//! This crate provides the pieces of a publishing run that need no network
//! or subprocess:
//! - `ChartDescriptor`: Chart.yaml, loaded and rewritten in place
//! - `VersionResolver`: picks the version a chart is published under
//! - `VersionRange`: npm-style range matching on top of `semver`
//! - `scan_repositories`: repository discovery in requirements.yaml

pub mod chart;
pub mod error;
pub mod requirements;
pub mod version;

pub use chart::{CHART_FILE, ChartDescriptor, Dependency, Maintainer};
pub use error::{CoreError, Result};
pub use requirements::{REQUIREMENTS_FILE, RepositoryReference, load_repositories, scan_repositories};
pub use version::{
    RequestedVersion, ResolvedVersions, VersionRange, VersionResolver, VersionSource, bump_patch,
    lenient_components,
};
