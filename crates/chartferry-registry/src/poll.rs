//! Waiting for an uploaded chart to be indexed
//!
//! The registry accepts an upload before it can serve the chart's metadata.
//! The poller asks for the chart a fixed number of times with a fixed pause
//! in between; "not found" answers are expected along the way, anything else
//! ends the wait.

use std::time::Duration;

use crate::client::{ChartIndex, FetchOutcome};
use crate::error::{RegistryError, Result};
use crate::metadata::ChartVersionDetails;

/// Attempts before giving up on indexing
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Pause between two attempts
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Fixed-cadence retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl PollPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

/// Fetch `name`/`version` until the registry serves it.
///
/// Fails with [`RegistryError::NotIndexed`] when every attempt came back
/// not-found, and with [`RegistryError::VersionMismatch`] (without retrying)
/// when the registry serves a different version.
pub async fn wait_for_chart<I>(
    index: &I,
    name: &str,
    version: &str,
    policy: PollPolicy,
) -> Result<ChartVersionDetails>
where
    I: ChartIndex + ?Sized,
{
    let attempts = policy.attempts.max(1);
    let mut last_status = 0;

    for attempt in 1..=attempts {
        match index.fetch_chart_version(name, version).await? {
            FetchOutcome::Found(details) => {
                if details.metadata.version != version {
                    return Err(RegistryError::VersionMismatch {
                        expected: version.to_string(),
                        actual: details.metadata.version.clone(),
                    });
                }
                tracing::debug!(name, version, attempt, "chart indexed");
                return Ok(*details);
            }
            FetchOutcome::NotFound { status, body } => {
                last_status = status;
                tracing::info!(
                    name,
                    version,
                    attempt,
                    attempts,
                    status,
                    body = %body.trim(),
                    "chart not indexed yet"
                );
            }
        }

        if attempt < attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(RegistryError::NotIndexed {
        name: name.to_string(),
        version: version.to_string(),
        attempts,
        last_status,
    })
}
