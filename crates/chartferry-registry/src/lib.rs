//! chartferry registry client
//!
//! This crate talks to the chart API of a Harbor-style registry:
//!
//! - **Upload**: multipart POST of a packaged chart, with the registry's
//!   answer classified into distinct failures
//! - **Indexing poll**: fixed-cadence wait until the uploaded version is served
//! - **Listing and download**: version discovery and archive retrieval
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartferry_registry::{Credentials, PollPolicy, RegistryClient, RegistryEndpoint, wait_for_chart};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = RegistryEndpoint::new("https://harbor.example.com", "library")?;
//! let client = RegistryClient::new(endpoint, Some(Credentials::basic("robot", "secret")))?;
//!
//! client.upload(Path::new("/tmp/webapp-1.2.3.tgz"), None, false).await?;
//! let details = wait_for_chart(&client, "webapp", "1.2.3", PollPolicy::default()).await?;
//! println!("digest: {}", details.metadata.digest);
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Notes
//!
//! - Redirects are never followed, so credentials stay on the configured origin

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod metadata;
pub mod poll;

// Re-exports for convenience
pub use client::{
    ChartIndex, FetchOutcome, RegistryClient, UploadReceipt, compute_digest, digest_matches,
};
pub use config::{RegistryEndpoint, normalize_server_url};
pub use credentials::Credentials;
pub use error::{RegistryError, Result};
pub use metadata::{ChartMetadata, ChartSecurity, ChartSignature, ChartVersionDetails};
pub use poll::{DEFAULT_ATTEMPTS, DEFAULT_DELAY, PollPolicy, wait_for_chart};
