//! Version catalog client.
//!
//! The update-check endpoint answers with a small YAML document:
//!
//! ```yaml
//! release: "1.9.91"
//! timestamp: 1593467587
//! api_versions: ['1']
//! ```
//!
//! Only `release` is used. The lookup is attempted once; a failure aborts
//! the whole install and the caller may simply run it again.

use anyhow::Result;
use serde::Deserialize;

use super::config::HttpSettings;
use super::version::SdkVersion;
use crate::errors::SdkError;

#[derive(Debug, Deserialize)]
struct UpdateCheck {
    release: Option<serde_yaml::Value>,
}

/// Asks the update-check endpoint for the current SDK release.
///
/// # Errors
///
/// Returns [`SdkError::CatalogUnavailable`] if the request fails, the server
/// answers with a non-success status, or the body has no valid `release`.
pub async fn current_version(http: &HttpSettings) -> Result<SdkVersion> {
    let url = &http.updatecheck_url;
    let client = http.client()?;

    tracing::debug!(%url, "querying version catalog");

    let response = client.get(url).send().await.map_err(|e| {
        SdkError::catalog_unavailable_with_source(format!("failed to reach {url}"), e)
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SdkError::catalog_unavailable(format!("HTTP error {status}: {url}")).into());
    }

    let body = response.text().await.map_err(|e| {
        SdkError::catalog_unavailable_with_source(format!("failed to read response from {url}"), e)
    })?;

    let version = parse_release(&body)?;
    tracing::info!(release = %version, "current SDK release");
    Ok(version)
}

/// Extracts the `release` version from an update-check body.
fn parse_release(body: &str) -> Result<SdkVersion> {
    let check: UpdateCheck = serde_yaml::from_str(body).map_err(|e| {
        SdkError::catalog_unavailable_with_source("response is not a YAML mapping", e)
    })?;

    let release = match check.release {
        Some(serde_yaml::Value::String(release)) => release,
        Some(other) => {
            return Err(SdkError::catalog_unavailable(format!(
                "'release' is not a string: {other:?}"
            ))
            .into());
        }
        None => return Err(SdkError::catalog_unavailable("missing 'release' field").into()),
    };

    SdkVersion::parse(release.trim()).ok_or_else(|| {
        SdkError::catalog_unavailable(format!("'release' is not a version: {release}")).into()
    })
}
