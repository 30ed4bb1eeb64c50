//! Error types for the SDK installer.
//!
//! Stage functions return `anyhow::Result` and raise `SdkError` values so the
//! command layer can attach context while callers can still recover the kind
//! of failure with `downcast_ref::<SdkError>()`.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error used as the optional cause of an [`SdkError`].
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Failure kinds of the install pipeline.
///
/// Every variant is fatal: the pipeline stops at the first one raised.
#[derive(Debug, Error)]
pub enum SdkError {
    /// The update-check endpoint could not be reached or its answer had no
    /// usable `release` field.
    #[error("version catalog unavailable: {message}")]
    CatalogUnavailable {
        /// Description of what went wrong.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxedSource>,
    },

    /// The identifier is neither a version, an HTTP(S) URL, nor a usable path.
    #[error("cannot resolve SDK identifier '{identifier}': {reason}")]
    VersionResolutionAmbiguous {
        /// The identifier as given.
        identifier: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The archive could not be downloaded or opened.
    #[error("fetch error: {message}")]
    FetchError {
        /// Description of the fetch failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxedSource>,
    },

    /// The archive is malformed, hostile, or could not be written to disk.
    #[error("extraction error: {message}")]
    ExtractionError {
        /// Description of the extraction failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxedSource>,
    },

    /// The SDK is already present and overwriting was not requested.
    #[error("already installed: {} exists (use --force to overwrite)", path.display())]
    AlreadyInstalled {
        /// The existing path that blocked the install.
        path: PathBuf,
    },

    /// A tool could not be made executable or linked into the tools directory.
    #[error("publish error: {message}")]
    PublishError {
        /// Description of the publish failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxedSource>,
    },
}

impl SdkError {
    /// Creates a new `CatalogUnavailable` error.
    #[must_use]
    pub fn catalog_unavailable(message: impl Into<String>) -> Self {
        Self::CatalogUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `CatalogUnavailable` error with a source error.
    #[must_use]
    pub fn catalog_unavailable_with_source(
        message: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::CatalogUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a new `VersionResolutionAmbiguous` error.
    #[must_use]
    pub fn ambiguous(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::VersionResolutionAmbiguous {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `FetchError`.
    #[must_use]
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::FetchError {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `FetchError` with a source error.
    #[must_use]
    pub fn fetch_with_source(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self::FetchError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a new `ExtractionError`.
    #[must_use]
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::ExtractionError {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `ExtractionError` with a source error.
    #[must_use]
    pub fn extraction_with_source(
        message: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::ExtractionError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a new `AlreadyInstalled` error.
    #[must_use]
    pub fn already_installed(path: impl Into<PathBuf>) -> Self {
        Self::AlreadyInstalled { path: path.into() }
    }

    /// Creates a new `PublishError` with a source error.
    #[must_use]
    pub fn publish_with_source(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self::PublishError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Short name of the pipeline stage that failed, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CatalogUnavailable { .. } => "catalog",
            Self::VersionResolutionAmbiguous { .. } => "resolve",
            Self::FetchError { .. } => "fetch",
            Self::ExtractionError { .. } | Self::AlreadyInstalled { .. } => "extract",
            Self::PublishError { .. } => "publish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_unavailable_displays_message() {
        let err = SdkError::catalog_unavailable("missing 'release' field");
        assert_eq!(
            err.to_string(),
            "version catalog unavailable: missing 'release' field"
        );
    }

    #[test]
    fn ambiguous_displays_identifier_and_reason() {
        let err = SdkError::ambiguous("ftp://host/sdk.zip", "unsupported scheme 'ftp'");
        assert_eq!(
            err.to_string(),
            "cannot resolve SDK identifier 'ftp://host/sdk.zip': unsupported scheme 'ftp'"
        );
    }

    #[test]
    fn fetch_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = SdkError::fetch_with_source("archive not found: /tmp/sdk.zip", io);
        assert_eq!(err.to_string(), "fetch error: archive not found: /tmp/sdk.zip");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn extraction_error_displays_message() {
        let err = SdkError::extraction("entry escapes destination: ../evil.txt");
        assert_eq!(
            err.to_string(),
            "extraction error: entry escapes destination: ../evil.txt"
        );
    }

    #[test]
    fn already_installed_mentions_force() {
        let err = SdkError::already_installed("/opt/google_appengine");
        assert_eq!(
            err.to_string(),
            "already installed: /opt/google_appengine exists (use --force to overwrite)"
        );
    }

    #[test]
    fn publish_error_displays_message() {
        let io = std::io::Error::other("read-only file system");
        let err = SdkError::publish_with_source("failed to link dev_appserver.py", io);
        assert_eq!(
            err.to_string(),
            "publish error: failed to link dev_appserver.py"
        );
    }

    #[test]
    fn kind_names_the_failing_stage() {
        assert_eq!(SdkError::already_installed("/opt/gae").kind(), "extract");
        assert_eq!(SdkError::fetch("boom").kind(), "fetch");
        assert_eq!(SdkError::ambiguous("x", "y").kind(), "resolve");
    }
}
