//! Source resolution.
//!
//! Maps an SDK identifier to a concrete location to fetch from. Versions are
//! routed to one of three hosting schemes:
//!
//! - the current release lives under the `featured` bucket,
//! - releases newer than [`legacy_cutoff`] live in per-version `deprecated`
//!   buckets,
//! - everything up to and including the cutoff lives on the old code-hosting
//!   archive.
//!
//! Identifiers that are not versions are either HTTP(S) URLs, used verbatim,
//! or local paths.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use reqwest::Url;

use super::version::{Identifier, SdkVersion, parse_identifier};
use crate::errors::SdkError;

/// Last release hosted on the old code-hosting archive.
const LEGACY_CUTOFF: (u64, u64, u64) = (1, 8, 9);

const FEATURED_PREFIX: &str = "https://storage.googleapis.com/appengine-sdks/featured";
const DEPRECATED_PREFIX: &str = "http://storage.googleapis.com/appengine-sdks/deprecated";
const LEGACY_PREFIX: &str = "http://googleappengine.googlecode.com/files";

/// Where an archive is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// An HTTP or HTTPS location. `raw` is the text the URL came from, kept
    /// verbatim for display and records; `url` is what gets requested.
    Remote { url: Url, raw: String },
    /// An absolute path on the local filesystem.
    Local(PathBuf),
}

impl fmt::Display for ResolvedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { raw, .. } => f.write_str(raw),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl ResolvedSource {
    /// A remote source whose text is the URL's own serialization.
    #[must_use]
    pub fn remote(url: Url) -> Self {
        Self::Remote {
            raw: url.to_string(),
            url,
        }
    }
}

/// The newest release still served from the legacy archive.
#[must_use]
pub fn legacy_cutoff() -> SdkVersion {
    let (major, minor, patch) = LEGACY_CUTOFF;
    SdkVersion::new(major, minor, patch)
}

/// Which hosting scheme a version is downloaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// The release the catalog reports as current.
    Featured,
    /// A per-version bucket for releases after the legacy cutoff.
    Deprecated,
    /// The old code-hosting archive.
    Legacy,
}

impl Bucket {
    /// Picks the hosting scheme for `version` given the current release.
    #[must_use]
    pub fn select(version: &SdkVersion, current: &SdkVersion) -> Self {
        if version == current {
            Self::Featured
        } else if *version > legacy_cutoff() {
            Self::Deprecated
        } else {
            Self::Legacy
        }
    }

    /// Download URL of `version` in this bucket.
    #[must_use]
    pub fn url_for(self, version: &SdkVersion) -> String {
        let file = format!("google_appengine_{}.zip", version.literal());
        match self {
            Self::Featured => format!("{FEATURED_PREFIX}/{file}"),
            Self::Deprecated => format!("{DEPRECATED_PREFIX}/{}/{file}", version.bucket()),
            Self::Legacy => format!("{LEGACY_PREFIX}/{file}"),
        }
    }
}

/// Resolves an identifier against the current release.
///
/// # Errors
///
/// Returns [`SdkError::VersionResolutionAmbiguous`] if the identifier is
/// blank, uses a URL scheme other than `http`/`https`, or cannot be turned
/// into an absolute path.
pub fn resolve(identifier: &str, current: &SdkVersion) -> Result<ResolvedSource> {
    let text = match parse_identifier(identifier) {
        Identifier::Parsed(version) => {
            let bucket = Bucket::select(&version, current);
            let url = bucket.url_for(&version);
            tracing::debug!(%version, ?bucket, %url, "resolved version");
            let url = Url::parse(&url).map_err(|e| {
                SdkError::ambiguous(identifier, format!("invalid download URL {url}: {e}"))
            })?;
            return Ok(ResolvedSource::remote(url));
        }
        Identifier::Unparsed(text) => text,
    };

    if text.trim().is_empty() {
        return Err(SdkError::ambiguous(identifier, "identifier is empty").into());
    }

    if let Ok(url) = Url::parse(&text) {
        match url.scheme() {
            "http" | "https" => {
                return Ok(ResolvedSource::Remote {
                    url,
                    raw: text,
                });
            }
            // A one-letter scheme is a Windows drive such as `C:\sdk.zip`.
            scheme if scheme.len() > 1 => {
                return Err(SdkError::ambiguous(
                    identifier,
                    format!("unsupported URL scheme '{scheme}'"),
                )
                .into());
            }
            _ => {}
        }
    }

    let path = std::path::absolute(&text)
        .map_err(|e| SdkError::ambiguous(identifier, format!("not a usable path: {e}")))?;
    Ok(ResolvedSource::Local(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(text: &str) -> SdkVersion {
        SdkVersion::parse(text).expect("Should parse version")
    }

    fn remote(source: ResolvedSource) -> String {
        match source {
            ResolvedSource::Remote { raw, .. } => raw,
            ResolvedSource::Local(path) => panic!("expected remote, got {}", path.display()),
        }
    }

    #[test]
    fn current_version_uses_featured_bucket() {
        let current = version("1.9.91");
        let url = remote(resolve("1.9.91", &current).expect("Should resolve"));
        assert_eq!(
            url,
            "https://storage.googleapis.com/appengine-sdks/featured/google_appengine_1.9.91.zip"
        );
    }

    #[test]
    fn current_version_wins_even_below_cutoff() {
        let current = version("1.8.0");
        let url = remote(resolve("1.8.0", &current).expect("Should resolve"));
        assert!(url.contains("/featured/"), "{url}");
    }

    #[test]
    fn newer_than_cutoff_uses_deprecated_bucket() {
        let current = version("1.9.91");
        let url = remote(resolve("1.9.40", &current).expect("Should resolve"));
        assert_eq!(
            url,
            "http://storage.googleapis.com/appengine-sdks/deprecated/1940/google_appengine_1.9.40.zip"
        );
    }

    #[test]
    fn cutoff_itself_is_legacy() {
        let current = version("1.9.91");
        let url = remote(resolve("1.8.9", &current).expect("Should resolve"));
        assert_eq!(
            url,
            "http://googleappengine.googlecode.com/files/google_appengine_1.8.9.zip"
        );
    }

    #[test]
    fn older_than_cutoff_is_legacy() {
        let current = version("1.9.91");
        let url = remote(resolve("1.7.5", &current).expect("Should resolve"));
        assert!(url.starts_with("http://googleappengine.googlecode.com/files/"));
    }

    #[test]
    fn one_past_cutoff_is_deprecated() {
        let current = version("1.9.91");
        let url = remote(resolve("1.8.10", &current).expect("Should resolve"));
        assert!(url.contains("/deprecated/1810/"), "{url}");
    }

    #[test]
    fn numerically_equal_literal_keeps_user_spelling() {
        let current = version("1.9.0");
        let url = remote(resolve("1.09.0", &current).expect("Should resolve"));
        assert!(url.ends_with("/featured/google_appengine_1.09.0.zip"), "{url}");
    }

    #[test]
    fn http_urls_pass_through() {
        let current = version("1.9.91");
        for input in [
            "http://example.com/sdk.zip",
            "https://mirror.example.org/path/google_appengine_1.9.91.zip",
        ] {
            let url = remote(resolve(input, &current).expect("Should resolve"));
            assert_eq!(url, input);
        }
    }

    #[test]
    fn suffixed_version_falls_through_to_path() {
        let current = version("1.9.91");
        let source = resolve("1.9.91-rc1", &current).expect("Should resolve");
        let ResolvedSource::Local(path) = source else {
            panic!("expected local path");
        };
        assert!(path.is_absolute());
        assert!(path.ends_with("1.9.91-rc1"));
    }

    #[test]
    fn relative_path_becomes_absolute() {
        let current = version("1.9.91");
        let source = resolve("downloads/sdk.zip", &current).expect("Should resolve");
        let expected = std::env::current_dir()
            .expect("Should have cwd")
            .join("downloads/sdk.zip");
        assert_eq!(source, ResolvedSource::Local(expected));
    }

    #[test]
    fn absolute_path_is_kept() {
        let current = version("1.9.91");
        let source = resolve("/tmp/google_appengine.zip", &current).expect("Should resolve");
        assert_eq!(
            source,
            ResolvedSource::Local(PathBuf::from("/tmp/google_appengine.zip"))
        );
    }

    #[test]
    fn empty_identifier_is_ambiguous() {
        let current = version("1.9.91");
        for input in ["", "   "] {
            let err = resolve(input, &current).expect_err("Should fail");
            assert!(matches!(
                err.downcast_ref::<SdkError>(),
                Some(SdkError::VersionResolutionAmbiguous { .. })
            ));
        }
    }

    #[test]
    fn unsupported_scheme_is_ambiguous() {
        let current = version("1.9.91");
        let err = resolve("ftp://example.com/sdk.zip", &current).expect_err("Should fail");
        assert!(matches!(
            err.downcast_ref::<SdkError>(),
            Some(SdkError::VersionResolutionAmbiguous { .. })
        ));
    }

    #[test]
    fn resolved_source_displays_location() {
        let local = ResolvedSource::Local(PathBuf::from("/tmp/sdk.zip"));
        assert_eq!(local.to_string(), "/tmp/sdk.zip");

        let remote = ResolvedSource::remote(Url::parse("https://example.com/a.zip").unwrap());
        assert_eq!(remote.to_string(), "https://example.com/a.zip");
    }

    #[test]
    fn non_canonical_urls_are_returned_unchanged() {
        let current = version("1.9.91");
        for (input, requested) in [
            ("http://example.com", "http://example.com/"),
            ("HTTP://Example.COM/sdk.zip", "http://example.com/sdk.zip"),
            ("https://host/a b.zip", "https://host/a%20b.zip"),
            ("https://host:443/sdk.zip", "https://host/sdk.zip"),
        ] {
            let source = resolve(input, &current).expect("Should resolve");
            assert_eq!(source.to_string(), input);
            let ResolvedSource::Remote { url, raw } = source else {
                panic!("expected remote for {input}");
            };
            assert_eq!(raw, input);
            assert_eq!(url.as_str(), requested);
        }
    }
}
