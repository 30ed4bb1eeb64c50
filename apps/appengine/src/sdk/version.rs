//! SDK version identifiers.
//!
//! SDK releases are numbered `major.minor.patch`. Parsing is deliberately
//! strict: exactly three dot-separated runs of ASCII digits. Anything else,
//! including pre-release or build suffixes such as `1.9.0-rc1`, is returned
//! as [`Identifier::Unparsed`] so the resolver can treat it as a URL or a
//! path. Callers must not "fix" such strings into versions.

use std::cmp::Ordering;
use std::fmt;

/// A parsed SDK version.
///
/// Ordering and equality are numeric, so `1.09.0 == 1.9.0`. The literal text
/// is kept because download URLs are built from the string the user typed.
#[derive(Debug, Clone)]
pub struct SdkVersion {
    version: semver::Version,
    literal: String,
}

impl SdkVersion {
    /// Builds a version from its components; the literal is the canonical form.
    #[must_use]
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        let version = semver::Version::new(major, minor, patch);
        Self {
            literal: version.to_string(),
            version,
        }
    }

    /// Parses a strict `major.minor.patch` string.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split('.');
        let major = parse_component(parts.next()?)?;
        let minor = parse_component(parts.next()?)?;
        let patch = parse_component(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            version: semver::Version::new(major, minor, patch),
            literal: text.to_string(),
        })
    }

    /// The string this version was parsed from.
    #[must_use]
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// The storage bucket segment: the literal with its separators removed.
    ///
    /// `1.9.40` becomes `1940`.
    #[must_use]
    pub fn bucket(&self) -> String {
        self.literal.replace('.', "")
    }
}

fn parse_component(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

impl PartialEq for SdkVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for SdkVersion {}

impl PartialOrd for SdkVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SdkVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

impl fmt::Display for SdkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}

/// A user-supplied SDK identifier, split on whether it is a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// The identifier is a `major.minor.patch` version.
    Parsed(SdkVersion),
    /// Anything else; kept verbatim for URL or path handling.
    Unparsed(String),
}

/// Splits an identifier into a version or an opaque string.
#[must_use]
pub fn parse_identifier(text: &str) -> Identifier {
    SdkVersion::parse(text).map_or_else(|| Identifier::Unparsed(text.to_string()), Identifier::Parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_components() {
        let v = SdkVersion::parse("1.9.40").expect("Should parse");
        assert_eq!(v, SdkVersion::new(1, 9, 40));
        assert_eq!(v.literal(), "1.9.40");
    }

    #[test]
    fn rejects_two_components() {
        assert!(SdkVersion::parse("1.9").is_none());
    }

    #[test]
    fn rejects_four_components() {
        assert!(SdkVersion::parse("1.9.40.1").is_none());
    }

    #[test]
    fn rejects_suffixes() {
        assert!(SdkVersion::parse("1.9.0-rc1").is_none());
        assert!(SdkVersion::parse("1.9.0+build").is_none());
        assert!(SdkVersion::parse("v1.9.0").is_none());
        assert!(SdkVersion::parse(" 1.9.0").is_none());
    }

    #[test]
    fn rejects_empty_and_signed_components() {
        assert!(SdkVersion::parse("").is_none());
        assert!(SdkVersion::parse("1..0").is_none());
        assert!(SdkVersion::parse("1.-9.0").is_none());
        assert!(SdkVersion::parse("1.+9.0").is_none());
    }

    #[test]
    fn rejects_overflowing_component() {
        assert!(SdkVersion::parse("1.9.99999999999999999999999").is_none());
    }

    #[test]
    fn ordering_is_numeric() {
        let a = SdkVersion::parse("1.8.9").expect("Should parse");
        let b = SdkVersion::parse("1.8.10").expect("Should parse");
        let c = SdkVersion::parse("1.10.0").expect("Should parse");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn leading_zeros_compare_equal_but_keep_literal() {
        let padded = SdkVersion::parse("1.09.0").expect("Should parse");
        assert_eq!(padded, SdkVersion::new(1, 9, 0));
        assert_eq!(padded.to_string(), "1.09.0");
    }

    #[test]
    fn bucket_strips_separators() {
        let v = SdkVersion::parse("1.9.40").expect("Should parse");
        assert_eq!(v.bucket(), "1940");
    }

    #[test]
    fn identifier_splits_versions_from_other_strings() {
        assert_eq!(
            parse_identifier("1.9.40"),
            Identifier::Parsed(SdkVersion::new(1, 9, 40))
        );
        assert_eq!(
            parse_identifier("./sdk.zip"),
            Identifier::Unparsed("./sdk.zip".to_string())
        );
        assert_eq!(
            parse_identifier("1.9.40-beta"),
            Identifier::Unparsed("1.9.40-beta".to_string())
        );
    }
}
