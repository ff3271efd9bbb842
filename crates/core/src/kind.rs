//! Metadata kinds, fetch status and repository ecosystems.

use crate::coordinate::PackageCoordinate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A kind of metadata whose fetching is coordinated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    /// Content hashes of a package version.
    Integrity,
    /// Health signals of the source repository behind a package.
    Health,
}

impl MetadataKind {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "integrity" => Ok(Self::Integrity),
            "health" => Ok(Self::Health),
            _ => Err(crate::Error::InvalidKind(s.to_string())),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integrity => "integrity",
            Self::Health => "health",
        }
    }

    /// What a fetch trigger for this kind asks the fetch worker for.
    pub fn requested(&self) -> Vec<RequestedMetadata> {
        match self {
            Self::Integrity => vec![RequestedMetadata::Integrity, RequestedMetadata::LatestVersion],
            Self::Health => vec![RequestedMetadata::Health],
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MetadataKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

/// Fetch status of a metadata record.
///
/// A record with no status at all is a distinct state and is modelled as
/// `Option<FetchStatus>` by callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchStatus {
    /// A fetch has been triggered and no result has been merged since.
    InProgress,
    /// A result carrying data has been merged.
    Processed,
    /// The upstream source had no data for the package.
    NotAvailable,
}

impl FetchStatus {
    /// Parse from the stored text form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "PROCESSED" => Ok(Self::Processed),
            "NOT_AVAILABLE" => Ok(Self::NotAvailable),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }

    /// Get the stored text form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Processed => "PROCESSED",
            Self::NotAvailable => "NOT_AVAILABLE",
        }
    }

    /// Whether a result has settled this record.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Processed | Self::NotAvailable)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata a fetch trigger requests from the fetch worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestedMetadata {
    LatestVersion,
    Integrity,
    Health,
}

/// Repository ecosystem a package is published in.
///
/// Version records are keyed by (ecosystem, namespace, name) rather than by
/// the full coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepositoryType {
    Maven,
    Npm,
    Pypi,
    Gem,
    Nuget,
    Go,
    Cargo,
    Composer,
    Hex,
    Cpan,
    Github,
    Hackage,
    Nixpkgs,
    Unsupported,
}

impl RepositoryType {
    /// Resolve the ecosystem of a coordinate from its type.
    pub fn resolve(coordinate: &PackageCoordinate) -> Self {
        Self::from_purl_type(coordinate.ty())
    }

    pub fn from_purl_type(ty: &str) -> Self {
        match ty {
            "maven" => Self::Maven,
            "npm" => Self::Npm,
            "pypi" => Self::Pypi,
            "gem" => Self::Gem,
            "nuget" => Self::Nuget,
            "golang" => Self::Go,
            "cargo" => Self::Cargo,
            "composer" => Self::Composer,
            "hex" => Self::Hex,
            "cpan" => Self::Cpan,
            "github" => Self::Github,
            "hackage" => Self::Hackage,
            "nixpkgs" => Self::Nixpkgs,
            _ => Self::Unsupported,
        }
    }

    /// Get the stored text form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maven => "MAVEN",
            Self::Npm => "NPM",
            Self::Pypi => "PYPI",
            Self::Gem => "GEM",
            Self::Nuget => "NUGET",
            Self::Go => "GO_MODULES",
            Self::Cargo => "CARGO",
            Self::Composer => "COMPOSER",
            Self::Hex => "HEX",
            Self::Cpan => "CPAN",
            Self::Github => "GITHUB",
            Self::Hackage => "HACKAGE",
            Self::Nixpkgs => "NIXPKGS",
            Self::Unsupported => "UNSUPPORTED",
        }
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_status_text_form() {
        for status in [
            FetchStatus::InProgress,
            FetchStatus::Processed,
            FetchStatus::NotAvailable,
        ] {
            assert_eq!(FetchStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(FetchStatus::parse("processed").is_err());
        assert!(FetchStatus::Processed.is_settled());
        assert!(!FetchStatus::InProgress.is_settled());
    }

    #[test]
    fn test_requested_metadata_per_kind() {
        assert_eq!(
            MetadataKind::Integrity.requested(),
            vec![RequestedMetadata::Integrity, RequestedMetadata::LatestVersion]
        );
        assert_eq!(MetadataKind::Health.requested(), vec![RequestedMetadata::Health]);
    }

    #[test]
    fn test_metadata_kind_parse() {
        assert_eq!(MetadataKind::parse("Health").unwrap(), MetadataKind::Health);
        assert!(MetadataKind::parse("repository").is_err());
    }

    #[test]
    fn test_repository_type_resolve() {
        let c = PackageCoordinate::parse("pkg:golang/github.com/foo/bar@v1.0.0").unwrap();
        assert_eq!(RepositoryType::resolve(&c), RepositoryType::Go);
        let c = PackageCoordinate::parse("pkg:deb/debian/curl@7.0").unwrap();
        assert_eq!(RepositoryType::resolve(&c), RepositoryType::Unsupported);
    }

    #[test]
    fn test_requested_metadata_wire_form() {
        let json = serde_json::to_string(&RequestedMetadata::LatestVersion).unwrap();
        assert_eq!(json, "\"LATEST_VERSION\"");
    }
}
