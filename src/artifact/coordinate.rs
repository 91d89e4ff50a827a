//! Artifact coordinates and the repository selection policy.
//!
//! A coordinate is the `group:name:version` triple identifying a fetchable
//! bundle. The repository policy decides, from the version string alone, which
//! remote endpoints to query and in what order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The `group:name:version` triple identifying a fetchable artifact.
///
/// Immutable value; equality, hashing and ordering cover all three fields.
/// Used as the cache and resolution key throughout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    /// Group identifier, dot-separated (e.g. `org.conduit`).
    pub group: String,

    /// Artifact name (e.g. `conduit-catalog`).
    pub name: String,

    /// Version string. May carry a vendor marker (see [`RepositoryPolicy`]).
    pub version: String,
}

impl ArtifactCoordinate {
    /// Create a new coordinate.
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse a `group:name:version` string.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(':');
        let group = parts.next()?;
        let name = parts.next()?;
        let version = parts.next()?;
        if parts.next().is_some() || group.is_empty() || name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(group, name, version))
    }

    /// The `group:name` pair, used as the key for augmentation rules.
    pub fn group_name(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }

    /// Filename of the distributable bundle.
    pub fn bundle_filename(&self) -> String {
        format!("{}-{}.tar.gz", self.name, self.version)
    }

    /// Filename of the dependency descriptor published next to the bundle.
    pub fn descriptor_filename(&self) -> String {
        format!("{}-{}.deps.json", self.name, self.version)
    }

    /// Relative repository path for this coordinate (`group/…/name/version`).
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.group.replace('.', "/"),
            self.name,
            self.version
        )
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)
    }
}

/// A remote repository index that bundles can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEndpoint {
    /// Base URL of the repository.
    pub url: String,

    /// Whether the endpoint requires credentials.
    pub requires_auth: bool,
}

impl RepositoryEndpoint {
    /// Create a new endpoint.
    pub fn new(url: impl Into<String>, requires_auth: bool) -> Self {
        Self {
            url: url.into(),
            requires_auth,
        }
    }

    /// Full download URL for a coordinate's bundle.
    pub fn bundle_url(&self, coordinate: &ArtifactCoordinate) -> String {
        format!(
            "{}/{}/{}",
            self.url.trim_end_matches('/'),
            coordinate.repository_path(),
            coordinate.bundle_filename()
        )
    }

    /// Full download URL for a coordinate's dependency descriptor.
    pub fn descriptor_url(&self, coordinate: &ArtifactCoordinate) -> String {
        format!(
            "{}/{}/{}",
            self.url.trim_end_matches('/'),
            coordinate.repository_path(),
            coordinate.descriptor_filename()
        )
    }
}

/// Decides which repository endpoints to query for a given coordinate.
///
/// A version string carrying the vendor marker selects the vendor endpoint in
/// addition to the public default; both are queried in a fixed order (public
/// default first, vendor as fallback) unless the artifact's group is
/// vendor-only, in which case only the vendor endpoint is queried.
#[derive(Debug, Clone)]
pub struct RepositoryPolicy {
    default_endpoint: RepositoryEndpoint,
    vendor_endpoint: RepositoryEndpoint,
    vendor_marker: String,
    vendor_only_groups: Vec<String>,
}

impl RepositoryPolicy {
    /// Create a new policy.
    pub fn new(
        default_endpoint: RepositoryEndpoint,
        vendor_endpoint: RepositoryEndpoint,
        vendor_marker: impl Into<String>,
        vendor_only_groups: Vec<String>,
    ) -> Self {
        Self {
            default_endpoint,
            vendor_endpoint,
            vendor_marker: vendor_marker.into(),
            vendor_only_groups,
        }
    }

    /// Whether a version string indicates a vendor-specific build.
    pub fn is_vendor_version(&self, version: &str) -> bool {
        !self.vendor_marker.is_empty() && version.contains(&self.vendor_marker)
    }

    /// The ordered endpoint list to query for a coordinate.
    pub fn endpoints_for(&self, coordinate: &ArtifactCoordinate) -> Vec<&RepositoryEndpoint> {
        if !self.is_vendor_version(&coordinate.version) {
            return vec![&self.default_endpoint];
        }

        if self
            .vendor_only_groups
            .iter()
            .any(|g| g == &coordinate.group)
        {
            return vec![&self.vendor_endpoint];
        }

        vec![&self.default_endpoint, &self.vendor_endpoint]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy() -> RepositoryPolicy {
        RepositoryPolicy::new(
            RepositoryEndpoint::new("https://repo.test/releases", false),
            RepositoryEndpoint::new("https://repo.test/enterprise", true),
            "enterprise",
            vec!["org.conduit.enterprise".to_string()],
        )
    }

    #[test]
    fn test_coordinate_display_and_parse() {
        let coord = ArtifactCoordinate::new("org.conduit", "conduit-catalog", "4.2.0");
        assert_eq!(coord.to_string(), "org.conduit:conduit-catalog:4.2.0");
        assert_eq!(
            ArtifactCoordinate::parse("org.conduit:conduit-catalog:4.2.0"),
            Some(coord)
        );

        assert!(ArtifactCoordinate::parse("only:two").is_none());
        assert!(ArtifactCoordinate::parse("a:b:c:d").is_none());
        assert!(ArtifactCoordinate::parse("::1.0").is_none());
    }

    #[test]
    fn test_coordinate_equality_all_fields() {
        let a = ArtifactCoordinate::new("g", "n", "1.0");
        let b = ArtifactCoordinate::new("g", "n", "1.0");
        let c = ArtifactCoordinate::new("g", "n", "2.0");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_bundle_url_layout() {
        let endpoint = RepositoryEndpoint::new("https://repo.test/releases/", false);
        let coord = ArtifactCoordinate::new("org.conduit.dsl", "conduit-yaml-schema", "4.2.0");

        assert_eq!(
            endpoint.bundle_url(&coord),
            "https://repo.test/releases/org/conduit/dsl/conduit-yaml-schema/4.2.0/conduit-yaml-schema-4.2.0.tar.gz"
        );
        assert_eq!(
            endpoint.descriptor_url(&coord),
            "https://repo.test/releases/org/conduit/dsl/conduit-yaml-schema/4.2.0/conduit-yaml-schema-4.2.0.deps.json"
        );
    }

    #[test]
    fn test_policy_default_only() {
        let policy = test_policy();
        let coord = ArtifactCoordinate::new("org.conduit", "conduit-catalog", "4.2.0");

        let endpoints = policy.endpoints_for(&coord);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].url, "https://repo.test/releases");
    }

    #[test]
    fn test_policy_vendor_version_queries_both_in_order() {
        let policy = test_policy();
        let coord =
            ArtifactCoordinate::new("org.conduit", "conduit-catalog", "4.2.0.enterprise-00012");

        let endpoints = policy.endpoints_for(&coord);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].url, "https://repo.test/releases");
        assert_eq!(endpoints[1].url, "https://repo.test/enterprise");
    }

    #[test]
    fn test_policy_vendor_only_group() {
        let policy = test_policy();
        let coord = ArtifactCoordinate::new(
            "org.conduit.enterprise",
            "conduit-catalog",
            "4.2.0.enterprise-00012",
        );

        let endpoints = policy.endpoints_for(&coord);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].url, "https://repo.test/enterprise");
    }
}
