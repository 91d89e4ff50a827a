//! Configuration management for catagen.
//!
//! Handles loading the generator configuration and the worklist from YAML
//! files, with sensible defaults for every section.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactCoordinate, RepositoryEndpoint, RepositoryPolicy};
use crate::catalog::{CatalogRequest, ExternalSchema};

/// Generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Download cache directory. Defaults to the platform cache dir.
    pub cache_dir: PathBuf,

    /// Maximum number of (runtime, version) requests processed in parallel.
    pub concurrency: usize,

    /// Per-request network timeout in seconds.
    pub request_timeout_secs: u64,

    /// Repository endpoints and vendor selection policy.
    pub repositories: RepositoryConfig,

    /// Extra dependencies layered on top of published descriptors.
    pub augmentations: Vec<AugmentationRule>,

    /// Statically-known local bundles (exploded directories or tar.gz files)
    /// read without network resolution.
    pub local_artifacts: Vec<PathBuf>,

    /// Fixed-URL schema documents fetched once per run.
    pub external_schemas: Vec<ExternalSchema>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("catagen"),
            concurrency: 4,
            request_timeout_secs: 30,
            repositories: RepositoryConfig::default(),
            augmentations: vec![AugmentationRule {
                group: "org.conduit.embedded".to_string(),
                name: "conduit-embedded-catalog".to_string(),
                // The published descriptor for the embedded catalog omits the
                // core model bundle, which is only needed at scan time.
                dependencies: vec![ArtifactCoordinate::new(
                    "org.conduit",
                    "conduit-core-model",
                    "*",
                )],
            }],
            local_artifacts: Vec::new(),
            external_schemas: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Augmentation rules keyed by `group:name`, the shape the resolver
    /// consumes.
    pub fn augmentation_map(&self) -> HashMap<String, Vec<ArtifactCoordinate>> {
        let mut map: HashMap<String, Vec<ArtifactCoordinate>> = HashMap::new();
        for rule in &self.augmentations {
            map.entry(format!("{}:{}", rule.group, rule.name))
                .or_default()
                .extend(rule.dependencies.iter().cloned());
        }
        map
    }
}

/// Repository endpoints and the vendor selection policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Public default repository, always queried first.
    pub default_url: String,

    /// Vendor repository, queried for versions carrying the vendor marker.
    pub vendor_url: String,

    /// Substring of a version string that selects the vendor endpoint.
    pub vendor_marker: String,

    /// Groups only ever published to the vendor repository.
    pub vendor_only_groups: Vec<String>,

    /// Whether the vendor repository requires credentials.
    pub vendor_requires_auth: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_url: "https://repo.conduit-platform.io/releases".to_string(),
            vendor_url: "https://repo.conduit-platform.io/enterprise".to_string(),
            vendor_marker: "enterprise".to_string(),
            vendor_only_groups: vec!["org.conduit.enterprise".to_string()],
            vendor_requires_auth: true,
        }
    }
}

impl RepositoryConfig {
    /// Build the resolver's repository policy from this configuration.
    pub fn policy(&self) -> RepositoryPolicy {
        RepositoryPolicy::new(
            RepositoryEndpoint::new(&self.default_url, false),
            RepositoryEndpoint::new(&self.vendor_url, self.vendor_requires_auth),
            self.vendor_marker.clone(),
            self.vendor_only_groups.clone(),
        )
    }
}

/// One configured augmentation: extra dependencies for a `group:name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentationRule {
    /// Group of the artifact the rule applies to.
    pub group: String,

    /// Name of the artifact the rule applies to.
    pub name: String,

    /// Dependencies to add. A `*` version inherits the parent's version.
    pub dependencies: Vec<ArtifactCoordinate>,
}

/// Load a worklist file: an ordered YAML sequence of (runtime, version)
/// requests.
pub fn load_worklist(path: &Path) -> anyhow::Result<Vec<CatalogRequest>> {
    let content = std::fs::read_to_string(path)?;
    let worklist = serde_yaml::from_str(&content)?;
    Ok(worklist)
}
