//! Artifact resolution and the process-wide download cache.
//!
//! A coordinate resolves to at most one cached local file per process
//! lifetime. Concurrent resolutions of the same coordinate share a single
//! in-flight download; cache writes are atomic (temp file, verify, rename)
//! so a concurrent reader never observes a partially-written bundle.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};

use super::coordinate::{ArtifactCoordinate, RepositoryEndpoint, RepositoryPolicy};
use super::error::{ArtifactError, ArtifactResult};
use super::fetcher::{ArtifactFetcher, FetchOutcome};
use super::scope::ResolvedArtifact;

/// Dependency descriptor published next to each bundle.
///
/// A missing remote descriptor means the artifact has no declared
/// dependencies; it is persisted as an empty descriptor so cache hits never
/// touch the network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    /// Optional hex-encoded SHA256 of the bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Direct dependency coordinates.
    #[serde(default)]
    pub dependencies: Vec<ArtifactCoordinate>,
}

/// Resolves coordinates to local bundle files, downloading on cache miss.
pub struct ArtifactResolver {
    policy: RepositoryPolicy,
    fetcher: Arc<dyn ArtifactFetcher>,
    cache_root: PathBuf,

    /// Extra dependencies layered on top of the published descriptors, keyed
    /// by `group:name`. Needed for artifacts whose descriptors omit bundles
    /// that are only required at resource-scan time. A `*` version inherits
    /// the parent's version.
    augmentations: HashMap<String, Vec<ArtifactCoordinate>>,

    /// Per-coordinate once-cells enforcing at-most-one in-flight download.
    in_flight: Mutex<HashMap<ArtifactCoordinate, Arc<OnceCell<PathBuf>>>>,
}

impl ArtifactResolver {
    /// Create a resolver over a cache directory.
    pub fn new(
        policy: RepositoryPolicy,
        fetcher: Arc<dyn ArtifactFetcher>,
        cache_root: PathBuf,
        augmentations: HashMap<String, Vec<ArtifactCoordinate>>,
    ) -> Self {
        Self {
            policy,
            fetcher,
            cache_root,
            augmentations,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a single coordinate, including its full transitive closure.
    ///
    /// Every dependency bundle is materialized as well; a dependency failing
    /// to resolve fails the whole call.
    pub async fn resolve(&self, coordinate: &ArtifactCoordinate) -> ArtifactResult<ResolvedArtifact> {
        let mut resolved = self.resolve_transitive(coordinate).await?;
        // First element is always the root of the walk.
        Ok(resolved.remove(0))
    }

    /// Resolve a coordinate and every transitive dependency.
    ///
    /// Returns the root first, then dependencies in discovery order,
    /// de-duplicated by coordinate so a diamond dependency is fetched once.
    /// No partial sets: the first unresolvable dependency aborts the call.
    pub async fn resolve_transitive(
        &self,
        root: &ArtifactCoordinate,
    ) -> ArtifactResult<Vec<ResolvedArtifact>> {
        let mut queue = VecDeque::from([root.clone()]);
        let mut seen: HashSet<ArtifactCoordinate> = HashSet::from([root.clone()]);
        let mut order: Vec<ArtifactCoordinate> = Vec::new();
        let mut paths: HashMap<ArtifactCoordinate, PathBuf> = HashMap::new();
        let mut direct: HashMap<ArtifactCoordinate, Vec<ArtifactCoordinate>> = HashMap::new();

        while let Some(coordinate) = queue.pop_front() {
            let (path, descriptor) = match self.materialize(&coordinate).await {
                Ok(found) => found,
                Err(e) if coordinate == *root => return Err(e),
                Err(e) => {
                    return Err(ArtifactError::TransitiveResolution {
                        parent: root.clone(),
                        dependency: coordinate,
                        source: Box::new(e),
                    })
                }
            };

            let dependencies = self.augmented_dependencies(&coordinate, descriptor.dependencies);
            for dependency in &dependencies {
                if seen.insert(dependency.clone()) {
                    queue.push_back(dependency.clone());
                }
            }

            order.push(coordinate.clone());
            paths.insert(coordinate.clone(), path);
            direct.insert(coordinate, dependencies);
        }

        let resolved = order
            .into_iter()
            .map(|coordinate| {
                let closure = reachable_from(&coordinate, &direct);
                ResolvedArtifact {
                    local_path: paths[&coordinate].clone(),
                    coordinate,
                    closure,
                }
            })
            .collect();
        Ok(resolved)
    }

    /// Fetch a fixed-URL external resource (no coordinate, no caching).
    pub async fn fetch_external(&self, url: &str) -> ArtifactResult<Vec<u8>> {
        match self.fetcher.fetch(url).await? {
            FetchOutcome::Found(bytes) => Ok(bytes),
            FetchOutcome::NotFound => Err(ArtifactError::Network(format!("{url}: not found"))),
        }
    }

    /// Remove the entire download cache directory.
    pub fn clear_cache(&self) -> ArtifactResult<()> {
        if self.cache_root.exists() {
            fs::remove_dir_all(&self.cache_root)?;
        }
        Ok(())
    }

    /// Root of the download cache.
    pub fn cache_root(&self) -> &PathBuf {
        &self.cache_root
    }

    /// Ensure the bundle and its descriptor are on disk; returns the bundle
    /// path and the parsed descriptor.
    async fn materialize(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> ArtifactResult<(PathBuf, DependencyDescriptor)> {
        let cell = {
            let mut map = self.in_flight.lock().await;
            map.entry(coordinate.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let path = cell
            .get_or_try_init(|| self.fetch_into_cache(coordinate))
            .await?
            .clone();

        let descriptor = self.read_cached_descriptor(coordinate)?;
        Ok((path, descriptor))
    }

    /// Cache-first bundle materialization with endpoint fallback.
    async fn fetch_into_cache(&self, coordinate: &ArtifactCoordinate) -> ArtifactResult<PathBuf> {
        let bundle_path = self.bundle_cache_path(coordinate);

        if bundle_path.exists() {
            if is_valid_bundle_file(&bundle_path) {
                tracing::debug!(coordinate = %coordinate, "Cache hit");
                return Ok(bundle_path);
            }
            // Stale or truncated file from an earlier run; treat as a cache
            // miss rather than letting a later read fail the whole request.
            tracing::warn!(
                coordinate = %coordinate,
                path = ?bundle_path,
                "Cached bundle failed validation, forcing re-download"
            );
            fs::remove_file(&bundle_path)?;
        }

        let endpoints = self.policy.endpoints_for(coordinate);
        let mut tried = Vec::new();

        for endpoint in endpoints {
            let url = endpoint.bundle_url(coordinate);
            let bytes = match self.fetcher.fetch(&url).await {
                Ok(FetchOutcome::Found(bytes)) => bytes,
                Ok(FetchOutcome::NotFound) => {
                    tracing::debug!(url = %url, "Bundle not found on endpoint");
                    tried.push(url);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Endpoint failed");
                    tried.push(format!("{url} ({e})"));
                    continue;
                }
            };

            if !is_gzip(&bytes) {
                tracing::warn!(url = %url, "Endpoint served a non-gzip bundle");
                tried.push(format!("{url} (not a gzip bundle)"));
                continue;
            }

            if !is_valid_bundle(&bytes[..]) {
                tracing::warn!(url = %url, "Endpoint served a corrupt bundle");
                tried.push(format!("{url} (corrupt bundle)"));
                continue;
            }

            let descriptor = match self.fetch_descriptor(coordinate, endpoint).await {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::warn!(coordinate = %coordinate, error = %e, "Descriptor fetch failed");
                    tried.push(format!("{url} (descriptor: {e})"));
                    continue;
                }
            };

            if let Some(expected) = &descriptor.sha256 {
                if let Err(e) = verify_sha256(&bytes, expected) {
                    tracing::warn!(url = %url, error = %e, "Checksum verification failed");
                    tried.push(format!("{url} ({e})"));
                    continue;
                }
            }

            self.persist(&bundle_path, &bytes)?;
            self.persist_descriptor(coordinate, &descriptor)?;
            tracing::info!(coordinate = %coordinate, url = %url, bytes = bytes.len(), "Downloaded bundle");
            return Ok(bundle_path);
        }

        Err(ArtifactError::Unresolvable {
            coordinate: coordinate.clone(),
            tried,
        })
    }

    async fn fetch_descriptor(
        &self,
        coordinate: &ArtifactCoordinate,
        endpoint: &RepositoryEndpoint,
    ) -> ArtifactResult<DependencyDescriptor> {
        match self.fetcher.fetch(&endpoint.descriptor_url(coordinate)).await? {
            FetchOutcome::Found(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| ArtifactError::InvalidDescriptor {
                    coordinate: coordinate.clone(),
                    reason: e.to_string(),
                })
            }
            FetchOutcome::NotFound => Ok(DependencyDescriptor::default()),
        }
    }

    fn read_cached_descriptor(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> ArtifactResult<DependencyDescriptor> {
        let path = self.descriptor_cache_path(coordinate);
        if !path.exists() {
            // Bundles placed in the cache out-of-band have no descriptor.
            tracing::debug!(coordinate = %coordinate, "No cached descriptor, assuming no dependencies");
            return Ok(DependencyDescriptor::default());
        }

        let content = fs::read(&path)?;
        serde_json::from_slice(&content).map_err(|e| ArtifactError::InvalidDescriptor {
            coordinate: coordinate.clone(),
            reason: e.to_string(),
        })
    }

    /// Descriptor dependencies plus any configured augmentation for this
    /// `group:name`, with `*` versions inheriting the parent's version.
    fn augmented_dependencies(
        &self,
        parent: &ArtifactCoordinate,
        mut dependencies: Vec<ArtifactCoordinate>,
    ) -> Vec<ArtifactCoordinate> {
        if let Some(extra) = self.augmentations.get(&parent.group_name()) {
            for rule in extra {
                let mut dependency = rule.clone();
                if dependency.version == "*" {
                    dependency.version = parent.version.clone();
                }
                if !dependencies.contains(&dependency) {
                    tracing::debug!(
                        parent = %parent,
                        dependency = %dependency,
                        "Applying augmented dependency"
                    );
                    dependencies.push(dependency);
                }
            }
        }
        dependencies
    }

    /// Atomic write: temp file in the target directory, then rename.
    fn persist(&self, target: &PathBuf, bytes: &[u8]) -> ArtifactResult<()> {
        let parent = target
            .parent()
            .ok_or_else(|| ArtifactError::Io(std::io::Error::other("cache path has no parent")))?;
        fs::create_dir_all(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(bytes)?;
        temp.persist(target).map_err(|e| ArtifactError::Io(e.error))?;
        Ok(())
    }

    fn persist_descriptor(
        &self,
        coordinate: &ArtifactCoordinate,
        descriptor: &DependencyDescriptor,
    ) -> ArtifactResult<()> {
        let content =
            serde_json::to_vec_pretty(descriptor).map_err(|e| ArtifactError::InvalidDescriptor {
                coordinate: coordinate.clone(),
                reason: e.to_string(),
            })?;
        self.persist(&self.descriptor_cache_path(coordinate), &content)
    }

    fn bundle_cache_path(&self, coordinate: &ArtifactCoordinate) -> PathBuf {
        self.cache_root
            .join(coordinate.repository_path())
            .join(coordinate.bundle_filename())
    }

    fn descriptor_cache_path(&self, coordinate: &ArtifactCoordinate) -> PathBuf {
        self.cache_root
            .join(coordinate.repository_path())
            .join(coordinate.descriptor_filename())
    }
}

/// Dependency closure of a coordinate under the direct-dependency map.
fn reachable_from(
    from: &ArtifactCoordinate,
    direct: &HashMap<ArtifactCoordinate, Vec<ArtifactCoordinate>>,
) -> BTreeSet<ArtifactCoordinate> {
    let mut closure = BTreeSet::new();
    let mut queue: VecDeque<&ArtifactCoordinate> =
        direct.get(from).into_iter().flatten().collect();

    while let Some(coordinate) = queue.pop_front() {
        if closure.insert(coordinate.clone()) {
            queue.extend(direct.get(coordinate).into_iter().flatten());
        }
    }
    closure.remove(from);
    closure
}

/// Verify SHA256 of downloaded bytes.
fn verify_sha256(bytes: &[u8], expected: &str) -> ArtifactResult<()> {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let actual = format!("{:x}", hasher.finalize());

    if actual != expected {
        return Err(ArtifactError::Network(format!(
            "SHA256 mismatch: expected {expected}, got {actual}"
        )));
    }
    Ok(())
}

/// Check for the gzip magic number (0x1f 0x8b).
fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Walk every archive header to prove the bundle opens end to end.
///
/// The gzip magic alone is not enough: a truncated file still carries the
/// magic but fails mid-stream.
fn is_valid_bundle<R: Read>(reader: R) -> bool {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    match archive.entries() {
        Ok(mut entries) => entries.all(|entry| entry.is_ok()),
        Err(_) => false,
    }
}

fn is_valid_bundle_file(path: &PathBuf) -> bool {
    match File::open(path) {
        Ok(file) => is_valid_bundle(BufReader::new(file)),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverFetcher;

    #[async_trait::async_trait]
    impl ArtifactFetcher for NeverFetcher {
        async fn fetch(&self, _url: &str) -> ArtifactResult<FetchOutcome> {
            Ok(FetchOutcome::NotFound)
        }
    }

    fn resolver_with(
        augmentations: HashMap<String, Vec<ArtifactCoordinate>>,
        cache_root: PathBuf,
    ) -> ArtifactResolver {
        let policy = RepositoryPolicy::new(
            RepositoryEndpoint::new("https://repo.test/releases", false),
            RepositoryEndpoint::new("https://repo.test/enterprise", true),
            "enterprise",
            Vec::new(),
        );
        ArtifactResolver::new(policy, Arc::new(NeverFetcher), cache_root, augmentations)
    }

    #[test]
    fn test_is_gzip() {
        assert!(is_gzip(&[0x1f, 0x8b, 0x08]));
        assert!(!is_gzip(&[0x50, 0x4b]));
        assert!(!is_gzip(&[0x1f]));
        assert!(!is_gzip(&[]));
    }

    #[test]
    fn test_is_valid_bundle() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        {
            let mut builder = tar::Builder::new(&mut encoder);
            let mut header = tar::Header::new_gnu();
            header.set_size(2);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, "x", &b"ok"[..]).unwrap();
            builder.finish().unwrap();
        }
        let good = encoder.finish().unwrap();
        assert!(is_valid_bundle(&good[..]));

        // Gzip magic followed by garbage: magic check passes, walk fails.
        assert!(!is_valid_bundle(&[0x1f, 0x8b, 0xde, 0xad, 0xbe, 0xef][..]));
        // A valid bundle cut short fails the same way.
        assert!(!is_valid_bundle(&good[..good.len() / 2]));
    }

    #[test]
    fn test_verify_sha256() {
        use sha2::{Digest, Sha256};
        let data = b"bundle bytes";
        let mut hasher = Sha256::new();
        hasher.update(data);
        let hash = format!("{:x}", hasher.finalize());

        assert!(verify_sha256(data, &hash).is_ok());
        assert!(verify_sha256(data, "0000").is_err());
    }

    #[test]
    fn test_descriptor_parse_defaults() {
        let descriptor: DependencyDescriptor = serde_json::from_str("{}").unwrap();
        assert!(descriptor.sha256.is_none());
        assert!(descriptor.dependencies.is_empty());

        let descriptor: DependencyDescriptor = serde_json::from_str(
            r#"{"dependencies":[{"group":"org.conduit","name":"conduit-core-model","version":"4.2.0"}]}"#,
        )
        .unwrap();
        assert_eq!(descriptor.dependencies.len(), 1);
    }

    #[test]
    fn test_augmented_dependencies_inherit_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut augmentations = HashMap::new();
        augmentations.insert(
            "org.conduit.embedded:conduit-embedded-catalog".to_string(),
            vec![ArtifactCoordinate::new("org.conduit", "conduit-core-model", "*")],
        );
        let resolver = resolver_with(augmentations, dir.path().to_path_buf());

        let parent =
            ArtifactCoordinate::new("org.conduit.embedded", "conduit-embedded-catalog", "4.2.0");
        let deps = resolver.augmented_dependencies(&parent, Vec::new());
        assert_eq!(
            deps,
            vec![ArtifactCoordinate::new("org.conduit", "conduit-core-model", "4.2.0")]
        );

        // Already-declared dependencies are not duplicated.
        let deps = resolver.augmented_dependencies(&parent, deps);
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_cache_paths() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_with(HashMap::new(), dir.path().to_path_buf());
        let coordinate = ArtifactCoordinate::new("org.conduit", "conduit-catalog", "4.2.0");

        let bundle = resolver.bundle_cache_path(&coordinate);
        assert!(bundle.ends_with("org/conduit/conduit-catalog/4.2.0/conduit-catalog-4.2.0.tar.gz"));

        let descriptor = resolver.descriptor_cache_path(&coordinate);
        assert!(descriptor.ends_with("org/conduit/conduit-catalog/4.2.0/conduit-catalog-4.2.0.deps.json"));
    }

    #[test]
    fn test_reachable_from_diamond() {
        let a = ArtifactCoordinate::new("g", "a", "1");
        let b = ArtifactCoordinate::new("g", "b", "1");
        let c = ArtifactCoordinate::new("g", "c", "1");
        let d = ArtifactCoordinate::new("g", "d", "1");

        let mut direct = HashMap::new();
        direct.insert(a.clone(), vec![b.clone(), c.clone()]);
        direct.insert(b.clone(), vec![d.clone()]);
        direct.insert(c.clone(), vec![d.clone()]);
        direct.insert(d.clone(), vec![]);

        let closure = reachable_from(&a, &direct);
        assert_eq!(closure.len(), 3);
        assert!(closure.contains(&d));
        assert!(!closure.contains(&a));
    }
}
