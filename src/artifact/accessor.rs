//! Uniform read access to resources inside a sealed scope.
//!
//! An artifact may be a packed tar.gz bundle or an exploded directory; the
//! accessor detects the shape from the file itself and exposes the same
//! lookup semantics for both, so callers never branch on artifact kind.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use walkdir::WalkDir;

use super::error::{ArtifactError, ArtifactResult};
use super::scope::{IsolationScope, ResolvedArtifact};

/// Mapping from relative filename to raw content, the unit handed to
/// downstream catalog assembly.
///
/// Keys are unique; on a collision the later insert wins and the collision is
/// recorded, never silently ambiguous.
#[derive(Debug, Clone, Default)]
pub struct LoadedResourceBundle {
    entries: HashMap<String, Vec<u8>>,
    collisions: Vec<String>,
}

impl LoadedResourceBundle {
    /// Insert a resource. An existing key is overwritten (later wins) and the
    /// collision is logged and recorded.
    pub fn insert(&mut self, key: impl Into<String>, content: Vec<u8>) {
        let key = key.into();
        if self.entries.insert(key.clone(), content).is_some() {
            tracing::warn!(resource = %key, "Resource name collision, later member wins");
            self.collisions.push(key);
        }
    }

    /// Look up a resource by name.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Whether a resource with this name is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Resource names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.entries.iter()
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bundle is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys that collided during assembly.
    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }

    /// Fold another bundle into this one; the other bundle's entries win on
    /// key collision.
    pub fn merge(&mut self, other: LoadedResourceBundle) {
        for (key, content) in other.entries {
            self.insert(key, content);
        }
    }
}

/// Detected shape of a resolved artifact's local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactShape {
    /// Packed tar.gz bundle; resources are archive entries.
    Archive,
    /// Exploded directory; resources are files on disk.
    Directory,
}

/// Reads named resources out of a sealed [`IsolationScope`].
#[derive(Debug, Default)]
pub struct ResourceAccessor;

impl ResourceAccessor {
    /// Create an accessor.
    pub fn new() -> Self {
        Self
    }

    /// Read a single named resource from a sealed scope.
    ///
    /// Lookup is case-sensitive and path-exact. Members are scanned newest
    /// first so that, on a name collision, the member added later wins. A
    /// missing resource is reported as [`ArtifactError::ResourceNotFound`],
    /// which callers may treat as "optional resource absent". Reading from
    /// an unsealed scope is an error.
    pub fn read_one(&self, scope: &IsolationScope, resource_path: &str) -> ArtifactResult<Vec<u8>> {
        if !scope.is_sealed() {
            return Err(ArtifactError::ScopeNotSealed(scope.id().to_string()));
        }

        for member in scope.members().iter().rev() {
            if let Some(content) = self.read_from_member(member, resource_path)? {
                return Ok(content);
            }
        }

        Err(ArtifactError::ResourceNotFound {
            scope: scope.id().to_string(),
            path: resource_path.to_string(),
        })
    }

    /// Bulk-read every resource under `folder_prefix` ending with `suffix`,
    /// keyed by the final path segment.
    ///
    /// Traversal is member-insertion order; within a member the order is
    /// whatever the archive or filesystem yields. A later member overrides an
    /// earlier one on key collision. An empty bundle is not an error.
    pub fn read_many(
        &self,
        scope: &IsolationScope,
        folder_prefix: &str,
        suffix: &str,
    ) -> ArtifactResult<LoadedResourceBundle> {
        self.read_many_mapped(scope, folder_prefix, suffix, |path| {
            file_name_of(path).to_string()
        })
    }

    /// Like [`read_many`](Self::read_many) with a caller-specified key
    /// transform applied to each matching resource path.
    pub fn read_many_mapped<F>(
        &self,
        scope: &IsolationScope,
        folder_prefix: &str,
        suffix: &str,
        key_of: F,
    ) -> ArtifactResult<LoadedResourceBundle>
    where
        F: Fn(&str) -> String,
    {
        if !scope.is_sealed() {
            return Err(ArtifactError::ScopeNotSealed(scope.id().to_string()));
        }

        let mut bundle = LoadedResourceBundle::default();
        for member in scope.members() {
            match detect_shape(member)? {
                ArtifactShape::Directory => {
                    self.collect_from_directory(member, folder_prefix, suffix, &key_of, &mut bundle)?;
                }
                ArtifactShape::Archive => {
                    self.collect_from_archive(member, folder_prefix, suffix, &key_of, &mut bundle)?;
                }
            }
        }
        Ok(bundle)
    }

    fn read_from_member(
        &self,
        member: &ResolvedArtifact,
        resource_path: &str,
    ) -> ArtifactResult<Option<Vec<u8>>> {
        // Resource paths are relative names inside the artifact; anything
        // trying to climb out of an exploded directory cannot match.
        if resource_path.split('/').any(|c| c == "..") {
            return Ok(None);
        }

        match detect_shape(member)? {
            ArtifactShape::Directory => {
                let full = member.local_path.join(resource_path);
                if full.is_file() {
                    Ok(Some(fs::read(full)?))
                } else {
                    Ok(None)
                }
            }
            ArtifactShape::Archive => self.read_archive_entry(member, resource_path),
        }
    }

    fn read_archive_entry(
        &self,
        member: &ResolvedArtifact,
        wanted: &str,
    ) -> ArtifactResult<Option<Vec<u8>>> {
        let file = File::open(&member.local_path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

        for entry in archive.entries().map_err(|e| corruption(member, &e))? {
            let mut entry = entry.map_err(|e| corruption(member, &e))?;
            let name = entry_name(&entry).map_err(|e| corruption(member, &e))?;
            if name == wanted {
                let mut content = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut content)?;
                return Ok(Some(content));
            }
        }
        Ok(None)
    }

    fn collect_from_archive<F>(
        &self,
        member: &ResolvedArtifact,
        folder_prefix: &str,
        suffix: &str,
        key_of: &F,
        bundle: &mut LoadedResourceBundle,
    ) -> ArtifactResult<()>
    where
        F: Fn(&str) -> String,
    {
        let file = File::open(&member.local_path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

        for entry in archive.entries().map_err(|e| corruption(member, &e))? {
            let mut entry = entry.map_err(|e| corruption(member, &e))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry_name(&entry).map_err(|e| corruption(member, &e))?;
            if !name.starts_with(folder_prefix) || !name.ends_with(suffix) {
                continue;
            }
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut content)?;
            bundle.insert(key_of(&name), content);
        }
        Ok(())
    }

    fn collect_from_directory<F>(
        &self,
        member: &ResolvedArtifact,
        folder_prefix: &str,
        suffix: &str,
        key_of: &F,
        bundle: &mut LoadedResourceBundle,
    ) -> ArtifactResult<()>
    where
        F: Fn(&str) -> String,
    {
        for entry in WalkDir::new(&member.local_path) {
            let entry = entry.map_err(|e| {
                ArtifactError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::other("walk error without io cause")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(&member.local_path) {
                Ok(rel) => slash_path(rel),
                Err(_) => continue,
            };
            if !relative.starts_with(folder_prefix) || !relative.ends_with(suffix) {
                continue;
            }
            let content = fs::read(entry.path())?;
            bundle.insert(key_of(&relative), content);
        }
        Ok(())
    }
}

/// Detect whether an artifact is an exploded directory or a packed bundle.
///
/// Detection is by file shape, never by declared coordinate type: a regular
/// file must carry the gzip magic, anything else is reported as corruption.
fn detect_shape(member: &ResolvedArtifact) -> ArtifactResult<ArtifactShape> {
    let metadata = fs::metadata(&member.local_path)?;
    if metadata.is_dir() {
        return Ok(ArtifactShape::Directory);
    }

    let mut magic = [0u8; 2];
    let mut file = File::open(&member.local_path)?;
    let read = file.read(&mut magic)?;
    if read == 2 && magic == [0x1f, 0x8b] {
        return Ok(ArtifactShape::Archive);
    }

    Err(ArtifactError::CacheCorruption {
        coordinate: member.coordinate.clone(),
        reason: "not a directory and missing gzip magic".to_string(),
    })
}

fn corruption(member: &ResolvedArtifact, error: &dyn std::fmt::Display) -> ArtifactError {
    ArtifactError::CacheCorruption {
        coordinate: member.coordinate.clone(),
        reason: error.to_string(),
    }
}

/// Archive entry path normalized to forward slashes, without a leading `./`.
fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> std::io::Result<String> {
    let path = entry.path()?;
    let name = slash_path(&path);
    Ok(name.strip_prefix("./").unwrap_or(&name).to_string())
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Final segment of a slash-separated resource path.
fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
