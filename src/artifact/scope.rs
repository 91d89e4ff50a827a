//! Per-version isolation scopes.
//!
//! A scope is an explicit container of resolved artifacts with its own
//! resource index: resource names are only ever looked up against the members
//! of one scope, so two concurrently loaded versions can both define the same
//! resource name without contaminating each other. Two scopes may share the
//! cached file bytes of a common artifact, but never index state.

use std::collections::BTreeSet;
use std::path::PathBuf;

use super::coordinate::ArtifactCoordinate;
use super::error::{ArtifactError, ArtifactResult};

/// An artifact whose bundle has been materialized in the local cache.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    /// The coordinate this artifact was resolved from.
    pub coordinate: ArtifactCoordinate,

    /// Local path of the bundle. Either a packed tar.gz file or an exploded
    /// directory; owned by the process-wide download cache, never duplicated
    /// per scope.
    pub local_path: PathBuf,

    /// Coordinates of every transitive dependency required to scan this
    /// artifact's resources.
    pub closure: BTreeSet<ArtifactCoordinate>,
}

impl ResolvedArtifact {
    /// Create a resolved artifact with an empty dependency closure.
    ///
    /// Used for statically-known local bundles that need no resolution.
    pub fn local(coordinate: ArtifactCoordinate, local_path: PathBuf) -> Self {
        Self {
            coordinate,
            local_path,
            closure: BTreeSet::new(),
        }
    }
}

/// A per-version namespace owning an ordered set of resolved artifacts.
///
/// Mutable only during construction; once sealed, the member list is frozen
/// for the remainder of its lifetime and resource reads may begin.
#[derive(Debug)]
pub struct IsolationScope {
    id: String,
    members: Vec<ResolvedArtifact>,
    sealed: bool,
}

impl IsolationScope {
    /// Create an empty, unsealed scope.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            members: Vec::new(),
            sealed: false,
        }
    }

    /// The scope identifier (typically `runtime@version`).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a member. Fails with [`ArtifactError::ScopeSealed`] after `seal`.
    pub fn add_member(&mut self, artifact: ResolvedArtifact) -> ArtifactResult<()> {
        if self.sealed {
            return Err(ArtifactError::ScopeSealed(self.id.clone()));
        }
        self.members.push(artifact);
        Ok(())
    }

    /// Whether the scope already contains a member with this coordinate.
    pub fn contains(&self, coordinate: &ArtifactCoordinate) -> bool {
        self.members.iter().any(|m| &m.coordinate == coordinate)
    }

    /// Freeze the member list. Idempotent.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Whether the scope has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[ResolvedArtifact] {
        &self.members
    }

    /// Every coordinate this scope depends on: members plus their closures.
    pub fn provenance(&self) -> BTreeSet<ArtifactCoordinate> {
        let mut set = BTreeSet::new();
        for member in &self.members {
            set.insert(member.coordinate.clone());
            set.extend(member.closure.iter().cloned());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str) -> ResolvedArtifact {
        ResolvedArtifact::local(
            ArtifactCoordinate::new("org.test", name, "1.0"),
            PathBuf::from(format!("/cache/{name}.tar.gz")),
        )
    }

    #[test]
    fn test_members_keep_insertion_order() {
        let mut scope = IsolationScope::new("main@1.0");
        scope.add_member(artifact("first")).unwrap();
        scope.add_member(artifact("second")).unwrap();
        scope.seal();

        let names: Vec<_> = scope
            .members()
            .iter()
            .map(|m| m.coordinate.name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_add_member_after_seal_fails() {
        let mut scope = IsolationScope::new("main@1.0");
        scope.add_member(artifact("first")).unwrap();
        scope.seal();

        let err = scope.add_member(artifact("second")).unwrap_err();
        assert!(matches!(err, ArtifactError::ScopeSealed(id) if id == "main@1.0"));
        assert_eq!(scope.members().len(), 1);
    }

    #[test]
    fn test_seal_is_idempotent() {
        let mut scope = IsolationScope::new("main@1.0");
        scope.seal();
        scope.seal();
        assert!(scope.is_sealed());
    }

    #[test]
    fn test_provenance_includes_closures() {
        let dep = ArtifactCoordinate::new("org.test", "dep", "1.0");
        let mut root = artifact("root");
        root.closure.insert(dep.clone());

        let mut scope = IsolationScope::new("main@1.0");
        scope.add_member(root).unwrap();
        scope.seal();

        let provenance = scope.provenance();
        assert_eq!(provenance.len(), 2);
        assert!(provenance.contains(&dep));
    }

    #[test]
    fn test_contains() {
        let mut scope = IsolationScope::new("main@1.0");
        scope.add_member(artifact("here")).unwrap();

        assert!(scope.contains(&ArtifactCoordinate::new("org.test", "here", "1.0")));
        assert!(!scope.contains(&ArtifactCoordinate::new("org.test", "here", "2.0")));
    }
}
