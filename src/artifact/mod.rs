//! Versioned artifact resolution and isolated resource loading.
//!
//! This module is the core of catagen: given a `group:name:version`
//! coordinate it resolves and fetches the right distributable bundle (and its
//! transitive dependencies) from a remote repository, loads it into a
//! per-version [`IsolationScope`] so concurrently loaded versions never
//! contaminate each other, and exposes uniform read access to named resources
//! whether the bundle is a packed archive or an exploded directory.

mod accessor;
mod coordinate;
mod error;
mod fetcher;
mod resolver;
mod scope;

pub use accessor::{LoadedResourceBundle, ResourceAccessor};
pub use coordinate::{ArtifactCoordinate, RepositoryEndpoint, RepositoryPolicy};
pub use error::{ArtifactError, ArtifactResult};
pub use fetcher::{ArtifactFetcher, FetchOutcome, HttpFetcher};
pub use resolver::{ArtifactResolver, DependencyDescriptor};
pub use scope::{IsolationScope, ResolvedArtifact};
