//! # Catagen
//!
//! Component catalog generator for the Conduit integration runtime.
//!
//! Catagen resolves versioned artifact bundles (catalog metadata, pipeline
//! schemas, connector definitions, operator CRDs) from remote repositories,
//! loads each requested version into an isolated per-version scope, and
//! emits a normalized bundle of named resources per (runtime, version) pair
//! for downstream catalog assembly.
//!
//! ## Architecture
//!
//! - [`artifact`]: coordinates, repository policy, the download cache and
//!   resolver, isolation scopes, and dual-mode resource access.
//! - [`catalog`]: the per-version loading pipeline and the batch runner.
//! - [`config`]: YAML configuration and worklist loading.
//!
//! Data flows strictly downward: the loader asks the resolver for artifacts,
//! wraps them in an isolation scope, and reads resources through the
//! accessor.

pub mod artifact;
pub mod catalog;
pub mod config;

pub use artifact::{
    ArtifactCoordinate, ArtifactError, ArtifactFetcher, ArtifactResolver, ArtifactResult,
    FetchOutcome, HttpFetcher, IsolationScope, LoadedResourceBundle, RepositoryEndpoint,
    RepositoryPolicy, ResolvedArtifact, ResourceAccessor,
};
pub use catalog::{
    BatchRunner, CatalogError, CatalogOutcome, CatalogRequest, CatalogResult,
    CatalogVersionLoader, ExternalSchema, LoadedCatalog, RuntimeKind,
};
pub use config::{GeneratorConfig, RepositoryConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "catagen";
