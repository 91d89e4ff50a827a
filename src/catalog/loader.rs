//! Per-version catalog loading.
//!
//! For one (runtime, version) request the loader resolves every artifact
//! kind the catalog needs - catalog metadata, pipeline schema, connector
//! definitions, operator CRDs - into a single isolation scope, then reads
//! the named resources out of the sealed scope into one bundle.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::{
    ArtifactCoordinate, ArtifactError, ArtifactResolver, IsolationScope, LoadedResourceBundle,
    ResolvedArtifact, ResourceAccessor,
};

/// Required resource inside the catalog bundle.
pub const CATALOG_RESOURCE: &str = "catalog/components.json";

/// Optional companion payloads inside the catalog bundle.
pub const OPTIONAL_CATALOG_RESOURCES: &[&str] =
    &["catalog/dataformats.json", "catalog/languages.json"];

/// Required resource inside the schema bundle.
pub const SCHEMA_RESOURCE: &str = "schemas/pipeline.json";

/// Connector definitions are bulk-read from this folder with this suffix.
pub const CONNECTOR_FOLDER: &str = "connectors/";
pub const CONNECTOR_SUFFIX: &str = ".connector.yaml";

/// The specific CRD documents needed from the operator bundle.
pub const CRD_RESOURCES: &[&str] = &["crds/pipelines.yaml", "crds/bindings.yaml"];

/// Boundary definitions read from statically-known local artifacts.
pub const BOUNDARY_FOLDER: &str = "boundaries/";
pub const BOUNDARY_SUFFIX: &str = ".json";

/// The runtime flavor a catalog is generated for.
///
/// The three kinds map to three different catalog artifact names for the
/// same logical catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// The standalone runtime.
    Main,
    /// The cloud-packaged runtime distribution.
    Cloud,
    /// The embedded runtime distribution.
    Embedded,
}

impl RuntimeKind {
    /// Stable lowercase name, matching the worklist file syntax.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Main => "main",
            RuntimeKind::Cloud => "cloud",
            RuntimeKind::Embedded => "embedded",
        }
    }

    /// The catalog metadata coordinate for this runtime kind.
    pub fn catalog_coordinate(&self, version: &str) -> ArtifactCoordinate {
        match self {
            RuntimeKind::Main => ArtifactCoordinate::new("org.conduit", "conduit-catalog", version),
            RuntimeKind::Cloud => {
                ArtifactCoordinate::new("org.conduit.cloud", "conduit-cloud-catalog", version)
            }
            RuntimeKind::Embedded => ArtifactCoordinate::new(
                "org.conduit.embedded",
                "conduit-embedded-catalog",
                version,
            ),
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (runtime, version) entry from the worklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRequest {
    /// Runtime flavor.
    pub runtime: RuntimeKind,

    /// Platform version to generate the catalog for.
    pub version: String,
}

impl CatalogRequest {
    /// Create a request.
    pub fn new(runtime: RuntimeKind, version: impl Into<String>) -> Self {
        Self {
            runtime,
            version: version.into(),
        }
    }

    /// Scope identifier for this request.
    pub fn scope_id(&self) -> String {
        format!("{}@{}", self.runtime, self.version)
    }
}

impl std::fmt::Display for CatalogRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.runtime, self.version)
    }
}

/// Result type for catalog loading.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors produced while loading one catalog version.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Artifact resolution or resource access failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// A resource the orchestrator declared required is absent.
    #[error("Required resource '{path}' missing from scope '{scope}'")]
    MissingResource { scope: String, path: String },
}

/// The assembled output for one (runtime, version) request.
#[derive(Debug)]
pub struct LoadedCatalog {
    /// The request this catalog was loaded for.
    pub request: CatalogRequest,

    /// Every named resource, keyed by relative filename.
    pub bundle: LoadedResourceBundle,

    /// Exact coordinates (including transitive closures) used, sorted, for
    /// diagnostics and reproducibility.
    pub provenance: Vec<ArtifactCoordinate>,
}

/// Sequences the artifact fetches for one (runtime, version) combination.
pub struct CatalogVersionLoader {
    resolver: Arc<ArtifactResolver>,
    accessor: ResourceAccessor,

    /// Statically-known local bundles (exploded directories or tar.gz files)
    /// merged into every catalog without network resolution.
    local_artifacts: Vec<PathBuf>,
}

impl CatalogVersionLoader {
    /// Create a loader.
    pub fn new(resolver: Arc<ArtifactResolver>, local_artifacts: Vec<PathBuf>) -> Self {
        Self {
            resolver,
            accessor: ResourceAccessor::new(),
            local_artifacts,
        }
    }

    /// The resolver backing this loader.
    pub fn resolver(&self) -> &ArtifactResolver {
        &self.resolver
    }

    /// Load one catalog version.
    ///
    /// Resolution steps are strictly sequential; any step failing aborts the
    /// whole request. The scope is sealed before the first resource read.
    pub async fn load(&self, request: &CatalogRequest) -> CatalogResult<LoadedCatalog> {
        let mut scope = IsolationScope::new(request.scope_id());

        let catalog = request.runtime.catalog_coordinate(&request.version);
        tracing::info!(request = %request, coordinate = %catalog, "Resolving catalog metadata");
        self.resolve_into(&mut scope, &catalog).await?;

        let schema = ArtifactCoordinate::new("org.conduit.dsl", "conduit-yaml-schema", &request.version);
        tracing::info!(request = %request, coordinate = %schema, "Resolving pipeline schema");
        self.resolve_into(&mut scope, &schema).await?;

        let connectors =
            ArtifactCoordinate::new("org.conduit.connectors", "conduit-connectors", &request.version);
        tracing::info!(request = %request, coordinate = %connectors, "Resolving connector definitions");
        self.resolve_into(&mut scope, &connectors).await?;

        let crds =
            ArtifactCoordinate::new("org.conduit.operator", "conduit-operator-crds", &request.version);
        tracing::info!(request = %request, coordinate = %crds, "Resolving operator CRDs");
        self.resolve_into(&mut scope, &crds).await?;

        scope.seal();

        let mut bundle = LoadedResourceBundle::default();

        bundle.insert(file_name_of(CATALOG_RESOURCE), self.required(&scope, CATALOG_RESOURCE)?);
        for resource in OPTIONAL_CATALOG_RESOURCES {
            if let Some(content) = self.optional(&scope, resource)? {
                bundle.insert(file_name_of(resource), content);
            }
        }

        bundle.insert(file_name_of(SCHEMA_RESOURCE), self.required(&scope, SCHEMA_RESOURCE)?);

        let connector_bundle = self
            .accessor
            .read_many(&scope, CONNECTOR_FOLDER, CONNECTOR_SUFFIX)?;
        tracing::debug!(request = %request, connectors = connector_bundle.len(), "Collected connector definitions");
        bundle.merge(connector_bundle);

        for resource in CRD_RESOURCES {
            bundle.insert(file_name_of(resource), self.required(&scope, resource)?);
        }

        let local = self.local_scope(request)?;
        if !local.members().is_empty() {
            bundle.merge(self.accessor.read_many(&local, BOUNDARY_FOLDER, BOUNDARY_SUFFIX)?);
        }

        let mut provenance: Vec<ArtifactCoordinate> = scope.provenance().into_iter().collect();
        provenance.extend(local.provenance());
        provenance.sort();

        tracing::info!(
            request = %request,
            resources = bundle.len(),
            coordinates = provenance.len(),
            "Catalog version loaded"
        );

        Ok(LoadedCatalog {
            request: request.clone(),
            bundle,
            provenance,
        })
    }

    /// Resolve a coordinate transitively and add every artifact to the scope,
    /// skipping coordinates already present.
    async fn resolve_into(
        &self,
        scope: &mut IsolationScope,
        coordinate: &ArtifactCoordinate,
    ) -> CatalogResult<()> {
        for artifact in self.resolver.resolve_transitive(coordinate).await? {
            if !scope.contains(&artifact.coordinate) {
                scope.add_member(artifact)?;
            }
        }
        Ok(())
    }

    fn required(&self, scope: &IsolationScope, path: &str) -> CatalogResult<Vec<u8>> {
        match self.accessor.read_one(scope, path) {
            Ok(content) => Ok(content),
            Err(ArtifactError::ResourceNotFound { scope, path }) => {
                Err(CatalogError::MissingResource { scope, path })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn optional(&self, scope: &IsolationScope, path: &str) -> CatalogResult<Option<Vec<u8>>> {
        match self.accessor.read_one(scope, path) {
            Ok(content) => Ok(Some(content)),
            Err(ArtifactError::ResourceNotFound { .. }) => {
                tracing::debug!(path = %path, "Optional resource absent");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A sealed scope over the statically-known local artifacts only.
    fn local_scope(&self, request: &CatalogRequest) -> CatalogResult<IsolationScope> {
        let mut scope = IsolationScope::new(format!("{}+local", request.scope_id()));
        for path in &self.local_artifacts {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "local".to_string());
            scope.add_member(ResolvedArtifact::local(
                ArtifactCoordinate::new("local", name, "static"),
                path.clone(),
            ))?;
        }
        scope.seal();
        Ok(scope)
    }
}

fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_kind_catalog_coordinates() {
        let coord = RuntimeKind::Main.catalog_coordinate("4.2.0");
        assert_eq!(coord.to_string(), "org.conduit:conduit-catalog:4.2.0");

        let coord = RuntimeKind::Cloud.catalog_coordinate("4.2.0");
        assert_eq!(coord.to_string(), "org.conduit.cloud:conduit-cloud-catalog:4.2.0");

        let coord = RuntimeKind::Embedded.catalog_coordinate("4.2.0");
        assert_eq!(
            coord.to_string(),
            "org.conduit.embedded:conduit-embedded-catalog:4.2.0"
        );
    }

    #[test]
    fn test_runtime_kind_serde_lowercase() {
        let kind: RuntimeKind = serde_yaml::from_str("embedded").unwrap();
        assert_eq!(kind, RuntimeKind::Embedded);
        assert_eq!(serde_yaml::to_string(&RuntimeKind::Main).unwrap().trim(), "main");
    }

    #[test]
    fn test_request_scope_id() {
        let request = CatalogRequest::new(RuntimeKind::Cloud, "4.2.0");
        assert_eq!(request.scope_id(), "cloud@4.2.0");
        assert_eq!(request.to_string(), "cloud@4.2.0");
    }
}
