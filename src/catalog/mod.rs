//! Catalog version loading and batch orchestration.

mod batch;
mod loader;

pub use batch::{BatchRunner, CatalogOutcome, ExternalSchema};
pub use loader::{
    CatalogError, CatalogRequest, CatalogResult, CatalogVersionLoader, LoadedCatalog, RuntimeKind,
    BOUNDARY_FOLDER, BOUNDARY_SUFFIX, CATALOG_RESOURCE, CONNECTOR_FOLDER, CONNECTOR_SUFFIX,
    CRD_RESOURCES, OPTIONAL_CATALOG_RESOURCES, SCHEMA_RESOURCE,
};
