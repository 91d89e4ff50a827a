//! Worklist processing with bounded concurrency.
//!
//! Distinct (runtime, version) requests are independent state machines; the
//! runner executes them in parallel up to a configured limit and reports a
//! per-request outcome list in worklist order. One request failing never
//! cancels its siblings.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use super::loader::{CatalogRequest, CatalogResult, CatalogVersionLoader, LoadedCatalog};
use crate::artifact::LoadedResourceBundle;

/// A fixed-URL schema document fetched once per run, independent of version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSchema {
    /// Resource name the document is stored under in every bundle.
    pub name: String,

    /// Public URL of the document.
    pub url: String,
}

/// Per-request outcome: success with a catalog, or failure with the reason.
#[derive(Debug)]
pub struct CatalogOutcome {
    /// The request this outcome belongs to.
    pub request: CatalogRequest,

    /// The loaded catalog, or the error that aborted the request.
    pub result: CatalogResult<LoadedCatalog>,
}

impl CatalogOutcome {
    /// Whether the request produced a catalog.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs an ordered worklist of catalog requests.
pub struct BatchRunner {
    loader: Arc<CatalogVersionLoader>,
    concurrency: usize,
    external_schemas: Vec<ExternalSchema>,
}

impl BatchRunner {
    /// Create a runner with the default concurrency limit.
    pub fn new(loader: Arc<CatalogVersionLoader>) -> Self {
        Self {
            loader,
            concurrency: 4,
            external_schemas: Vec::new(),
        }
    }

    /// Set the maximum number of requests processed in parallel.
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the external schemas fetched once per run and merged into every
    /// successful bundle.
    #[must_use]
    pub fn external_schemas(mut self, schemas: Vec<ExternalSchema>) -> Self {
        self.external_schemas = schemas;
        self
    }

    /// Process the worklist. Outcomes are returned in worklist order; every
    /// requested version appears exactly once, as success or failure.
    pub async fn run(&self, worklist: Vec<CatalogRequest>) -> Vec<CatalogOutcome> {
        let shared = Arc::new(self.fetch_external_schemas().await);

        let mut outcomes: Vec<(usize, CatalogOutcome)> = stream::iter(
            worklist.into_iter().enumerate(),
        )
        .map(|(index, request)| {
            let loader = Arc::clone(&self.loader);
            let shared = Arc::clone(&shared);
            async move {
                tracing::info!(request = %request, "Processing catalog request");
                let result = loader.load(&request).await.map(|mut catalog| {
                    catalog.bundle.merge((*shared).clone());
                    catalog
                });
                match &result {
                    Ok(catalog) => {
                        tracing::info!(request = %request, resources = catalog.bundle.len(), "Request succeeded");
                    }
                    Err(e) => {
                        tracing::error!(request = %request, error = %e, "Request failed");
                    }
                }
                (index, CatalogOutcome { request, result })
            }
        })
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Fetch each configured external schema once. A failed fetch is logged
    /// and skipped; it does not fail the batch.
    async fn fetch_external_schemas(&self) -> LoadedResourceBundle {
        let mut bundle = LoadedResourceBundle::default();
        for schema in &self.external_schemas {
            match self.loader.resolver().fetch_external(&schema.url).await {
                Ok(content) => {
                    tracing::info!(name = %schema.name, url = %schema.url, "Fetched external schema");
                    bundle.insert(schema.name.clone(), content);
                }
                Err(e) => {
                    tracing::warn!(name = %schema.name, url = %schema.url, error = %e, "External schema fetch failed, continuing without it");
                }
            }
        }
        bundle
    }
}
