//! Artifact subsystem error types.

use thiserror::Error;

use super::coordinate::ArtifactCoordinate;

/// Result type for artifact operations.
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Errors that can occur during artifact resolution and resource access.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The coordinate could not be fetched from any configured endpoint.
    #[error("Unresolvable artifact {coordinate}, tried endpoints: {tried:?}")]
    Unresolvable {
        coordinate: ArtifactCoordinate,
        tried: Vec<String>,
    },

    /// A dependency of an otherwise-resolved artifact could not be resolved.
    #[error("Failed to resolve dependency {dependency} of {parent}")]
    TransitiveResolution {
        parent: ArtifactCoordinate,
        dependency: ArtifactCoordinate,
        #[source]
        source: Box<ArtifactError>,
    },

    /// Attempted mutation of a sealed scope. Indicates an orchestration bug.
    #[error("Scope '{0}' is sealed and cannot accept new members")]
    ScopeSealed(String),

    /// Attempted resource read on a scope that was never sealed. Indicates
    /// an orchestration bug.
    #[error("Scope '{0}' must be sealed before resources can be read")]
    ScopeNotSealed(String),

    /// A named resource is absent from a sealed scope. Recoverable unless the
    /// caller declared the resource required.
    #[error("Resource '{path}' not found in scope '{scope}'")]
    ResourceNotFound { scope: String, path: String },

    /// A cached artifact file failed an integrity or shape check.
    #[error("Cached artifact {coordinate} is corrupt: {reason}")]
    CacheCorruption {
        coordinate: ArtifactCoordinate,
        reason: String,
    },

    /// The dependency descriptor next to an artifact could not be parsed.
    #[error("Invalid dependency descriptor for {coordinate}: {reason}")]
    InvalidDescriptor {
        coordinate: ArtifactCoordinate,
        reason: String,
    },

    /// Network error (request failure, timeout, or a non-404 HTTP error).
    #[error("Network error: {0}")]
    Network(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
