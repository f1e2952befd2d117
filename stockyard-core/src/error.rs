//! Error types for Stockyard operations

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Failed to open store at {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Migration to version {version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Row for {key} could not be decoded: {reason}")]
    DecodeFailed { key: String, reason: String },

    #[error("Store worker is gone: {reason}")]
    WorkerGone { reason: String },
}

/// Validation errors for names, SKUs, and payload fields.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Field {field} exceeds {max} characters (got {got})")]
    TooLong { field: String, max: usize, got: usize },

    #[error("Field {field} contains invalid characters: {value:?}")]
    InvalidCharacters { field: String, value: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Model provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("No model provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Model call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Agent-to-agent fabric errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FabricError {
    #[error("No agent registered for {owner_key}")]
    AgentUnreachable { owner_key: String },

    #[error("Agent {owner_key} rejected the call: {reason}")]
    CallRejected { owner_key: String, reason: String },

    #[error("Peer call to {owner_key} timed out")]
    CallTimedOut { owner_key: String },

    #[error("Agent {owner_key} is {state} and not accepting work")]
    NotAccepting { owner_key: String, state: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level error enum unifying the domain errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FleetError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Fabric(#[from] FabricError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Create-child collision: the segment is already a registered child.
    #[error("Agent {name:?} already exists")]
    AgentExists { name: String },

    /// Child, SKU, or stored row missing.
    #[error("{what} not found: {name:?}")]
    NotFound { what: String, name: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the workspace.
pub type FleetResult<T> = Result<T, FleetError>;
