//! Collaborators the engine drives: object store, backend client, address resolver.

use std::sync::Arc;

use async_trait::async_trait;
use owop_core::{BackendRule, Function, ObjectKey, Rule, SecretSource, TargetReference};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,
    /// Optimistic-concurrency failure: the object changed since it was read.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("api error {code}: {message}")]
    Api { code: u16, message: String },
    #[error("transport: {0}")]
    Transport(String),
}

/// Declarative object store. Writes carry the read resourceVersion and fail on conflict.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn get_rule(&self, key: &ObjectKey) -> Result<Option<Rule>, StoreError>;
    /// Replace metadata/spec; returns the stored object.
    async fn update_rule(&self, rule: &Rule) -> Result<Rule, StoreError>;
    /// Replace the status subresource; returns the stored object.
    async fn update_rule_status(&self, rule: &Rule) -> Result<Rule, StoreError>;

    async fn get_function(&self, key: &ObjectKey) -> Result<Option<Function>, StoreError>;
    async fn create_function(&self, function: &Function) -> Result<Function, StoreError>;
    async fn update_function(&self, function: &Function) -> Result<Function, StoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("backend unreachable: {0}")]
    Transport(String),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::Transport(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    pub status: u16,
}

/// Function backend, scoped to one set of credentials.
#[async_trait]
pub trait RuleBackend: Send + Sync {
    /// Insert-or-replace when `overwrite` is set.
    async fn insert_rule(&self, rule: &BackendRule, overwrite: bool) -> Result<(BackendRule, ResponseMeta), BackendError>;
    async fn delete_rule(&self, name: &str) -> Result<ResponseMeta, BackendError>;
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("credentials secret {namespace}/{name} not found")]
    Missing { namespace: String, name: String },
    #[error("credentials secret {name}: {reason}")]
    Invalid { name: String, reason: String },
    #[error("reading credentials: {0}")]
    Store(String),
}

#[async_trait]
pub trait BackendProvider: Send + Sync {
    /// Client for the credentials named by `source` (or the configured default) in `namespace`.
    async fn client(&self, namespace: &str, source: Option<&SecretSource>) -> Result<Arc<dyn RuleBackend>, CredentialsError>;
}

#[derive(Debug, Error)]
#[error("{target}: {reason}")]
pub struct ResolveError {
    pub target: String,
    pub reason: String,
}

#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Concrete address of `target`; `namespace` applies when the reference omits one.
    async fn resolve(&self, namespace: &str, target: &TargetReference) -> Result<String, ResolveError>;
}
