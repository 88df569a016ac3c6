//! Failure taxonomy and the retry/terminal decision table.

use owop_core::QualifiedNameError;
use thiserror::Error;

use crate::ports::{BackendError, CredentialsError, ResolveError, StoreError};

#[derive(Debug, Error)]
pub enum Failure {
    #[error("malformed {field} name: {source}")]
    MalformedSpec {
        field: &'static str,
        #[source]
        source: QualifiedNameError,
    },
    #[error("object is not addressable: {0}")]
    Unaddressable(#[source] ResolveError),
    #[error("error creating function backend client: {0}")]
    CredentialUnavailable(#[source] CredentialsError),
    #[error("backend call failed: {0}")]
    Backend(#[source] BackendError),
    #[error("store access failed: {0}")]
    Persistence(#[source] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MalformedSpec,
    Unaddressable,
    CredentialUnavailable,
    BackendTransient,
    PersistenceConflict,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::MalformedSpec => "malformed_spec",
            FailureKind::Unaddressable => "unaddressable",
            FailureKind::CredentialUnavailable => "credential_unavailable",
            FailureKind::BackendTransient => "backend",
            FailureKind::PersistenceConflict => "persistence",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Converge,
    Finalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return the failure; the dispatcher re-invokes.
    Retry,
    /// Record Failed with the observed generation; never retried for that generation.
    Terminal,
    /// Record Failed without stamping the generation; a change on the dependency re-invokes.
    AwaitDependency,
    /// Carry on as if the step succeeded.
    Proceed,
}

/// Pluggable classification of backend errors.
pub trait BackendClassifier: Send + Sync {
    /// Disposition of a failed insert-or-replace during convergence.
    fn classify_insert(&self, _err: &BackendError) -> Disposition {
        Disposition::Retry
    }

    /// Whether a failed delete should hold the finalizer and be retried.
    fn should_retry_finalize(&self, err: &BackendError) -> bool;
}

/// Always retry inserts; give up on deletes the backend will never accept.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl BackendClassifier for DefaultClassifier {
    fn should_retry_finalize(&self, err: &BackendError) -> bool {
        match err.status() {
            None => true,
            // already gone
            Some(404) => false,
            Some(408) | Some(429) => true,
            Some(s) if (400..500).contains(&s) => false,
            Some(_) => true,
        }
    }
}

impl Failure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::MalformedSpec { .. } => FailureKind::MalformedSpec,
            Failure::Unaddressable(_) => FailureKind::Unaddressable,
            Failure::CredentialUnavailable(_) => FailureKind::CredentialUnavailable,
            Failure::Backend(_) => FailureKind::BackendTransient,
            Failure::Persistence(_) => FailureKind::PersistenceConflict,
        }
    }

    pub fn disposition(&self, phase: Phase, classifier: &dyn BackendClassifier) -> Disposition {
        match phase {
            Phase::Converge => match self {
                Failure::MalformedSpec { .. } => Disposition::Terminal,
                Failure::Unaddressable(_) => Disposition::AwaitDependency,
                Failure::CredentialUnavailable(_) => Disposition::Retry,
                Failure::Backend(e) => classifier.classify_insert(e),
                Failure::Persistence(_) => Disposition::Retry,
            },
            Phase::Finalize => match self {
                Failure::Backend(e) if classifier.should_retry_finalize(e) => Disposition::Retry,
                Failure::Persistence(_) => Disposition::Retry,
                _ => Disposition::Proceed,
            },
        }
    }
}
