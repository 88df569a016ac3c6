//! owop reconcile: converge backend rules to Rule resources.
//!
//! One call to [`Engine::reconcile`] handles one change notification: the rule is
//! re-fetched, then either converged or finalized. Retryable failures are returned
//! as `Err`; everything else is absorbed into the rule's status.

#![forbid(unsafe_code)]

mod context;
mod converge;
pub mod failure;
mod finalize;
pub mod ports;
mod resolve;
mod sync;

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use owop_core::ObjectKey;
use tracing::{debug, warn, Instrument};

pub use context::Invocation;
pub use failure::{BackendClassifier, DefaultClassifier, Disposition, Failure, FailureKind, Phase};
pub use ports::{
    AddressResolver, BackendError, BackendProvider, CredentialsError, ResolveError, ResponseMeta, RuleBackend,
    RuleStore, StoreError,
};

/// Result of an invocation that needs no re-invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Rule no longer exists.
    Absent,
    /// Observed generation already applied.
    UpToDate,
    Online,
    /// Terminal failure recorded in status.
    Failed(String),
    /// Action target not addressable yet; recorded in status.
    Awaiting(String),
    /// Finalizer released.
    Finalized,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Absent => "absent",
            Outcome::UpToDate => "up_to_date",
            Outcome::Online => "online",
            Outcome::Failed(_) => "failed",
            Outcome::Awaiting(_) => "awaiting",
            Outcome::Finalized => "finalized",
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn RuleStore>,
    backends: Arc<dyn BackendProvider>,
    resolver: Arc<dyn AddressResolver>,
    classifier: Arc<dyn BackendClassifier>,
}

impl Engine {
    pub fn new(store: Arc<dyn RuleStore>, backends: Arc<dyn BackendProvider>, resolver: Arc<dyn AddressResolver>) -> Self {
        Self { store, backends, resolver, classifier: Arc::new(DefaultClassifier) }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn BackendClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Handle one change notification for `key`.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Outcome, Failure> {
        let started = Instant::now();
        let inv = Invocation::new(self, key.clone());
        let span = inv.span().clone();
        let res = dispatch(&inv).instrument(span).await;
        histogram!("rule_reconcile_ms", started.elapsed().as_secs_f64() * 1000.0);
        match &res {
            Ok(outcome) => counter!("rule_reconcile_total", 1u64, "outcome" => outcome.label()),
            Err(f) => counter!("rule_reconcile_retry_total", 1u64, "kind" => f.kind().label()),
        }
        res
    }
}

async fn dispatch(inv: &Invocation<'_>) -> Result<Outcome, Failure> {
    let rule = match inv.store().get_rule(inv.key()).await {
        Ok(Some(rule)) => rule,
        // Deleted objects are collected by the store; nothing is owed.
        Ok(None) | Err(StoreError::NotFound) => {
            debug!("rule not found");
            return Ok(Outcome::Absent);
        }
        Err(e) => {
            warn!(error = %e, "reading rule failed (retrying)");
            return Err(Failure::Persistence(e));
        }
    };

    if rule.is_deleting() {
        finalize::finalize(inv, rule).await
    } else {
        converge::converge(inv, rule).await
    }
}
