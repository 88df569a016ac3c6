//! Per-invocation execution context.

use owop_core::ObjectKey;
use tracing::{info_span, Span};
use uuid::Uuid;

use crate::failure::BackendClassifier;
use crate::ports::{AddressResolver, BackendProvider, RuleStore};
use crate::Engine;

/// Collaborators and the log span of one call; the span carries a fresh `request_id`.
pub struct Invocation<'a> {
    engine: &'a Engine,
    key: ObjectKey,
    span: Span,
}

impl<'a> Invocation<'a> {
    pub fn new(engine: &'a Engine, key: ObjectKey) -> Self {
        let request_id = Uuid::new_v4();
        let span = info_span!("reconcile", namespace = %key.namespace, name = %key.name, request_id = %request_id);
        Self { engine, key, span }
    }

    pub fn key(&self) -> &ObjectKey { &self.key }
    pub fn span(&self) -> &Span { &self.span }

    pub fn store(&self) -> &dyn RuleStore { self.engine.store.as_ref() }
    pub fn backends(&self) -> &dyn BackendProvider { self.engine.backends.as_ref() }
    pub fn resolver(&self) -> &dyn AddressResolver { self.engine.resolver.as_ref() }
    pub fn classifier(&self) -> &dyn BackendClassifier { self.engine.classifier.as_ref() }
}
