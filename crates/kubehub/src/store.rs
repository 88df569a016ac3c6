//! Optimistic-concurrency object store over `kube::Api`.

use async_trait::async_trait;
use kube::{
    api::{Api, PostParams},
    Client, ResourceExt,
};
use owop_core::{Function, ObjectKey, Rule};
use owop_reconcile::{RuleStore, StoreError};
use tracing::debug;

use crate::store_err;

/// Writes use `replace`, which carries the object's resourceVersion; a stale copy fails with 409.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn rules(&self, namespace: &str) -> Api<Rule> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn functions(&self, namespace: &str) -> Api<Function> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn namespace_of<K: ResourceExt>(obj: &K) -> Result<String, StoreError> {
    obj.namespace().ok_or_else(|| StoreError::Api { code: 400, message: format!("{} has no namespace", obj.name_any()) })
}

#[async_trait]
impl RuleStore for KubeStore {
    async fn get_rule(&self, key: &ObjectKey) -> Result<Option<Rule>, StoreError> {
        self.rules(&key.namespace).get_opt(&key.name).await.map_err(store_err)
    }

    async fn update_rule(&self, rule: &Rule) -> Result<Rule, StoreError> {
        let ns = namespace_of(rule)?;
        debug!(namespace = %ns, name = %rule.name_any(), "replace rule");
        self.rules(&ns).replace(&rule.name_any(), &PostParams::default(), rule).await.map_err(store_err)
    }

    async fn update_rule_status(&self, rule: &Rule) -> Result<Rule, StoreError> {
        let ns = namespace_of(rule)?;
        let data = serde_json::to_vec(rule).map_err(|e| StoreError::Api { code: 400, message: e.to_string() })?;
        debug!(namespace = %ns, name = %rule.name_any(), "replace rule status");
        self.rules(&ns).replace_status(&rule.name_any(), &PostParams::default(), data).await.map_err(store_err)
    }

    async fn get_function(&self, key: &ObjectKey) -> Result<Option<Function>, StoreError> {
        self.functions(&key.namespace).get_opt(&key.name).await.map_err(store_err)
    }

    async fn create_function(&self, function: &Function) -> Result<Function, StoreError> {
        let ns = namespace_of(function)?;
        self.functions(&ns).create(&PostParams::default(), function).await.map_err(store_err)
    }

    async fn update_function(&self, function: &Function) -> Result<Function, StoreError> {
        let ns = namespace_of(function)?;
        self.functions(&ns).replace(&function.name_any(), &PostParams::default(), function).await.map_err(store_err)
    }
}
