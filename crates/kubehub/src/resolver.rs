//! Resolve addressable objects (`status.address.url`) through API discovery.

use async_trait::async_trait;
use kube::{
    api::Api,
    core::{DynamicObject, GroupVersionKind},
    discovery, Client,
};
use owop_core::TargetReference;
use owop_reconcile::{AddressResolver, ResolveError};
use serde_json::Value as Json;
use tracing::debug;

#[derive(Clone)]
pub struct DuckResolver {
    client: Client,
}

impl DuckResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// `group/version` or core `version` plus kind.
fn target_gvk(target: &TargetReference) -> GroupVersionKind {
    match target.api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, &target.kind),
        None => GroupVersionKind::gvk("", &target.api_version, &target.kind),
    }
}

/// Address published by an addressable object; legacy `hostname` is accepted as http.
pub fn address_of(obj: &Json) -> Option<String> {
    let addr = obj.get("status")?.get("address")?;
    let non_empty = |k: &str| addr.get(k).and_then(|v| v.as_str()).filter(|s| !s.is_empty()).map(|s| s.to_string());
    non_empty("url").or_else(|| non_empty("hostname").map(|h| format!("http://{}", h)))
}

#[async_trait]
impl AddressResolver for DuckResolver {
    async fn resolve(&self, namespace: &str, target: &TargetReference) -> Result<String, ResolveError> {
        let ns = target.namespace.as_deref().unwrap_or(namespace);
        let err = |reason: String| ResolveError { target: format!("{}/{}", ns, target.name), reason };

        let gvk = target_gvk(target);
        let (ar, _caps) = discovery::pinned_kind(&self.client, &gvk)
            .await
            .map_err(|e| err(format!("kind {}/{} not served: {}", target.api_version, target.kind, e)))?;
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), ns, &ar);
        let obj = api
            .get_opt(&target.name)
            .await
            .map_err(|e| err(e.to_string()))?
            .ok_or_else(|| err("not found".to_string()))?;
        let url = address_of(&obj.data).ok_or_else(|| err("no status.address.url".to_string()))?;
        debug!(target = %target.name, url = %url, "resolved address");
        Ok(url)
    }
}
