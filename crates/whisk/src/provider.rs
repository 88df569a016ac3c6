use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use owop_core::SecretSource;
use owop_reconcile::{BackendProvider, CredentialsError, RuleBackend};
use tracing::debug;

use crate::client::WhiskClient;
use crate::config::WhiskConfig;

/// Secret consulted when a resource names no credentials of its own.
pub const DEFAULT_CREDENTIALS_SECRET: &str = "seed-defaults-owprops";

/// Builds backend clients from credentials Secrets in the resource's namespace.
///
/// Secrets are read on every call so rotated or late-created credentials are picked up.
pub struct SecretBackendProvider {
    client: Client,
    default_secret: String,
    timeout: Duration,
}

impl SecretBackendProvider {
    pub fn new(client: Client) -> Self {
        Self { client, default_secret: DEFAULT_CREDENTIALS_SECRET.to_string(), timeout: Duration::from_secs(30) }
    }

    pub fn with_default_secret(mut self, name: impl Into<String>) -> Self {
        self.default_secret = name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl BackendProvider for SecretBackendProvider {
    async fn client(&self, namespace: &str, source: Option<&SecretSource>) -> Result<Arc<dyn RuleBackend>, CredentialsError> {
        let name = source.map(|s| s.name.as_str()).unwrap_or(self.default_secret.as_str());
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets
            .get_opt(name)
            .await
            .map_err(|e| CredentialsError::Store(e.to_string()))?
            .ok_or_else(|| CredentialsError::Missing { namespace: namespace.to_string(), name: name.to_string() })?;
        let invalid = |reason: String| CredentialsError::Invalid { name: name.to_string(), reason };
        let config = WhiskConfig::from_secret(&secret).map_err(|e| invalid(e.to_string()))?;
        debug!(secret = %name, api_host = %config.api_host, namespace = %config.namespace, "backend credentials loaded");
        let client = WhiskClient::new(config, self.timeout).map_err(|e| invalid(e.to_string()))?;
        Ok(Arc::new(client))
    }
}
