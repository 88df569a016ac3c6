//! owop kubehub: Kubernetes bindings for the rule engine (store, resolver, controller).

#![forbid(unsafe_code)]

pub mod controller;
pub mod resolver;
pub mod store;

use anyhow::{Context, Result};
use kube::Client;

pub use controller::{run_controller, ControllerConfig};
pub use resolver::DuckResolver;
pub use store::KubeStore;

/// Client from in-cluster config or the current kubeconfig context.
pub async fn get_kube_client() -> Result<Client> {
    Client::try_default().await.context("building kube client (in-cluster or kubeconfig)")
}

/// Map kube API errors onto the engine's store taxonomy.
pub(crate) fn store_err(e: kube::Error) -> owop_reconcile::StoreError {
    use owop_reconcile::StoreError;
    match e {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound,
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict(ae.message),
        kube::Error::Api(ae) => StoreError::Api { code: ae.code, message: ae.message },
        other => StoreError::Transport(other.to_string()),
    }
}
