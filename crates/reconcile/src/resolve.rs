use owop_core::{
    redirect_action_name, redirect_function, redirect_function_name, ActionRef, ObjectKey, QualifiedName, Rule,
    DEFAULT_NAMESPACE,
};
use tracing::{debug, info};

use crate::context::Invocation;
use crate::failure::Failure;
use crate::ports::StoreError;

/// Action side of a rule once its reference has been looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    /// Backend path of a directly named action.
    Named(String),
    /// Resolved address of an addressable object, reached through a redirect Function.
    Address(String),
}

/// Parse a direct action name or ask the resolver for the target's address. No writes.
pub(crate) async fn locate(inv: &Invocation<'_>, rule: &Rule) -> Result<Target, Failure> {
    match rule.action() {
        ActionRef::Direct(name) => QualifiedName::parse(name, DEFAULT_NAMESPACE)
            .map(|q| Target::Named(q.path()))
            .map_err(|source| Failure::MalformedSpec { field: "action", source }),
        ActionRef::Indirect(target) => {
            let url = inv.resolver().resolve(&inv.key().namespace, target).await.map_err(Failure::Unaddressable)?;
            debug!(url = %url, "resolved action target");
            Ok(Target::Address(url))
        }
    }
}

/// Backend action name for `target`, materializing the redirect Function for addresses.
pub(crate) async fn action_name(inv: &Invocation<'_>, rule: &Rule, target: &Target) -> Result<String, Failure> {
    match target {
        Target::Named(path) => Ok(path.clone()),
        Target::Address(url) => materialize_redirect(inv, rule, url).await,
    }
}

async fn materialize_redirect(inv: &Invocation<'_>, rule: &Rule, url: &str) -> Result<String, Failure> {
    let desired = redirect_function(rule, url);
    let key = ObjectKey::new(inv.key().namespace.as_str(), redirect_function_name(rule));
    match inv.store().get_function(&key).await {
        Ok(Some(mut existing)) => {
            if existing.spec != desired.spec {
                info!(function = %key, "updating redirect function");
                existing.spec = desired.spec;
                inv.store().update_function(&existing).await.map_err(Failure::Persistence)?;
            }
        }
        Ok(None) | Err(StoreError::NotFound) => {
            info!(function = %key, "creating redirect function");
            inv.store().create_function(&desired).await.map_err(Failure::Persistence)?;
        }
        Err(e) => return Err(Failure::Persistence(e)),
    }
    Ok(redirect_action_name(rule))
}
