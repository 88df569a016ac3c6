//! owop core: Rule/Function resource types, qualified names and finalizer helpers.

#![forbid(unsafe_code)]

pub mod qname;
pub mod redirect;
pub mod resources;

pub use qname::{QualifiedName, QualifiedNameError, DEFAULT_NAMESPACE};
pub use redirect::{redirect_function, redirect_function_name, redirect_action_name};
pub use resources::{
    ActionRef, Function, FunctionSpec, KeyValue, ResourceState, ResourceStatus, Rule, RuleSpec, SecretSource,
    TargetReference,
};

use serde::{Deserialize, Serialize};

/// Finalizer token owned by this operator.
pub const FINALIZER: &str = "functions.ibmcloud.ibm.com";

/// Identity of a namespaced object, as delivered by change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Rule as sent to the function backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRule {
    pub name: String,
    /// `/namespace/entity`
    pub trigger: String,
    /// `/namespace/entity`
    pub action: String,
    pub publish: bool,
}
