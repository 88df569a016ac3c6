//! Custom resources: `Rule` (reconciled here) and `Function` (derived redirects only).

use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ObjectKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ResourceState {
    Pending,
    Online,
    Failed,
}

impl ResourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Pending => "Pending",
            ResourceState::Online => "Online",
            ResourceState::Failed => "Failed",
        }
    }
}

/// Status block shared by Rule and Function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Last generation applied (successfully or terminally).
    #[serde(default)]
    pub generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Secret holding backend properties (`apihost`, `auth`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecretSource {
    pub name: String,
}

/// Reference to an addressable object (`status.address.url`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ibmcloud.ibm.com",
    version = "v1alpha1",
    kind = "Rule",
    namespaced,
    status = "ResourceStatus",
    derive = "PartialEq",
    shortname = "rl",
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    /// Backend rule name; defaults to the resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Qualified trigger name.
    pub trigger: String,
    /// Qualified action name. Ignored when `ref` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Addressable object the rule fires into, via a derived redirect Function.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<TargetReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_from: Option<SecretSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KeyValue {
    pub name: String,
    pub value: String,
}

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ibmcloud.ibm.com",
    version = "v1alpha1",
    kind = "Function",
    namespaced,
    status = "ResourceStatus",
    derive = "PartialEq",
    shortname = "fn",
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub runtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub parameters: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_from: Option<SecretSource>,
}

/// Where a rule's action comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRef<'a> {
    Direct(&'a str),
    Indirect(&'a TargetReference),
}

impl Rule {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace().unwrap_or_default(), self.name_any())
    }

    pub fn generation(&self) -> i64 {
        self.meta().generation.unwrap_or(0)
    }

    pub fn observed_generation(&self) -> i64 {
        self.status.as_ref().map(|s| s.generation).unwrap_or(0)
    }

    pub fn state(&self) -> Option<ResourceState> {
        self.status.as_ref().and_then(|s| s.state)
    }

    /// Generation already applied (or terminally failed); nothing to do.
    pub fn is_up_to_date(&self) -> bool {
        let current = self.generation();
        current != 0 && self.observed_generation() >= current
    }

    pub fn is_deleting(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    /// Name of the backend-side rule.
    pub fn backend_name(&self) -> String {
        match self.spec.name.as_deref() {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => self.name_any(),
        }
    }

    pub fn action(&self) -> ActionRef<'_> {
        match &self.spec.target_ref {
            Some(r) => ActionRef::Indirect(r),
            None => ActionRef::Direct(self.spec.function.as_deref().unwrap_or("")),
        }
    }

    pub fn has_finalizer(&self, token: &str) -> bool {
        self.finalizers().iter().any(|f| f == token)
    }

    pub fn with_finalizer(&self, token: &str) -> Rule {
        let mut next = self.clone();
        if !next.has_finalizer(token) {
            next.finalizers_mut().push(token.to_string());
        }
        next
    }

    pub fn without_finalizer(&self, token: &str) -> Rule {
        let mut next = self.clone();
        next.finalizers_mut().retain(|f| f != token);
        next
    }

    /// Copy with a new state/message. `generation`, when given, is recorded as applied;
    /// the recorded generation never moves backwards.
    pub fn with_status(&self, state: ResourceState, message: impl Into<String>, generation: Option<i64>) -> Rule {
        let mut next = self.clone();
        let prev = next.status.take().unwrap_or_default();
        next.status = Some(ResourceStatus {
            generation: generation.map(|g| g.max(prev.generation)).unwrap_or(prev.generation),
            state: Some(state),
            message: Some(message.into()),
        });
        next
    }
}
