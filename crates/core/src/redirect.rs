//! Derived redirect Function for rules whose action is an addressable object.

use kube::{Resource, ResourceExt};

use crate::resources::{Function, FunctionSpec, KeyValue, Rule};
use crate::DEFAULT_NAMESPACE;

pub const REDIRECT_RUNTIME: &str = "nodejs:default";
pub const TARGET_URL_PARAM: &str = "targetUrl";

const REDIRECT_CODE: &str = r#"const needle = require('needle');
function main(params) {
  const url = params.targetUrl;
  delete params.targetUrl;
  return needle('post', url, params, { json: true })
    .then(res => ({ statusCode: res.statusCode }));
}
"#;

/// Name of the redirect Function derived from a rule.
pub fn redirect_function_name(rule: &Rule) -> String {
    format!("{}-redirect", rule.name_any())
}

/// Backend action the rule points at once the redirect Function is deployed.
pub fn redirect_action_name(rule: &Rule) -> String {
    format!("/{}/{}", DEFAULT_NAMESPACE, redirect_function_name(rule))
}

/// Desired redirect Function, owned by `rule` so it is collected with it.
pub fn redirect_function(rule: &Rule, url: &str) -> Function {
    let mut f = Function::new(
        &redirect_function_name(rule),
        FunctionSpec {
            name: None,
            package: None,
            runtime: REDIRECT_RUNTIME.to_string(),
            code: Some(REDIRECT_CODE.to_string()),
            parameters: vec![KeyValue { name: TARGET_URL_PARAM.to_string(), value: url.to_string() }],
            context_from: rule.spec.context_from.clone(),
        },
    );
    f.metadata.namespace = rule.namespace();
    if let Some(owner) = rule.controller_owner_ref(&()) {
        f.metadata.owner_references = Some(vec![owner]);
    }
    f
}
