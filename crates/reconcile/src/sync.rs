use chrono::Utc;
use owop_core::{BackendRule, QualifiedName, ResourceState, Rule, DEFAULT_NAMESPACE};
use tracing::info;

use crate::context::Invocation;
use crate::failure::Failure;
use crate::resolve::{self, Target};

/// RFC 850 timestamp, as shown in `Online` status messages.
const RFC850: &str = "%A, %d-%b-%y %H:%M:%S UTC";

/// Names the rule refers to, checked before any status is staged.
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    trigger: String,
    target: Target,
}

/// Parse the trigger and locate the action. Nothing is written, so a failure here
/// leaves the stored rule untouched.
pub(crate) async fn plan(inv: &Invocation<'_>, rule: &Rule) -> Result<Plan, Failure> {
    let trigger = QualifiedName::parse(&rule.spec.trigger, DEFAULT_NAMESPACE)
        .map_err(|source| Failure::MalformedSpec { field: "trigger", source })?;
    let target = resolve::locate(inv, rule).await?;
    Ok(Plan { trigger: trigger.path(), target })
}

/// Insert-or-replace the backend rule described by `plan` and record `Online`.
///
/// Returns the rule as persisted with its new status. Every error is classified by the caller.
pub(crate) async fn sync(inv: &Invocation<'_>, rule: &Rule, generation: i64, plan: Plan) -> Result<Rule, Failure> {
    info!("deploying rule");
    let action = resolve::action_name(inv, rule, &plan.target).await?;

    info!("acquiring function backend credentials");
    let client = inv
        .backends()
        .client(&inv.key().namespace, rule.spec.context_from.as_ref())
        .await
        .map_err(Failure::CredentialUnavailable)?;

    let wanted = BackendRule { name: rule.backend_name(), trigger: plan.trigger, action, publish: false };
    info!(rule = %wanted.name, trigger = %wanted.trigger, action = %wanted.action, "calling backend rule update");
    let (_, resp) = client.insert_rule(&wanted, true).await.map_err(|e| {
        info!(error = %e, "backend rule update failed");
        Failure::Backend(e)
    })?;
    info!(status = resp.status, "deployment done");

    let online = rule.with_status(ResourceState::Online, Utc::now().format(RFC850).to_string(), Some(generation));
    inv.store().update_rule_status(&online).await.map_err(Failure::Persistence)
}
