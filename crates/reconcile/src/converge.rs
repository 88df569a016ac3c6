use owop_core::{ResourceState, Rule, FINALIZER};
use tracing::{debug, error, info, warn};

use crate::context::Invocation;
use crate::failure::{Disposition, Failure, Phase};
use crate::{sync, Outcome};

const PENDING_MESSAGE: &str = "deploying";

/// Bring a non-deleting rule up to date with its observed generation.
pub(crate) async fn converge(inv: &Invocation<'_>, rule: Rule) -> Result<Outcome, Failure> {
    let generation = rule.generation();
    if rule.is_up_to_date() {
        debug!(generation, "rule up-to-date");
        return Ok(Outcome::UpToDate);
    }

    // Finalizer first: no backend call without cleanup owed.
    let rule = if rule.has_finalizer(FINALIZER) {
        rule
    } else {
        match inv.store().update_rule(&rule.with_finalizer(FINALIZER)).await {
            Ok(updated) => updated,
            Err(e) => {
                info!(error = %e, "setting finalizer failed (retrying)");
                return Err(Failure::Persistence(e));
            }
        }
    };

    let plan = match sync::plan(inv, &rule).await {
        Ok(plan) => plan,
        Err(failure) => return settle(inv, rule, generation, failure).await,
    };

    let rule = stage_pending(inv, rule).await?;

    match sync::sync(inv, &rule, generation, plan).await {
        Ok(_) => Ok(Outcome::Online),
        Err(failure) => settle(inv, rule, generation, failure).await,
    }
}

/// Apply the converge disposition of `failure` to the rule's status.
async fn settle(inv: &Invocation<'_>, rule: Rule, generation: i64, failure: Failure) -> Result<Outcome, Failure> {
    match failure.disposition(Phase::Converge, inv.classifier()) {
        Disposition::Retry => {
            warn!(error = %failure, kind = failure.kind().label(), "deployment failed (retrying)");
            Err(failure)
        }
        Disposition::AwaitDependency => {
            let message = failure.to_string();
            if has_status(&rule, ResourceState::Failed, &message) {
                debug!(error = %message, "still waiting for action target");
                return Ok(Outcome::Awaiting(message));
            }
            warn!(error = %message, "action target not addressable; waiting for it to change");
            let failed = rule.with_status(ResourceState::Failed, message.as_str(), None);
            inv.store().update_rule_status(&failed).await.map_err(Failure::Persistence)?;
            Ok(Outcome::Awaiting(message))
        }
        Disposition::Terminal => {
            let message = failure.to_string();
            error!(error = %message, generation, "deployment failed");
            let failed = rule.with_status(ResourceState::Failed, message.as_str(), Some(generation));
            // Best effort; the outcome stays terminal.
            if let Err(e) = inv.store().update_rule_status(&failed).await {
                warn!(error = %e, "failed to record terminal status");
            }
            Ok(Outcome::Failed(message))
        }
        // Only finalize steps can be skipped; an insert classified this way is retried.
        Disposition::Proceed => Err(failure),
    }
}

fn has_status(rule: &Rule, state: ResourceState, message: &str) -> bool {
    rule.state() == Some(state) && rule.status.as_ref().and_then(|s| s.message.as_deref()) == Some(message)
}

async fn stage_pending(inv: &Invocation<'_>, rule: Rule) -> Result<Rule, Failure> {
    if has_status(&rule, ResourceState::Pending, PENDING_MESSAGE) {
        return Ok(rule);
    }
    let pending = rule.with_status(ResourceState::Pending, PENDING_MESSAGE, None);
    inv.store().update_rule_status(&pending).await.map_err(|e| {
        info!(error = %e, "setting status to pending failed (retrying)");
        Failure::Persistence(e)
    })
}
