use owop_core::{Rule, FINALIZER};
use tracing::{debug, info, warn};

use crate::context::Invocation;
use crate::failure::{Disposition, Failure, Phase};
use crate::Outcome;

/// Delete the backend rule, then release the finalizer.
///
/// The finalizer stays only while a retryable delete error is outstanding. Missing
/// credentials release it without a delete.
pub(crate) async fn finalize(inv: &Invocation<'_>, rule: Rule) -> Result<Outcome, Failure> {
    if !rule.has_finalizer(FINALIZER) {
        debug!("no finalizer; nothing to clean up");
        return Ok(Outcome::Finalized);
    }
    let name = rule.backend_name();

    match inv.backends().client(&inv.key().namespace, rule.spec.context_from.as_ref()).await {
        Ok(client) => {
            info!(rule = %name, "deleting backend rule");
            if let Err(e) = client.delete_rule(&name).await {
                let failure = Failure::Backend(e);
                if failure.disposition(Phase::Finalize, inv.classifier()) == Disposition::Retry {
                    warn!(error = %failure, "backend rule delete failed (retrying)");
                    return Err(failure);
                }
                warn!(error = %failure, "backend rule delete failed; giving up");
            }
        }
        Err(e) => {
            let failure = Failure::CredentialUnavailable(e);
            if failure.disposition(Phase::Finalize, inv.classifier()) == Disposition::Retry {
                return Err(failure);
            }
            warn!(error = %failure, "no backend credentials; releasing finalizer without deleting");
        }
    }

    inv.store().update_rule(&rule.without_finalizer(FINALIZER)).await.map_err(|e| {
        info!(error = %e, "removing finalizer failed (retrying)");
        Failure::Persistence(e)
    })?;
    Ok(Outcome::Finalized)
}
