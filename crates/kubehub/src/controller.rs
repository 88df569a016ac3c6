//! Controller host: watches Rules (and their redirect Functions) and feeds the engine.
//!
//! `kube::runtime::Controller` serializes work per object and bounds concurrency across
//! objects; the engine itself takes no locks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use kube::{
    api::{Api, ListParams},
    runtime::{
        controller::{self, Action},
        watcher, Controller,
    },
    Client,
};
use metrics::counter;
use owop_core::{Function, Rule};
use owop_reconcile::{Engine, Failure, Outcome};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Watch one namespace; all when `None`.
    pub namespace: Option<String>,
    pub concurrency: u16,
    /// Delay before re-invoking after a retryable failure.
    pub requeue: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { namespace: None, concurrency: 32, requeue: Duration::from_secs(10) }
    }
}

struct Ctx {
    engine: Engine,
    requeue: Duration,
}

async fn reconcile(rule: Arc<Rule>, ctx: Arc<Ctx>) -> Result<Action, Failure> {
    // The engine re-fetches; the cached object only names what changed.
    match ctx.engine.reconcile(&rule.key()).await? {
        // targets of arbitrary kinds are not watched; look again later
        Outcome::Awaiting(_) => Ok(Action::requeue(ctx.requeue)),
        _ => Ok(Action::await_change()),
    }
}

fn error_policy(rule: Arc<Rule>, err: &Failure, ctx: Arc<Ctx>) -> Action {
    warn!(rule = %rule.key(), error = %err, kind = err.kind().label(), requeue_s = ctx.requeue.as_secs(), "requeue");
    Action::requeue(ctx.requeue)
}

/// Run until SIGINT/SIGTERM.
pub async fn run_controller(client: Client, engine: Engine, cfg: ControllerConfig) -> Result<()> {
    let (rules, functions): (Api<Rule>, Api<Function>) = match cfg.namespace.as_deref() {
        Some(ns) => (Api::namespaced(client.clone(), ns), Api::namespaced(client, ns)),
        None => (Api::all(client.clone()), Api::all(client)),
    };
    rules.list(&ListParams::default().limit(1)).await.context("listing rules (is the Rule CRD installed?)")?;

    let ctx = Arc::new(Ctx { engine, requeue: cfg.requeue });
    info!(ns = ?cfg.namespace, concurrency = cfg.concurrency, "rule controller started");
    Controller::new(rules, watcher::Config::default())
        .owns(functions, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(cfg.concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!(rule = %obj, "reconciled"),
                Err(e) => {
                    counter!("rule_controller_errors_total", 1u64);
                    debug!(error = %e, "reconcile error");
                }
            }
        })
        .await;
    info!("rule controller stopped");
    Ok(())
}
