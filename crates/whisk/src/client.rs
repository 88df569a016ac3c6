//! OpenWhisk REST client for rules.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use owop_core::BackendRule;
use owop_reconcile::{BackendError, ResponseMeta, RuleBackend};
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

use crate::config::WhiskConfig;

#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid api host '{0}'")]
    BadHost(String),
    #[error("building http client: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct WhiskClient {
    http: reqwest::Client,
    base: Url,
    config: WhiskConfig,
}

#[derive(Serialize)]
struct RuleBody<'a> {
    name: &'a str,
    trigger: &'a str,
    action: &'a str,
    publish: bool,
}

#[derive(Deserialize)]
struct RuleResponse {
    name: String,
    #[serde(default)]
    trigger: Json,
    #[serde(default)]
    action: Json,
    #[serde(default)]
    publish: bool,
}

/// Entities come back either as a path string or as `{path, name}`.
fn entity_path(v: &Json) -> Option<String> {
    match v {
        Json::String(s) => Some(s.clone()),
        Json::Object(_) => Some(format!("/{}/{}", v.get("path")?.as_str()?, v.get("name")?.as_str()?)),
        _ => None,
    }
}

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

impl WhiskClient {
    pub fn new(config: WhiskConfig, timeout: Duration) -> Result<Self, ClientBuildError> {
        let base_s = config.base_url();
        let base = Url::parse(&base_s).map_err(|_| ClientBuildError::BadHost(base_s.clone()))?;
        if base.cannot_be_a_base() {
            return Err(ClientBuildError::BadHost(base_s));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;
        Ok(Self { http, base, config })
    }

    /// `<base>/api/v1/namespaces/<ns>/rules/<name>`
    pub fn rule_url(&self, name: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segs) = url.path_segments_mut() {
            segs.pop_if_empty().extend(["api", "v1", "namespaces", self.config.namespace.as_str(), "rules", name]);
        }
        url
    }

    async fn send(&self, op: &'static str, method: Method, url: Url, body: Option<&RuleBody<'_>>) -> Result<(StatusCode, String), BackendError> {
        let mut req = self.http.request(method, url).basic_auth(&self.config.user, Some(&self.config.key));
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await.map_err(|e| {
            counter!("whisk_requests_total", 1u64, "op" => op, "status" => "error");
            transport(e)
        })?;
        let status = resp.status();
        counter!("whisk_requests_total", 1u64, "op" => op, "status" => status.as_u16().to_string());
        let text = resp.text().await.map_err(transport)?;
        debug!(op, status = status.as_u16(), "whisk response");
        if !status.is_success() {
            return Err(BackendError::Status { status: status.as_u16(), message: error_message(&text, status) });
        }
        Ok((status, text))
    }
}

/// `{"error": "...", "code": "..."}`, else the raw body.
fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Json>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(|s| s.to_string()))
        .or_else(|| Some(body.trim().to_string()).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string())
}

#[async_trait]
impl RuleBackend for WhiskClient {
    async fn insert_rule(&self, rule: &BackendRule, overwrite: bool) -> Result<(BackendRule, ResponseMeta), BackendError> {
        let mut url = self.rule_url(&rule.name);
        url.query_pairs_mut().append_pair("overwrite", if overwrite { "true" } else { "false" });
        let body = RuleBody { name: &rule.name, trigger: &rule.trigger, action: &rule.action, publish: rule.publish };
        let (status, text) = self.send("insert", Method::PUT, url, Some(&body)).await?;

        let stored = serde_json::from_str::<RuleResponse>(&text)
            .ok()
            .map(|r| BackendRule {
                trigger: entity_path(&r.trigger).unwrap_or_else(|| rule.trigger.clone()),
                action: entity_path(&r.action).unwrap_or_else(|| rule.action.clone()),
                name: r.name,
                publish: r.publish,
            })
            .unwrap_or_else(|| rule.clone());
        Ok((stored, ResponseMeta { status: status.as_u16() }))
    }

    async fn delete_rule(&self, name: &str) -> Result<ResponseMeta, BackendError> {
        let (status, _) = self.send("delete", Method::DELETE, self.rule_url(name), None).await?;
        Ok(ResponseMeta { status: status.as_u16() })
    }
}
