//! Backend properties as stored in a credentials Secret.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use owop_core::DEFAULT_NAMESPACE;
use thiserror::Error;

pub const KEY_API_HOST: &str = "apihost";
pub const KEY_AUTH: &str = "auth";
pub const KEY_NAMESPACE: &str = "namespace";
pub const KEY_INSECURE: &str = "insecure";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WhiskConfigError {
    #[error("missing key '{0}'")]
    MissingKey(&'static str),
    #[error("key '{0}' is not valid utf-8")]
    NotUtf8(String),
    #[error("auth must be 'user:key'")]
    BadAuth,
}

#[derive(Clone, PartialEq, Eq)]
pub struct WhiskConfig {
    pub api_host: String,
    pub user: String,
    pub key: String,
    pub namespace: String,
    pub insecure: bool,
}

impl std::fmt::Debug for WhiskConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhiskConfig")
            .field("api_host", &self.api_host)
            .field("user", &self.user)
            .field("namespace", &self.namespace)
            .field("insecure", &self.insecure)
            .finish_non_exhaustive()
    }
}

impl WhiskConfig {
    pub fn from_props(props: &BTreeMap<String, String>) -> Result<Self, WhiskConfigError> {
        let get = |k: &str| props.get(k).map(|v| v.trim()).filter(|v| !v.is_empty());
        let api_host = get(KEY_API_HOST).ok_or(WhiskConfigError::MissingKey(KEY_API_HOST))?.to_string();
        let auth = get(KEY_AUTH).ok_or(WhiskConfigError::MissingKey(KEY_AUTH))?;
        let (user, key) = auth.split_once(':').filter(|(u, k)| !u.is_empty() && !k.is_empty()).ok_or(WhiskConfigError::BadAuth)?;
        Ok(Self {
            api_host,
            user: user.to_string(),
            key: key.to_string(),
            namespace: get(KEY_NAMESPACE).unwrap_or(DEFAULT_NAMESPACE).to_string(),
            insecure: get(KEY_INSECURE).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false),
        })
    }

    pub fn from_secret(secret: &Secret) -> Result<Self, WhiskConfigError> {
        let mut props = BTreeMap::new();
        for (k, v) in secret.data.iter().flatten() {
            let s = String::from_utf8(v.0.clone()).map_err(|_| WhiskConfigError::NotUtf8(k.clone()))?;
            props.insert(k.clone(), s);
        }
        // stringData only shows up on objects that were never round-tripped through the API server
        for (k, v) in secret.string_data.iter().flatten() {
            props.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Self::from_props(&props)
    }

    /// API host as a URL; bare hosts default to https.
    pub fn base_url(&self) -> String {
        if self.api_host.starts_with("http://") || self.api_host.starts_with("https://") {
            self.api_host.clone()
        } else {
            format!("https://{}", self.api_host)
        }
    }
}
