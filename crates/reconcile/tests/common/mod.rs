#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kube::ResourceExt;
use owop_core::{BackendRule, Function, ObjectKey, ResourceStatus, Rule, RuleSpec, SecretSource, TargetReference};
use owop_reconcile::{
    AddressResolver, BackendError, BackendProvider, CredentialsError, Engine, ResolveError, ResponseMeta,
    RuleBackend, RuleStore, StoreError,
};
use rustc_hash::FxHashMap;

pub const NS: &str = "apps";

pub fn rule(name: &str, trigger: &str, function: &str, generation: i64, observed: i64) -> Rule {
    let mut r = Rule::new(
        name,
        RuleSpec {
            name: None,
            trigger: trigger.to_string(),
            function: Some(function.to_string()),
            target_ref: None,
            context_from: None,
        },
    );
    r.metadata.namespace = Some(NS.to_string());
    r.metadata.uid = Some(format!("00000000-0000-0000-0000-{:012}", generation));
    r.metadata.generation = Some(generation);
    if observed > 0 {
        r.status = Some(ResourceStatus { generation: observed, state: None, message: None });
    }
    r
}

pub fn indirect_rule(name: &str, target: &str) -> Rule {
    let mut r = rule(name, "/_/events", "", 1, 0);
    r.spec.function = None;
    r.spec.target_ref = Some(TargetReference {
        api_version: "serving.knative.dev/v1".into(),
        kind: "Service".into(),
        name: target.to_string(),
        namespace: None,
    });
    r
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new(NS, name)
}

/// In-memory store with resourceVersion checks on every write.
#[derive(Default)]
pub struct MemStore {
    rules: Mutex<FxHashMap<ObjectKey, Rule>>,
    functions: Mutex<FxHashMap<ObjectKey, Function>>,
    calls: Mutex<Vec<&'static str>>,
    pub fail_get: Mutex<bool>,
    pub fail_rule_updates: Mutex<bool>,
    pub fail_status_updates: Mutex<bool>,
    pub fail_function_ops: Mutex<bool>,
}

fn next_rv(rv: Option<&str>) -> String {
    (rv.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0) + 1).to_string()
}

impl MemStore {
    pub fn with_rule(rule: Rule) -> Arc<Self> {
        let store = Self::default();
        store.put_rule(rule);
        Arc::new(store)
    }

    pub fn put_rule(&self, mut rule: Rule) {
        rule.metadata.resource_version = Some(next_rv(rule.metadata.resource_version.as_deref()));
        self.rules.lock().unwrap().insert(rule.key(), rule);
    }

    pub fn put_function(&self, mut f: Function) {
        f.metadata.resource_version = Some("1".into());
        let key = ObjectKey::new(f.namespace().unwrap_or_default(), f.name_any());
        self.functions.lock().unwrap().insert(key, f);
    }

    pub fn rule(&self, name: &str) -> Option<Rule> {
        self.rules.lock().unwrap().get(&key(name)).cloned()
    }

    pub fn function(&self, name: &str) -> Option<Function> {
        self.functions.lock().unwrap().get(&key(name)).cloned()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<&'static str> {
        self.calls().into_iter().filter(|c| !c.starts_with("get")).collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn function_op(&self, call: &'static str) -> Result<(), StoreError> {
        self.record(call);
        if *self.fail_function_ops.lock().unwrap() {
            return Err(StoreError::Api { code: 500, message: "etcdserver: request timed out".into() });
        }
        Ok(())
    }

    fn check_rv(stored: Option<&str>, incoming: Option<&str>) -> Result<(), StoreError> {
        if stored != incoming {
            return Err(StoreError::Conflict(format!("resourceVersion {:?} != {:?}", incoming, stored)));
        }
        Ok(())
    }
}

#[async_trait]
impl RuleStore for MemStore {
    async fn get_rule(&self, key: &ObjectKey) -> Result<Option<Rule>, StoreError> {
        self.record("get_rule");
        if *self.fail_get.lock().unwrap() {
            return Err(StoreError::Transport("connection refused".into()));
        }
        Ok(self.rules.lock().unwrap().get(key).cloned())
    }

    async fn update_rule(&self, rule: &Rule) -> Result<Rule, StoreError> {
        self.record("update_rule");
        if *self.fail_rule_updates.lock().unwrap() {
            return Err(StoreError::Conflict("object has been modified".into()));
        }
        let mut rules = self.rules.lock().unwrap();
        let stored = rules.get_mut(&rule.key()).ok_or(StoreError::NotFound)?;
        Self::check_rv(stored.metadata.resource_version.as_deref(), rule.metadata.resource_version.as_deref())?;
        if stored.spec != rule.spec {
            stored.metadata.generation = Some(stored.generation() + 1);
        }
        stored.spec = rule.spec.clone();
        stored.metadata.finalizers = rule.metadata.finalizers.clone();
        stored.metadata.resource_version = Some(next_rv(stored.metadata.resource_version.as_deref()));
        Ok(stored.clone())
    }

    async fn update_rule_status(&self, rule: &Rule) -> Result<Rule, StoreError> {
        self.record("update_rule_status");
        if *self.fail_status_updates.lock().unwrap() {
            return Err(StoreError::Conflict("object has been modified".into()));
        }
        let mut rules = self.rules.lock().unwrap();
        let stored = rules.get_mut(&rule.key()).ok_or(StoreError::NotFound)?;
        Self::check_rv(stored.metadata.resource_version.as_deref(), rule.metadata.resource_version.as_deref())?;
        stored.status = rule.status.clone();
        stored.metadata.resource_version = Some(next_rv(stored.metadata.resource_version.as_deref()));
        Ok(stored.clone())
    }

    async fn get_function(&self, key: &ObjectKey) -> Result<Option<Function>, StoreError> {
        self.function_op("get_function")?;
        Ok(self.functions.lock().unwrap().get(key).cloned())
    }

    async fn create_function(&self, function: &Function) -> Result<Function, StoreError> {
        self.function_op("create_function")?;
        let key = ObjectKey::new(function.namespace().unwrap_or_default(), function.name_any());
        let mut functions = self.functions.lock().unwrap();
        if functions.contains_key(&key) {
            return Err(StoreError::Api { code: 409, message: "already exists".into() });
        }
        let mut f = function.clone();
        f.metadata.resource_version = Some("1".into());
        functions.insert(key, f.clone());
        Ok(f)
    }

    async fn update_function(&self, function: &Function) -> Result<Function, StoreError> {
        self.function_op("update_function")?;
        let key = ObjectKey::new(function.namespace().unwrap_or_default(), function.name_any());
        let mut functions = self.functions.lock().unwrap();
        let stored = functions.get_mut(&key).ok_or(StoreError::NotFound)?;
        Self::check_rv(stored.metadata.resource_version.as_deref(), function.metadata.resource_version.as_deref())?;
        let mut f = function.clone();
        f.metadata.resource_version = Some(next_rv(stored.metadata.resource_version.as_deref()));
        *stored = f.clone();
        Ok(f)
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub inserted: Mutex<Vec<(BackendRule, bool)>>,
    pub deleted: Mutex<Vec<String>>,
    pub insert_error: Mutex<Option<BackendError>>,
    pub delete_error: Mutex<Option<BackendError>>,
}

impl FakeBackend {
    pub fn inserts(&self) -> Vec<(BackendRule, bool)> {
        self.inserted.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RuleBackend for FakeBackend {
    async fn insert_rule(&self, rule: &BackendRule, overwrite: bool) -> Result<(BackendRule, ResponseMeta), BackendError> {
        self.inserted.lock().unwrap().push((rule.clone(), overwrite));
        match self.insert_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok((rule.clone(), ResponseMeta { status: 200 })),
        }
    }

    async fn delete_rule(&self, name: &str) -> Result<ResponseMeta, BackendError> {
        self.deleted.lock().unwrap().push(name.to_string());
        match self.delete_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(ResponseMeta { status: 200 }),
        }
    }
}

#[derive(Default)]
pub struct FakeProvider {
    pub backend: Arc<FakeBackend>,
    pub unavailable: Mutex<bool>,
    pub requested: Mutex<Vec<(String, Option<SecretSource>)>>,
}

#[async_trait]
impl BackendProvider for FakeProvider {
    async fn client(&self, namespace: &str, source: Option<&SecretSource>) -> Result<Arc<dyn RuleBackend>, CredentialsError> {
        self.requested.lock().unwrap().push((namespace.to_string(), source.cloned()));
        if *self.unavailable.lock().unwrap() {
            return Err(CredentialsError::Missing { namespace: namespace.to_string(), name: "seed-defaults-owprops".into() });
        }
        Ok(self.backend.clone())
    }
}

/// Resolves targets by name from a fixed table.
#[derive(Default)]
pub struct FakeResolver {
    pub addresses: Mutex<FxHashMap<String, String>>,
    pub calls: Mutex<usize>,
}

impl FakeResolver {
    pub fn set(&self, target: &str, url: &str) {
        self.addresses.lock().unwrap().insert(target.to_string(), url.to_string());
    }
}

#[async_trait]
impl AddressResolver for FakeResolver {
    async fn resolve(&self, namespace: &str, target: &TargetReference) -> Result<String, ResolveError> {
        *self.calls.lock().unwrap() += 1;
        self.addresses.lock().unwrap().get(&target.name).cloned().ok_or_else(|| ResolveError {
            target: format!("{}/{}", namespace, target.name),
            reason: "no status.address.url".into(),
        })
    }
}

pub struct Harness {
    pub store: Arc<MemStore>,
    pub provider: Arc<FakeProvider>,
    pub resolver: Arc<FakeResolver>,
    pub engine: Engine,
}

impl Harness {
    pub fn new(store: Arc<MemStore>) -> Self {
        let provider = Arc::new(FakeProvider::default());
        let resolver = Arc::new(FakeResolver::default());
        let engine = Engine::new(store.clone(), provider.clone(), resolver.clone());
        Self { store, provider, resolver, engine }
    }

    pub fn backend(&self) -> &FakeBackend {
        &self.provider.backend
    }
}
