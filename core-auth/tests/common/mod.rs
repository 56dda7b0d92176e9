//! Scripted in-process backend shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::{CallbackLocation, MemoryKeyValueStore};
use bridge_traits::{BridgeError, HttpClient, HttpRequest, HttpResponse};
use core_auth::AuthManager;
use core_runtime::config::SessionConfig;
use core_runtime::events::EventBus;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const BASE_URL: &str = "http://backend.test/api";

/// What the refresh endpoint answers.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// 200 with this access token, which the backend then accepts.
    Mint(String),
    /// 400, the refresh token is invalid.
    Reject,
    /// Connection failure.
    Unreachable,
}

pub struct FakeBackend {
    accepted: Mutex<HashSet<String>>,
    refresh_outcome: Mutex<RefreshOutcome>,
    probe_status: Mutex<Option<u16>>,
    hold_refresh: AtomicBool,
    refresh_gate: Notify,
    hold_probe: AtomicBool,
    probe_gate: Notify,
    calls: Mutex<HashMap<String, usize>>,
    seen_tokens: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeBackend {
    pub fn new(accepted: &[&str], refresh_outcome: RefreshOutcome) -> Arc<Self> {
        Arc::new(Self {
            accepted: Mutex::new(accepted.iter().map(|t| t.to_string()).collect()),
            refresh_outcome: Mutex::new(refresh_outcome),
            probe_status: Mutex::new(None),
            hold_refresh: AtomicBool::new(false),
            refresh_gate: Notify::new(),
            hold_probe: AtomicBool::new(false),
            probe_gate: Notify::new(),
            calls: Mutex::new(HashMap::new()),
            seen_tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn accept(&self, token: &str) {
        self.accepted.lock().unwrap().insert(token.to_string());
    }

    pub fn revoke(&self, token: &str) {
        self.accepted.lock().unwrap().remove(token);
    }

    /// Make the identity probe answer `status` regardless of the token.
    pub fn fail_probe_with(&self, status: u16) {
        *self.probe_status.lock().unwrap() = Some(status);
    }

    /// Park refresh calls until [`release_refresh`](Self::release_refresh).
    pub fn hold_refresh(&self) {
        self.hold_refresh.store(true, Ordering::SeqCst);
    }

    pub fn release_refresh(&self) {
        self.hold_refresh.store(false, Ordering::SeqCst);
        self.refresh_gate.notify_one();
    }

    /// Park identity probes until [`release_probe`](Self::release_probe).
    pub fn hold_probe(&self) {
        self.hold_probe.store(true, Ordering::SeqCst);
    }

    pub fn release_probe(&self) {
        self.hold_probe.store(false, Ordering::SeqCst);
        self.probe_gate.notify_one();
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    /// Access tokens sent to `path`, in order.
    pub fn tokens_sent_to(&self, path: &str) -> Vec<Option<String>> {
        self.seen_tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, token)| token.clone())
            .collect()
    }

    /// Yield until `path` has been called at least `count` times.
    pub async fn wait_for_calls(&self, path: &str, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls(path) < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{} never reached {} calls", path, count));
    }

    fn record(&self, path: &str, token: Option<String>) {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default() += 1;
        self.seen_tokens
            .lock()
            .unwrap()
            .push((path.to_string(), token));
    }

    fn is_accepted(&self, token: Option<&str>) -> bool {
        token.is_some_and(|t| self.accepted.lock().unwrap().contains(t))
    }
}

#[async_trait]
impl HttpClient for FakeBackend {
    async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_string();
        let token = request.query_value("access_token").map(str::to_string);
        self.record(&path, token.clone());

        match path.as_str() {
            "/me" => {
                if self.hold_probe.load(Ordering::SeqCst) {
                    self.probe_gate.notified().await;
                }
                if let Some(status) = *self.probe_status.lock().unwrap() {
                    return Ok(HttpResponse::new(status, ""));
                }
                if self.is_accepted(token.as_deref()) {
                    Ok(HttpResponse::new(
                        200,
                        r#"{"id":"u1","display_name":"Listener","images":[{"url":"https://img.test/u1.png"}],"followers":{"total":7},"email":"u1@example.test"}"#,
                    ))
                } else {
                    Ok(HttpResponse::new(401, r#"{"error":"invalid token"}"#))
                }
            }
            "/refresh_token" => {
                if self.hold_refresh.load(Ordering::SeqCst) {
                    self.refresh_gate.notified().await;
                }
                let outcome = self.refresh_outcome.lock().unwrap().clone();
                match outcome {
                    RefreshOutcome::Mint(fresh) => {
                        self.accept(&fresh);
                        let body = format!(r#"{{"access_token":"{}"}}"#, fresh);
                        Ok(HttpResponse::new(200, body))
                    }
                    RefreshOutcome::Reject => Ok(HttpResponse::new(400, "Token refresh failed")),
                    RefreshOutcome::Unreachable => {
                        Err(BridgeError::Connection("backend unreachable".to_string()))
                    }
                }
            }
            _ => {
                if self.is_accepted(token.as_deref()) {
                    Ok(HttpResponse::new(200, r#"{"items":[],"total":0}"#))
                } else {
                    Ok(HttpResponse::new(401, ""))
                }
            }
        }
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub store: Arc<MemoryKeyValueStore>,
    pub location: Arc<CallbackLocation>,
    pub manager: AuthManager,
}

pub fn harness(backend: Arc<FakeBackend>, stored: &[(&str, &str)]) -> Harness {
    let store = Arc::new(MemoryKeyValueStore::with_entries(stored.iter().copied()));
    let location = Arc::new(CallbackLocation::new());

    let config = SessionConfig::builder()
        .api_base_url(BASE_URL)
        .request_timeout(Duration::from_secs(5))
        .http_client(backend.clone())
        .token_storage(store.clone())
        .redirect_location(location.clone())
        .build()
        .expect("valid test config");

    let manager = AuthManager::new(&config, EventBus::default());

    Harness {
        backend,
        store,
        location,
        manager,
    }
}
