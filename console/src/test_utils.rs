//! In-memory test doubles for [`HubApi`], [`Confirm`] and [`Notify`].

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use hub_api::{
    def::HubApi,
    error::{HubApiError, HubErrorKind},
    models::{
        App, BackendType, Channel, CloseChannelRequest, InfoResponse,
        NodeMetadata, OnchainBalance, RedeemOnchainFundsResponse,
        SetupRequest, UnlockRequest,
    },
    types::{CsrfToken, Empty},
};
use tokio::sync::Semaphore;

use crate::confirm::{Confirm, ConfirmPrompt, Notification, Notify};

// --- Fixtures --- //

pub fn channel(
    id: &str,
    remote_pubkey: &str,
    local_balance: u64,
    remote_balance: u64,
    active: bool,
) -> Channel {
    Channel {
        id: id.to_owned(),
        remote_pubkey: remote_pubkey.to_owned(),
        local_balance,
        remote_balance,
        active,
        public: true,
    }
}

pub fn node(public_key: &str, alias: &str) -> NodeMetadata {
    NodeMetadata {
        public_key: public_key.to_owned(),
        alias: alias.to_owned(),
        ..Default::default()
    }
}

pub fn info(backend_type: BackendType, running: bool) -> InfoResponse {
    InfoResponse {
        backend_type,
        setup_completed: true,
        running,
        unlocked: true,
        alby_auth_url: None,
        show_backup_reminder: false,
        alby_user_identifier: None,
    }
}

pub fn app(name: &str, nostr_pubkey: &str) -> App {
    let now = Utc::now();
    App {
        name: name.to_owned(),
        description: String::new(),
        nostr_pubkey: nostr_pubkey.to_owned(),
        created_at: now,
        updated_at: now,
        last_event_at: None,
        expires_at: None,
        request_methods: Vec::new(),
        max_amount: 0,
        budget_usage: 0,
        budget_renewal: "monthly".to_owned(),
    }
}

// --- MockHub --- //

/// A fake Hub which keeps its state in memory and records every request.
///
/// Mutating endpoints behave like the real Hub: closing a channel removes it
/// from the channel list, stopping the node marks it not running, etc.
#[derive(Clone, Default)]
pub struct MockHub {
    state: Arc<Mutex<MockHubState>>,
}

#[derive(Default)]
struct MockHubState {
    csrf: Option<String>,
    info: Option<InfoResponse>,
    channels: Vec<Channel>,
    balance: OnchainBalance,
    nodes: HashMap<String, NodeMetadata>,
    failing_nodes: HashSet<String>,
    apps: Vec<App>,
    /// Endpoint (e.g. "POST /api/stop") -> the error it fails with.
    failures: HashMap<String, HubApiError>,
    /// Every request, e.g. "GET /api/channels".
    calls: Vec<String>,
    /// Node lookups wait on this while it's set.
    node_gate: Option<Arc<Semaphore>>,
}

impl MockHub {
    /// A running LDK Hub with a CSRF token and nothing else.
    pub fn new() -> Self {
        let hub = Self::default();
        {
            let mut state = hub.state();
            state.csrf = Some("mock-csrf-token".to_owned());
            state.info = Some(info(BackendType::Ldk, true));
        }
        hub
    }

    fn state(&self) -> MutexGuard<'_, MockHubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_channels(&self, channels: Vec<Channel>) {
        self.state().channels = channels;
    }

    pub fn set_balance(&self, balance: OnchainBalance) {
        self.state().balance = balance;
    }

    pub fn set_info(&self, info: InfoResponse) {
        self.state().info = Some(info);
    }

    pub fn set_apps(&self, apps: Vec<App>) {
        self.state().apps = apps;
    }

    /// `None` makes `GET /api/csrf` fail.
    pub fn set_csrf(&self, token: Option<&str>) {
        self.state().csrf = token.map(str::to_owned);
    }

    pub fn add_node(&self, node: NodeMetadata) {
        self.state().nodes.insert(node.public_key.clone(), node);
    }

    /// Lookups for `pubkey` fail with a server error.
    pub fn fail_node(&self, pubkey: &str) {
        self.state().failing_nodes.insert(pubkey.to_owned());
    }

    /// Requests to `endpoint` (e.g. "POST /api/channels/close") fail with
    /// `error` until [`Self::clear_failures`].
    pub fn fail(&self, endpoint: &str, error: HubApiError) {
        self.state().failures.insert(endpoint.to_owned(), error);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Hold all node lookups until the returned semaphore is closed.
    pub fn pause_node_lookups(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state().node_gate = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// How many requests were made to `endpoint`.
    pub fn count(&self, endpoint: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == endpoint).count()
    }

    /// Whether any mutating request was made.
    pub fn mutated(&self) -> bool {
        self.state()
            .calls
            .iter()
            .any(|call| !call.starts_with("GET "))
    }

    /// Pubkeys looked up via `GET /api/mempool/lightning/nodes/:pubkey`.
    pub fn node_lookups(&self) -> Vec<String> {
        const PREFIX: &str = "GET /api/mempool/lightning/nodes/";
        self.state()
            .calls
            .iter()
            .filter_map(|call| call.strip_prefix(PREFIX))
            .map(str::to_owned)
            .collect()
    }

    /// Records the call and returns its configured failure, if any.
    fn record(&self, endpoint: String) -> Result<(), HubApiError> {
        let mut state = self.state();
        let failure = state.failures.get(&endpoint).cloned();
        state.calls.push(endpoint);
        failure.map_or(Ok(()), Err)
    }

    /// Mutating endpoints also check the CSRF token like the Hub does.
    fn record_mutation(
        &self,
        endpoint: String,
        csrf: &CsrfToken,
    ) -> Result<(), HubApiError> {
        self.record(endpoint)?;
        match self.state().csrf.as_deref() {
            Some(expected) if expected == csrf.as_str() => Ok(()),
            _ => Err(HubApiError::new(
                HubErrorKind::Forbidden,
                "invalid csrf token",
            )),
        }
    }
}

impl HubApi for MockHub {
    async fn csrf(&self) -> Result<CsrfToken, HubApiError> {
        self.record("GET /api/csrf".to_owned())?;
        self.state()
            .csrf
            .clone()
            .map(CsrfToken::new)
            .ok_or_else(|| HubApiError::new(HubErrorKind::Server, "no session"))
    }

    async fn info(&self) -> Result<InfoResponse, HubApiError> {
        self.record("GET /api/info".to_owned())?;
        self.state()
            .info
            .clone()
            .ok_or_else(|| HubApiError::not_found("no info"))
    }

    async fn unlock(
        &self,
        csrf: &CsrfToken,
        req: &UnlockRequest,
    ) -> Result<Empty, HubApiError> {
        self.record_mutation("POST /api/unlock".to_owned(), csrf)?;
        if req.unlock_password.is_empty() {
            return Err(HubApiError::new(
                HubErrorKind::Unauthorized,
                "Invalid password",
            ));
        }
        if let Some(info) = self.state().info.as_mut() {
            info.unlocked = true;
            info.running = true;
        }
        Ok(Empty {})
    }

    async fn setup(
        &self,
        csrf: &CsrfToken,
        req: &SetupRequest,
    ) -> Result<Empty, HubApiError> {
        self.record_mutation("POST /api/setup".to_owned(), csrf)?;
        let mut state = self.state();
        let backend_type = req.backend_type.clone().unwrap_or(BackendType::Ldk);
        let mut new_info = info(backend_type, false);
        new_info.unlocked = false;
        state.info = Some(new_info);
        Ok(Empty {})
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, HubApiError> {
        self.record("GET /api/channels".to_owned())?;
        Ok(self.state().channels.clone())
    }

    async fn node_metadata(
        &self,
        pubkey: &str,
    ) -> Result<NodeMetadata, HubApiError> {
        let endpoint = format!("GET /api/mempool/lightning/nodes/{pubkey}");
        self.record(endpoint)?;

        let gate = self.state().node_gate.clone();
        if let Some(gate) = gate {
            // Closing the semaphore releases every waiter.
            let _ = gate.acquire().await;
        }

        let state = self.state();
        if state.failing_nodes.contains(pubkey) {
            return Err(HubApiError::new(
                HubErrorKind::Server,
                "mempool lookup failed",
            ));
        }
        state
            .nodes
            .get(pubkey)
            .cloned()
            .ok_or_else(|| HubApiError::not_found(pubkey))
    }

    async fn close_channel(
        &self,
        csrf: &CsrfToken,
        req: &CloseChannelRequest,
    ) -> Result<Empty, HubApiError> {
        self.record_mutation("POST /api/channels/close".to_owned(), csrf)?;
        let mut state = self.state();
        let before = state.channels.len();
        state.channels.retain(|c| {
            !(c.id == req.channel_id && c.remote_pubkey == req.node_id)
        });
        if state.channels.len() == before {
            return Err(HubApiError::new(
                HubErrorKind::Server,
                "Failed to close channel: channel not found",
            ));
        }
        Ok(Empty {})
    }

    async fn onchain_balance(&self) -> Result<OnchainBalance, HubApiError> {
        self.record("GET /api/wallet/balance".to_owned())?;
        Ok(self.state().balance)
    }

    async fn redeem_onchain_funds(
        &self,
        csrf: &CsrfToken,
    ) -> Result<RedeemOnchainFundsResponse, HubApiError> {
        let endpoint = "POST /api/wallet/redeem-onchain-funds".to_owned();
        self.record_mutation(endpoint, csrf)?;
        self.state().balance = OnchainBalance::default();
        Ok(RedeemOnchainFundsResponse {
            tx_id: "f00dbabe".to_owned(),
        })
    }

    async fn reset_router(
        &self,
        csrf: &CsrfToken,
    ) -> Result<Empty, HubApiError> {
        self.record_mutation("POST /api/reset-router".to_owned(), csrf)?;
        Ok(Empty {})
    }

    async fn stop(&self, csrf: &CsrfToken) -> Result<Empty, HubApiError> {
        self.record_mutation("POST /api/stop".to_owned(), csrf)?;
        if let Some(info) = self.state().info.as_mut() {
            info.running = false;
        }
        Ok(Empty {})
    }

    async fn list_apps(&self) -> Result<Vec<App>, HubApiError> {
        self.record("GET /api/apps".to_owned())?;
        Ok(self.state().apps.clone())
    }

    async fn get_app(&self, nostr_pubkey: &str) -> Result<App, HubApiError> {
        self.record(format!("GET /api/apps/{nostr_pubkey}"))?;
        self.state()
            .apps
            .iter()
            .find(|app| app.nostr_pubkey == nostr_pubkey)
            .cloned()
            .ok_or_else(|| HubApiError::not_found("App not found"))
    }

    async fn delete_app(
        &self,
        csrf: &CsrfToken,
        nostr_pubkey: &str,
    ) -> Result<Empty, HubApiError> {
        self.record_mutation(format!("DELETE /api/apps/{nostr_pubkey}"), csrf)?;
        let mut state = self.state();
        let before = state.apps.len();
        state.apps.retain(|app| app.nostr_pubkey != nostr_pubkey);
        if state.apps.len() == before {
            return Err(HubApiError::not_found("App not found"));
        }
        Ok(Empty {})
    }
}

// --- Confirm / Notify --- //

/// Answers prompts from a script, then declines everything.
#[derive(Default)]
pub struct ScriptedConfirm {
    answers: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<ConfirmPrompt>>,
}

impl ScriptedConfirm {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Agrees to everything.
    pub fn always_yes() -> Self {
        Self::new(std::iter::repeat_n(true, 64))
    }

    pub fn prompts(&self) -> Vec<ConfirmPrompt> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Confirm for ScriptedConfirm {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.clone());
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(false)
    }
}

/// Remembers every notification.
#[derive(Default)]
pub struct RecordingNotify {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotify {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.notifications().pop()
    }
}

impl Notify for RecordingNotify {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}
