//! The [`Console`]: cached Hub state plus the confirm-then-mutate actions.

use std::{
    any::Any,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use hub_api::{
    def::HubApi,
    error::HubApiError,
    models::{
        App, BackendType, Channel, CloseChannelRequest, InfoResponse,
        OnchainBalance, RedeemOnchainFundsResponse, SetupRequest,
        UnlockRequest,
    },
    types::CsrfToken,
};
use hub_client::csrf::CsrfStore;
use hub_std::fmt::DisplayPrefix;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    cache::{Cached, RequestCache, RequestKey},
    channels::{self, ChannelsView, NodeIndex},
    confirm::{Confirm, ConfirmPrompt, Notification, Notify},
    error::ConsoleError,
};

/// Shown in the close prompt when the peer's alias is unknown.
const UNKNOWN_NODE: &str = "Unknown Node";

// Error notification prefixes, by screen.
const CHANNELS_ERROR: &str = "Something went wrong";
const APP_ERROR: &str = "Failed to delete app";
const SETUP_ERROR: &str = "Failed to connect";

/// Whether a confirm-gated action went ahead.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActionOutcome {
    Completed,
    /// The user declined a confirmation; nothing was sent.
    Cancelled,
}

/// Node metadata and the channel list generation it was computed from.
#[derive(Default)]
struct NodesState {
    index: Arc<NodeIndex>,
    channels_generation: u64,
}

/// The console's view of one Hub.
///
/// Reads go through a [`RequestCache`]; mutating actions check the CSRF
/// token, ask for confirmation where needed, and invalidate whatever they
/// change. All user-facing outcomes are reported through [`Notify`].
///
/// The internal locks are never held across an `.await`.
pub struct Console<H, C, N> {
    hub: H,
    confirm: C,
    notify: N,
    csrf: CsrfStore,
    cache: Mutex<RequestCache>,
    nodes: Mutex<NodesState>,
}

impl<H: HubApi, C: Confirm, N: Notify> Console<H, C, N> {
    pub fn new(hub: H, confirm: C, notify: N, cache_max_age: Duration) -> Self {
        Self {
            hub,
            confirm,
            notify,
            csrf: CsrfStore::new(),
            cache: Mutex::new(RequestCache::new(cache_max_age)),
            nodes: Mutex::new(NodesState::default()),
        }
    }

    #[inline]
    pub fn hub(&self) -> &H {
        &self.hub
    }

    #[inline]
    pub fn csrf(&self) -> &CsrfStore {
        &self.csrf
    }

    fn cache(&self) -> MutexGuard<'_, RequestCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn nodes(&self) -> MutexGuard<'_, NodesState> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Reads --- //

    /// Fetch the CSRF token for this session.
    pub async fn load_csrf(&self) -> Result<Arc<CsrfToken>, ConsoleError> {
        Ok(self.csrf.refresh(&self.hub).await?)
    }

    /// Returns cached data for `key` if fresh, otherwise fetches it.
    async fn read<T, Fut>(
        &self,
        key: RequestKey,
        fetch: impl FnOnce() -> Fut,
    ) -> Result<Cached<T>, ConsoleError>
    where
        T: Any + Send + Sync,
        Fut: Future<Output = Result<T, HubApiError>>,
    {
        if let Some(cached) = self.cache().get_fresh::<T>(&key, Instant::now())
        {
            return Ok(cached);
        }

        match fetch().await {
            Ok(data) => {
                debug!(%key, "Fetched");
                Ok(self.cache().store(key, data, Instant::now()))
            }
            Err(e) => {
                warn!(%key, "Fetch failed: {e:#}");
                self.cache().record_error(key, e.clone());
                Err(ConsoleError::Api(e))
            }
        }
    }

    /// Invalidate `key` and fetch it again.
    async fn refetch<T, Fut>(
        &self,
        key: RequestKey,
        fetch: impl FnOnce() -> Fut,
    ) -> Result<Cached<T>, ConsoleError>
    where
        T: Any + Send + Sync,
        Fut: Future<Output = Result<T, HubApiError>>,
    {
        self.cache().invalidate(&key);
        self.read(key, fetch).await
    }

    pub async fn info(&self) -> Result<Arc<InfoResponse>, ConsoleError> {
        let cached = self.read(RequestKey::Info, || self.hub.info()).await?;
        Ok(cached.data)
    }

    pub async fn channels(&self) -> Result<Cached<Vec<Channel>>, ConsoleError> {
        self.read(RequestKey::Channels, || self.hub.list_channels())
            .await
    }

    pub async fn onchain_balance(
        &self,
    ) -> Result<Arc<OnchainBalance>, ConsoleError> {
        let cached = self
            .read(RequestKey::OnchainBalance, || self.hub.onchain_balance())
            .await?;
        Ok(cached.data)
    }

    pub async fn list_apps(&self) -> Result<Arc<Vec<App>>, ConsoleError> {
        let cached = self.read(RequestKey::Apps, || self.hub.list_apps()).await?;
        Ok(cached.data)
    }

    pub async fn app(&self, nostr_pubkey: &str) -> Result<Arc<App>, ConsoleError> {
        let key = RequestKey::App(nostr_pubkey.to_owned());
        let cached = self.read(key, || self.hub.get_app(nostr_pubkey)).await?;
        Ok(cached.data)
    }

    /// Invalidate and refetch the channel list, then resolve node metadata
    /// for the new list.
    pub async fn refresh_channels(
        &self,
    ) -> Result<Cached<Vec<Channel>>, ConsoleError> {
        let channels = self
            .refetch(RequestKey::Channels, || self.hub.list_channels())
            .await?;
        self.refresh_node_metadata().await;
        Ok(channels)
    }

    /// Resolve node metadata for the currently cached channel list.
    ///
    /// Returns `false` if there was no channel list, or if the channel list
    /// was refetched while the lookups were in flight. In the latter case
    /// the results are discarded; a later call picks up the new list.
    pub async fn refresh_node_metadata(&self) -> bool {
        let Some(channels) =
            self.cache().get::<Vec<Channel>>(&RequestKey::Channels)
        else {
            return false;
        };

        let index = channels::load_node_metadata(&self.hub, &channels.data).await;

        let current = self.cache().generation(&RequestKey::Channels);
        if current != channels.generation {
            debug!(
                batch = channels.generation,
                current, "Discarding node metadata for a stale channel list"
            );
            return false;
        }

        *self.nodes() = NodesState {
            index: Arc::new(index),
            channels_generation: channels.generation,
        };
        true
    }

    /// The node metadata currently used to label channel rows.
    pub fn node_index(&self) -> Arc<NodeIndex> {
        self.nodes().index.clone()
    }

    /// Fetch whatever the channels page needs that isn't fresh, then build
    /// the view. Node metadata is reloaded when the channel list changed.
    ///
    /// Failed requests are logged and show up as `None`s in the view.
    pub async fn load_channels_page(&self) -> ChannelsView {
        if !self.csrf.is_loaded()
            && let Err(e) = self.load_csrf().await
        {
            warn!("Couldn't load CSRF token: {e:#}");
        }

        let (_, channels, _) = futures::join!(
            self.info(),
            self.channels(),
            self.onchain_balance(),
        );

        if let Ok(channels) = channels {
            let stale = self.nodes().channels_generation != channels.generation;
            if stale {
                self.refresh_node_metadata().await;
            }
        }

        self.channels_view()
    }

    /// Build the channels page from what's cached right now, without any
    /// requests.
    pub fn channels_view(&self) -> ChannelsView {
        let (channels, balance, info) = {
            let cache = self.cache();
            (
                cache.get::<Vec<Channel>>(&RequestKey::Channels),
                cache.get::<OnchainBalance>(&RequestKey::OnchainBalance),
                cache.get::<InfoResponse>(&RequestKey::Info),
            )
        };
        let nodes = self.node_index();

        ChannelsView::build(
            channels.as_ref().map(|c| c.data.as_slice()),
            &nodes,
            balance.as_ref().map(|b| &*b.data),
            info.as_ref().map(|i| &*i.data),
        )
    }

    /// The last fetch error for `key`, if its latest fetch failed.
    pub fn last_error(&self, key: &RequestKey) -> Option<HubApiError> {
        self.cache().error(key).cloned()
    }

    // --- Actions --- //

    /// Report `error` under `context` and hand it back.
    fn fail(&self, context: &str, error: ConsoleError) -> ConsoleError {
        warn!("{context}: {error:#}");
        self.notify.notify(Notification::error(context, &error));
        error
    }

    fn require_csrf(
        &self,
        context: &str,
    ) -> Result<Arc<CsrfToken>, ConsoleError> {
        self.csrf
            .current()
            .ok_or_else(|| self.fail(context, ConsoleError::MissingCsrf))
    }

    /// Check the Hub runs one of `backends`, fetching info if needed.
    async fn require_backend(
        &self,
        context: &str,
        backends: &[BackendType],
    ) -> Result<(), ConsoleError> {
        let info = self.info().await.map_err(|e| self.fail(context, e))?;
        if backends.contains(&info.backend_type) {
            Ok(())
        } else {
            let backend = info.backend_type.to_string();
            Err(self.fail(context, ConsoleError::UnsupportedBackend { backend }))
        }
    }

    /// Close a channel after confirming with the user.
    ///
    /// Inactive channels get an extra warning first, since they may still be
    /// waiting on funding confirmations. On success the channel list is
    /// refetched; the previously cached list is left as it was.
    pub async fn close_channel(
        &self,
        channel_id: &str,
        node_id: &str,
        is_active: bool,
    ) -> Result<ActionOutcome, ConsoleError> {
        let csrf = self.require_csrf(CHANNELS_ERROR)?;

        if !is_active
            && !self.confirm.confirm(&ConfirmPrompt::InactiveChannel).await
        {
            return Ok(ActionOutcome::Cancelled);
        }

        let alias = self
            .node_index()
            .alias(node_id)
            .unwrap_or(UNKNOWN_NODE)
            .to_owned();
        let prompt = ConfirmPrompt::CloseChannel {
            alias,
            node_id: node_id.to_owned(),
            channel_id: channel_id.to_owned(),
        };
        if !self.confirm.confirm(&prompt).await {
            return Ok(ActionOutcome::Cancelled);
        }

        info!(node_id = %DisplayPrefix::<10>(node_id), "Closing channel");
        let req = CloseChannelRequest {
            channel_id: channel_id.to_owned(),
            node_id: node_id.to_owned(),
        };
        self.hub
            .close_channel(&csrf, &req)
            .await
            .map_err(|e| self.fail(CHANNELS_ERROR, e.into()))?;

        if let Err(e) = self.refresh_channels().await {
            warn!("Channel closed, but couldn't reload channels: {e:#}");
        }
        self.notify.notify(Notification::success("Channel closed"));
        Ok(ActionOutcome::Completed)
    }

    /// Reset the LDK router's scorer state.
    pub async fn reset_router(&self) -> Result<(), ConsoleError> {
        let csrf = self.require_csrf(CHANNELS_ERROR)?;
        self.require_backend(CHANNELS_ERROR, &[BackendType::Ldk])
            .await?;

        info!("Resetting router");
        self.hub
            .reset_router(&csrf)
            .await
            .map_err(|e| self.fail(CHANNELS_ERROR, e.into()))?;

        self.reload_info().await;
        self.notify.notify(Notification::success("Router reset"));
        Ok(())
    }

    /// Stop the LDK node. The Hub restarts it on the next unlock.
    pub async fn stop_node(&self) -> Result<(), ConsoleError> {
        let csrf = self.require_csrf(CHANNELS_ERROR)?;
        self.require_backend(CHANNELS_ERROR, &[BackendType::Ldk])
            .await?;

        info!("Stopping node");
        self.hub
            .stop(&csrf)
            .await
            .map_err(|e| self.fail(CHANNELS_ERROR, e.into()))?;

        self.reload_info().await;
        self.notify.notify(Notification::success("Node stopped"));
        Ok(())
    }

    /// Sweep the spendable on-chain balance out of the node's wallet.
    pub async fn redeem_onchain_funds(
        &self,
    ) -> Result<RedeemOnchainFundsResponse, ConsoleError> {
        let csrf = self.require_csrf(CHANNELS_ERROR)?;
        let backends = [BackendType::Ldk, BackendType::Greenlight];
        self.require_backend(CHANNELS_ERROR, &backends).await?;

        info!("Redeeming onchain funds");
        let resp = self
            .hub
            .redeem_onchain_funds(&csrf)
            .await
            .map_err(|e| self.fail(CHANNELS_ERROR, e.into()))?;

        let refetch = self
            .refetch(RequestKey::OnchainBalance, || self.hub.onchain_balance())
            .await;
        if let Err(e) = refetch {
            warn!("Funds redeemed, but couldn't reload balance: {e:#}");
        }
        let msg = format!("Onchain funds redeemed: {}", resp.tx_id);
        self.notify.notify(Notification::success(msg));
        Ok(resp)
    }

    /// Disconnect an app.
    pub async fn delete_app(
        &self,
        nostr_pubkey: &str,
    ) -> Result<(), ConsoleError> {
        let csrf = self.require_csrf(APP_ERROR)?;

        info!(app = %DisplayPrefix::<10>(nostr_pubkey), "Deleting app");
        self.hub
            .delete_app(&csrf, nostr_pubkey)
            .await
            .map_err(|e| self.fail(APP_ERROR, e.into()))?;

        {
            let mut cache = self.cache();
            cache.remove(&RequestKey::App(nostr_pubkey.to_owned()));
            cache.invalidate(&RequestKey::Apps);
        }
        self.notify.notify(Notification::success("App disconnected"));
        Ok(())
    }

    /// Unlock the node with the user's password.
    pub async fn unlock(&self, password: &str) -> Result<(), ConsoleError> {
        let csrf = self.require_csrf(SETUP_ERROR)?;

        let req = UnlockRequest {
            unlock_password: password.to_owned(),
        };
        self.hub
            .unlock(&csrf, &req)
            .await
            .map_err(|e| self.fail(SETUP_ERROR, e.into()))?;

        info!("Unlocked");
        self.reload_info().await;
        Ok(())
    }

    /// Submit the initial backend setup.
    pub async fn setup(&self, req: &SetupRequest) -> Result<(), ConsoleError> {
        if !is_setup_complete(req) {
            let error = ConsoleError::IncompleteSetup;
            self.notify.notify(Notification::Error(error.to_string()));
            return Err(error);
        }
        let csrf = self.require_csrf(SETUP_ERROR)?;

        self.hub
            .setup(&csrf, req)
            .await
            .map_err(|e| self.fail(SETUP_ERROR, e.into()))?;

        info!(backend = ?req.backend_type, "Setup complete");
        self.reload_info().await;
        Ok(())
    }

    async fn reload_info(&self) {
        if let Err(e) = self.refetch(RequestKey::Info, || self.hub.info()).await
        {
            warn!("Couldn't reload node info: {e:#}");
        }
    }
}

fn is_filled(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Whether `req` has every field its backend needs.
fn is_setup_complete(req: &SetupRequest) -> bool {
    match &req.backend_type {
        None => false,
        Some(BackendType::Breez) =>
            is_filled(&req.greenlight_invite_code)
                && is_filled(&req.breez_mnemonic),
        Some(BackendType::Lnd) =>
            is_filled(&req.lnd_address)
                && is_filled(&req.lnd_cert_hex)
                && is_filled(&req.lnd_macaroon_hex),
        Some(_) => true,
    }
}
