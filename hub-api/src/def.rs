//! # API Definitions
//!
//! Defines the HTTP API exposed by the Hub to its admin console. Every
//! endpoint is documented with:
//! - 1) HTTP method e.g. `POST`
//! - 2) Endpoint e.g. `/api/channels/close`
//! - 3) Data used to make the request e.g. [`CloseChannelRequest`]
//! - 4) The return type e.g. [`Empty`]
//!
//! Mutating endpoints are guarded by the Hub's CSRF middleware and take the
//! token fetched from `GET /api/csrf` as an explicit argument.
//!
//! If an API method takes or returns nothing, the type is [`Empty`] and NOT
//! `()`, so that fields can be added later in a backwards-compatible way.

#![deny(missing_docs)]
// We don't export our traits currently so auto trait stability is not relevant.
#![allow(async_fn_in_trait)]

use crate::{
    error::HubApiError,
    models::{
        App, Channel, CloseChannelRequest, InfoResponse, NodeMetadata,
        OnchainBalance, RedeemOnchainFundsResponse, SetupRequest,
        UnlockRequest,
    },
    types::{CsrfToken, Empty},
};

/// The admin API the Hub exposes to the console.
pub trait HubApi {
    // --- Session --- //

    /// GET /api/csrf [`Empty`] -> [`CsrfToken`]
    async fn csrf(&self) -> Result<CsrfToken, HubApiError>;

    /// GET /api/info [`Empty`] -> [`InfoResponse`]
    async fn info(&self) -> Result<InfoResponse, HubApiError>;

    /// POST /api/unlock [`UnlockRequest`] -> [`Empty`]
    async fn unlock(
        &self,
        csrf: &CsrfToken,
        req: &UnlockRequest,
    ) -> Result<Empty, HubApiError>;

    /// POST /api/setup [`SetupRequest`] -> [`Empty`]
    async fn setup(
        &self,
        csrf: &CsrfToken,
        req: &SetupRequest,
    ) -> Result<Empty, HubApiError>;

    // --- Channels --- //

    /// GET /api/channels [`Empty`] -> [`Vec<Channel>`]
    async fn list_channels(&self) -> Result<Vec<Channel>, HubApiError>;

    /// GET /api/mempool/lightning/nodes/:pubkey [`Empty`] -> [`NodeMetadata`]
    async fn node_metadata(
        &self,
        pubkey: &str,
    ) -> Result<NodeMetadata, HubApiError>;

    /// POST /api/channels/close [`CloseChannelRequest`] -> [`Empty`]
    async fn close_channel(
        &self,
        csrf: &CsrfToken,
        req: &CloseChannelRequest,
    ) -> Result<Empty, HubApiError>;

    // --- Wallet --- //

    /// GET /api/wallet/balance [`Empty`] -> [`OnchainBalance`]
    async fn onchain_balance(&self) -> Result<OnchainBalance, HubApiError>;

    /// POST /api/wallet/redeem-onchain-funds [`Empty`]
    ///                                       -> [`RedeemOnchainFundsResponse`]
    async fn redeem_onchain_funds(
        &self,
        csrf: &CsrfToken,
    ) -> Result<RedeemOnchainFundsResponse, HubApiError>;

    // --- Node --- //

    /// POST /api/reset-router [`Empty`] -> [`Empty`]
    async fn reset_router(
        &self,
        csrf: &CsrfToken,
    ) -> Result<Empty, HubApiError>;

    /// POST /api/stop [`Empty`] -> [`Empty`]
    async fn stop(&self, csrf: &CsrfToken) -> Result<Empty, HubApiError>;

    // --- Apps --- //

    /// GET /api/apps [`Empty`] -> [`Vec<App>`]
    async fn list_apps(&self) -> Result<Vec<App>, HubApiError>;

    /// GET /api/apps/:pubkey [`Empty`] -> [`App`]
    async fn get_app(&self, nostr_pubkey: &str) -> Result<App, HubApiError>;

    /// DELETE /api/apps/:pubkey [`Empty`] -> [`Empty`]
    async fn delete_app(
        &self,
        csrf: &CsrfToken,
        nostr_pubkey: &str,
    ) -> Result<Empty, HubApiError>;
}
