//! The [`HubClient`], which implements [`HubApi`] over HTTP.

use std::{borrow::Cow, sync::Arc, time::Duration};

use hub_api::{
    def::HubApi,
    error::{ErrorCode, HubApiError, HubErrorKind},
    models::{
        App, Channel, CloseChannelRequest, InfoResponse, NodeMetadata,
        OnchainBalance, RedeemOnchainFundsResponse, SetupRequest,
        UnlockRequest,
    },
    rest::{RequestBuilderExt, RestClient},
    types::{CsrfToken, Empty},
};
use serde::de::DeserializeOwned;

/// Read requests failing with these codes are never retried; the answer
/// won't change on a second attempt.
const READ_STOP_CODES: &[ErrorCode] = &[
    HubErrorKind::Building.to_code(),
    HubErrorKind::BadRequest.to_code(),
    HubErrorKind::Unauthorized.to_code(),
    HubErrorKind::Forbidden.to_code(),
    HubErrorKind::NotFound.to_code(),
];

/// The client to a single Hub instance.
///
/// Cheaply cloneable; all clones share one connection pool and cookie store,
/// and therefore one Hub session.
#[derive(Clone)]
pub struct HubClient {
    inner: Arc<HubClientInner>,
}

struct HubClientInner {
    rest: RestClient,
    /// The Hub base url without a trailing slash, e.g. `http://localhost:8080`
    hub_url: Cow<'static, str>,
    /// How many times idempotent reads are retried.
    read_retries: usize,
}

impl HubClient {
    pub fn new(
        hub_url: impl Into<Cow<'static, str>>,
        user_agent: impl Into<Cow<'static, str>>,
        timeout: Duration,
        read_retries: usize,
    ) -> anyhow::Result<Self> {
        let rest = RestClient::new(user_agent, "hub", timeout)?;
        Ok(Self::from_rest(rest, hub_url, read_retries))
    }

    /// Build a [`HubClient`] around an existing [`RestClient`].
    pub fn from_rest(
        rest: RestClient,
        hub_url: impl Into<Cow<'static, str>>,
        read_retries: usize,
    ) -> Self {
        let hub_url = normalize_base_url(hub_url.into());
        let inner = HubClientInner {
            rest,
            hub_url,
            read_retries,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    #[inline]
    pub fn hub_url(&self) -> &str {
        &self.inner.hub_url
    }

    fn url(&self, path: &str) -> String {
        let hub_url = &self.inner.hub_url;
        format!("{hub_url}{path}")
    }

    async fn read<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, HubApiError> {
        let rest = &self.inner.rest;
        let req = rest.get(self.url(path));
        rest.send_with_retries(req, self.inner.read_retries, READ_STOP_CODES)
            .await
    }
}

fn normalize_base_url(url: Cow<'static, str>) -> Cow<'static, str> {
    match url.strip_suffix('/') {
        Some(trimmed) => Cow::Owned(trimmed.trim_end_matches('/').to_owned()),
        None => url,
    }
}

impl HubApi for HubClient {
    async fn csrf(&self) -> Result<CsrfToken, HubApiError> {
        self.read("/api/csrf").await
    }

    async fn info(&self) -> Result<InfoResponse, HubApiError> {
        self.read("/api/info").await
    }

    async fn unlock(
        &self,
        csrf: &CsrfToken,
        req: &UnlockRequest,
    ) -> Result<Empty, HubApiError> {
        let rest = &self.inner.rest;
        let req = rest.post(self.url("/api/unlock"), req).csrf(csrf)?;
        rest.send(req).await
    }

    async fn setup(
        &self,
        csrf: &CsrfToken,
        req: &SetupRequest,
    ) -> Result<Empty, HubApiError> {
        let rest = &self.inner.rest;
        let req = rest.post(self.url("/api/setup"), req).csrf(csrf)?;
        rest.send(req).await
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, HubApiError> {
        self.read("/api/channels").await
    }

    async fn node_metadata(
        &self,
        pubkey: &str,
    ) -> Result<NodeMetadata, HubApiError> {
        if !is_url_safe_id(pubkey) {
            return Err(HubApiError::building(format!(
                "Invalid node pubkey: '{pubkey}'"
            )));
        }
        self.read(&format!("/api/mempool/lightning/nodes/{pubkey}"))
            .await
    }

    async fn close_channel(
        &self,
        csrf: &CsrfToken,
        req: &CloseChannelRequest,
    ) -> Result<Empty, HubApiError> {
        let rest = &self.inner.rest;
        let req = rest
            .post(self.url("/api/channels/close"), req)
            .csrf(csrf)?;
        rest.send(req).await
    }

    async fn onchain_balance(&self) -> Result<OnchainBalance, HubApiError> {
        self.read("/api/wallet/balance").await
    }

    async fn redeem_onchain_funds(
        &self,
        csrf: &CsrfToken,
    ) -> Result<RedeemOnchainFundsResponse, HubApiError> {
        let rest = &self.inner.rest;
        let req = rest
            .post_empty(self.url("/api/wallet/redeem-onchain-funds"))
            .csrf(csrf)?;
        rest.send(req).await
    }

    async fn reset_router(
        &self,
        csrf: &CsrfToken,
    ) -> Result<Empty, HubApiError> {
        let rest = &self.inner.rest;
        let req = rest.post_empty(self.url("/api/reset-router")).csrf(csrf)?;
        rest.send(req).await
    }

    async fn stop(&self, csrf: &CsrfToken) -> Result<Empty, HubApiError> {
        let rest = &self.inner.rest;
        let req = rest.post_empty(self.url("/api/stop")).csrf(csrf)?;
        rest.send(req).await
    }

    async fn list_apps(&self) -> Result<Vec<App>, HubApiError> {
        self.read("/api/apps").await
    }

    async fn get_app(&self, nostr_pubkey: &str) -> Result<App, HubApiError> {
        if !is_url_safe_id(nostr_pubkey) {
            return Err(HubApiError::building(format!(
                "Invalid app pubkey: '{nostr_pubkey}'"
            )));
        }
        self.read(&format!("/api/apps/{nostr_pubkey}")).await
    }

    async fn delete_app(
        &self,
        csrf: &CsrfToken,
        nostr_pubkey: &str,
    ) -> Result<Empty, HubApiError> {
        if !is_url_safe_id(nostr_pubkey) {
            return Err(HubApiError::building(format!(
                "Invalid app pubkey: '{nostr_pubkey}'"
            )));
        }
        let rest = &self.inner.rest;
        let url = self.url(&format!("/api/apps/{nostr_pubkey}"));
        let req = rest.delete(url).csrf(csrf)?;
        rest.send(req).await
    }
}

/// Pubkeys are interpolated into url paths, so they must be a single
/// non-empty path segment.
fn is_url_safe_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod test {
    use super::*;

    fn client(url: &'static str) -> HubClient {
        HubClient::new(url, "console-test", Duration::from_secs(1), 0).unwrap()
    }

    #[test]
    fn base_url_is_normalized() {
        let client1 = client("http://localhost:8080/");
        assert_eq!(client1.hub_url(), "http://localhost:8080");
        assert_eq!(
            client1.url("/api/channels"),
            "http://localhost:8080/api/channels"
        );

        let client2 = client("https://hub.example.com//");
        assert_eq!(client2.hub_url(), "https://hub.example.com");

        let client3 = client("http://127.0.0.1:8080");
        assert_eq!(client3.hub_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn pubkey_path_segments() {
        assert!(is_url_safe_id("02abcdef0123"));
        assert!(!is_url_safe_id(""));
        assert!(!is_url_safe_id("../info"));
        assert!(!is_url_safe_id("02ab?x=1"));
    }

    #[tokio::test]
    async fn bad_pubkey_never_hits_the_network() {
        // Nothing listens on this port; a network attempt would surface as a
        // `Connect` error instead.
        let client = client("http://127.0.0.1:9");
        let err = client.node_metadata("../../info").await.unwrap_err();
        assert_eq!(err.kind, HubErrorKind::Building);

        let csrf = CsrfToken::new("token");
        let err = client.delete_app(&csrf, "").await.unwrap_err();
        assert_eq!(err.kind, HubErrorKind::Building);
    }

    #[test]
    fn read_stop_codes() {
        assert!(READ_STOP_CODES.contains(&404));
        assert!(!READ_STOP_CODES.contains(&503));
        assert!(!READ_STOP_CODES.contains(&HubErrorKind::Connect.to_code()));
    }
}
