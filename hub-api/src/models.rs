//! JSON request and response models for the Hub API.
//!
//! Field names follow the Hub's wire format (camelCase), except for
//! [`NodeMetadata`], which is proxied verbatim from mempool.space and uses
//! snake_case.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Channels --- //

/// A Lightning channel with a remote peer. Balances are in millisatoshis.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub remote_pubkey: String,
    pub local_balance: u64,
    pub remote_balance: u64,
    pub active: bool,
    pub public: bool,
}

impl Channel {
    /// Total channel capacity in msats.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.local_balance.saturating_add(self.remote_balance)
    }
}

/// POST /api/channels/close
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseChannelRequest {
    pub channel_id: String,
    pub node_id: String,
}

// --- Node metadata --- //

/// Public alias and identity information for a Lightning node.
///
/// Only `public_key` is guaranteed; everything else is best-effort data from
/// the mempool.space node stats API.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub public_key: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub active_channel_count: u32,
    #[serde(default)]
    pub sockets: String,
}

// --- Balances --- //

/// The wallet's base-layer balance, in satoshis.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OnchainBalance {
    pub spendable: u64,
    pub total: u64,
}

impl OnchainBalance {
    /// Funds still waiting for confirmation, in sats.
    #[inline]
    pub fn incoming(&self) -> u64 {
        self.total.saturating_sub(self.spendable)
    }
}

/// POST /api/wallet/redeem-onchain-funds
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemOnchainFundsResponse {
    pub tx_id: String,
}

// --- Info --- //

/// The Lightning backend the Hub is running against.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BackendType {
    Lnd,
    Breez,
    Greenlight,
    Ldk,
    /// A backend this version of the console doesn't know about.
    Other(String),
}

impl BackendType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Lnd => "LND",
            Self::Breez => "BREEZ",
            Self::Greenlight => "GREENLIGHT",
            Self::Ldk => "LDK",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for BackendType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "LND" => Self::Lnd,
            "BREEZ" => Self::Breez,
            "GREENLIGHT" => Self::Greenlight,
            "LDK" => Self::Ldk,
            _ => Self::Other(s),
        }
    }
}

impl From<BackendType> for String {
    fn from(backend: BackendType) -> Self {
        match backend {
            BackendType::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GET /api/info
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub backend_type: BackendType,
    pub setup_completed: bool,
    pub running: bool,
    pub unlocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alby_auth_url: Option<String>,
    #[serde(default)]
    pub show_backup_reminder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alby_user_identifier: Option<String>,
}

// --- Apps --- //

/// A connected application.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nostr_pubkey: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_event_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub request_methods: Vec<String>,
    #[serde(default)]
    pub max_amount: u64,
    #[serde(default)]
    pub budget_usage: u64,
    #[serde(default)]
    pub budget_renewal: String,
}

// --- Session / setup --- //

/// POST /api/unlock
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockRequest {
    pub unlock_password: String,
}

impl fmt::Debug for UnlockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockRequest").finish_non_exhaustive()
    }
}

/// POST /api/setup
///
/// Only the fields relevant to the chosen `backend_type` need to be set.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<BackendType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breez_mnemonic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breez_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greenlight_invite_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lnd_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lnd_cert_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lnd_macaroon_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_password: Option<String>,
}

impl fmt::Debug for SetupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupRequest")
            .field("backend_type", &self.backend_type)
            .field("lnd_address", &self.lnd_address)
            .finish_non_exhaustive()
    }
}

// --- Strategies --- //

#[cfg(any(test, feature = "test-utils"))]
pub mod arbitrary {
    use proptest::{
        arbitrary::any,
        prelude::Just,
        prop_oneof,
        strategy::{BoxedStrategy, Strategy},
    };

    use super::*;

    /// A 66 hex char compressed pubkey-looking string. Drawn from a small set
    /// so that channel lists frequently share peers.
    pub fn any_pubkey() -> BoxedStrategy<String> {
        (0_u8..4)
            .prop_map(|idx| format!("02{}{idx:02x}", "ab".repeat(31)))
            .boxed()
    }

    /// Balances up to ~21M BTC in msats, with zero well represented.
    pub fn any_balance_msat() -> BoxedStrategy<u64> {
        prop_oneof![
            1 => Just(0_u64),
            4 => 0_u64..1_000_000_000,
            1 => any::<u64>().prop_map(|x| x % 2_100_000_000_000_000_000),
        ]
        .boxed()
    }

    pub fn any_channel() -> BoxedStrategy<Channel> {
        (
            any::<u32>(),
            any_pubkey(),
            any_balance_msat(),
            any_balance_msat(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(
                |(id, remote_pubkey, local, remote, active, public)| Channel {
                    id: format!("{id:08x}"),
                    remote_pubkey,
                    local_balance: local,
                    remote_balance: remote,
                    active,
                    public,
                },
            )
            .boxed()
    }
}
