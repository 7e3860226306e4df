//! The channel view aggregator.
//!
//! Joins the channel list with per-peer node metadata and the on-chain
//! balance into the rows and summary shown on the channels page. Everything
//! here except [`load_node_metadata`] is pure.

use std::collections::{BTreeSet, HashMap};

use futures::{StreamExt, stream::FuturesUnordered};
use hub_api::{
    def::HubApi,
    models::{BackendType, Channel, InfoResponse, NodeMetadata, OnchainBalance},
};
use hub_std::fmt::DisplayPrefix;
use tracing::{debug, warn};

use crate::amount::format_sats;

/// Shown for peers whose metadata couldn't be resolved.
pub const UNKNOWN_ALIAS: &str = "Unknown";

/// Pubkey chars shown in a row's peer label.
const PEER_PREFIX_LEN: usize = 10;

/// Node metadata keyed by node pubkey.
#[derive(Clone, Debug, Default)]
pub struct NodeIndex(HashMap<String, NodeMetadata>);

impl NodeIndex {
    pub fn get(&self, pubkey: &str) -> Option<&NodeMetadata> {
        self.0.get(pubkey)
    }

    /// The peer's alias, if we know one.
    pub fn alias(&self, pubkey: &str) -> Option<&str> {
        self.get(pubkey)
            .map(|node| node.alias.as_str())
            .filter(|alias| !alias.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, pubkey: &str) -> bool {
        self.0.contains_key(pubkey)
    }
}

impl FromIterator<NodeMetadata> for NodeIndex {
    fn from_iter<I: IntoIterator<Item = NodeMetadata>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|node| (node.public_key.clone(), node))
                .collect(),
        )
    }
}

/// Look up metadata for every distinct peer in `channels`.
///
/// Lookups run concurrently, one per distinct pubkey. A failed lookup is
/// logged and leaves that peer out of the result; it never fails the batch.
pub async fn load_node_metadata(
    hub: &impl HubApi,
    channels: &[Channel],
) -> NodeIndex {
    let pubkeys = channels
        .iter()
        .map(|channel| channel.remote_pubkey.as_str())
        .collect::<BTreeSet<_>>();

    let mut lookups = pubkeys
        .into_iter()
        .map(|pubkey| async move { (pubkey, hub.node_metadata(pubkey).await) })
        .collect::<FuturesUnordered<_>>();

    let mut nodes = Vec::with_capacity(lookups.len());
    while let Some((pubkey, result)) = lookups.next().await {
        match result {
            Ok(mut node) => {
                // The row join is on the pubkey we asked about.
                if node.public_key.is_empty() {
                    node.public_key = pubkey.to_owned();
                }
                nodes.push(node);
            }
            Err(e) => {
                let pubkey = DisplayPrefix::<10>(pubkey);
                warn!(%pubkey, "Node metadata lookup failed: {e:#}");
            }
        }
    }

    debug!("Resolved metadata for {} nodes", nodes.len());
    nodes.into_iter().collect()
}

/// The sum of local balances in msats, or `None` while the channel list is
/// still loading.
pub fn compute_lightning_balance(channels: Option<&[Channel]>) -> Option<u64> {
    channels.map(|channels| {
        channels
            .iter()
            .map(|channel| channel.local_balance)
            .fold(0_u64, u64::saturating_add)
    })
}

/// One row of the channels table.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelRow {
    pub channel: Channel,
    /// The peer's metadata, if it resolved.
    pub node: Option<NodeMetadata>,
    /// The peer's alias, or [`UNKNOWN_ALIAS`].
    pub alias: String,
    /// Local plus remote balance, in msats.
    pub capacity: u64,
    /// `None` for a zero-capacity channel.
    pub local_percentage: Option<f64>,
    /// `None` for a zero-capacity channel.
    pub remote_percentage: Option<f64>,
}

impl ChannelRow {
    /// Width of the local side of the balance bar, in percent.
    pub fn local_bar_width(&self) -> f64 {
        self.local_percentage.unwrap_or(0.0)
    }

    /// Width of the remote side of the balance bar, in percent.
    pub fn remote_bar_width(&self) -> f64 {
        self.remote_percentage.unwrap_or(0.0)
    }

    /// e.g. "ACINQ (03864ef025...)". The ellipsis is always shown.
    pub fn peer_label(&self) -> String {
        let pubkey = &self.channel.remote_pubkey;
        let end = pubkey
            .char_indices()
            .nth(PEER_PREFIX_LEN)
            .map_or(pubkey.len(), |(idx, _)| idx);
        format!("{} ({}...)", self.alias, &pubkey[..end])
    }

    /// Our side of the channel, e.g. "1.5k sats".
    pub fn local_display(&self) -> String {
        format_sats(self.channel.local_balance)
    }

    /// The peer's side of the channel.
    pub fn remote_display(&self) -> String {
        format_sats(self.channel.remote_balance)
    }

    pub fn visibility(&self) -> &'static str {
        if self.channel.public {
            "Public"
        } else {
            "Private"
        }
    }

    /// A public explorer page for the peer.
    pub fn explorer_url(&self) -> String {
        let pubkey = &self.channel.remote_pubkey;
        format!("https://amboss.space/node/{pubkey}")
    }
}

/// Build the table row for `channel`.
pub fn build_row(channel: &Channel, nodes: &NodeIndex) -> ChannelRow {
    let node = nodes.get(&channel.remote_pubkey).cloned();
    let alias = nodes
        .alias(&channel.remote_pubkey)
        .unwrap_or(UNKNOWN_ALIAS)
        .to_owned();

    let capacity = channel.capacity();
    let percentage = |part: u64| {
        (capacity > 0).then(|| part as f64 / capacity as f64 * 100.0)
    };
    let local_percentage = percentage(channel.local_balance);
    let remote_percentage = percentage(channel.remote_balance);

    ChannelRow {
        channel: channel.clone(),
        node,
        alias,
        capacity,
        local_percentage,
        remote_percentage,
    }
}

/// The on-chain balance card.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnchainSummary {
    pub balance: OnchainBalance,
    /// e.g. "12.5k sats"
    pub spendable_display: String,
    /// Unconfirmed sats, if any, e.g. "(2000 incoming)".
    pub incoming_display: Option<String>,
}

impl OnchainSummary {
    pub fn new(balance: OnchainBalance) -> Self {
        let spendable_display =
            format_sats(balance.spendable.saturating_mul(1000));
        let incoming_display = (balance.spendable != balance.total)
            .then(|| format!("({} incoming)", balance.incoming()));
        Self {
            balance,
            spendable_display,
            incoming_display,
        }
    }
}

/// Which channels page menu entries apply to this Hub.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MenuCapabilities {
    /// "Redeem Onchain Funds"
    pub redeem_onchain_funds: bool,
    /// "Node Management": reset router and restart.
    pub node_management: bool,
}

impl MenuCapabilities {
    pub fn new(
        info: Option<&InfoResponse>,
        balance: Option<&OnchainBalance>,
    ) -> Self {
        let backend = info.map(|info| &info.backend_type);
        let spendable = balance.map(|b| b.spendable).unwrap_or(0);

        let redeem_onchain_funds = matches!(
            backend,
            Some(BackendType::Ldk | BackendType::Greenlight)
        ) && spendable > 0;
        let node_management = backend == Some(&BackendType::Ldk);

        Self {
            redeem_onchain_funds,
            node_management,
        }
    }
}

/// Everything the channels page renders. `None` fields are still loading
/// (or failed to load).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelsView {
    pub channel_count: Option<usize>,
    /// Sum of local balances, in msats.
    pub lightning_balance: Option<u64>,
    pub onchain: Option<OnchainSummary>,
    /// Empty while the channel list is loading.
    pub rows: Vec<ChannelRow>,
    pub menu: MenuCapabilities,
    /// `Some(false)` means the node is stopped and the page should be left.
    pub node_running: Option<bool>,
}

impl ChannelsView {
    pub fn build(
        channels: Option<&[Channel]>,
        nodes: &NodeIndex,
        balance: Option<&OnchainBalance>,
        info: Option<&InfoResponse>,
    ) -> Self {
        let rows = channels
            .unwrap_or_default()
            .iter()
            .map(|channel| build_row(channel, nodes))
            .collect();

        Self {
            channel_count: channels.map(<[Channel]>::len),
            lightning_balance: compute_lightning_balance(channels),
            onchain: balance.copied().map(OnchainSummary::new),
            rows,
            menu: MenuCapabilities::new(info, balance),
            node_running: info.map(|info| info.running),
        }
    }

    /// e.g. "1.5M sats"
    pub fn lightning_balance_display(&self) -> Option<String> {
        self.lightning_balance.map(format_sats)
    }

    pub fn is_loading(&self) -> bool {
        self.channel_count.is_none()
    }
}

#[cfg(test)]
mod test {
    use hub_api::models::arbitrary::any_channel;
    use proptest::{collection::vec, prop_assert, prop_assert_eq, proptest};

    use super::*;
    use crate::test_utils::{MockHub, channel, info, node};

    #[test]
    fn row_without_metadata_is_unknown() {
        let chan = channel("c1", "02aa", 1_500_000, 500_000, true);
        let row = build_row(&chan, &NodeIndex::default());
        assert_eq!(row.alias, UNKNOWN_ALIAS);
        assert!(row.node.is_none());
        assert_eq!(row.capacity, 2_000_000);
        assert_eq!(row.local_percentage, Some(75.0));
        assert_eq!(row.remote_percentage, Some(25.0));
        assert_eq!(row.visibility(), "Public");
        assert_eq!(row.local_display(), "1.5k sats");
        assert_eq!(row.remote_display(), "500 sats");
    }

    #[test]
    fn peer_label_truncates_pubkey() {
        let pubkey = format!("03864ef025{}", "de".repeat(28));
        let nodes = NodeIndex::from_iter([node(&pubkey, "ACINQ")]);
        let row = build_row(&channel("c1", &pubkey, 1, 1, true), &nodes);
        assert_eq!(row.peer_label(), "ACINQ (03864ef025...)");
    }

    #[test]
    fn row_joins_metadata_by_pubkey() {
        let nodes = [node("02aa", "ACINQ"), node("02bb", "")]
            .into_iter()
            .collect::<NodeIndex>();

        let row = build_row(&channel("c1", "02aa", 1, 1, true), &nodes);
        assert_eq!(row.alias, "ACINQ");
        assert_eq!(row.peer_label(), "ACINQ (02aa...)");

        // Resolved but blank alias still falls back.
        let row = build_row(&channel("c2", "02bb", 1, 1, true), &nodes);
        assert_eq!(row.alias, UNKNOWN_ALIAS);
        assert!(row.node.is_some());
    }

    #[test]
    fn zero_capacity_has_no_percentages() {
        let chan = channel("c1", "02aa", 0, 0, false);
        let row = build_row(&chan, &NodeIndex::default());
        assert_eq!(row.capacity, 0);
        assert_eq!(row.local_percentage, None);
        assert_eq!(row.remote_percentage, None);
        assert_eq!(row.local_bar_width(), 0.0);
        assert_eq!(row.remote_bar_width(), 0.0);
    }

    #[test]
    fn lightning_balance() {
        assert_eq!(compute_lightning_balance(None), None);
        assert_eq!(compute_lightning_balance(Some(&[][..])), Some(0));

        let channels = [
            channel("c1", "02aa", 1_000, 5, true),
            channel("c2", "02bb", 2_000, 5, false),
        ];
        assert_eq!(compute_lightning_balance(Some(&channels[..])), Some(3_000));
    }

    #[test]
    fn row_percentages_are_well_formed() {
        proptest!(|(chan in any_channel())| {
            let row = build_row(&chan, &NodeIndex::default());
            let total = row.local_bar_width() + row.remote_bar_width();
            prop_assert!(!total.is_nan());
            if row.capacity == 0 {
                prop_assert_eq!(total, 0.0);
            } else {
                prop_assert!((total - 100.0).abs() < 1e-6);
                prop_assert!(row.local_bar_width() >= 0.0);
                prop_assert!(row.remote_bar_width() >= 0.0);
            }
        });
    }

    #[test]
    fn view_tracks_row_count() {
        proptest!(|(channels in vec(any_channel(), 0..16))| {
            let view = ChannelsView::build(
                Some(channels.as_slice()),
                &NodeIndex::default(),
                None,
                None,
            );
            prop_assert_eq!(view.rows.len(), channels.len());
            prop_assert_eq!(view.channel_count, Some(channels.len()));
            for (row, chan) in view.rows.iter().zip(&channels) {
                prop_assert_eq!(&row.channel.id, &chan.id);
            }
        });
    }

    #[test]
    fn onchain_summary() {
        let settled = OnchainSummary::new(OnchainBalance {
            spendable: 12_500,
            total: 12_500,
        });
        assert_eq!(settled.spendable_display, "12.5k sats");
        assert_eq!(settled.incoming_display, None);

        let pending = OnchainSummary::new(OnchainBalance {
            spendable: 500,
            total: 2_500,
        });
        assert_eq!(pending.spendable_display, "500 sats");
        assert_eq!(pending.incoming_display.as_deref(), Some("(2000 incoming)"));
    }

    #[test]
    fn menu_capabilities() {
        let funded = OnchainBalance {
            spendable: 1,
            total: 1,
        };
        let empty = OnchainBalance::default();

        let ldk = info(BackendType::Ldk, true);
        let menu = MenuCapabilities::new(Some(&ldk), Some(&funded));
        assert!(menu.redeem_onchain_funds && menu.node_management);
        let menu = MenuCapabilities::new(Some(&ldk), Some(&empty));
        assert!(!menu.redeem_onchain_funds && menu.node_management);

        let greenlight = info(BackendType::Greenlight, true);
        let menu = MenuCapabilities::new(Some(&greenlight), Some(&funded));
        assert!(menu.redeem_onchain_funds && !menu.node_management);

        let lnd = info(BackendType::Lnd, true);
        let menu = MenuCapabilities::new(Some(&lnd), Some(&funded));
        assert_eq!(menu, MenuCapabilities::default());

        assert_eq!(MenuCapabilities::new(None, None), Default::default());
    }

    #[test]
    fn loading_view() {
        let view = ChannelsView::build(None, &NodeIndex::default(), None, None);
        assert!(view.is_loading());
        assert_eq!(view.lightning_balance, None);
        assert_eq!(view.lightning_balance_display(), None);
        assert!(view.rows.is_empty());
        assert_eq!(view.node_running, None);

        let stopped = info(BackendType::Ldk, false);
        let view = ChannelsView::build(
            Some(&[][..]),
            &NodeIndex::default(),
            None,
            Some(&stopped),
        );
        assert_eq!(view.node_running, Some(false));
        assert_eq!(view.lightning_balance_display().as_deref(), Some("0 sats"));
    }

    #[tokio::test]
    async fn one_lookup_per_distinct_peer() {
        let hub = MockHub::new();
        hub.add_node(node("02aa", "A"));
        hub.add_node(node("02cc", "C"));
        hub.fail_node("02bb");

        let channels = [
            channel("c1", "02aa", 1, 1, true),
            channel("c2", "02bb", 1, 1, true),
            channel("c3", "02aa", 1, 1, true),
            channel("c4", "02cc", 1, 1, true),
        ];
        let nodes = load_node_metadata(&hub, &channels).await;

        // B's failure is contained; A and C resolve.
        assert_eq!(nodes.len(), 2);
        assert!(nodes.contains("02aa") && nodes.contains("02cc"));
        assert!(!nodes.contains("02bb"));

        let mut lookups = hub.node_lookups();
        lookups.sort();
        assert_eq!(lookups, ["02aa", "02bb", "02cc"]);
    }

    #[tokio::test]
    async fn lookups_run_concurrently() {
        let hub = MockHub::new();
        hub.add_node(node("02aa", "A"));
        hub.add_node(node("02cc", "C"));
        hub.fail_node("02bb");
        let channels = [
            channel("c1", "02aa", 1, 1, true),
            channel("c2", "02bb", 1, 1, true),
            channel("c3", "02cc", 1, 1, true),
        ];

        // Every lookup is in flight before any of them can finish.
        let gate = hub.pause_node_lookups();
        let (nodes, in_flight) =
            tokio::join!(load_node_metadata(&hub, &channels), async {
                tokio::task::yield_now().await;
                let in_flight = hub.node_lookups().len();
                gate.close();
                in_flight
            });
        assert_eq!(in_flight, 3);

        assert_eq!(nodes.alias("02aa"), Some("A"));
        assert_eq!(nodes.alias("02cc"), Some("C"));
        assert!(!nodes.contains("02bb"));
    }

    #[tokio::test]
    async fn no_channels_no_lookups() {
        let hub = MockHub::new();
        let nodes = load_node_metadata(&hub, &[]).await;
        assert!(nodes.is_empty());
        assert!(hub.node_lookups().is_empty());
    }
}
