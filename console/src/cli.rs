//! `hub-console` CLI

use std::{
    fmt::Write as _,
    io::{self, Write as _},
    process::ExitCode,
};

use anyhow::Context;
use argh::FromArgs;
use hub_api::models::App;
use hub_client::client::HubClient;
use hub_std::fmt::DisplayPrefix;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::{
    amount::format_sats,
    app::{ActionOutcome, Console},
    cache::RequestKey,
    channels::{ChannelRow, ChannelsView},
    config::{ConfigArgs, ConsoleConfig},
    confirm::{Confirm, ConfirmPrompt, Notification, Notify},
};

/// Command-line admin console for the Hub.
#[derive(Debug, FromArgs)]
pub struct ConsoleArgs {
    /// base url of the Hub.
    /// Default: `http://localhost:8080`.
    /// Env: `HUB_URL`.
    #[argh(option)]
    pub hub_url: Option<String>,

    /// request timeout in seconds.
    /// Default: 30.
    /// Env: `HUB_REQUEST_TIMEOUT_SECS`.
    #[argh(option)]
    pub request_timeout_secs: Option<u64>,

    /// how long cached reads are reused, in seconds.
    /// Default: 30.
    /// Env: `HUB_CACHE_MAX_AGE_SECS`.
    #[argh(option)]
    pub cache_max_age_secs: Option<u64>,

    /// answer "yes" to every confirmation prompt.
    #[argh(switch, short = 'y')]
    pub yes: bool,

    #[argh(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
pub enum Command {
    Channels(ChannelsArgs),
    CloseChannel(CloseChannelArgs),
    ResetRouter(ResetRouterArgs),
    Stop(StopArgs),
    Redeem(RedeemArgs),
    Apps(AppsArgs),
}

/// Show balances and the channel table.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "channels")]
pub struct ChannelsArgs {}

/// Close a channel.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "close-channel")]
pub struct CloseChannelArgs {
    /// the channel id.
    #[argh(option)]
    pub channel_id: String,

    /// the peer's node pubkey.
    #[argh(option)]
    pub node_id: String,
}

/// Reset the router (LDK only).
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "reset-router")]
pub struct ResetRouterArgs {}

/// Stop the node (LDK only).
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "stop")]
pub struct StopArgs {}

/// Sweep the spendable onchain balance (LDK and Greenlight only).
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "redeem")]
pub struct RedeemArgs {}

/// List connected apps.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "apps")]
pub struct AppsArgs {}

type CliConsole = Console<HubClient, StdinConfirm, TermNotify>;

impl ConsoleArgs {
    pub fn from_cli() -> Self {
        argh::from_env()
    }

    /// CLI flags, then env vars, then defaults.
    pub fn config(&self) -> anyhow::Result<ConsoleConfig> {
        ConsoleConfig::from_args(ConfigArgs {
            hub_url: self.hub_url.clone(),
            request_timeout_secs: self.request_timeout_secs,
            cache_max_age_secs: self.cache_max_age_secs,
        })
    }

    /// Run the command. Action failures have already been shown to the user
    /// when this returns [`ExitCode::FAILURE`].
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let config = self.config()?;
        debug!(hub_url = %config.hub_url, "Starting");

        let hub = HubClient::new(
            config.hub_url,
            config.user_agent,
            config.request_timeout,
            config.metadata_retries,
        )
        .context("Failed to build Hub client")?;
        let confirm = StdinConfirm {
            assume_yes: self.yes,
        };
        let console = Console::new(hub, confirm, TermNotify, config.cache_max_age);

        match self.cmd {
            Command::Channels(_) => show_channels(&console).await,
            Command::CloseChannel(args) => close_channel(&console, args).await,
            Command::ResetRouter(_) => {
                load_csrf(&console).await?;
                Ok(exit_code(console.reset_router().await.is_ok()))
            }
            Command::Stop(_) => {
                load_csrf(&console).await?;
                Ok(exit_code(console.stop_node().await.is_ok()))
            }
            Command::Redeem(_) => {
                load_csrf(&console).await?;
                Ok(exit_code(console.redeem_onchain_funds().await.is_ok()))
            }
            Command::Apps(_) => {
                let apps = console.list_apps().await?;
                print!("{}", render_apps(&apps));
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn load_csrf(console: &CliConsole) -> anyhow::Result<()> {
    console
        .load_csrf()
        .await
        .map(|_| ())
        .context("Failed to load CSRF token")
}

async fn show_channels(console: &CliConsole) -> anyhow::Result<ExitCode> {
    let view = console.load_channels_page().await;
    if view.is_loading() {
        let error = console
            .last_error(&RequestKey::Channels)
            .map(|e| e.to_string())
            .unwrap_or_default();
        anyhow::bail!("Failed to load channels: {error}");
    }
    if view.node_running == Some(false) {
        eprintln!("The node is not running. Unlock it to continue.");
        return Ok(ExitCode::FAILURE);
    }
    print!("{}", render_channels(&view));
    Ok(ExitCode::SUCCESS)
}

async fn close_channel(
    console: &CliConsole,
    args: CloseChannelArgs,
) -> anyhow::Result<ExitCode> {
    // Loads the channel list, node aliases and the CSRF token.
    let view = console.load_channels_page().await;
    let row = view
        .rows
        .iter()
        .find(|row| {
            row.channel.id == args.channel_id
                && row.channel.remote_pubkey == args.node_id
        })
        .with_context(|| {
            format!(
                "No channel '{}' with node '{}'",
                args.channel_id, args.node_id
            )
        })?;

    let result = console
        .close_channel(&args.channel_id, &args.node_id, row.channel.active)
        .await;
    match result {
        Ok(ActionOutcome::Completed) => Ok(ExitCode::SUCCESS),
        Ok(ActionOutcome::Cancelled) => {
            println!("Cancelled");
            Ok(ExitCode::SUCCESS)
        }
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

// --- Rendering --- //

fn percent(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.0}%")).unwrap_or_else(|| "-".to_owned())
}

fn render_row(out: &mut String, row: &ChannelRow) {
    let status = if row.channel.active { "active" } else { "inactive" };
    let _ = writeln!(
        out,
        "{peer:<30} {visibility:<8} {status:<9} {capacity:>14} \
         {local:>14} {local_pct:>5} / {remote_pct:<5} {remote:<14} {url}",
        peer = row.peer_label(),
        visibility = row.visibility(),
        capacity = format_sats(row.capacity),
        local = row.local_display(),
        local_pct = percent(row.local_percentage),
        remote_pct = percent(row.remote_percentage),
        remote = row.remote_display(),
        url = row.explorer_url(),
    );
}

/// The channels page as plain text.
pub fn render_channels(view: &ChannelsView) -> String {
    let mut out = String::new();
    let loading = || "…".to_owned();

    let count = view.channel_count.map(|n| n.to_string());
    let _ = writeln!(out, "Channels:          {}", count.unwrap_or_else(loading));

    let lightning = view.lightning_balance_display();
    let _ = writeln!(
        out,
        "Lightning balance: {}",
        lightning.unwrap_or_else(loading)
    );

    match &view.onchain {
        Some(onchain) => {
            let _ = write!(out, "Onchain balance:   {}", onchain.spendable_display);
            if let Some(incoming) = &onchain.incoming_display {
                let _ = write!(out, " {incoming}");
            }
            out.push('\n');
        }
        None => {
            let _ = writeln!(out, "Onchain balance:   {}", loading());
        }
    }

    if !view.rows.is_empty() {
        out.push('\n');
        for row in &view.rows {
            render_row(&mut out, row);
        }
    }
    out
}

/// The connected apps as plain text.
pub fn render_apps(apps: &[App]) -> String {
    if apps.is_empty() {
        return "No connected apps\n".to_owned();
    }
    let mut out = String::new();
    for app in apps {
        let last_used = app
            .last_event_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_owned());
        let _ = writeln!(
            out,
            "{name:<24} {pubkey}  last used: {last_used}",
            name = app.name,
            pubkey = DisplayPrefix::<10>(&app.nostr_pubkey),
        );
    }
    out
}

// --- Confirm / Notify --- //

/// Asks `[y/N]` on the terminal.
pub struct StdinConfirm {
    pub assume_yes: bool,
}

impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        if self.assume_yes {
            return true;
        }

        eprint!("{prompt}\n[y/N] ");
        let _ = io::stderr().flush();

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(_) => is_yes(&line),
            Err(_) => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Successes go to stdout, errors to stderr.
pub struct TermNotify;

impl Notify for TermNotify {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::Success(msg) => println!("{msg}"),
            Notification::Error(msg) => eprintln!("{msg}"),
        }
    }
}

#[cfg(test)]
mod test {
    use hub_api::models::OnchainBalance;

    use super::*;
    use crate::{
        channels::NodeIndex,
        test_utils::{app, channel, node},
    };

    #[test]
    fn parse_args() {
        let args = ConsoleArgs::from_args(&["hub-console"], &[
            "--hub-url",
            "http://hub:8080",
            "-y",
            "close-channel",
            "--channel-id",
            "c1",
            "--node-id",
            "02aa",
        ])
        .unwrap();
        assert_eq!(args.hub_url.as_deref(), Some("http://hub:8080"));
        assert!(args.yes);
        match args.cmd {
            Command::CloseChannel(close) => {
                assert_eq!(close.channel_id, "c1");
                assert_eq!(close.node_id, "02aa");
            }
            other => panic!("Wrong command: {other:?}"),
        }

        let args =
            ConsoleArgs::from_args(&["hub-console"], &["reset-router"]).unwrap();
        assert!(matches!(args.cmd, Command::ResetRouter(_)));
        assert!(!args.yes);

        // `close-channel` requires both ids.
        let result = ConsoleArgs::from_args(&["hub-console"], &[
            "close-channel",
            "--channel-id",
            "c1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn render_loading_view() {
        let out = render_channels(&ChannelsView::default());
        assert!(out.contains("Channels:          …"));
        assert!(out.contains("Lightning balance: …"));
    }

    #[test]
    fn render_loaded_view() {
        let pubkey = format!("02{}", "ab".repeat(32));
        let channels = vec![channel("c1", &pubkey, 1_500_000, 500_000, true)];
        let nodes = NodeIndex::from_iter([node(&pubkey, "ACINQ")]);
        let balance = OnchainBalance {
            spendable: 12_500,
            total: 14_500,
        };
        let view = ChannelsView::build(
            Some(channels.as_slice()),
            &nodes,
            Some(&balance),
            None,
        );

        let out = render_channels(&view);
        assert!(out.contains("Channels:          1"));
        assert!(out.contains("Lightning balance: 1.5k sats"));
        assert!(out.contains("Onchain balance:   12.5k sats (2000 incoming)"));
        assert!(out.contains("ACINQ (02abababab...)"));
        assert!(out.contains("1.5k sats   75% / 25%   500 sats"));
        assert!(out.contains(&format!("https://amboss.space/node/{pubkey}")));
    }

    #[test]
    fn render_app_list() {
        assert_eq!(render_apps(&[]), "No connected apps\n");
        let out = render_apps(&[app("Damus", "abcdef0123456789")]);
        assert!(out.starts_with("Damus"));
        assert!(out.contains("abcdef0123..."));
        assert!(out.contains("last used: never"));
    }
}
