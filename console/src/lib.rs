//! # Hub console
//!
//! The non-visual core of the Hub admin console: a cached, CSRF-aware view of
//! one Hub, the channels page view-model, and the confirm-then-mutate actions
//! (close channel, reset router, stop node, ...).
//!
//! Nothing here renders UI. Prompts and notifications go through the
//! [`confirm::Confirm`] and [`confirm::Notify`] traits; the `hub-console`
//! binary implements them on the terminal.

// Hub API used by the console:
//  GET  /api/csrf
//  GET  /api/info
// POST  /api/unlock
// POST  /api/setup
//  GET  /api/channels
//  GET  /api/mempool/lightning/nodes/:pubkey
// POST  /api/channels/close
//  GET  /api/wallet/balance
// POST  /api/wallet/redeem-onchain-funds
// POST  /api/reset-router
// POST  /api/stop
//  GET  /api/apps
//  GET  /api/apps/:pubkey
// DELETE /api/apps/:pubkey

pub mod amount;
pub mod app;
pub mod cache;
pub mod channels;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod error;
pub mod or_env;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
