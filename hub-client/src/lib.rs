//! A crate containing the client the console uses to talk to the Hub.

/// `HubClient`.
pub mod client;
/// CSRF token store.
pub mod csrf;
