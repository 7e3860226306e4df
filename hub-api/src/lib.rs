//! Definitions shared by every client of the Hub HTTP API: the API trait
//! itself, the JSON wire models, the error types, and a generic
//! [`RestClient`](crate::rest::RestClient).

/// API trait definition.
pub mod def;
/// API error types.
pub mod error;
/// JSON request and response models.
pub mod models;
/// `RestClient` and request helpers.
pub mod rest;
/// Misc small wire types.
pub mod types;
