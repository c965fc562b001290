//! Core types and trait definitions for the billserve legislative graph.
//!
//! This crate has no HTTP or database dependencies.
//! Storage backends implement [`store::BillStore`]; the ingestion pipeline
//! depends on that abstraction only.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod bill;
pub mod error;
pub mod legislator;
pub mod normalize;
pub mod party;
pub mod store;

pub use error::{Error, Result};

/// The outcome of a get-or-create: the resolved entity plus whether this call
/// inserted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted<T> {
  pub value:   T,
  pub created: bool,
}
