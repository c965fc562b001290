//! Access to the upstream BILLSTATUS bulk-data source.
//!
//! - [`fetch`]: the [`DocumentSource`] seam and its HTTP implementation.
//! - [`locate`]: document URL construction and manifest discovery.
//! - [`xml`]: conversion of a status document into a raw key → value tree.

// Native `async fn` in traits, as in `billserve-core`.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod fetch;
pub mod locate;
pub mod xml;

pub use error::{Error, Result};
pub use fetch::{DocumentSource, FetchConfig, HttpFetcher};
pub use locate::Locator;
