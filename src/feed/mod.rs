//! Feed retrieval: reference resolution, mirror failover, and normalization.
//!
//! - [`resolver`] - expands `rsshub://` shorthand into concrete candidate URLs
//! - [`instances`] - the ordered RSSHub mirror registry
//! - [`fetcher`] - one HTTP GET per candidate, with browser-like headers
//! - [`parser`] - RSS 2.0 / Atom / RDF into one [`Feed`] shape
//! - [`client`] - ties the above together, plus the bounded-concurrency batch
//! - [`opml`] - subscription lists for the batch tool
//!
//! # Example
//!
//! ```ignore
//! use rss_mcp::feed::{FeedClient, Fetcher, GetFeedParams, InstanceRegistry};
//!
//! let client = FeedClient::new(Fetcher::with_defaults()?, InstanceRegistry::default());
//! let feed = client.get_feed(&GetFeedParams::new("rsshub://github/trending/daily")).await?;
//! ```

pub mod client;
pub mod fetcher;
pub mod instances;
pub mod opml;
pub mod parser;
pub mod resolver;
pub mod types;
mod xml;

pub use client::{
    BatchSummary, FeedClient, FeedError, FeedFailure, FeedRequest, FeedSuccess, GetFeedParams,
};
pub use fetcher::{FetchError, Fetcher, FixedUserAgent, RandomUserAgent, UserAgentSource};
pub use instances::{InstanceRegistry, RSSHUB_INSTANCES};
pub use opml::{parse_opml, OpmlDocument, OpmlError, OpmlFeed};
pub use parser::{normalize, ParseError};
pub use types::{Feed, Item};
