//! RSS/Atom/RDF feed fetching with RSSHub mirror failover, served as MCP tools.
//!
//! The library core is [`feed::FeedClient`]: it turns a feed reference into
//! candidate URLs, tries them in order, and normalizes the first feed that
//! parses. [`tool`] wraps it in the MCP result envelope and [`transport`]
//! moves JSON-RPC over stdio or HTTP.

pub mod config;
pub mod feed;
pub mod tool;
pub mod transport;
pub mod util;

pub use config::Config;
pub use feed::{Feed, FeedClient, FeedError, GetFeedParams, Item};
