//! Text and date helpers shared by the feed normalizer.
//!
//! # Examples
//!
//! ```
//! use rss_mcp::util::{normalize_date, strip_html};
//!
//! assert_eq!(strip_html("<p>Hello &amp; <b>bye</b></p>"), "Hello & bye");
//! assert_eq!(normalize_date("2024-03-15T12:34:56Z"), "2024-03-15T12:34:56.000Z");
//! ```

mod date;
mod text;

pub use date::{normalize_date, parse_feed_date};
pub use text::{collapse_whitespace, strip_control_chars, strip_html};
