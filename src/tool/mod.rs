//! The two feed tools and their result envelope.
//!
//! Transports hand a tool name plus JSON arguments to [`FeedTools::call`] and
//! get a [`ToolResponse`] back. Feed failures never escape as errors: they
//! come back as an envelope with `isError: true` and a readable message, the
//! same on every transport.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::feed::{opml, FeedClient, FeedRequest, GetFeedParams};

pub const GET_FEED: &str = "get_feed";
pub const GET_FEEDS: &str = "get_feeds";

const NO_FEEDS_MESSAGE: &str =
    "Error: No feeds provided. Please provide either OPML content or an array of URLs.";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// MCP `tools/call` result: `{content: [{type: "text", text}], isError?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<ToolContent>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                kind: "text".to_string(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    /// Success envelope carrying `value` as pretty-printed JSON.
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::text(text),
            Err(e) => Self::error(format!("Failed to serialize result: {e}")),
        }
    }

    /// Text of the first content block.
    pub fn first_text(&self) -> &str {
        self.content.first().map(|c| c.text.as_str()).unwrap_or("")
    }
}

/// Entry of the `tools/list` result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: GET_FEED,
            description: "Get RSS feed from any URL, including RSSHub feeds.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "URL of the RSS feed. For RSSHub, you can use 'rsshub://' protocol (e.g., 'rsshub://bilibili/user/dynamic/208259'). For regular RSS feeds, use the full URL."
                    },
                    "count": {
                        "type": "integer",
                        "minimum": 0,
                        "default": 1,
                        "description": "Number of RSS feed items to retrieve. Defaults to 1. Set to 0 to retrieve all items."
                    },
                    "priorityInstance": {
                        "type": "string",
                        "description": "RSSHub instance (e.g. 'https://rsshub.example.org') to try before the built-in mirrors for this call."
                    }
                },
                "required": ["url"]
            }),
        },
        ToolDefinition {
            name: GET_FEEDS,
            description: "Get multiple RSS feeds at once. Accepts either an OPML file content (exported from Feedly, Inoreader, etc.) or a list of RSS URLs. Returns aggregated content from all feeds.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "opml": {
                        "type": "string",
                        "description": "OPML file content (XML string) exported from RSS readers like Feedly, Inoreader, etc."
                    },
                    "urls": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Array of RSS feed URLs to fetch"
                    },
                    "count": {
                        "type": "integer",
                        "minimum": 0,
                        "default": 1,
                        "description": "Number of items to retrieve per feed. Defaults to 1. Set to 0 for all items."
                    },
                    "concurrency": {
                        "type": "integer",
                        "minimum": 1,
                        "default": 5,
                        "description": "Number of feeds to fetch in parallel. Defaults to 5. Higher values are faster but may hit rate limits."
                    }
                }
            }),
        },
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetFeedArgs {
    url: String,
    count: Option<usize>,
    priority_instance: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GetFeedsArgs {
    opml: Option<String>,
    urls: Option<Vec<String>>,
    count: Option<usize>,
    concurrency: Option<usize>,
}

/// Tool dispatcher bound to one [`FeedClient`].
#[derive(Debug, Clone)]
pub struct FeedTools {
    client: FeedClient,
    default_count: usize,
    default_concurrency: usize,
}

impl FeedTools {
    pub fn new(client: FeedClient) -> Self {
        Self {
            client,
            default_count: 1,
            default_concurrency: crate::feed::client::DEFAULT_CONCURRENCY,
        }
    }

    /// Overrides what an omitted `count` / `concurrency` argument means.
    pub fn with_defaults(mut self, count: usize, concurrency: usize) -> Self {
        self.default_count = count;
        self.default_concurrency = concurrency;
        self
    }

    /// Runs tool `name`. Only an unknown tool name is an `Err`; every other
    /// failure is reported inside the envelope.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolResponse, ToolError> {
        tracing::debug!(tool = %name, "Tool called");
        match name {
            GET_FEED => Ok(self.get_feed(arguments).await),
            GET_FEEDS => Ok(self.get_feeds(arguments).await),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    pub async fn get_feed(&self, arguments: Value) -> ToolResponse {
        let args: GetFeedArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => {
                return ToolResponse::error(format!(
                    "Error fetching RSS feed: Invalid arguments: {e}"
                ))
            }
        };

        let mut params = GetFeedParams::new(args.url).count(args.count.unwrap_or(self.default_count));
        params.priority_instance = args.priority_instance;

        match self.client.get_feed(&params).await {
            Ok(feed) => {
                tracing::info!(url = %params.url, "Tool completed");
                ToolResponse::json(&feed)
            }
            Err(e) => {
                tracing::error!(url = %params.url, error = %e, "Tool failed");
                ToolResponse::error(format!("Error fetching RSS feed: {e}"))
            }
        }
    }

    pub async fn get_feeds(&self, arguments: Value) -> ToolResponse {
        // `null` / missing arguments mean "nothing provided", not a type error.
        let args: GetFeedsArgs = if arguments.is_null() {
            GetFeedsArgs::default()
        } else {
            match serde_json::from_value(arguments) {
                Ok(args) => args,
                Err(e) => {
                    return ToolResponse::error(format!(
                        "Error processing feeds: Invalid arguments: {e}"
                    ))
                }
            }
        };

        let mut requests = Vec::new();

        if let Some(content) = args.opml.as_deref().filter(|c| !c.trim().is_empty()) {
            let document = match opml::parse_opml(content) {
                Ok(document) => document,
                Err(e) => return ToolResponse::error(format!("Error processing feeds: {e}")),
            };
            tracing::info!(feeds = document.feeds.len(), "Found feeds in OPML");
            requests.extend(document.feeds.into_iter().map(|f| FeedRequest {
                url: f.xml_url,
                title: Some(f.title),
                category: f.category,
            }));
        }

        if let Some(urls) = args.urls {
            requests.extend(urls.into_iter().map(FeedRequest::from_url));
        }

        if requests.is_empty() {
            return ToolResponse::error(NO_FEEDS_MESSAGE);
        }

        let count = args.count.unwrap_or(self.default_count);
        let concurrency = args.concurrency.unwrap_or(self.default_concurrency);
        tracing::info!(feeds = requests.len(), concurrency, "Fetching feeds");

        let summary = self.client.get_feeds(requests, count, concurrency).await;
        ToolResponse::json(&summary)
    }
}
