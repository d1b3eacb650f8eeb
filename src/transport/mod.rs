//! MCP transports. Each one only moves JSON-RPC text between its channel and
//! the shared [`McpServer`]; no feed logic lives here.

pub mod http;
pub mod jsonrpc;
pub mod stdio;

pub use http::{create_router, serve_http};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpServer};
pub use stdio::serve_stdio;

/// Server over an empty mirror registry, for transport tests that never fetch.
#[cfg(test)]
pub(crate) fn test_server() -> McpServer {
    use crate::feed::fetcher::{build_client, Fetcher, FixedUserAgent, DEFAULT_MAX_REDIRECTS};
    use crate::feed::{FeedClient, InstanceRegistry};
    use crate::tool::FeedTools;
    use std::sync::Arc;
    use std::time::Duration;

    let timeout = Duration::from_secs(2);
    let fetcher = Fetcher::new(
        build_client(timeout, DEFAULT_MAX_REDIRECTS).unwrap(),
        Arc::new(FixedUserAgent("test".into())),
        timeout,
    );
    let registry = InstanceRegistry::with_instances(Vec::<String>::new(), None);
    McpServer::new(FeedTools::new(
        FeedClient::new(fetcher, registry).with_retry_delay(Duration::ZERO),
    ))
}
