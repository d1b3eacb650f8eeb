use futures::StreamExt;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::redirect::Policy;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Per-attempt timeout used when the caller does not configure one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Redirect hops followed before an attempt is abandoned.
pub const DEFAULT_MAX_REDIRECTS: usize = 3;
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

const ACCEPT_FEED: &str = "application/rss+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGES: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// Browser User-Agents rotated across requests. Some mirrors sit behind
/// filters that block obvious non-browser clients.
pub const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0",
];

/// Errors from a single fetch attempt against one concrete URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Not an absolute http(s) URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, redirect limit, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error! status: {0}")]
    HttpStatus(u16),
    /// Request exceeded the per-attempt timeout
    #[error("Request timed out")]
    Timeout,
    /// 2xx response with an empty body; overloaded mirrors do this
    #[error("Empty response data")]
    EmptyBody,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Chooses the User-Agent for each request.
///
/// Production rotates through [`BROWSER_USER_AGENTS`]; tests pin a value with
/// [`FixedUserAgent`].
pub trait UserAgentSource: Send + Sync {
    fn user_agent(&self) -> &str;
}

/// Picks uniformly at random from a fixed pool.
#[derive(Debug, Clone)]
pub struct RandomUserAgent {
    pool: Vec<String>,
}

impl RandomUserAgent {
    pub fn new<I, S>(pool: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pool: pool.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for RandomUserAgent {
    fn default() -> Self {
        Self::new(BROWSER_USER_AGENTS.iter().copied())
    }
}

impl UserAgentSource for RandomUserAgent {
    fn user_agent(&self) -> &str {
        self.pool
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(BROWSER_USER_AGENTS[0])
    }
}

/// Always sends the same User-Agent.
#[derive(Debug, Clone)]
pub struct FixedUserAgent(pub String);

impl UserAgentSource for FixedUserAgent {
    fn user_agent(&self) -> &str {
        &self.0
    }
}

/// Create a custom redirect policy with loop detection and limited hops.
fn create_redirect_policy(max_redirects: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error(format!("Too many redirects (max {max_redirects})"));
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Builds the HTTP client used for feed fetching.
pub fn build_client(timeout: Duration, max_redirects: usize) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(create_redirect_policy(max_redirects))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(timeout)
        .build()
}

/// Performs single GET attempts with feed-friendly headers.
///
/// Cheap to clone: the reqwest client and UA strategy are shared.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    user_agents: Arc<dyn UserAgentSource>,
    timeout: Duration,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    pub fn new(
        client: reqwest::Client,
        user_agents: Arc<dyn UserAgentSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            user_agents,
            timeout,
        }
    }

    /// Fetcher with the default timeout, redirect cap and rotating User-Agent.
    pub fn with_defaults() -> Result<Self, FetchError> {
        let client = build_client(DEFAULT_TIMEOUT, DEFAULT_MAX_REDIRECTS)?;
        Ok(Self::new(
            client,
            Arc::new(RandomUserAgent::default()),
            DEFAULT_TIMEOUT,
        ))
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_FEED));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGES));
        match HeaderValue::from_str(self.user_agents.user_agent()) {
            Ok(ua) => {
                headers.insert(USER_AGENT, ua);
            }
            Err(e) => {
                tracing::warn!(error = %e, "User-Agent is not a valid header value, omitting");
            }
        }
        headers
    }

    /// Fetches `url` once and returns the body as text.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] - not an absolute http(s) URL
    /// - [`FetchError::Timeout`] - no complete response within the timeout
    /// - [`FetchError::Network`] - connection, TLS or redirect failures
    /// - [`FetchError::HttpStatus`] - non-2xx response
    /// - [`FetchError::ResponseTooLarge`] - body exceeded 10MB
    /// - [`FetchError::EmptyBody`] - 2xx with nothing in it
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(FetchError::InvalidUrl(format!(
                    "{url}: unsupported scheme {scheme}"
                )))
            }
        }

        let request = self.client.get(parsed).headers(self.headers());

        // The whole attempt (headers and body) shares one deadline.
        let bytes = tokio::time::timeout(self.timeout, async {
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }
            read_limited_bytes(response, MAX_FEED_SIZE).await
        })
        .await
        .map_err(|_| FetchError::Timeout)??;

        let body = String::from_utf8_lossy(&bytes).into_owned();
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(body)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><guid>1</guid><title>Test</title></item>
</channel></rss>"#;

    fn test_fetcher(timeout: Duration) -> Fetcher {
        Fetcher::new(
            build_client(timeout, DEFAULT_MAX_REDIRECTS).unwrap(),
            Arc::new(FixedUserAgent("rss-mcp-test/1.0".into())),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_fetch_success_sends_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(header("user-agent", "rss-mcp-test/1.0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = test_fetcher(DEFAULT_TIMEOUT)
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, VALID_RSS);
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = test_fetcher(DEFAULT_TIMEOUT)
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        match result.unwrap_err() {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1) // failover happens across mirrors, not within one
            .mount(&mock_server)
            .await;

        let result = test_fetcher(DEFAULT_TIMEOUT)
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn test_fetch_empty_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&mock_server)
            .await;

        let result = test_fetcher(DEFAULT_TIMEOUT)
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::EmptyBody)));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;

        let result = test_fetcher(Duration::from_millis(200))
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(
            matches!(result, Err(FetchError::Timeout) | Err(FetchError::Network(_))),
            "got {result:?}"
        );
    }

    #[tokio::test]
    async fn test_fetch_redirect_limit() {
        let mock_server = MockServer::start().await;
        for i in 0..5 {
            Mock::given(method("GET"))
                .and(path(format!("/r{i}")))
                .respond_with(
                    ResponseTemplate::new(302)
                        .insert_header("Location", format!("{}/r{}", mock_server.uri(), i + 1)),
                )
                .mount(&mock_server)
                .await;
        }

        let result = test_fetcher(DEFAULT_TIMEOUT)
            .fetch(&format!("{}/r0", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::Network(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn test_fetch_follows_short_redirect() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("Location", format!("{}/new", mock_server.uri())),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let body = test_fetcher(DEFAULT_TIMEOUT)
            .fetch(&format!("{}/old", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, VALID_RSS);
    }

    #[tokio::test]
    async fn test_invalid_scheme_rejected() {
        let fetcher = test_fetcher(DEFAULT_TIMEOUT);
        assert!(matches!(
            fetcher.fetch("rsshub://zhihu/hot").await,
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            fetcher.fetch("not a url").await,
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_random_user_agent_from_pool() {
        let source = RandomUserAgent::default();
        for _ in 0..20 {
            assert!(BROWSER_USER_AGENTS.contains(&source.user_agent()));
        }
    }

    #[test]
    fn test_empty_pool_falls_back() {
        let source = RandomUserAgent::new(Vec::<String>::new());
        assert_eq!(source.user_agent(), BROWSER_USER_AGENTS[0]);
    }
}
