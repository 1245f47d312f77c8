use crate::error::{Result, ScanError};
use crate::extract::{extract_hyperlinks, is_valid_url};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Sprawl/0.1 (+https://github.com/sprawl-rs/sprawl)";

/// Upper bound on the default worker pool.
pub const MAX_POOL_SIZE: usize = 32;

/// Default fetch pool size: `min(32, 2 × available parallelism)`.
pub fn default_pool_size() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores * 2).min(MAX_POOL_SIZE)
}

/// The network boundary of a traversal.
///
/// Implementations must never fail outward: malformed URLs, connection
/// errors and stream errors all come back as an empty list.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the distinct valid links in its body, in order
    /// of first occurrence.
    async fn fetch_links(&self, url: &str) -> Vec<String>;
}

/// Run the extractor over every line, keep valid absolute URLs and drop
/// repeats while preserving first-occurrence order.
pub fn collect_links<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for line in lines {
        for candidate in extract_hyperlinks(line.as_ref()) {
            if is_valid_url(candidate) && seen.insert(candidate.to_string()) {
                links.push(candidate.to_string());
            }
        }
    }

    links
}

/// reqwest-backed [`PageFetcher`].
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(None)
    }

    /// Build a fetcher, optionally bounding every request by `timeout`.
    ///
    /// No timeout is applied by default: a slow page holds its worker until
    /// the traversal deadline abandons the level.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn fetch_body(&self, url: &str) -> Result<String> {
        let parsed =
            Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;

        let response = self.client.get(parsed).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_links(&self, url: &str) -> Vec<String> {
        debug!("Fetching {}", url);

        match self.fetch_body(url).await {
            Ok(body) => {
                let links = collect_links(body.lines());
                debug!("Found {} links on {}", links.len(), url);
                links
            }
            Err(e) => {
                warn!("Fetch failed for {}: {}", url, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[test]
    fn test_collect_links_dedupes_in_first_seen_order() {
        let lines = vec![
            r#"<a href="http://b.com">b</a><a href="http://a.com/">a</a>"#,
            r#"<a href="http://b.com/">again</a><a href="http://c.com">c</a>"#,
        ];
        assert_eq!(
            collect_links(lines),
            vec!["http://b.com", "http://a.com", "http://c.com"]
        );
    }

    #[test]
    fn test_collect_links_filters_invalid_candidates() {
        let lines = [r#""httpfoo" "http://ok.com" "http:// spaced out""#];
        assert_eq!(collect_links(lines), vec!["http://ok.com"]);
    }

    #[test]
    fn test_default_pool_size_is_bounded() {
        let size = default_pool_size();
        assert!(size >= 2);
        assert!(size <= MAX_POOL_SIZE);
    }

    #[tokio::test]
    async fn test_fetch_links_from_page() {
        let mock_server = MockServer::start().await;

        let html = format!(
            "<html><body>\n<a href=\"{0}/page1\">1</a>\n<a href=\"{0}/page2/\">2</a><a href=\"{0}/page1\">dup</a>\n</body></html>",
            mock_server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(html.as_bytes()),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let links = fetcher.fetch_links(&mock_server.uri()).await;

        assert_eq!(
            links,
            vec![
                format!("{}/page1", mock_server.uri()),
                format!("{}/page2", mock_server.uri()),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_error_status_yields_no_links() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_bytes(b"<a href=\"http://never.com\">x</a>".as_slice()),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let links = fetcher
            .fetch_links(&format!("{}/missing", mock_server.uri()))
            .await;
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_url_yields_no_links() {
        let fetcher = HttpFetcher::new().unwrap();
        assert!(fetcher.fetch_links("htp:/invalid-url\\").await.is_empty());
        assert!(fetcher.fetch_links("not a url").await.is_empty());
    }

    #[tokio::test]
    async fn test_connection_failure_yields_no_links() {
        // Port 9 (discard) on loopback is reliably closed in test environments.
        let fetcher = HttpFetcher::with_timeout(Some(Duration::from_secs(2))).unwrap();
        assert!(fetcher.fetch_links("http://127.0.0.1:9/").await.is_empty());
    }
}
