//! Page fetching.
//!
//! The pipeline only needs "give me the HTML at this URL", expressed by
//! [`PageFetcher`]. [`HttpFetcher`] is the production implementation on top of
//! a shared `reqwest` client.

use reqwest::StatusCode;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument};

const USER_AGENT: &str = concat!("news_harvest/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: StatusCode },
}

/// Something that can fetch the raw HTML of a page.
pub trait PageFetcher {
    /// Fetch `url` and return the response body as text.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// [`PageFetcher`] backed by a `reqwest` client.
///
/// Non-2xx responses are reported as [`FetchError::Status`]. The timeout
/// applies to each request as a whole.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher.
    ///
    /// `accept_invalid_certs` disables certificate validation, which some
    /// legacy institutional sites still need.
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10));

        if accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let request_err = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let t0 = Instant::now();
        let response = self.client.get(url).send().await.map_err(request_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(request_err)?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5), false).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.htm"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html><body>新闻</body></html>"),
            )
            .mount(&server)
            .await;

        let body = fetcher()
            .fetch(&format!("{}/list.htm", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html><body>新闻</body></html>");
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.htm"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/gone.htm", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status { status: StatusCode::NOT_FOUND, .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let err = fetcher().fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[test]
    fn test_insecure_client_builds() {
        assert!(HttpFetcher::new(Duration::from_secs(1), true).is_ok());
    }
}
