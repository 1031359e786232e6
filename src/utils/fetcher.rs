use async_trait::async_trait;
use reqwest::{header, redirect, Client};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::config::FetchSettings;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("timeout of {}ms exceeded while fetching {url}", .timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    #[error("no response from {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("request failed with status code {status} {status_text}")]
    Upstream { status: u16, status_text: String },
}

/// Raw bytes of a downloaded document and what the server said they are.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// URL of the final response after redirects.
    pub final_url: Url,
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError>;
}

/// Single-attempt GET with a total timeout and a bounded redirect chain.
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .redirect(redirect::Policy::limited(settings.max_redirects))
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            timeout: settings.timeout,
        })
    }

    fn classify(&self, url: &Url, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            warn!(target: "fetcher", url = %url, "Fetch timed out");
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            warn!(target: "fetcher", url = %url, "HTTP transport error: {}", err);
            FetchError::Unreachable {
                url: url.to_string(),
                reason: error_chain(&err),
            }
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        info!(target: "fetcher", url = %url, "Starting HTTP fetch");
        let started = Instant::now();

        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/pdf")
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "fetcher", url = %url, status = status.as_u16(), "HTTP non-success status");
            return Err(FetchError::Upstream {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_string());
        let final_url = response.url().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.classify(url, e))?
            .to_vec();

        info!(
            target: "fetcher",
            url = %url,
            final_url = %final_url,
            size = bytes.len(),
            ct = ?content_type,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "HTTP fetch completed"
        );

        Ok(FetchedDocument {
            bytes,
            content_type,
            final_url,
        })
    }
}

// reqwest's top-level message hides the useful part (DNS, refused, TLS) in its sources
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Redirect},
        routing::get,
        Router,
    };
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn spawn_upstream(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn fetcher_with_timeout(timeout: Duration) -> HttpFetcher {
        HttpFetcher::new(&FetchSettings {
            timeout,
            ..FetchSettings::default()
        })
        .unwrap()
    }

    fn url(addr: SocketAddr, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", addr, path)).unwrap()
    }

    async fn pdf_bytes(headers: HeaderMap) -> impl IntoResponse {
        let ua = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let accept = headers
            .get("accept")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !ua.starts_with("Mozilla/5.0") || accept != "application/pdf" {
            return (StatusCode::BAD_REQUEST, "unexpected request headers").into_response();
        }
        ([("content-type", "application/pdf")], b"%PDF-1.4 fake".to_vec()).into_response()
    }

    fn upstream_app() -> Router {
        Router::new()
            .route("/doc.pdf", get(pdf_bytes))
            .route("/moved", get(|| async { Redirect::temporary("/doc.pdf") }))
            .route("/loop", get(|| async { Redirect::temporary("/loop") }))
            .route(
                "/missing",
                get(|| async { (StatusCode::NOT_FOUND, "nope") }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
    }

    #[tokio::test]
    async fn fetches_bytes_with_browser_headers() {
        let addr = spawn_upstream(upstream_app()).await;
        let fetcher = fetcher_with_timeout(Duration::from_secs(5));

        let doc = fetcher.fetch(&url(addr, "/doc.pdf")).await.unwrap();
        assert_eq!(doc.bytes, b"%PDF-1.4 fake");
        assert_eq!(doc.content_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn follows_redirects() {
        let addr = spawn_upstream(upstream_app()).await;
        let fetcher = fetcher_with_timeout(Duration::from_secs(5));

        let doc = fetcher.fetch(&url(addr, "/moved")).await.unwrap();
        assert_eq!(doc.final_url.path(), "/doc.pdf");
        assert_eq!(doc.bytes, b"%PDF-1.4 fake");
    }

    #[tokio::test]
    async fn redirect_loop_is_unreachable() {
        let addr = spawn_upstream(upstream_app()).await;
        let fetcher = fetcher_with_timeout(Duration::from_secs(5));

        let err = fetcher.fetch(&url(addr, "/loop")).await.unwrap_err();
        assert!(matches!(err, FetchError::Unreachable { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let addr = spawn_upstream(upstream_app()).await;
        let fetcher = fetcher_with_timeout(Duration::from_secs(5));

        let err = fetcher.fetch(&url(addr, "/missing")).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Upstream {
                status: 404,
                status_text: "Not Found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let addr = spawn_upstream(upstream_app()).await;
        let fetcher = fetcher_with_timeout(Duration::from_millis(200));

        let err = fetcher.fetch(&url(addr, "/slow")).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "{:?}", err);
        assert!(err.to_string().starts_with("timeout of 200ms exceeded"));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = fetcher_with_timeout(Duration::from_secs(5));
        let err = fetcher.fetch(&url(addr, "/doc.pdf")).await.unwrap_err();
        assert!(matches!(err, FetchError::Unreachable { .. }), "{:?}", err);
    }
}
