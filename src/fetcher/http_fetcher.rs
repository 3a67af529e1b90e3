use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;

use crate::app::{FetchError, Result};
use crate::domain::Method;
use crate::fetcher::Fetcher;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_options(Duration::from_secs(10), crate::config::DEFAULT_USER_AGENT)
    }

    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, method: &Method) -> Result<Vec<u8>> {
        let request = match method {
            Method::Get => self.client.get(url),
            Method::Post(body) => self
                .client
                .post(url)
                .header(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED))
                .body(body.clone()),
        };

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?.to_vec();
        tracing::debug!("Fetched {} bytes from {}", body.len(), url);

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;

    /// Serves one canned response and reports the raw request it received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&raw) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&raw).into_owned());

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        (format!("http://{}/resource", addr), rx)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= head_end + 4 + content_length
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::with_options(Duration::from_secs(5), "test-agent/1.0").unwrap()
    }

    #[test]
    fn test_client_builds() {
        assert!(HttpFetcher::new().is_ok());
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let (url, request) = serve_once("200 OK", "hello").await;
        let body = fetcher().fetch(&url, &Method::Get).await.unwrap();
        assert_eq!(body, b"hello");

        let request = request.await.unwrap();
        assert!(request.starts_with("GET /resource"));
    }

    #[tokio::test]
    async fn test_post_sends_form_body() {
        let (url, request) = serve_once("200 OK", "{}").await;
        fetcher()
            .fetch(&url, &Method::Post("variable1=test&variable2=test2".into()))
            .await
            .unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /resource"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/x-www-form-urlencoded"));
        assert!(request.ends_with("variable1=test&variable2=test2"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let (url, _request) = serve_once("404 Not Found", "missing").await;
        let err = fetcher().fetch(&url, &Method::Get).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert!(err.is_transfer());
    }

    #[tokio::test]
    async fn test_connection_failure_is_transfer_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher()
            .fetch(&format!("http://{}/gone", addr), &Method::Get)
            .await
            .unwrap_err();
        assert!(err.is_transfer());
    }
}
