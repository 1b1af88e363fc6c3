use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::types::{BaseChat, StreamRequest};
use anyhow::anyhow;
use anyhow::{Context, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Url;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Opens the response body of a base chat streaming request.
pub trait ByteSource: Send + Sync {
    fn open_stream(
        &self,
        base_chat_id: i64,
        request: &StreamRequest,
    ) -> impl Future<Output = Result<ByteStream>> + Send;
}

#[derive(Clone)]
pub struct ScribeClient {
    http: reqwest::Client,
    api_url: String,
    request_timeout: Option<Duration>,
}

impl ScribeClient {
    pub fn new(config: &Config) -> Result<Self> {
        let request_timeout = config.request_timeout_secs.map(Duration::from_secs);
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub async fn fetch_base_chat(&self, base_chat_id: i64) -> Result<BaseChat> {
        let request_url = self.base_chat_url(base_chat_id);
        let mut request = self.http.get(&request_url);
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;

        response
            .json::<BaseChat>()
            .await
            .with_context(|| format!("invalid base chat record from '{request_url}'"))
    }

    pub async fn create_stream(
        &self,
        base_chat_id: i64,
        request: &StreamRequest,
    ) -> Result<ByteStream> {
        request.validate()?;
        let request_url = format!("{}/stream", self.base_chat_url(base_chat_id));

        if debug_payload_enabled() {
            let payload = serde_json::to_value(request)?;
            emit_debug_payload(&request_url, &payload);
        }

        let response = self
            .http
            .post(&request_url)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;

        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| map_api_request_error(error, &request_url_for_stream))
        });
        Ok(Box::pin(stream))
    }

    fn base_chat_url(&self, base_chat_id: i64) -> String {
        format!("{}/base-chat/{base_chat_id}", self.api_url)
    }
}

impl ByteSource for ScribeClient {
    async fn open_stream(&self, base_chat_id: i64, request: &StreamRequest) -> Result<ByteStream> {
        self.create_stream(base_chat_id, request).await
    }
}

/// True when the request targets this machine (`localhost`, a loopback
/// address or the unspecified address).
fn targets_this_machine(request_url: &str) -> bool {
    let Ok(url) = Url::parse(request_url.trim()) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback() || ip.is_unspecified())
        .unwrap_or(false)
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && targets_this_machine(request_url) {
        return anyhow!(
            "cannot reach local scribe API '{}': {}. Start the backend or update SCRIBE_API_URL.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach scribe API '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "scribe API '{}' returned HTTP {}: {}",
            request_url,
            status,
            error
        );
    }
    anyhow!("request to '{}' failed: {}", request_url, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_url: &str) -> Config {
        Config {
            api_url: api_url.to_string(),
            n_results: 1,
            request_timeout_secs: Some(2),
            show_embeddings: false,
        }
    }

    #[test]
    fn test_api_url_trailing_slash_is_trimmed() {
        let client = ScribeClient::new(&config("http://localhost:8000/")).expect("client");
        assert_eq!(client.api_url(), "http://localhost:8000");
        assert_eq!(client.base_chat_url(7), "http://localhost:8000/base-chat/7");
    }

    #[test]
    fn test_local_targets() {
        assert!(targets_this_machine(" HTTP://LOCALHOST:8000/base-chat/1 "));
        assert!(targets_this_machine("http://127.0.0.2:8000/base-chat/1/stream"));
        assert!(targets_this_machine("http://[::1]:8000/base-chat/1"));
        assert!(targets_this_machine("http://0.0.0.0:8000/base-chat/1"));
        assert!(!targets_this_machine("https://localhost.example.com/base-chat"));
        assert!(!targets_this_machine("http://10.0.0.4:8000/base-chat/1"));
        assert!(!targets_this_machine("not a url"));
    }

    #[tokio::test]
    async fn test_create_stream_rejects_empty_query_before_sending() {
        let client = ScribeClient::new(&config("http://127.0.0.1:9")).expect("client");
        let error = match client.create_stream(1, &StreamRequest::new("", 1)).await {
            Ok(_) => panic!("empty query must be rejected"),
            Err(error) => error,
        };
        assert!(error.to_string().contains("query string"));
    }

    #[tokio::test]
    async fn test_connect_failure_names_local_endpoint() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let client =
            ScribeClient::new(&config(&format!("http://127.0.0.1:{port}"))).expect("client");
        let error = match client.fetch_base_chat(1).await {
            Ok(_) => panic!("closed port must fail"),
            Err(error) => error,
        };
        assert!(error.to_string().contains("cannot reach local scribe API"));
    }
}
