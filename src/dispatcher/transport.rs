use super::{ApiRequest, ApiResponse, HttpMethod, Transport};
use crate::error::TransportError;
use crate::proxy::ProxyDescriptor;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy};
use serde_json::Value;
use std::error::Error as StdError;
use std::time::Duration;

/// Browser-like headers the dashboard sends.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("accept", "application/json, text/plain, */*"),
    ("accept-language", "en-GB,en;q=0.8"),
    ("cache-control", "no-cache"),
    ("content-type", "application/json"),
    ("origin", "https://dashboard.layeredge.io"),
    ("pragma", "no-cache"),
    ("priority", "u=1, i"),
    ("referer", "https://dashboard.layeredge.io/"),
    (
        "sec-ch-ua",
        "\"Not(A:Brand\";v=\"99\", \"Google Chrome\";v=\"133\", \"Chromium\";v=\"133\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-site"),
    ("sec-gpc", "1"),
    (
        "user-agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36",
    ),
];

/// Resolver messages meaning "try again later" (EAI_AGAIN).
const TRANSIENT_DNS_MARKERS: &[&str] = &[
    "temporary failure in name resolution",
    "eai_again",
    "name resolution failed temporarily",
];

/// reqwest-backed transport. A fresh client is built per call so each one can
/// be bound to a different proxy.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    timeout: Duration,
    headers: HeaderMap,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, headers: &[(&str, &str)]) -> Result<Self, TransportError> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Client(format!("bad header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Client(format!("bad header value for {}: {}", name, e)))?;
            map.insert(name, value);
        }

        Ok(Self {
            timeout,
            headers: map,
        })
    }

    fn client_for(&self, proxy: &ProxyDescriptor) -> Result<Client, TransportError> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .default_headers(self.headers.clone());

        if let Some(uri) = proxy.uri() {
            let proxy = Proxy::all(uri)
                .map_err(|e| TransportError::Client(format!("invalid proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| TransportError::Client(error_chain(&e)))
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        let chain = error_chain(&err);

        if is_transient_dns(&chain) {
            TransportError::TransientDns(chain)
        } else if err.is_timeout() {
            TransportError::Timeout(self.timeout.as_secs())
        } else if err.is_decode() {
            TransportError::Decode(chain)
        } else {
            TransportError::Connection(chain)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        proxy: &ProxyDescriptor,
    ) -> Result<ApiResponse, TransportError> {
        let client = self.client_for(proxy)?;

        let mut builder = match request.method {
            HttpMethod::Get => client.get(&request.url),
            HttpMethod::Post => client.post(&request.url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body: parse_body(&text)?,
        })
    }
}

fn parse_body(text: &str) -> Result<Value, TransportError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| TransportError::Decode(e.to_string()))
}

/// `outer: inner: root` rendering of an error and all its sources.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}

pub(crate) fn is_transient_dns(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_DNS_MARKERS.iter().any(|m| lower.contains(m))
}
