// HTTP request wrapper
//
// One logical call = one `request()`: per-attempt timeout, linear-backoff
// retries for 5xx and transport failures, bearer auth, JSON-or-text bodies.
// Endpoint semantics live in `client`; nothing here knows about jobs.

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::schemas::error_message;
use crate::config::{ApiConfig, AuthProfile};
use crate::errors::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Parsed response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// JSON when the content type says so and the bytes parse; text otherwise
    fn parse(headers: &HeaderMap, bytes: &[u8]) -> Self {
        let is_json = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);

        if is_json {
            if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
                return ResponseBody::Json(value);
            }
        }
        ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// The body as a JSON value; text becomes a JSON string
    pub fn to_value(&self) -> Value {
        match self {
            ResponseBody::Json(value) => value.clone(),
            ResponseBody::Text(text) => Value::String(text.clone()),
        }
    }

    /// Error body as JSON, `None` for an empty text body
    fn error_body(&self) -> Option<Value> {
        match self {
            ResponseBody::Text(text) if text.trim().is_empty() => None,
            other => Some(other.to_value()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub data: ResponseBody,
    pub status: u16,
    pub headers: HeaderMap,
    pub elapsed: Duration,
}

impl HttpResponse {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Per-call options; unset fields fall back to the client's configuration
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub retry_base_delay: Option<Duration>,
    /// Statuses returned as responses rather than raised, never retried
    pub passthrough: Vec<u16>,
    /// Send without credentials regardless of auth profile
    pub skip_auth: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: Vec::new(),
            query: Vec::new(),
            timeout: None,
            max_retries: None,
            retry_base_delay: None,
            passthrough: Vec::new(),
            skip_auth: false,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    pub fn passthrough(mut self, statuses: &[u16]) -> Self {
        self.passthrough.extend_from_slice(statuses);
        self
    }

    pub fn without_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }
}

enum AttemptError {
    Timeout,
    Transport(String),
}

/// Thin reqwest wrapper with uniform timeout/retry/error behavior
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    auth: AuthProfile,
    unauthenticated_paths: Vec<String>,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HttpClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("nextagi/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Build(e.to_string()))?;

        if config.auth == AuthProfile::Development {
            warn!(
                base_url = %config.base_url,
                "Development auth profile: requests are sent without credentials"
            );
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            auth: config.auth,
            unauthenticated_paths: config
                .unauthenticated_paths
                .iter()
                .map(|p| normalize_path(p))
                .collect(),
            timeout: config.timeout(),
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn bearer_for(&self, endpoint: &str, options: &RequestOptions) -> Option<&str> {
        if options.skip_auth || self.auth == AuthProfile::Development {
            return None;
        }
        let path = normalize_path(endpoint.split('?').next().unwrap_or(endpoint));
        if self.unauthenticated_paths.contains(&path) {
            return None;
        }
        self.api_key.as_deref()
    }

    /// Perform one logical call
    ///
    /// - status < 400 (or listed in `passthrough`): returned as a response
    /// - 4xx: `ApiError::Client`, never retried
    /// - 5xx / transport failure: retried after `base * attempt`, then
    ///   `ApiError::Server`
    /// - timeout: `ApiError::Timeout` immediately, never retried
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, ApiError> {
        let url = self.url(endpoint);
        let request_id = Uuid::new_v4().to_string();
        let timeout = options.timeout.unwrap_or(self.timeout);
        let max_retries = options.max_retries.unwrap_or(self.max_retries);
        let base_delay = options.retry_base_delay.unwrap_or(self.retry_base_delay);
        let bearer = self.bearer_for(endpoint, &options);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            debug!(
                method = %options.method,
                url = %url,
                attempt,
                request_id = %request_id,
                authenticated = bearer.is_some(),
                "HTTP request start"
            );

            let failure = match self
                .attempt(&url, &options, &request_id, bearer, timeout)
                .await
            {
                Ok(response) => {
                    let status = response.status;
                    debug!(
                        url = %url,
                        status,
                        elapsed_ms = response.elapsed_ms(),
                        attempt,
                        "HTTP response"
                    );

                    if status < 400 || options.passthrough.contains(&status) {
                        return Ok(response);
                    }

                    let body = response.data.error_body();
                    let message = body
                        .as_ref()
                        .and_then(error_message)
                        .unwrap_or_else(|| reason(status));

                    if status < 500 {
                        warn!(url = %url, status, message = %message, "HTTP client error");
                        return Err(ApiError::Client {
                            endpoint: endpoint.to_string(),
                            status,
                            message,
                            body,
                        });
                    }

                    warn!(url = %url, status, attempt, message = %message, "HTTP server error");
                    ApiError::Server {
                        endpoint: endpoint.to_string(),
                        status: Some(status),
                        message,
                        attempts: attempt,
                    }
                }
                Err(AttemptError::Timeout) => {
                    warn!(url = %url, timeout_ms = timeout.as_millis() as u64, "HTTP request timed out");
                    return Err(ApiError::Timeout {
                        endpoint: endpoint.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                Err(AttemptError::Transport(message)) => {
                    warn!(url = %url, attempt, error = %message, "HTTP transport error");
                    ApiError::Server {
                        endpoint: endpoint.to_string(),
                        status: None,
                        message,
                        attempts: attempt,
                    }
                }
            };

            if attempt > max_retries {
                error!(url = %url, attempts = attempt, error = %failure, "HTTP request failed, retries exhausted");
                return Err(failure);
            }

            let delay = base_delay * attempt;
            debug!(url = %url, delay_ms = delay.as_millis() as u64, "Retry scheduled");
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(
        &self,
        url: &str,
        options: &RequestOptions,
        request_id: &str,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<HttpResponse, AttemptError> {
        let started = Instant::now();

        let mut builder = self
            .client
            .request(options.method.clone(), url)
            .header(REQUEST_ID_HEADER, request_id);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(key) = bearer {
            builder = builder.bearer_auth(key);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, bytes))
        };

        match tokio::time::timeout(timeout, exchange).await {
            Err(_) => Err(AttemptError::Timeout),
            Ok(Err(e)) if e.is_timeout() => Err(AttemptError::Timeout),
            Ok(Err(e)) => Err(AttemptError::Transport(e.to_string())),
            Ok(Ok((status, headers, bytes))) => Ok(HttpResponse {
                data: ResponseBody::parse(&headers, &bytes),
                status,
                headers,
                elapsed: started.elapsed(),
            }),
        }
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn reason(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn client(config: ApiConfig) -> HttpClient {
        HttpClient::new(&config).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let http = client(ApiConfig {
            base_url: "http://localhost:8000/api/v1/".to_string(),
            ..ApiConfig::default()
        });
        assert_eq!(http.url("/query"), "http://localhost:8000/api/v1/query");
        assert_eq!(http.url("jobs/abc"), "http://localhost:8000/api/v1/jobs/abc");
        assert_eq!(http.url("https://other/x"), "https://other/x");
    }

    #[test]
    fn test_bearer_selection() {
        let http = client(ApiConfig {
            api_key: Some("k".to_string()),
            unauthenticated_paths: vec!["health/".to_string()],
            ..ApiConfig::default()
        });
        assert_eq!(http.bearer_for("/query", &RequestOptions::get()), Some("k"));
        assert_eq!(http.bearer_for("/health", &RequestOptions::get()), None);
        assert_eq!(http.bearer_for("/health?x=1", &RequestOptions::get()), None);
        assert_eq!(http.bearer_for("/query", &RequestOptions::get().without_auth()), None);

        let dev = client(ApiConfig {
            api_key: Some("k".to_string()),
            auth: AuthProfile::Development,
            ..ApiConfig::default()
        });
        assert_eq!(dev.bearer_for("/query", &RequestOptions::get()), None);

        let keyless = client(ApiConfig::default());
        assert_eq!(keyless.bearer_for("/query", &RequestOptions::get()), None);
    }

    #[test]
    fn test_body_parsing_follows_content_type() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            ResponseBody::parse(&headers, br#"{"a":1}"#),
            ResponseBody::Text(r#"{"a":1}"#.to_string())
        );

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert_eq!(
            ResponseBody::parse(&headers, br#"{"a":1}"#),
            ResponseBody::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(
            ResponseBody::parse(&headers, b"not json"),
            ResponseBody::Text("not json".to_string())
        );
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(reason(503), "Service Unavailable");
        assert_eq!(reason(599), "HTTP 599");
    }
}
