//! Web API transport client.
//!
//! Every call resolves to one of three outcomes: a transport failure
//! ([`WebApiError::Transport`]), a soft failure (an [`ApiResponse`] whose `ok`
//! flag is false, logged and returned as data), or a successful response.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

/// Production Web API base URL.
pub const WEB_API_BASE_URL: &str = "https://slack.com/api";
/// Content type sent with every call. The charset must be explicit.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Call parameters. Threaded verbatim into query strings or JSON bodies.
pub type Params = BTreeMap<String, String>;

/// Parameter keys whose values never appear in logs or error text.
pub const REDACTED_PARAMS: &[&str] = &["client_secret", "code"];
const REDACTED: &str = "[REDACTED]";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WebApiDefaults;

impl WebApiDefaults {
    pub const BASE_URL: &'static str = WEB_API_BASE_URL;
    pub const HANDSHAKE_BACKOFF: Duration = Duration::from_secs(5);
}

/// Construction options for [`WebApiClient`].
#[derive(Clone, Debug)]
pub struct WebApiClientOptions {
    /// Base URL that method names are joined onto.
    pub base_url: String,
    /// Optional TCP connect timeout. Calls themselves are never timed out.
    pub connect_timeout: Option<Duration>,
    /// Delay between soft-failed realtime handshake attempts.
    pub handshake_backoff: Duration,
    /// Upper bound on pages fetched by the paginator. `None` trusts the server.
    pub max_pages: Option<usize>,
}

impl Default for WebApiClientOptions {
    fn default() -> Self {
        Self {
            base_url: WebApiDefaults::BASE_URL.to_string(),
            connect_timeout: None,
            handshake_backoff: WebApiDefaults::HANDSHAKE_BACKOFF,
            max_pages: None,
        }
    }
}

/// HTTP verb used for a call: `Get` for queries, `Post` for mutations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HttpVerb {
    Get,
    Post,
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// Authenticated Web API client.
///
/// Cloning is cheap: the underlying connection pool is shared and never
/// mutated by calls.
#[derive(Clone)]
pub struct WebApiClient {
    http: Client,
    token: Option<SecretString>,
    base_url: String,
    pub(crate) handshake_backoff: Duration,
    pub(crate) max_pages: Option<usize>,
}

impl fmt::Debug for WebApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl WebApiClient {
    /// Creates an unauthenticated client. Only useful for `oauth.access`.
    pub fn new() -> Result<Self, WebApiError> {
        Self::with_options(None, WebApiClientOptions::default())
    }

    /// Creates a client that sends `token` as a bearer credential.
    pub fn with_token(token: SecretString) -> Result<Self, WebApiError> {
        Self::with_options(Some(token), WebApiClientOptions::default())
    }

    pub fn with_options(
        token: Option<SecretString>,
        options: WebApiClientOptions,
    ) -> Result<Self, WebApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(WebApiError::Request)?;

        Ok(Self {
            http,
            token,
            base_url: normalize_base_url(&options.base_url),
            handshake_backoff: options.handshake_backoff,
            max_pages: options.max_pages,
        })
    }

    /// Overrides the API base URL.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.base_url = normalize_base_url(base_url.as_ref());
        self
    }

    /// Caps how many pages [`WebApiClient::paginate`] will request.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Sets the delay between soft-failed realtime handshake attempts.
    pub fn with_handshake_backoff(mut self, backoff: Duration) -> Self {
        self.handshake_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, method: &str, params: &Params) -> Result<ApiResponse, WebApiError> {
        self.call(method, params, HttpVerb::Get).await
    }

    pub async fn post(&self, method: &str, params: &Params) -> Result<ApiResponse, WebApiError> {
        self.call(method, params, HttpVerb::Post).await
    }

    /// Issues one Web API call.
    ///
    /// `GET` parameters are query-string encoded, `POST` parameters are sent
    /// as a JSON body. A response with `ok: false` is returned, not raised;
    /// callers inspect [`ApiResponse::ok`] themselves.
    pub async fn call(
        &self,
        method: &str,
        params: &Params,
        verb: HttpVerb,
    ) -> Result<ApiResponse, WebApiError> {
        let endpoint = self.endpoint(method);
        let traced = redact_params(params);
        info!(event = "web_api_call", method, verb = %verb, params = ?traced);

        let mut builder = match verb {
            HttpVerb::Get => self.http.get(&endpoint).query(params),
            HttpVerb::Post => {
                let body = serde_json::to_vec(params).map_err(WebApiError::Encode)?;
                self.http.post(&endpoint).body(body)
            }
        };
        builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        if let Some(token) = self.token.as_ref() {
            builder = builder.header(
                AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let response = builder.send().await.map_err(WebApiError::Request)?;
        let status = response.status();
        let body = response.text().await.map_err(WebApiError::Request)?;

        let response = parse_api_response(status, &body).ok_or_else(|| WebApiError::Transport {
            status,
            method: method.to_string(),
            body: body.clone(),
            payload: traced.clone(),
        })?;

        if !response.ok() {
            warn!(
                event = "web_api_soft_failure",
                status = status.as_u16(),
                method,
                body = %body,
                params = ?traced
            );
        }

        Ok(response)
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }
}

/// Copy of `params` safe for logs and diagnostics; the wire copy is untouched.
fn redact_params(params: &Params) -> Params {
    params
        .iter()
        .map(|(key, value)| {
            let value = if REDACTED_PARAMS.contains(&key.as_str()) {
                REDACTED.to_string()
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect()
}

fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Accepts only statuses in `[200, 400)` whose body is a JSON object
/// carrying a boolean `ok`.
fn parse_api_response(status: StatusCode, body: &str) -> Option<ApiResponse> {
    if !(200..400).contains(&status.as_u16()) {
        return None;
    }
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
        return None;
    };
    if !fields.get("ok").is_some_and(Value::is_boolean) {
        return None;
    }
    Some(ApiResponse { status, fields })
}

/// Parsed response envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    status: StatusCode,
    fields: Map<String, Value>,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The envelope's success flag.
    pub fn ok(&self) -> bool {
        self.fields.get("ok").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Server-reported error string for soft failures.
    pub fn error(&self) -> Option<&str> {
        self.fields.get("error").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Continuation cursor from `response_metadata.next_cursor`.
    ///
    /// An empty cursor is reported as `None`.
    pub fn next_cursor(&self) -> Option<&str> {
        self.fields
            .get("response_metadata")
            .and_then(|meta| meta.get("next_cursor"))
            .and_then(Value::as_str)
            .filter(|cursor| !cursor.is_empty())
    }

    /// Deserializes the whole envelope into a typed response.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, WebApiError> {
        T::deserialize(Value::Object(self.fields.clone())).map_err(WebApiError::Decode)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    #[cfg(test)]
    pub(crate) fn from_json(value: Value) -> Self {
        parse_api_response(StatusCode::OK, &value.to_string()).expect("valid envelope")
    }
}

#[derive(Debug, Error)]
pub enum WebApiError {
    #[error("request failed: {0}")]
    Request(reqwest::Error),

    #[error("web api transport error: status={status} method={method} body={body} payload={payload:?}")]
    Transport {
        status: StatusCode,
        method: String,
        body: String,
        /// Request parameters with [`REDACTED_PARAMS`] values masked.
        payload: Params,
    },

    #[error("failed to encode request body: {0}")]
    Encode(serde_json::Error),

    #[error("failed to decode response: {0}")]
    Decode(serde_json::Error),
}
