//! HTTP transport.
//!
//! [`Transport`] is the single place a request turns into a network call. It
//! resolves paths against the configured origin, sets the JSON content type,
//! and classifies the response into a decoded body or an [`ApiError`].
//!
//! The network itself sits behind [`HttpBackend`], which pairs a credentialed
//! call with read access to the cookies the backend has set. The production
//! backend is [`ReqwestBackend`]: a `reqwest` client sharing one cookie jar
//! across every call, so the session and CSRF cookies always travel along.

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

use crate::error::ApiError;

/// A fully resolved request handed to an [`HttpBackend`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Raw response returned by an [`HttpBackend`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Credentialed HTTP access plus read access to backend-set cookies.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Send a request with cookies attached, returning the raw response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;

    /// Read a cookie visible to `url` by name.
    fn cookie(&self, url: &Url, name: &str) -> Option<String>;
}

/// `reqwest` backend with a shared cookie jar.
#[derive(Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl ReqwestBackend {
    /// Create a backend with an empty cookie jar.
    pub fn new() -> Result<Self, ApiError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        Ok(Self { client, jar })
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, body })
    }

    fn cookie(&self, url: &Url, name: &str) -> Option<String> {
        let header = self.jar.cookies(url)?;
        find_cookie(header.to_str().ok()?, name)
    }
}

/// Pick one cookie out of a `Cookie` header value (`a=1; b=2`).
pub(crate) fn find_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// A request as callers describe it, before path resolution.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Extra path segments appended after `path`, percent-encoded on send.
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Create a request with no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            segments: Vec::new(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Append a path segment such as a resource id.
    ///
    /// The value is percent-encoded, so `/`, `?` and `#` stay inside the
    /// segment. Empty, `.` and `..` segments are rejected when sent.
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Append a query parameter.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Append a query parameter when a value is present.
    pub fn query_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Set a header, replacing any previous value.
    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, ApiError> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidRequest(format!("header {}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Whether the request changes server state and therefore needs a CSRF token.
    pub fn is_mutating(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD | Method::OPTIONS)
    }
}

/// Executes [`ApiRequest`]s against the configured origin.
#[derive(Clone)]
pub struct Transport {
    backend: Arc<dyn HttpBackend>,
    base_url: String,
    origin: Url,
}

impl Transport {
    /// Create a transport. Fails when `base_url` is not an absolute URL.
    pub fn new(base_url: &str, backend: Arc<dyn HttpBackend>) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let origin = Url::parse(&base_url)?;

        Ok(Self {
            backend,
            base_url,
            origin,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a path (or absolute URL) to the URL that will be requested.
    pub fn resolve(&self, path: &str) -> Result<Url, ApiError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }

        let url = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Ok(Url::parse(&url)?)
    }

    /// Read a backend-set cookie for the configured origin.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.backend.cookie(&self.origin, name)
    }

    /// Execute a request, decoding the body when there is one.
    ///
    /// Returns `Ok(None)` for 204 responses and for empty success bodies.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Option<T>, ApiError> {
        match self.round_trip(request).await? {
            Some(response) => decode_body(&response),
            None => Ok(None),
        }
    }

    /// Execute a request whose success response must carry a body.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        match self.round_trip(request).await? {
            Some(response) => decode_body(&response)?
                .ok_or_else(|| ApiError::decode(response.status, "empty response body")),
            None => Err(ApiError::decode(204, "empty response body")),
        }
    }

    /// Execute a request and discard any success body.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.round_trip(request).await.map(|_| ())
    }

    /// Send the request and classify the status.
    ///
    /// `None` means 204; the body of such a response is never looked at.
    async fn round_trip(&self, request: ApiRequest) -> Result<Option<HttpResponse>, ApiError> {
        let mut url = self.resolve(&request.path)?;
        if !request.segments.is_empty() {
            if let Some(bad) = request
                .segments
                .iter()
                .find(|s| matches!(s.as_str(), "" | "." | ".."))
            {
                return Err(ApiError::InvalidRequest(format!(
                    "invalid path segment {:?}",
                    bad
                )));
            }
            let mut path = url.path_segments_mut().map_err(|_| {
                ApiError::InvalidRequest("base URL cannot take path segments".to_string())
            })?;
            path.pop_if_empty().extend(&request.segments);
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        let mut headers = request.headers;
        let body = match request.body {
            Some(body) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Some(serde_json::to_vec(&body)?)
            }
            None => None,
        };

        tracing::debug!(method = %request.method, url = %url, "Sending API request");

        let response = self
            .backend
            .send(HttpRequest {
                method: request.method.clone(),
                url: url.clone(),
                headers,
                body,
            })
            .await
            .map_err(|e| {
                tracing::debug!(
                    method = %request.method,
                    url = %url,
                    error = %e,
                    "API request failed"
                );
                e
            })?;

        tracing::debug!(
            method = %request.method,
            url = %url,
            status = response.status,
            "Received API response"
        );

        if response.status == 204 {
            return Ok(None);
        }

        if !(200..300).contains(&response.status) {
            return Err(ApiError::from_response(response.status, &response.body));
        }

        Ok(Some(response))
    }
}

fn decode_body<T: DeserializeOwned>(response: &HttpResponse) -> Result<Option<T>, ApiError> {
    if response.body.trim_ascii().is_empty() {
        return Ok(None);
    }

    serde_json::from_slice(&response.body)
        .map(Some)
        .map_err(|e| ApiError::decode(response.status, e.to_string()))
}
