//! Scripted [`HttpBackend`] used by unit tests.
//!
//! The handler sees every request together with a mutable cookie map, which
//! stands in for the cookies the real backend would set.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use url::Url;

use crate::error::ApiError;
use crate::transport::{HttpBackend, HttpRequest, HttpResponse};

pub(crate) type Cookies = HashMap<String, String>;

type Handler = dyn Fn(&HttpRequest, &mut Cookies) -> Reply + Send + Sync;

/// What the fake backend answers with.
pub(crate) struct Reply(Result<HttpResponse, ApiError>);

impl Reply {
    pub(crate) fn status(status: u16) -> Self {
        Self::raw(status, b"")
    }

    pub(crate) fn raw(status: u16, body: &[u8]) -> Self {
        Reply(Ok(HttpResponse {
            status,
            body: body.to_vec(),
        }))
    }

    pub(crate) fn json(status: u16, body: serde_json::Value) -> Self {
        Self::raw(status, body.to_string().as_bytes())
    }

    pub(crate) fn network(reason: &str) -> Self {
        Reply(Err(ApiError::Network(reason.to_string())))
    }
}

pub(crate) struct FakeBackend {
    handler: Box<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
    cookies: Mutex<Cookies>,
}

impl FakeBackend {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest, &mut Cookies) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            cookies: Mutex::new(HashMap::new()),
        })
    }

    /// Every request sent so far, in order.
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests sent to `method path`.
    pub(crate) fn count(&self, method: &str, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == method && r.url.path() == path)
            .count()
    }

    pub(crate) fn set_cookie(&self, name: &str, value: &str) {
        self.cookies
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }
}

#[async_trait]
impl HttpBackend for FakeBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut cookies = self.cookies.lock().unwrap();
        (self.handler)(&request, &mut *cookies).0
    }

    fn cookie(&self, _url: &Url, name: &str) -> Option<String> {
        self.cookies.lock().unwrap().get(name).cloned()
    }
}

/// Wraps a [`FakeBackend`] and holds every request until [`open`] is called.
///
/// [`open`]: GatedBackend::open
pub(crate) struct GatedBackend {
    inner: Arc<FakeBackend>,
    gate: Semaphore,
}

impl GatedBackend {
    pub(crate) fn new(inner: Arc<FakeBackend>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gate: Semaphore::new(0),
        })
    }

    /// Let held and future requests through.
    pub(crate) fn open(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl HttpBackend for GatedBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        self.inner.send(request).await
    }

    fn cookie(&self, url: &Url, name: &str) -> Option<String> {
        self.inner.cookie(url, name)
    }
}

impl HttpRequest {
    pub(crate) fn path(&self) -> &str {
        self.url.path()
    }

    pub(crate) fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    }

    pub(crate) fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_ref()
            .and_then(|b| serde_json::from_slice(b).ok())
    }
}
