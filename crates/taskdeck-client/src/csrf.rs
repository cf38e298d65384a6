//! CSRF token lifecycle (double-submit cookie).
//!
//! The backend sets a client-readable cookie; every mutating request copies
//! its value into a header. The manager never writes the cookie itself: it
//! only reads it and, when missing or rejected, asks the backend to set it
//! again through the bootstrap endpoint.

use reqwest::header::HeaderName;
use serde::de::DeserializeOwned;
use std::future::Future;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::transport::{ApiRequest, Transport};

/// Attaches CSRF tokens to protected calls and recovers once from staleness.
#[derive(Clone)]
pub struct CsrfManager {
    transport: Transport,
    cookie_name: String,
    header_name: HeaderName,
    bootstrap_path: String,
}

impl CsrfManager {
    /// Create a manager reading `config.csrf_cookie_name` and sending
    /// `config.csrf_header_name`.
    pub fn new(transport: Transport, config: &ClientConfig) -> Result<Self, ApiError> {
        let header_name = HeaderName::from_bytes(config.csrf_header_name.as_bytes()).map_err(|e| {
            ApiError::InvalidRequest(format!(
                "invalid CSRF header name {:?}: {}",
                config.csrf_header_name, e
            ))
        })?;

        Ok(Self {
            transport,
            cookie_name: config.csrf_cookie_name.clone(),
            header_name,
            bootstrap_path: config.csrf_bootstrap_path.clone(),
        })
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    /// Token currently present in the cookie jar.
    pub fn current_token(&self) -> Option<String> {
        self.transport.cookie(&self.cookie_name)
    }

    /// Ask the backend to (re)issue the CSRF cookie.
    ///
    /// Safe to call redundantly; concurrent callers may each bootstrap.
    pub async fn bootstrap(&self) -> Result<(), ApiError> {
        tracing::debug!(path = %self.bootstrap_path, "Bootstrapping CSRF token");
        self.transport
            .dispatch(ApiRequest::get(self.bootstrap_path.as_str()))
            .await
    }

    /// Return the current token, bootstrapping it first when absent.
    pub async fn ensure_token(&self) -> Result<String, ApiError> {
        match self.current_token() {
            Some(token) => Ok(token),
            None => self.refresh_token().await,
        }
    }

    /// Bootstrap unconditionally and re-read the cookie.
    async fn refresh_token(&self) -> Result<String, ApiError> {
        self.bootstrap().await?;
        self.current_token().ok_or_else(|| {
            tracing::error!(
                cookie = %self.cookie_name,
                path = %self.bootstrap_path,
                "CSRF cookie still missing after bootstrap; check backend cookie settings"
            );
            ApiError::MissingCsrfToken
        })
    }

    /// Run a protected request with a valid token.
    ///
    /// `request_fn` receives the token to send. If it fails with 401 or 403 the
    /// token is re-bootstrapped and `request_fn` runs exactly once more; that
    /// second outcome is returned as is. `request_fn` is never invoked more
    /// than twice.
    pub async fn call_protected<T, F, Fut>(&self, mut request_fn: F) -> Result<T, ApiError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let token = self.ensure_token().await?;

        match request_fn(token).await {
            Err(err) if err.is_auth_failure() => {
                tracing::warn!(
                    status = ?err.status(),
                    error = %err,
                    "Protected request rejected, refreshing CSRF token and retrying once"
                );
                let token = self.refresh_token().await?;
                request_fn(token).await
            }
            outcome => outcome,
        }
    }

    /// Copy `token` into the CSRF header of `request`.
    pub fn attach(&self, request: ApiRequest, token: &str) -> Result<ApiRequest, ApiError> {
        request.header(self.header_name.clone(), token)
    }

    /// Protected counterpart of [`Transport::execute`].
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Option<T>, ApiError> {
        self.call_protected(|token| {
            let request = self.attach(request.clone(), &token);
            async move { self.transport.execute(request?).await }
        })
        .await
    }

    /// Protected counterpart of [`Transport::fetch`].
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.call_protected(|token| {
            let request = self.attach(request.clone(), &token);
            async move { self.transport.fetch(request?).await }
        })
        .await
    }

    /// Protected counterpart of [`Transport::dispatch`].
    pub async fn dispatch(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.call_protected(|token| {
            let request = self.attach(request.clone(), &token);
            async move { self.transport.dispatch(request?).await }
        })
        .await
    }
}
