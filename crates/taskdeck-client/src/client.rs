//! API client facade.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::csrf::CsrfManager;
use crate::error::ApiError;
use crate::resources::admin::AdminApi;
use crate::resources::assist::AssistApi;
use crate::resources::auth::AuthApi;
use crate::resources::motivation::MotivationApi;
use crate::resources::tasks::TasksApi;
use crate::transport::{HttpBackend, ReqwestBackend, Transport};

/// Transport plus CSRF manager, shared by every resource client.
///
/// Cloning is cheap; clones share the backend and therefore the cookie jar.
#[derive(Clone)]
pub struct ApiClient {
    transport: Transport,
    csrf: CsrfManager,
}

impl ApiClient {
    /// Create a client backed by `reqwest` with a fresh cookie jar.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let backend = ReqwestBackend::new()?;
        Self::with_backend(config, Arc::new(backend))
    }

    /// Create a client over a custom backend.
    pub fn with_backend(
        config: &ClientConfig,
        backend: Arc<dyn HttpBackend>,
    ) -> Result<Self, ApiError> {
        let transport = Transport::new(&config.api_base_url, backend)?;
        let csrf = CsrfManager::new(transport.clone(), config)?;

        tracing::debug!(
            base_url = %transport.base_url(),
            csrf_header = %csrf.header_name(),
            "API client created"
        );

        Ok(Self { transport, csrf })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn csrf(&self) -> &CsrfManager {
        &self.csrf
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn tasks(&self) -> TasksApi<'_> {
        TasksApi::new(self)
    }

    pub fn admin(&self) -> AdminApi<'_> {
        AdminApi::new(self)
    }

    pub fn motivation(&self) -> MotivationApi<'_> {
        MotivationApi::new(self)
    }

    pub fn assist(&self) -> AssistApi<'_> {
        AssistApi::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ApiClient::new(&ClientConfig::default()).unwrap();
        assert_eq!(client.transport().base_url(), "http://localhost:8000");
        assert_eq!(client.csrf().header_name().as_str(), "x-csrf-token");

        let config = ClientConfig::default().with_base_url("http://localhost:8000/api/");
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.transport().base_url(), "http://localhost:8000/api");
    }
}
