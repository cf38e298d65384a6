//! Session-aware client for the Taskdeck HTTP API.
//!
//! The pieces stack from the bottom up:
//!
//! - [`transport`] sends JSON requests with credentials and turns failures
//!   into [`ApiError`].
//! - [`csrf`] keeps the double-submit token and retries a protected request
//!   once after an auth failure.
//! - [`resources`] wraps each endpoint family (tasks, admin, motivation,
//!   assist, auth) behind typed methods.
//! - [`session`] tracks who is signed in and publishes changes to subscribers.
//!
//! ```ignore
//! use taskdeck_client::{ApiClient, ClientConfig, SessionStore};
//!
//! let client = ApiClient::new(&ClientConfig::from_env()?)?;
//! let session = SessionStore::new(client);
//! session.hydrate().await;
//! let tasks = session.client().tasks().list(&Default::default()).await?;
//! ```

pub mod client;
pub mod config;
pub mod csrf;
pub mod error;
pub mod resources;
pub mod result_ext;
pub mod scope;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use csrf::CsrfManager;
pub use error::{ApiError, ValidationDetail};
pub use result_ext::ApiResultExt;
pub use scope::{ScopeGuard, ScopeToken};
pub use session::{Session, SessionStatus, SessionStore};
pub use transport::{ApiRequest, HttpBackend, ReqwestBackend, Transport};
