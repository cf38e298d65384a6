//! Session store.
//!
//! One [`SessionStore`] exists per running client. It is a cheap, cloneable
//! handle meant to be passed to whatever needs to know who is signed in.
//!
//! # State machine
//!
//! ```text
//! Unknown --hydrate--> Hydrating --/auth/me ok--> Authenticated(user)
//!                                \--any failure--> Anonymous
//! Authenticated | Anonymous --sign_in / sign_up ok--> Authenticated(user)
//! any --sign_out (ok or not)--> Anonymous
//! ```
//!
//! Every transition is a single write to a `watch` channel, so observers never
//! see a half-applied state. Failed sign-in/sign-up leave the state untouched.

use std::sync::Arc;
use tokio::sync::{watch, OnceCell};

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::resources::auth::{SignInRequest, SignUpRequest, UserSummary};

/// Authentication status of the running client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    Unknown,
    Hydrating,
    Authenticated(UserSummary),
    Anonymous,
}

impl SessionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            SessionStatus::Unknown => "unknown",
            SessionStatus::Hydrating => "hydrating",
            SessionStatus::Authenticated(_) => "authenticated",
            SessionStatus::Anonymous => "anonymous",
        }
    }
}

/// Snapshot of the session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub status: SessionStatus,
    /// CSRF token read from the cookie jar at the last session transition
    /// or [`SessionStore::sync_csrf_token`] call. Protected requests always
    /// read the jar directly, so a stale value here never affects them.
    pub csrf_token: Option<String>,
}

impl Session {
    pub fn user(&self) -> Option<&UserSummary> {
        match &self.status {
            SessionStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.status, SessionStatus::Authenticated(_))
    }

    /// True once hydration (or a sign-in/out) has produced a definite answer.
    pub fn is_settled(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Authenticated(_) | SessionStatus::Anonymous
        )
    }
}

/// Puts a half-finished hydration back to `Unknown` so the next
/// `hydrate()` can start over.
struct HydrationRollback<'a> {
    state: &'a watch::Sender<Session>,
    armed: bool,
}

impl Drop for HydrationRollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let rolled_back = self.state.send_if_modified(|session| {
            if session.status == SessionStatus::Hydrating {
                session.status = SessionStatus::Unknown;
                true
            } else {
                false
            }
        });
        if rolled_back {
            tracing::debug!("Hydration cancelled, session reset to unknown");
        }
    }
}

struct Inner {
    client: ApiClient,
    state: watch::Sender<Session>,
    hydration: OnceCell<()>,
}

/// Process-wide session state plus the operations that change it.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    pub fn new(client: ApiClient) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            inner: Arc::new(Inner {
                client,
                state,
                hydration: OnceCell::new(),
            }),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status.clone()
    }

    pub fn user(&self) -> Option<UserSummary> {
        self.inner.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.inner.state.borrow().csrf_token.clone()
    }

    /// Re-read the CSRF cookie into the snapshot.
    ///
    /// The backend may rotate the token on any protected call. Subscribers are
    /// only notified when the value actually changed.
    pub fn sync_csrf_token(&self) -> Option<String> {
        let token = self.inner.client.csrf().current_token();
        self.inner.state.send_if_modified(|session| {
            if session.csrf_token == token {
                return false;
            }
            session.csrf_token = token.clone();
            true
        });
        token
    }

    /// Watch every state transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Find out whether a session already exists.
    ///
    /// Runs the `/auth/me` probe at most once per store: concurrent callers
    /// wait on the in-flight probe, later callers return immediately. Failure
    /// is not an error; it settles the session as anonymous.
    pub async fn hydrate(&self) {
        self.inner
            .hydration
            .get_or_init(|| self.run_hydration())
            .await;
    }

    async fn run_hydration(&self) {
        let started = self.inner.state.send_if_modified(|session| {
            if session.status == SessionStatus::Unknown {
                session.status = SessionStatus::Hydrating;
                true
            } else {
                false
            }
        });
        if !started {
            tracing::debug!(
                status = self.status().name(),
                "Session already settled, skipping hydration"
            );
            return;
        }

        // Dropping this future mid-probe must not strand the store in Hydrating.
        let mut rollback = HydrationRollback {
            state: &self.inner.state,
            armed: true,
        };
        let outcome = self.inner.client.auth().me().await;
        rollback.armed = false;
        let token = self.inner.client.csrf().current_token();

        let status = match outcome {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Existing session found");
                SessionStatus::Authenticated(user)
            }
            Err(e) if e.is_auth_failure() => {
                tracing::debug!(status = ?e.status(), "No existing session");
                SessionStatus::Anonymous
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session probe failed, continuing as anonymous");
                SessionStatus::Anonymous
            }
        };

        // A sign-in or sign-out that landed while the probe was in flight wins.
        let applied = self.inner.state.send_if_modified(|session| {
            if session.status != SessionStatus::Hydrating {
                return false;
            }
            session.status = status;
            session.csrf_token = token;
            true
        });
        if !applied {
            tracing::debug!("Hydration result discarded, session changed while probing");
        }
    }

    /// Sign in. On failure the current state is left as it was.
    pub async fn sign_in(&self, credentials: &SignInRequest) -> Result<UserSummary, ApiError> {
        let user = self.inner.client.auth().sign_in(credentials).await?;
        self.authenticate(user.clone());
        tracing::info!(user_id = %user.id, "Signed in");
        Ok(user)
    }

    /// Register and sign in. On failure the current state is left as it was.
    pub async fn sign_up(&self, registration: &SignUpRequest) -> Result<UserSummary, ApiError> {
        let user = self.inner.client.auth().sign_up(registration).await?;
        self.authenticate(user.clone());
        tracing::info!(user_id = %user.id, "Signed up");
        Ok(user)
    }

    /// Sign out.
    ///
    /// Local state becomes anonymous whatever the backend says; a backend
    /// failure is still returned so the caller can report it.
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        let outcome = self.inner.client.auth().sign_out().await;
        let token = self.inner.client.csrf().current_token();

        self.inner.state.send_modify(|session| {
            session.status = SessionStatus::Anonymous;
            session.csrf_token = token;
        });

        match &outcome {
            Ok(()) => tracing::info!("Signed out"),
            Err(e) => tracing::warn!(
                error = %e,
                "Sign-out call failed; local session cleared anyway"
            ),
        }
        outcome
    }

    /// Mark the session signed in without contacting the backend.
    ///
    /// Development builds only.
    #[cfg(feature = "dev-login")]
    pub fn dev_sign_in(&self, user: UserSummary) {
        tracing::warn!(user_id = %user.id, "Development sign-in, backend not consulted");
        self.authenticate(user);
    }

    fn authenticate(&self, user: UserSummary) {
        let token = self.inner.client.csrf().current_token();
        self.inner.state.send_modify(|session| {
            session.status = SessionStatus::Authenticated(user);
            session.csrf_token = token;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::test_support::{Cookies, FakeBackend, GatedBackend, Reply};
    use crate::transport::HttpRequest;
    use serde_json::json;
    use std::sync::{Mutex, OnceLock};

    fn user_json(id: &str) -> serde_json::Value {
        json!({"id": id, "email": format!("{}@example.com", id), "name": "Ada", "role": "user"})
    }

    fn store<F>(handler: F) -> (SessionStore, Arc<FakeBackend>)
    where
        F: Fn(&HttpRequest, &mut Cookies) -> Reply + Send + Sync + 'static,
    {
        let backend = FakeBackend::new(handler);
        let config = ClientConfig::default().with_base_url("http://api.test");
        let client = ApiClient::with_backend(&config, backend.clone()).unwrap();
        (SessionStore::new(client), backend)
    }

    fn gated_store<F>(handler: F) -> (SessionStore, Arc<FakeBackend>, Arc<GatedBackend>)
    where
        F: Fn(&HttpRequest, &mut Cookies) -> Reply + Send + Sync + 'static,
    {
        let backend = FakeBackend::new(handler);
        let gate = GatedBackend::new(backend.clone());
        let config = ClientConfig::default().with_base_url("http://api.test");
        let client = ApiClient::with_backend(&config, gate.clone()).unwrap();
        (SessionStore::new(client), backend, gate)
    }

    fn sign_in_request() -> SignInRequest {
        SignInRequest {
            email: "ada@example.com".to_string(),
            password: "correct horse".to_string(),
            remember_me: Some(true),
        }
    }

    #[tokio::test]
    async fn test_starts_unknown() {
        let (store, backend) = store(|_, _| Reply::status(204));
        assert_eq!(store.status(), SessionStatus::Unknown);
        assert!(!store.snapshot().is_settled());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_existing_session() {
        let (store, backend) = store(|_, _| Reply::json(200, json!({"user": user_json("u1")})));
        backend.set_cookie("csrf_token", "tok");

        store.hydrate().await;

        let session = store.snapshot();
        assert_eq!(session.user().map(|u| u.id.as_str()), Some("u1"));
        assert_eq!(session.csrf_token.as_deref(), Some("tok"));
        assert_eq!(backend.count("GET", "/auth/me"), 1);
    }

    #[tokio::test]
    async fn test_hydrate_401_settles_anonymous_without_error() {
        let (store, _backend) =
            store(|_, _| Reply::json(401, json!({"detail": "Not authenticated"})));

        store.hydrate().await;

        assert_eq!(store.status(), SessionStatus::Anonymous);
        assert!(store.user().is_none());
        assert!(store.snapshot().is_settled());
    }

    #[tokio::test]
    async fn test_hydrate_network_failure_settles_anonymous() {
        let (store, _backend) = store(|_, _| Reply::network("connection refused"));
        store.hydrate().await;
        assert_eq!(store.status(), SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_status_is_hydrating_during_probe() {
        let probe: Arc<OnceLock<watch::Receiver<Session>>> = Arc::new(OnceLock::new());
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let (probe_h, seen_h) = (probe.clone(), seen.clone());
        let (store, _backend) = store(move |_, _| {
            if let Some(rx) = probe_h.get() {
                seen_h.lock().unwrap().push(rx.borrow().status.name());
            }
            Reply::json(401, json!({}))
        });
        probe.set(store.subscribe()).unwrap();

        store.hydrate().await;

        assert_eq!(*seen.lock().unwrap(), vec!["hydrating"]);
        assert_eq!(store.status(), SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_repeated_hydrate_probes_once() {
        let (store, backend) =
            store(|_, _| Reply::json(200, json!({"data": user_json("u1")})));

        let other = store.clone();
        tokio::join!(store.hydrate(), store.hydrate(), other.hydrate());
        store.hydrate().await;

        assert_eq!(backend.count("GET", "/auth/me"), 1);
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_concurrent_hydrate_waits_on_one_probe() {
        let (store, backend, gate) = gated_store(|_, _| Reply::json(401, json!({})));
        let other = store.clone();

        let mut first = tokio_test::task::spawn(store.hydrate());
        let mut second = tokio_test::task::spawn(other.hydrate());
        tokio_test::assert_pending!(first.poll());
        tokio_test::assert_pending!(second.poll());
        assert_eq!(store.status(), SessionStatus::Hydrating);

        gate.open();
        tokio_test::assert_ready!(first.poll());
        tokio_test::assert_ready!(second.poll());

        assert_eq!(backend.count("GET", "/auth/me"), 1);
        assert_eq!(store.status(), SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_dropped_hydrate_can_be_retried() {
        let (store, backend, gate) =
            gated_store(|_, _| Reply::json(200, json!({"user": user_json("u1")})));

        let mut pending = tokio_test::task::spawn(store.hydrate());
        tokio_test::assert_pending!(pending.poll());
        assert_eq!(store.status(), SessionStatus::Hydrating);

        drop(pending);
        assert_eq!(store.status(), SessionStatus::Unknown);

        gate.open();
        store.hydrate().await;

        assert!(store.is_authenticated());
        assert_eq!(backend.count("GET", "/auth/me"), 1);
    }

    #[tokio::test]
    async fn test_sync_csrf_token_after_rotation() {
        let (store, backend) = store(|req, cookies| match req.path() {
            "/auth/signin" => Reply::json(200, json!({"user": user_json("u1")})),
            "/tasks/t-1" => {
                cookies.insert("csrf_token".to_string(), "rotated".to_string());
                Reply::status(204)
            }
            _ => Reply::status(404),
        });
        backend.set_cookie("csrf_token", "tok");

        store.sign_in(&sign_in_request()).await.unwrap();
        store.client().tasks().delete("t-1").await.unwrap();
        assert_eq!(store.csrf_token().as_deref(), Some("tok"));

        let mut rx = store.subscribe();
        assert_eq!(store.sync_csrf_token().as_deref(), Some("rotated"));
        assert_eq!(store.csrf_token().as_deref(), Some("rotated"));
        assert!(rx.has_changed().unwrap());

        let _ = rx.borrow_and_update();
        store.sync_csrf_token();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_sign_in_with_token_makes_one_mutating_call() {
        let (store, backend) = store(|req, _| match req.path() {
            "/auth/me" => Reply::json(401, json!({"detail": "Not authenticated"})),
            "/auth/signin" => Reply::json(200, json!({"user": user_json("u7")})),
            _ => Reply::status(404),
        });
        backend.set_cookie("csrf_token", "tok");

        store.hydrate().await;
        assert_eq!(store.status(), SessionStatus::Anonymous);

        let user = store.sign_in(&sign_in_request()).await.unwrap();

        assert_eq!(user.id, "u7");
        assert_eq!(store.user(), Some(user));
        assert_eq!(backend.count("POST", "/auth/signin"), 1);
        assert_eq!(backend.count("GET", "/auth/csrf"), 0);

        let sent = backend.requests();
        let signin = sent.iter().find(|r| r.path() == "/auth/signin").unwrap();
        assert_eq!(signin.header("x-csrf-token").as_deref(), Some("tok"));
        assert_eq!(
            signin.json_body(),
            Some(json!({
                "email": "ada@example.com",
                "password": "correct horse",
                "rememberMe": true
            }))
        );
    }

    #[tokio::test]
    async fn test_sign_in_picks_up_rotated_token() {
        let (store, backend) = store(|req, cookies| match req.path() {
            "/auth/csrf" => {
                cookies.insert("csrf_token".to_string(), "boot".to_string());
                Reply::status(204)
            }
            "/auth/signin" => {
                cookies.insert("csrf_token".to_string(), "rotated".to_string());
                Reply::json(200, json!({"user": user_json("u1")}))
            }
            _ => Reply::status(401),
        });

        store.sign_in(&sign_in_request()).await.unwrap();

        assert_eq!(store.csrf_token().as_deref(), Some("rotated"));
        assert_eq!(backend.count("GET", "/auth/csrf"), 1);
    }

    #[tokio::test]
    async fn test_failed_sign_in_leaves_state_untouched() {
        let (store, backend) = store(|req, _| match req.path() {
            "/auth/me" => Reply::json(200, json!({"user": user_json("u1")})),
            _ => Reply::json(
                422,
                json!({"detail": [{"loc": ["body", "password"], "msg": "too short"}]}),
            ),
        });
        backend.set_cookie("csrf_token", "tok");
        store.hydrate().await;
        let before = store.snapshot();

        let err = store.sign_in(&sign_in_request()).await.unwrap_err();

        assert_eq!(err.status(), Some(422));
        assert_eq!(err.field_errors().get("password").map(String::as_str), Some("too short"));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_sign_in_without_obtainable_token() {
        let (store, backend) = store(|_, _| Reply::status(204));

        let err = store.sign_in(&sign_in_request()).await.unwrap_err();

        assert!(err.is_missing_csrf());
        assert_eq!(backend.count("POST", "/auth/signin"), 0);
        assert_eq!(store.status(), SessionStatus::Unknown);
    }

    #[tokio::test]
    async fn test_sign_up_authenticates() {
        let (store, backend) = store(|req, _| match req.path() {
            "/auth/signup" => Reply::json(201, json!({"user": user_json("new")})),
            _ => Reply::status(401),
        });
        backend.set_cookie("csrf_token", "tok");
        let mut rx = store.subscribe();

        store
            .sign_up(&SignUpRequest {
                email: "new@example.com".to_string(),
                password: "S3cret!pass".to_string(),
                name: Some("New".to_string()),
            })
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().user().map(|u| u.id.clone()), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_sign_out_clears_state() {
        let (store, backend) = store(|req, _| match req.path() {
            "/auth/signin" => Reply::json(200, json!({"user": user_json("u1")})),
            "/auth/signout" => Reply::status(204),
            _ => Reply::status(404),
        });
        backend.set_cookie("csrf_token", "tok");

        store.sign_in(&sign_in_request()).await.unwrap();
        store.sign_out().await.unwrap();

        assert_eq!(store.status(), SessionStatus::Anonymous);
        assert_eq!(backend.count("POST", "/auth/signout"), 1);
    }

    #[tokio::test]
    async fn test_sign_out_network_failure_still_clears_state() {
        let (store, backend) = store(|req, _| match req.path() {
            "/auth/signin" => Reply::json(200, json!({"user": user_json("u1")})),
            _ => Reply::network("connection reset"),
        });
        backend.set_cookie("csrf_token", "tok");
        store.sign_in(&sign_in_request()).await.unwrap();

        let err = store.sign_out().await.unwrap_err();

        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(store.status(), SessionStatus::Anonymous);
        assert!(store.user().is_none());
    }

    #[tokio::test]
    async fn test_hydrate_after_sign_in_is_noop() {
        let (store, backend) = store(|req, _| match req.path() {
            "/auth/signin" => Reply::json(200, json!({"user": user_json("u1")})),
            _ => Reply::status(401),
        });
        backend.set_cookie("csrf_token", "tok");

        store.sign_in(&sign_in_request()).await.unwrap();
        store.hydrate().await;

        assert!(store.is_authenticated());
        assert_eq!(backend.count("GET", "/auth/me"), 0);
    }

    #[cfg(feature = "dev-login")]
    #[tokio::test]
    async fn test_dev_sign_in_skips_backend() {
        let (store, backend) = store(|_, _| Reply::status(500));
        let user: UserSummary = serde_json::from_value(user_json("dev-user")).unwrap();

        store.dev_sign_in(user.clone());

        assert_eq!(store.user(), Some(user));
        assert!(backend.requests().is_empty());
    }
}
