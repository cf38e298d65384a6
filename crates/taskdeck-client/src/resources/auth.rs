//! Authentication endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::transport::ApiRequest;

/// Role of a principal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Cached projection of the signed-in principal. Owned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,

    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, alias = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// IANA time zone, e.g. `Asia/Seoul`.
    #[serde(default, alias = "timeZone", skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,

    #[serde(default)]
    pub role: Role,

    #[serde(default, alias = "emailVerified")]
    pub email_verified: bool,

    #[serde(default, alias = "avatarUrl", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserSummary {
    /// Best name to show for this user, falling back to the email.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// `POST /auth/signin` body.
#[derive(Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "rememberMe", default, skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<bool>,
}

impl fmt::Debug for SignInRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// `POST /auth/signup` body.
#[derive(Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

/// Auth responses come as `{user}` or as `{data: user}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AuthEnvelope {
    User { user: UserSummary },
    Data { data: UserSummary },
}

impl AuthEnvelope {
    fn into_user(self) -> UserSummary {
        match self {
            AuthEnvelope::User { user } | AuthEnvelope::Data { data: user } => user,
        }
    }
}

/// Authentication endpoints.
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `GET /auth/me`. Fails with 401 when there is no session.
    pub async fn me(&self) -> Result<UserSummary, ApiError> {
        let envelope: AuthEnvelope = self
            .client
            .transport()
            .fetch(ApiRequest::get("/auth/me"))
            .await?;
        Ok(envelope.into_user())
    }

    /// `POST /auth/signin` (protected).
    pub async fn sign_in(&self, credentials: &SignInRequest) -> Result<UserSummary, ApiError> {
        let request = ApiRequest::post("/auth/signin").json(credentials)?;
        let envelope: AuthEnvelope = self.client.csrf().fetch(request).await?;
        Ok(envelope.into_user())
    }

    /// `POST /auth/signup` (protected).
    pub async fn sign_up(&self, registration: &SignUpRequest) -> Result<UserSummary, ApiError> {
        let request = ApiRequest::post("/auth/signup").json(registration)?;
        let envelope: AuthEnvelope = self.client.csrf().fetch(request).await?;
        Ok(envelope.into_user())
    }

    /// `POST /auth/signout` (protected).
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        self.client
            .csrf()
            .dispatch(ApiRequest::post("/auth/signout"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_summary_from_snake_case() {
        let user: UserSummary = serde_json::from_value(json!({
            "id": "u1",
            "email": "ada@example.com",
            "name": "Ada",
            "tz": "Europe/London",
            "locale": "en-GB",
            "role": "admin",
            "email_verified": true
        }))
        .unwrap();

        assert_eq!(user.label(), "Ada");
        assert!(user.is_admin());
        assert!(user.email_verified);
        assert_eq!(user.tz.as_deref(), Some("Europe/London"));
    }

    #[test]
    fn test_user_summary_from_camel_case_with_defaults() {
        let user: UserSummary = serde_json::from_value(json!({
            "id": "u2",
            "email": "bob@example.com",
            "timeZone": "Asia/Seoul",
            "emailVerified": false
        }))
        .unwrap();

        assert_eq!(user.role, Role::User);
        assert_eq!(user.tz.as_deref(), Some("Asia/Seoul"));
        assert_eq!(user.label(), "bob@example.com");
    }

    #[test]
    fn test_sign_in_body_shape() {
        let body = serde_json::to_value(SignInRequest {
            email: "a@b.c".to_string(),
            password: "pw".to_string(),
            remember_me: Some(true),
        })
        .unwrap();
        assert_eq!(body, json!({"email": "a@b.c", "password": "pw", "rememberMe": true}));

        let body = serde_json::to_value(SignUpRequest {
            email: "a@b.c".to_string(),
            password: "pw".to_string(),
            name: None,
        })
        .unwrap();
        assert_eq!(body, json!({"email": "a@b.c", "password": "pw"}));
    }

    #[test]
    fn test_debug_redacts_password() {
        let request = SignInRequest {
            email: "a@b.c".to_string(),
            password: "hunter2".to_string(),
            remember_me: None,
        };
        assert!(!format!("{:?}", request).contains("hunter2"));
    }

    #[test]
    fn test_auth_envelope_shapes() {
        let user = json!({"id": "u1", "email": "a@b.c"});
        let a: AuthEnvelope = serde_json::from_value(json!({"user": user.clone()})).unwrap();
        let b: AuthEnvelope = serde_json::from_value(json!({"data": user})).unwrap();
        assert_eq!(a.into_user().id, "u1");
        assert_eq!(b.into_user().id, "u1");
    }
}
