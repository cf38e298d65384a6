//! Admin user-management endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::Role;
use super::{ApiEnvelope, MaybeEnveloped};
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::transport::ApiRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminUserStatus {
    Active,
    Inactive,
    Banned,
}

impl AdminUserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminUserStatus::Active => "active",
            AdminUserStatus::Inactive => "inactive",
            AdminUserStatus::Banned => "banned",
        }
    }
}

impl std::str::FromStr for AdminUserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(AdminUserStatus::Active),
            "inactive" => Ok(AdminUserStatus::Inactive),
            "banned" => Ok(AdminUserStatus::Banned),
            other => Err(format!("unknown user status: {}", other)),
        }
    }
}

/// A user as seen by administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub role: Role,
    pub status: AdminUserStatus,
    #[serde(default)]
    pub tz: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Query for `GET /admin/users`.
#[derive(Debug, Clone, Default)]
pub struct ListAdminUsersParams {
    /// Free-text search over email and name.
    pub q: Option<String>,
    pub role: Option<Role>,
    pub status: Option<AdminUserStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Body for `PATCH /admin/users/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminUserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AdminUserStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatsOverview {
    pub total_users: u64,
    pub active_users: u64,
    pub banned_users: u64,
    pub admins: u64,
}

/// Admin endpoints. The backend rejects non-admin sessions with 403.
pub struct AdminApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AdminApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list_users(
        &self,
        params: &ListAdminUsersParams,
    ) -> Result<ApiEnvelope<Vec<AdminUser>>, ApiError> {
        let request = ApiRequest::get("/admin/users")
            .query_opt("q", params.q.as_deref().filter(|q| !q.is_empty()))
            .query_opt("role", params.role)
            .query_opt("status", params.status.map(|s| s.as_str()))
            .query_opt("page", params.page)
            .query_opt("pageSize", params.page_size);
        self.client.transport().fetch(request).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<AdminUser, ApiError> {
        let user: MaybeEnveloped<AdminUser> = self
            .client
            .transport()
            .fetch(ApiRequest::get("/admin/users").segment(user_id))
            .await?;
        Ok(user.into_data())
    }

    pub async fn update_user(
        &self,
        user_id: &str,
        payload: &AdminUserUpdate,
    ) -> Result<AdminUser, ApiError> {
        let request = ApiRequest::patch("/admin/users")
            .segment(user_id)
            .json(payload)?;
        let user: MaybeEnveloped<AdminUser> = self.client.csrf().fetch(request).await?;
        Ok(user.into_data())
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<(), ApiError> {
        self.client
            .csrf()
            .dispatch(ApiRequest::delete("/admin/users").segment(user_id))
            .await
    }

    pub async fn ban_user(&self, user_id: &str) -> Result<AdminUser, ApiError> {
        let request = ApiRequest::post("/admin/users")
            .segment(user_id)
            .segment("ban");
        let user: MaybeEnveloped<AdminUser> = self.client.csrf().fetch(request).await?;
        Ok(user.into_data())
    }

    pub async fn stats_overview(&self) -> Result<AdminStatsOverview, ApiError> {
        let stats: MaybeEnveloped<AdminStatsOverview> = self
            .client
            .transport()
            .fetch(ApiRequest::get("/admin/stats/overview"))
            .await?;
        Ok(stats.into_data())
    }
}
