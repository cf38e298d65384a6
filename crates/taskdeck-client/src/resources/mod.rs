//! Typed resource clients.
//!
//! Each client is a borrowed view over [`ApiClient`](crate::ApiClient): reads
//! go straight through the transport, mutations through the CSRF manager.
//!
//! - `auth` - current user, sign-in/sign-up/sign-out
//! - `tasks` - task CRUD
//! - `admin` - user administration and stats
//! - `motivation` - message of the hour
//! - `assist` - AI task assistant

pub mod admin;
pub mod assist;
pub mod auth;
pub mod motivation;
pub mod tasks;

use serde::{Deserialize, Serialize};

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Standard response envelope: `{data, meta?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

/// A single-item response that may or may not be wrapped in an envelope.
///
/// Some endpoints answer with `{data: T}`, others with `T` directly.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum MaybeEnveloped<T> {
    Wrapped(ApiEnvelope<T>),
    Bare(T),
}

impl<T> MaybeEnveloped<T> {
    pub(crate) fn into_data(self) -> T {
        match self {
            MaybeEnveloped::Wrapped(envelope) => envelope.data,
            MaybeEnveloped::Bare(data) => data,
        }
    }
}

/// Sort direction shared by list calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}
