//! Motivation-of-the-hour endpoint.

use serde::{Deserialize, Serialize};

use super::MaybeEnveloped;
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::transport::ApiRequest;

/// Name sent when the caller has none.
pub const DEFAULT_NAME: &str = "Friend";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motivation {
    /// Message generated for the current hour slot.
    pub message: String,
    #[serde(default)]
    pub quote: Option<Quote>,
    pub name: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

pub struct MotivationApi<'a> {
    client: &'a ApiClient,
}

impl<'a> MotivationApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `GET /motivation/now`. A blank `name` is sent as [`DEFAULT_NAME`].
    pub async fn now(
        &self,
        name: Option<&str>,
        locale: Option<&str>,
    ) -> Result<Motivation, ApiError> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_NAME);

        let request = ApiRequest::get("/motivation/now")
            .query("name", name)
            .query_opt("locale", locale);
        let motivation: MaybeEnveloped<Motivation> = self.client.transport().fetch(request).await?;
        Ok(motivation.into_data())
    }
}
