//! AI task assistant endpoint.

use serde::{Deserialize, Serialize};

use super::MaybeEnveloped;
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::transport::ApiRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistRequest {
    pub query: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSuggestion {
    pub name: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistResponse {
    pub answer: String,
    #[serde(default)]
    pub suggested_tags: Vec<TagSuggestion>,
    #[serde(default)]
    pub related_tasks: Vec<TaskRef>,
    /// Conversation including the assistant's reply.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

pub struct AssistApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AssistApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `POST /tasks/assist` (protected).
    pub async fn ask(&self, request: &AssistRequest) -> Result<AssistResponse, ApiError> {
        let request = ApiRequest::post("/tasks/assist").json(request)?;
        let response: MaybeEnveloped<AssistResponse> = self.client.csrf().fetch(request).await?;
        Ok(response.into_data())
    }
}
