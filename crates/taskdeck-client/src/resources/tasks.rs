//! Task endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiEnvelope, MaybeEnveloped, SortOrder};
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::transport::ApiRequest;

/// A personal work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// 1 (lowest) to 5 (highest).
    pub priority: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sortable task columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskSortKey {
    CreatedAt,
    UpdatedAt,
    Title,
}

impl TaskSortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSortKey::CreatedAt => "createdAt",
            TaskSortKey::UpdatedAt => "updatedAt",
            TaskSortKey::Title => "title",
        }
    }
}

impl std::str::FromStr for TaskSortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" | "created_at" | "created" => Ok(TaskSortKey::CreatedAt),
            "updatedAt" | "updated_at" | "updated" => Ok(TaskSortKey::UpdatedAt),
            "title" => Ok(TaskSortKey::Title),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

/// Query for `GET /tasks`.
#[derive(Debug, Clone, Default)]
pub struct ListTasksParams {
    pub sort_key: Option<TaskSortKey>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Body for `POST /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreate {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
}

/// Body for `PATCH /tasks/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
}

/// Task endpoints.
pub struct TasksApi<'a> {
    client: &'a ApiClient,
}

impl<'a> TasksApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, params: &ListTasksParams) -> Result<ApiEnvelope<Vec<Task>>, ApiError> {
        let request = ApiRequest::get("/tasks")
            .query_opt("sortKey", params.sort_key.map(|k| k.as_str()))
            .query_opt("sortOrder", params.sort_order)
            .query_opt("page", params.page)
            .query_opt("pageSize", params.page_size);
        self.client.transport().fetch(request).await
    }

    pub async fn get(&self, task_id: &str) -> Result<Task, ApiError> {
        let task: MaybeEnveloped<Task> = self
            .client
            .transport()
            .fetch(ApiRequest::get("/tasks").segment(task_id))
            .await?;
        Ok(task.into_data())
    }

    pub async fn create(&self, payload: &TaskCreate) -> Result<Task, ApiError> {
        let request = ApiRequest::post("/tasks").json(payload)?;
        let task: MaybeEnveloped<Task> = self.client.csrf().fetch(request).await?;
        Ok(task.into_data())
    }

    pub async fn update(&self, task_id: &str, payload: &TaskUpdate) -> Result<Task, ApiError> {
        let request = ApiRequest::patch("/tasks").segment(task_id).json(payload)?;
        let task: MaybeEnveloped<Task> = self.client.csrf().fetch(request).await?;
        Ok(task.into_data())
    }

    pub async fn delete(&self, task_id: &str) -> Result<(), ApiError> {
        self.client
            .csrf()
            .dispatch(ApiRequest::delete("/tasks").segment(task_id))
            .await
    }
}
