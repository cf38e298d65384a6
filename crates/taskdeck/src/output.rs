//! Terminal rendering for command results.

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use taskdeck_client::resources::admin::{AdminStatsOverview, AdminUser};
use taskdeck_client::resources::assist::AssistResponse;
use taskdeck_client::resources::auth::UserSummary;
use taskdeck_client::resources::motivation::Motivation;
use taskdeck_client::resources::tasks::Task;
use taskdeck_client::resources::{ApiEnvelope, PageMeta};
use taskdeck_client::ApiError;

pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }

    pub fn done(&self, message: &str) -> Result<()> {
        self.emit(&json!({ "ok": true, "message": message }), || message.to_string())
    }

    pub fn user(&self, user: &UserSummary) -> Result<()> {
        self.emit(user, || {
            format!("{} <{}> [{}] id={}", user.label(), user.email, user.role, user.id)
        })
    }

    pub fn task(&self, task: &Task) -> Result<()> {
        self.emit(task, || {
            let mut out = task_line(task);
            if !task.description.is_empty() {
                out.push_str("\n\n");
                out.push_str(&task.description);
            }
            out.push_str(&format!(
                "\n\ncreated {}  updated {}",
                task.created_at.format("%Y-%m-%d %H:%M"),
                task.updated_at.format("%Y-%m-%d %H:%M")
            ));
            out
        })
    }

    pub fn tasks(&self, tasks: &ApiEnvelope<Vec<Task>>) -> Result<()> {
        self.emit(tasks, || {
            if tasks.data.is_empty() {
                return "No tasks".to_string();
            }
            let mut lines: Vec<String> = tasks.data.iter().map(task_line).collect();
            if let Some(meta) = &tasks.meta {
                lines.push(page_line(meta, tasks.data.len()));
            }
            lines.join("\n")
        })
    }

    pub fn admin_user(&self, user: &AdminUser) -> Result<()> {
        self.emit(user, || admin_user_line(user))
    }

    pub fn admin_users(&self, users: &ApiEnvelope<Vec<AdminUser>>) -> Result<()> {
        self.emit(users, || {
            if users.data.is_empty() {
                return "No users".to_string();
            }
            let mut lines: Vec<String> = users.data.iter().map(admin_user_line).collect();
            if let Some(meta) = &users.meta {
                lines.push(page_line(meta, users.data.len()));
            }
            lines.join("\n")
        })
    }

    pub fn stats(&self, stats: &AdminStatsOverview) -> Result<()> {
        self.emit(stats, || {
            format!(
                "users: {}\nactive: {}\nbanned: {}\nadmins: {}",
                stats.total_users, stats.active_users, stats.banned_users, stats.admins
            )
        })
    }

    pub fn motivation(&self, motivation: &Motivation) -> Result<()> {
        self.emit(motivation, || {
            let mut out = motivation.message.clone();
            if let Some(quote) = &motivation.quote {
                out.push_str(&format!("\n\n  \"{}\"", quote.text));
                if let Some(author) = &quote.author {
                    out.push_str(&format!("\n    - {}", author));
                }
            }
            out
        })
    }

    pub fn assist(&self, response: &AssistResponse) -> Result<()> {
        self.emit(response, || {
            let mut out = response.answer.clone();
            if !response.suggested_tags.is_empty() {
                let tags: Vec<String> = response
                    .suggested_tags
                    .iter()
                    .map(|t| format!("#{}", t.name))
                    .collect();
                out.push_str(&format!("\n\nSuggested tags: {}", tags.join(" ")));
            }
            for task in &response.related_tasks {
                out.push_str(&format!(
                    "\n  related: {} {}",
                    task.id,
                    task.title.as_deref().unwrap_or("")
                ));
            }
            out
        })
    }
}

fn task_line(task: &Task) -> String {
    let tags: Vec<String> = task.tags.iter().map(|t| format!("#{}", t)).collect();
    format!("{}  P{}  {}  {}", task.id, task.priority, task.title, tags.join(" "))
        .trim_end()
        .to_string()
}

fn admin_user_line(user: &AdminUser) -> String {
    format!(
        "{}  {}  {}  {}  {}",
        user.id,
        user.email,
        user.name.as_deref().unwrap_or("-"),
        user.role,
        user.status.as_str()
    )
}

fn page_line(meta: &PageMeta, shown: usize) -> String {
    match (meta.page, meta.total) {
        (Some(page), Some(total)) => format!("-- page {}, {} of {} --", page, shown, total),
        (None, Some(total)) => format!("-- {} of {} --", shown, total),
        _ => format!("-- {} shown --", shown),
    }
}

/// Print a failed run to stderr, including per-field validation messages.
pub fn report(err: &anyhow::Error) {
    eprintln!("Error: {:#}", err);

    let api_error = err.chain().find_map(|cause| cause.downcast_ref::<ApiError>());
    if let Some(api_error) = api_error {
        for (field, message) in api_error.field_errors() {
            eprintln!("  {}: {}", field, message);
        }
    }

    if crate::is_auth_failure(err) {
        eprintln!("Hint: sign in with --email, or check that your role allows this");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(tags: &[&str]) -> Task {
        serde_json::from_value(json!({
            "id": "t-1", "title": "Write report", "priority": 4,
            "tags": tags,
            "createdAt": "2024-05-01T09:00:00Z", "updatedAt": "2024-05-01T09:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_task_line() {
        assert_eq!(task_line(&task(&["work", "q3"])), "t-1  P4  Write report  #work #q3");
        assert_eq!(task_line(&task(&[])), "t-1  P4  Write report");
    }

    #[test]
    fn test_page_line() {
        let meta: PageMeta = serde_json::from_value(json!({"total": 12, "page": 2})).unwrap();
        assert_eq!(page_line(&meta, 5), "-- page 2, 5 of 12 --");

        let meta: PageMeta = serde_json::from_value(json!({})).unwrap();
        assert_eq!(page_line(&meta, 3), "-- 3 shown --");
    }
}
