//! Catalog of claimable tasks.
//!
//! Built-in tasks recur: their windows follow the clock and are re-anchored
//! on every read. Tasks registered explicitly keep the dates they came with.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use notch_core::{default_catalog, TaskDefinition, VerificationConfig};

#[derive(Debug, Clone)]
struct Entry {
    task: TaskDefinition,
    recurring: bool,
}

impl Entry {
    fn at(&self, now: DateTime<Utc>) -> TaskDefinition {
        if self.recurring {
            self.task.anchored_at(now)
        } else {
            self.task.clone()
        }
    }
}

/// Task definitions in registration order.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<Vec<Entry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in recurring catalog. Attestation tasks without schemas get
    /// `partner_schema_ids`.
    pub fn with_defaults(now: DateTime<Utc>, partner_schema_ids: &[String]) -> Self {
        let tasks = default_catalog(now)
            .into_iter()
            .map(|mut task| {
                if let VerificationConfig::Attestation(req) = &mut task.verification {
                    if req.schema_ids.is_empty() {
                        req.schema_ids = partner_schema_ids.to_vec();
                    }
                }
                Entry {
                    task,
                    recurring: true,
                }
            })
            .collect();
        Self {
            tasks: RwLock::new(tasks),
        }
    }

    /// Add or replace a task by id. Its dates are kept as given.
    pub async fn register(&self, task: TaskDefinition) {
        let mut tasks = self.tasks.write().await;
        info!(task_id = %task.id, category = %task.category, points = task.points, "Registered task");
        let entry = Entry {
            task,
            recurring: false,
        };
        match tasks.iter_mut().find(|e| e.task.id == entry.task.id) {
            Some(existing) => *existing = entry,
            None => tasks.push(entry),
        }
    }

    pub async fn remove(&self, task_id: &str) -> Option<TaskDefinition> {
        let mut tasks = self.tasks.write().await;
        let index = tasks.iter().position(|e| e.task.id == task_id)?;
        Some(tasks.remove(index).task)
    }

    /// The task as it stands at `now`.
    pub async fn get(&self, task_id: &str, now: DateTime<Utc>) -> Option<TaskDefinition> {
        self.tasks
            .read()
            .await
            .iter()
            .find(|e| e.task.id == task_id)
            .map(|e| e.at(now))
    }

    /// Tasks that are active and in their window at `now`.
    pub async fn active(&self, now: DateTime<Utc>) -> Vec<TaskDefinition> {
        self.tasks
            .read()
            .await
            .iter()
            .map(|e| e.at(now))
            .filter(|t| t.is_eligible(now))
            .collect()
    }

    pub async fn all(&self, now: DateTime<Utc>) -> Vec<TaskDefinition> {
        self.tasks.read().await.iter().map(|e| e.at(now)).collect()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_defaults_fill_partner_schemas() {
        let now = Utc::now();
        let registry = TaskRegistry::with_defaults(now, &["0xpartner".to_string()]);
        assert_eq!(registry.len().await, 5);

        let partner = registry.get("weekly-partner-app", now).await.unwrap();
        match partner.verification {
            VerificationConfig::Attestation(req) => assert_eq!(req.schema_ids, vec!["0xpartner"]),
            other => panic!("unexpected verification {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expired_task_excluded_from_active() {
        let now = Utc::now();
        let registry = TaskRegistry::with_defaults(now, &[]);
        let mut expired = registry.get("daily-swap", now).await.unwrap();
        expired.start_date = now - Duration::days(3);
        expired.end_date = now - Duration::days(2);
        assert!(expired.active);
        registry.register(expired).await;

        let active = registry.active(now).await;
        assert!(active.iter().all(|t| t.id != "daily-swap"));
        assert_eq!(active.len(), 4);
        assert_eq!(registry.len().await, 5, "replacement keeps one entry per id");
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = TaskRegistry::with_defaults(Utc::now(), &[]);
        assert!(registry.remove("invite-friends").await.is_some());
        assert!(registry.remove("invite-friends").await.is_none());
        assert!(registry.get("invite-friends", Utc::now()).await.is_none());
    }

    #[tokio::test]
    async fn test_builtin_windows_follow_the_clock() {
        let built = Utc::now();
        let registry = TaskRegistry::with_defaults(built, &[]);
        let later = built + Duration::days(2);

        let active: Vec<_> = registry.active(later).await.into_iter().map(|t| t.id).collect();
        assert!(active.contains(&"daily-cast-notch".to_string()));
        assert!(active.contains(&"daily-swap".to_string()));
        assert_eq!(active.len(), 5);

        let daily = registry.get("daily-swap", later).await.unwrap();
        assert!(daily.is_eligible(later));
        assert!(daily.start_date > built);

        let weeks_later = built + Duration::days(40);
        assert_eq!(registry.active(weeks_later).await.len(), 5);
    }

    #[tokio::test]
    async fn test_registered_dates_are_kept() {
        let now = Utc::now();
        let registry = TaskRegistry::new();
        let mut task = notch_core::default_catalog(now).remove(0);
        task.end_date = now + Duration::hours(1);
        registry.register(task).await;

        assert_eq!(registry.active(now).await.len(), 1);
        assert!(registry.active(now + Duration::days(2)).await.is_empty());
    }
}
