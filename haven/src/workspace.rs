// ABOUTME: a username-scoped facade over the memory store for notes and tasks.
// ABOUTME: adds stats, bulk cleanup, and a full json export on top of the row operations.

use serde::Serialize;

use crate::error::HavenError;
use crate::memory::{MemoryStore, Note, Task, TaskPriority};

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceStats {
    pub total_notes: usize,
    pub total_tasks: usize,
    pub pending_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
}

/// Borrows the store for the duration of one interaction; the app constructs
/// one per menu entry, scoped to the active user.
pub struct Workspace<'a> {
    store: &'a MemoryStore,
    username: &'a str,
}

impl<'a> Workspace<'a> {
    pub fn new(store: &'a MemoryStore, username: &'a str) -> Self {
        Self { store, username }
    }

    // -- notes --

    pub fn create_note(&self, title: &str, content: &str, tags: &str) -> Result<i64, HavenError> {
        self.store.create_note(self.username, title, content, tags)
    }

    pub fn list_notes(&self) -> Result<Vec<Note>, HavenError> {
        self.store.list_notes(self.username, None)
    }

    pub fn get_note(&self, note_id: i64) -> Result<Option<Note>, HavenError> {
        self.store.get_note(self.username, note_id)
    }

    pub fn update_note(
        &self,
        note_id: i64,
        title: &str,
        content: &str,
        tags: &str,
    ) -> Result<bool, HavenError> {
        self.store
            .update_note(self.username, note_id, title, content, tags)
    }

    pub fn delete_note(&self, note_id: i64) -> Result<bool, HavenError> {
        self.store.delete_note(self.username, note_id)
    }

    pub fn search_notes(&self, query: &str) -> Result<Vec<Note>, HavenError> {
        self.store.list_notes(self.username, Some(query))
    }

    // -- tasks --

    pub fn create_task(
        &self,
        title: &str,
        description: &str,
        priority: TaskPriority,
        due_at_ms: Option<i64>,
    ) -> Result<i64, HavenError> {
        self.store
            .create_task(self.username, title, description, priority, due_at_ms)
    }

    pub fn list_tasks(&self, include_completed: bool) -> Result<Vec<Task>, HavenError> {
        if include_completed {
            self.store.list_tasks(self.username, None)
        } else {
            self.store.list_tasks(self.username, Some(false))
        }
    }

    pub fn get_task(&self, task_id: i64) -> Result<Option<Task>, HavenError> {
        self.store.get_task(self.username, task_id)
    }

    pub fn toggle_task(&self, task_id: i64) -> Result<bool, HavenError> {
        self.store.toggle_task(self.username, task_id)
    }

    pub fn delete_task(&self, task_id: i64) -> Result<bool, HavenError> {
        self.store.delete_task(self.username, task_id)
    }

    pub fn pending_tasks(&self) -> Result<Vec<Task>, HavenError> {
        self.store.list_tasks(self.username, Some(false))
    }

    pub fn completed_tasks(&self) -> Result<Vec<Task>, HavenError> {
        self.store.list_tasks(self.username, Some(true))
    }

    pub fn tasks_by_priority(&self, priority: TaskPriority) -> Result<Vec<Task>, HavenError> {
        let tasks = self.store.list_tasks(self.username, Some(false))?;
        Ok(tasks.into_iter().filter(|t| t.priority == priority).collect())
    }

    pub fn clear_completed_tasks(&self) -> Result<usize, HavenError> {
        self.store.delete_completed_tasks(self.username)
    }

    // -- aggregates --

    pub fn stats(&self) -> Result<WorkspaceStats, HavenError> {
        let notes = self.list_notes()?;
        let tasks = self.store.list_tasks(self.username, None)?;
        let completed = tasks.iter().filter(|t| t.completed).count();
        let pending = tasks.len() - completed;
        let completion_rate = if tasks.is_empty() {
            0.0
        } else {
            completed as f64 / tasks.len() as f64 * 100.0
        };
        Ok(WorkspaceStats {
            total_notes: notes.len(),
            total_tasks: tasks.len(),
            pending_tasks: pending,
            completed_tasks: completed,
            completion_rate,
        })
    }

    pub fn export(&self) -> Result<serde_json::Value, HavenError> {
        let notes = self.list_notes()?;
        let tasks = self.store.list_tasks(self.username, None)?;
        let stats = self.stats()?;
        Ok(serde_json::json!({
            "username": self.username,
            "notes": notes,
            "tasks": tasks,
            "stats": stats,
            "exported_at": chrono::Utc::now().to_rfc3339(),
        }))
    }
}
