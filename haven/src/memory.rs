// ABOUTME: the local sqlite store holding users, preferences, conversations, notes, and tasks.
// ABOUTME: all rows are scoped to a user id; timestamps are unix milliseconds.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::HavenError;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<TaskPriority> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            _ => None,
        }
    }

    fn from_db(value: &str) -> TaskPriority {
        TaskPriority::parse(value).unwrap_or(TaskPriority::Medium)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub role: String,
    pub content: String,
    pub language: String,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub tags: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub priority: TaskPriority,
    pub due_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

pub struct MemoryStore {
    conn: Connection,
}

impl MemoryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HavenError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, HavenError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), HavenError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                created_at_ms INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS user_preferences (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at_ms INTEGER NOT NULL,
                UNIQUE (user_id, key)
            );
            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                language TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_conversations_user
            ON conversations (user_id, id);
            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                completed INTEGER NOT NULL DEFAULT 0,
                priority TEXT NOT NULL DEFAULT 'medium',
                due_at_ms INTEGER,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    pub fn get_or_create_user(&self, username: &str) -> Result<i64, HavenError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        self.conn.execute(
            "INSERT INTO users (username, created_at_ms) VALUES (?1, ?2)",
            params![username, now_ms()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // -- preferences --

    pub fn set_preference(&self, username: &str, key: &str, value: &str) -> Result<(), HavenError> {
        let user_id = self.get_or_create_user(username)?;
        self.conn.execute(
            "INSERT INTO user_preferences (user_id, key, value, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, key)
             DO UPDATE SET value = excluded.value, updated_at_ms = excluded.updated_at_ms",
            params![user_id, key, value, now_ms()],
        )?;
        Ok(())
    }

    pub fn get_preference(&self, username: &str, key: &str) -> Result<Option<String>, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let value = self
            .conn
            .query_row(
                "SELECT value FROM user_preferences WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn all_preferences(&self, username: &str) -> Result<Vec<(String, String)>, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM user_preferences WHERE user_id = ?1 ORDER BY key",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- conversation history --

    pub fn add_message(
        &self,
        username: &str,
        role: &str,
        content: &str,
        language: &str,
    ) -> Result<(), HavenError> {
        let user_id = self.get_or_create_user(username)?;
        self.conn.execute(
            "INSERT INTO conversations (user_id, role, content, language, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, role, content, language, now_ms()],
        )?;
        Ok(())
    }

    /// The most recent `limit` messages, in chronological order.
    pub fn recent_history(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let mut stmt = self.conn.prepare(
            "SELECT role, content, language, created_at_ms
             FROM conversations WHERE user_id = ?1
             ORDER BY id DESC LIMIT ?2",
        )?;
        let mut rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(StoredMessage {
                    role: row.get(0)?,
                    content: row.get(1)?,
                    language: row.get(2)?,
                    created_at_ms: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.reverse();
        Ok(rows)
    }

    pub fn clear_history(&self, username: &str) -> Result<usize, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let deleted = self.conn.execute(
            "DELETE FROM conversations WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(deleted)
    }

    // -- notes --

    pub fn create_note(
        &self,
        username: &str,
        title: &str,
        content: &str,
        tags: &str,
    ) -> Result<i64, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let now = now_ms();
        self.conn.execute(
            "INSERT INTO notes (user_id, title, content, tags, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![user_id, title, content, tags, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Notes newest-updated first; `search` filters on a title or content
    /// substring when given.
    pub fn list_notes(
        &self,
        username: &str,
        search: Option<&str>,
    ) -> Result<Vec<Note>, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let pattern = search.map(|s| format!("%{s}%"));
        let mut stmt = self.conn.prepare(
            "SELECT id, title, content, tags, created_at_ms, updated_at_ms
             FROM notes
             WHERE user_id = ?1 AND (?2 IS NULL OR title LIKE ?2 OR content LIKE ?2)
             ORDER BY updated_at_ms DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id, pattern], |row| {
                Ok(Note {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    content: row.get(2)?,
                    tags: row.get(3)?,
                    created_at_ms: row.get(4)?,
                    updated_at_ms: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_note(&self, username: &str, note_id: i64) -> Result<Option<Note>, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let note = self
            .conn
            .query_row(
                "SELECT id, title, content, tags, created_at_ms, updated_at_ms
                 FROM notes WHERE user_id = ?1 AND id = ?2",
                params![user_id, note_id],
                |row| {
                    Ok(Note {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        content: row.get(2)?,
                        tags: row.get(3)?,
                        created_at_ms: row.get(4)?,
                        updated_at_ms: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(note)
    }

    pub fn update_note(
        &self,
        username: &str,
        note_id: i64,
        title: &str,
        content: &str,
        tags: &str,
    ) -> Result<bool, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let updated = self.conn.execute(
            "UPDATE notes SET title = ?3, content = ?4, tags = ?5, updated_at_ms = ?6
             WHERE user_id = ?1 AND id = ?2",
            params![user_id, note_id, title, content, tags, now_ms()],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_note(&self, username: &str, note_id: i64) -> Result<bool, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let deleted = self.conn.execute(
            "DELETE FROM notes WHERE user_id = ?1 AND id = ?2",
            params![user_id, note_id],
        )?;
        Ok(deleted > 0)
    }

    // -- tasks --

    pub fn create_task(
        &self,
        username: &str,
        title: &str,
        description: &str,
        priority: TaskPriority,
        due_at_ms: Option<i64>,
    ) -> Result<i64, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let now = now_ms();
        self.conn.execute(
            "INSERT INTO tasks
             (user_id, title, description, completed, priority, due_at_ms, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?6)",
            params![user_id, title, description, priority.as_str(), due_at_ms, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_tasks(
        &self,
        username: &str,
        completed: Option<bool>,
    ) -> Result<Vec<Task>, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let completed_filter = completed.map(|c| c as i64);
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, completed, priority, due_at_ms,
                    created_at_ms, updated_at_ms
             FROM tasks
             WHERE user_id = ?1 AND (?2 IS NULL OR completed = ?2)
             ORDER BY created_at_ms DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id, completed_filter], |row| {
                let priority: String = row.get(4)?;
                Ok(Task {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    completed: row.get::<_, i64>(3)? != 0,
                    priority: TaskPriority::from_db(&priority),
                    due_at_ms: row.get(5)?,
                    created_at_ms: row.get(6)?,
                    updated_at_ms: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_task(&self, username: &str, task_id: i64) -> Result<Option<Task>, HavenError> {
        let tasks = self.list_tasks(username, None)?;
        Ok(tasks.into_iter().find(|t| t.id == task_id))
    }

    pub fn toggle_task(&self, username: &str, task_id: i64) -> Result<bool, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let updated = self.conn.execute(
            "UPDATE tasks SET completed = 1 - completed, updated_at_ms = ?3
             WHERE user_id = ?1 AND id = ?2",
            params![user_id, task_id, now_ms()],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_task(&self, username: &str, task_id: i64) -> Result<bool, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let deleted = self.conn.execute(
            "DELETE FROM tasks WHERE user_id = ?1 AND id = ?2",
            params![user_id, task_id],
        )?;
        Ok(deleted > 0)
    }

    pub fn delete_completed_tasks(&self, username: &str) -> Result<usize, HavenError> {
        let user_id = self.get_or_create_user(username)?;
        let deleted = self.conn.execute(
            "DELETE FROM tasks WHERE user_id = ?1 AND completed = 1",
            params![user_id],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_user_is_idempotent() {
        let store = MemoryStore::open_in_memory().unwrap();
        let a = store.get_or_create_user("layla").unwrap();
        let b = store.get_or_create_user("layla").unwrap();
        assert_eq!(a, b);
        let c = store.get_or_create_user("omar").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn preferences_upsert_and_read_back() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.set_preference("layla", "language", "ar").unwrap();
        store.set_preference("layla", "language", "en").unwrap();
        assert_eq!(
            store.get_preference("layla", "language").unwrap().as_deref(),
            Some("en")
        );
        assert_eq!(store.get_preference("layla", "theme").unwrap(), None);
        assert_eq!(store.all_preferences("layla").unwrap().len(), 1);
    }

    #[test]
    fn history_is_chronological_and_limited() {
        let store = MemoryStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .add_message("layla", "user", &format!("message {i}"), "en")
                .unwrap();
        }
        let history = store.recent_history("layla", 3).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, "message 2");
        assert_eq!(history[2].content, "message 4");
    }

    #[test]
    fn clear_history_reports_deleted_rows() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.add_message("layla", "user", "hello", "en").unwrap();
        store.add_message("layla", "assistant", "hi", "en").unwrap();
        assert_eq!(store.clear_history("layla").unwrap(), 2);
        assert!(store.recent_history("layla", 10).unwrap().is_empty());
    }

    #[test]
    fn notes_crud_and_search() {
        let store = MemoryStore::open_in_memory().unwrap();
        let id = store
            .create_note("layla", "groceries", "buy zaatar", "shopping")
            .unwrap();
        store
            .create_note("layla", "ideas", "rust workshop outline", "")
            .unwrap();

        assert_eq!(store.list_notes("layla", None).unwrap().len(), 2);
        let found = store.list_notes("layla", Some("zaatar")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);

        assert!(store
            .update_note("layla", id, "groceries", "buy zaatar and olives", "shopping")
            .unwrap());
        let note = store.get_note("layla", id).unwrap().unwrap();
        assert!(note.content.contains("olives"));

        assert!(store.delete_note("layla", id).unwrap());
        assert!(!store.delete_note("layla", id).unwrap());
    }

    #[test]
    fn notes_are_scoped_per_user() {
        let store = MemoryStore::open_in_memory().unwrap();
        let id = store.create_note("layla", "private", "secret", "").unwrap();
        assert!(store.get_note("omar", id).unwrap().is_none());
        assert!(!store.delete_note("omar", id).unwrap());
    }

    #[test]
    fn tasks_toggle_and_filters() {
        let store = MemoryStore::open_in_memory().unwrap();
        let a = store
            .create_task("layla", "ship release", "", TaskPriority::High, None)
            .unwrap();
        store
            .create_task("layla", "water plants", "", TaskPriority::Low, None)
            .unwrap();

        assert_eq!(store.list_tasks("layla", Some(false)).unwrap().len(), 2);
        assert!(store.toggle_task("layla", a).unwrap());
        assert_eq!(store.list_tasks("layla", Some(true)).unwrap().len(), 1);

        let task = store.get_task("layla", a).unwrap().unwrap();
        assert!(task.completed);
        assert_eq!(task.priority, TaskPriority::High);

        assert_eq!(store.delete_completed_tasks("layla").unwrap(), 1);
        assert_eq!(store.list_tasks("layla", None).unwrap().len(), 1);
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haven.db");
        {
            let store = MemoryStore::open(&path).unwrap();
            store.create_note("layla", "kept", "still here", "").unwrap();
        }
        let store = MemoryStore::open(&path).unwrap();
        assert_eq!(store.list_notes("layla", None).unwrap().len(), 1);
    }
}
