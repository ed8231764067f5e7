use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::priority;
use crate::traits::{
    ConversationTurn, Memory, MemoryKind, NewTask, Notification, PrioritySource, RecordStore,
    Task, TaskFilter, TaskStatus,
};


/// Set restrictive file permissions (0600) on the database and WAL files.
#[cfg(unix)]
fn set_db_file_permissions(db_path: &str) {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::Permissions::from_mode(0o600);
    if let Err(e) = std::fs::set_permissions(db_path, mode.clone()) {
        tracing::warn!("failed to set permissions on {db_path}: {e}");
    }
    for suffix in &["-wal", "-shm"] {
        let path = format!("{db_path}{suffix}");
        if std::path::Path::new(&path).exists() {
            if let Err(e) = std::fs::set_permissions(&path, mode.clone()) {
                tracing::warn!("failed to set permissions on {path}: {e}");
            }
        }
    }
}

#[cfg(not(unix))]
fn set_db_file_permissions(_db_path: &str) {}

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub async fn new(db_path: &str) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{db_path}"))
            .unwrap_or_else(|_| SqliteConnectOptions::new().filename(db_path))
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        set_db_file_permissions(db_path);

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                body TEXT,
                status TEXT NOT NULL DEFAULT 'open',
                priority INTEGER,
                priority_source TEXT,
                urgent INTEGER,
                important INTEGER,
                source TEXT,
                due_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS memories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                confidence REAL NOT NULL DEFAULT 1.0,
                source TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversation_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)")
            .execute(&pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_turns_created ON conversation_turns(created_at)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    async fn fetch_actionable(&self) -> anyhow::Result<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE status IN ('open', 'in_progress')",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }
}

fn parse_ts(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn opt_ts(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| parse_ts(&s).ok())
}

fn opt_bool(raw: Option<i64>) -> Option<bool> {
    raw.map(|v| v != 0)
}

fn task_from_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Task> {
    let status: String = row.get("status");
    let status = status
        .parse::<TaskStatus>()
        .map_err(|_| anyhow::anyhow!("unknown task status '{status}' in database"))?;
    let priority_source: Option<String> = row.get("priority_source");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    Ok(Task {
        id: row.get("id"),
        title: row.get("title"),
        body: row.get("body"),
        status,
        priority: row.get("priority"),
        priority_source: priority_source.and_then(|s| s.parse::<PrioritySource>().ok()),
        urgent: opt_bool(row.get("urgent")),
        important: opt_bool(row.get("important")),
        source: row.get("source"),
        due_date: opt_ts(row.get("due_date")),
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn memory_from_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Memory> {
    let kind: String = row.get("kind");
    let kind = kind
        .parse::<MemoryKind>()
        .map_err(|_| anyhow::anyhow!("unknown memory kind '{kind}' in database"))?;
    let created_at: String = row.get("created_at");
    Ok(Memory {
        id: row.get("id"),
        kind,
        content: row.get("content"),
        confidence: row.get("confidence"),
        source: row.get("source"),
        created_at: parse_ts(&created_at)?,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create_task(&self, new: NewTask) -> anyhow::Result<Task> {
        let now = Utc::now().to_rfc3339();
        let priority_source = new.priority.map(|_| PrioritySource::UserSet.as_str());
        let result = sqlx::query(
            "INSERT INTO tasks
                (title, body, status, priority, priority_source, urgent, important, source,
                 due_date, created_at, updated_at)
             VALUES (?, ?, 'open', ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.title)
        .bind(&new.body)
        .bind(new.priority)
        .bind(priority_source)
        .bind(new.urgent.map(|v| v as i64))
        .bind(new.important.map(|v| v as i64))
        .bind(&new.source)
        .bind(new.due_date.map(|d| d.to_rfc3339()))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_task(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("task {id} vanished after insert"))
    }

    async fn get_task(&self, id: i64) -> anyhow::Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn list_tasks(&self, filter: TaskFilter) -> anyhow::Result<Vec<Task>> {
        let sql = match filter {
            TaskFilter::Open => {
                "SELECT * FROM tasks WHERE status IN ('open', 'in_progress', 'blocked')
                 ORDER BY created_at DESC"
            }
            TaskFilter::All => "SELECT * FROM tasks ORDER BY created_at DESC",
            TaskFilter::Complete => {
                "SELECT * FROM tasks WHERE status = 'complete' ORDER BY created_at DESC"
            }
        };
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn find_tasks_by_title(&self, query: &str) -> anyhow::Result<Vec<Task>> {
        // LIKE is case-insensitive for ASCII in SQLite.
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE title LIKE ? ESCAPE '\\' ORDER BY created_at DESC",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn set_task_status(&self, id: i64, status: TaskStatus) -> anyhow::Result<Option<Task>> {
        let result = sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_task(id).await
    }

    async fn set_task_urgency(
        &self,
        id: i64,
        urgent: Option<bool>,
        important: Option<bool>,
    ) -> anyhow::Result<Option<Task>> {
        let result = sqlx::query(
            "UPDATE tasks SET urgent = ?, important = ?, updated_at = ? WHERE id = ?",
        )
        .bind(urgent.map(|v| v as i64))
        .bind(important.map(|v| v as i64))
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_task(id).await
    }

    async fn get_prioritized(&self, limit: usize) -> anyhow::Result<Vec<Task>> {
        let mut tasks = self.fetch_actionable().await?;
        tasks.sort_by(priority::quadrant_cmp);
        tasks.truncate(limit);
        Ok(tasks)
    }

    async fn get_prioritized_plain(&self, limit: usize) -> anyhow::Result<Vec<Task>> {
        let mut tasks = self.fetch_actionable().await?;
        tasks.sort_by(priority::plain_cmp);
        tasks.truncate(limit);
        Ok(tasks)
    }

    async fn get_stale_tasks(&self, days: i64) -> anyhow::Result<Vec<Task>> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();
        let rows = sqlx::query(
            "SELECT * FROM tasks
             WHERE status IN ('open', 'in_progress')
               AND datetime(updated_at) <= datetime(?)
             ORDER BY updated_at ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn create_memory(
        &self,
        kind: MemoryKind,
        content: &str,
        confidence: f64,
        source: &str,
    ) -> anyhow::Result<Memory> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO memories (kind, content, confidence, source, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(kind.as_str())
        .bind(content)
        .bind(confidence)
        .bind(source)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let row = sqlx::query("SELECT * FROM memories WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        memory_from_row(&row)
    }

    async fn list_memories(&self, kind: MemoryKind) -> anyhow::Result<Vec<Memory>> {
        let rows = sqlx::query("SELECT * FROM memories WHERE kind = ? ORDER BY created_at ASC")
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(memory_from_row).collect()
    }

    async fn search_memories(&self, query: &str) -> anyhow::Result<Vec<Memory>> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let rows = sqlx::query(
            "SELECT * FROM memories WHERE content LIKE ? ESCAPE '\\' ORDER BY created_at DESC",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(memory_from_row).collect()
    }

    async fn create_notification(&self, kind: &str, content: &str) -> anyhow::Result<Notification> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO notifications (kind, content, read, created_at) VALUES (?, ?, 0, ?)",
        )
        .bind(kind)
        .bind(content)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let row = sqlx::query("SELECT * FROM notifications WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        let read: i64 = row.get("read");
        let created_at: String = row.get("created_at");
        Ok(Notification {
            id: row.get("id"),
            kind: row.get("kind"),
            content: row.get("content"),
            read: read != 0,
            created_at: parse_ts(&created_at)?,
        })
    }

    async fn list_notifications(&self, limit: i64) -> anyhow::Result<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT * FROM notifications ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let read: i64 = row.get("read");
                let created_at: String = row.get("created_at");
                Ok(Notification {
                    id: row.get("id"),
                    kind: row.get("kind"),
                    content: row.get("content"),
                    read: read != 0,
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect()
    }

    async fn append_turn(&self, role: &str, content: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO conversation_turns (role, content, created_at) VALUES (?, ?, ?)",
        )
        .bind(role)
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_history(&self, limit: i64) -> anyhow::Result<Vec<ConversationTurn>> {
        // Newest N, then flipped back to chronological order.
        let rows = sqlx::query(
            "SELECT * FROM conversation_turns ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        let mut turns: Vec<ConversationTurn> = rows
            .iter()
            .map(|row| {
                let created_at: String = row.get("created_at");
                Ok(ConversationTurn {
                    id: row.get("id"),
                    role: row.get("role"),
                    content: row.get("content"),
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect::<anyhow::Result<_>>()?;
        turns.reverse();
        Ok(turns)
    }
}
