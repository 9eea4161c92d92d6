use anyhow::Result;
use chrono::{DateTime, Utc};
use shared::TaskStatus;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;

mod models;

pub use models::*;

/// Upper bound on messages scanned when building the chat overview.
pub const OVERVIEW_MESSAGE_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Private in-memory database. A single connection that never idles out,
    /// since every new SQLite memory connection starts empty.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query("PRAGMA foreign_keys = ON").execute(&self.pool).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                bio TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS email_otps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER UNIQUE NOT NULL REFERENCES users(id),
                code_hash TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                verified BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'open'
                    CHECK (status IN ('open', 'assigned', 'done')),
                user_id INTEGER NOT NULL REFERENCES users(id),
                assignee_id INTEGER REFERENCES users(id),
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id INTEGER NOT NULL REFERENCES users(id),
                receiver_id INTEGER REFERENCES users(id),
                task_id INTEGER REFERENCES tasks(id),
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_id, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages(receiver_id, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rides (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                driver_id INTEGER NOT NULL REFERENCES users(id),
                origin TEXT NOT NULL,
                destination TEXT NOT NULL,
                time TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS study_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                course TEXT NOT NULL,
                available BOOLEAN NOT NULL DEFAULT 1,
                campus TEXT NOT NULL DEFAULT 'Surrey',
                teacher TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Drop every table and recreate the schema.
    pub async fn reset(&self) -> Result<()> {
        for table in ["messages", "email_otps", "study_sessions", "rides", "tasks", "users"] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(&self.pool)
                .await?;
        }
        tracing::warn!("All tables dropped");
        self.run_migrations().await
    }

    // User operations
    pub async fn create_user(&self, user: &NewUser<'_>) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, first_name, last_name, email, password_hash, bio, created_at)
            VALUES (?, ?, ?, ?, ?, '', ?)
            RETURNING id, username, first_name, last_name, email, password_hash, bio, created_at
            "#,
        )
        .bind(user.username)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, first_name, last_name, email, password_hash, bio, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, first_name, last_name, email, password_hash, bio, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, username, first_name, last_name, email, password_hash, bio, created_at FROM users WHERE id IN ({})",
            placeholders
        );
        let mut query = sqlx::query_as::<_, User>(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn update_user_profile(
        &self,
        id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
        bio: Option<&str>,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                username = COALESCE(?, username),
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                bio = COALESCE(?, bio)
            WHERE id = ?
            RETURNING id, username, first_name, last_name, email, password_hash, bio, created_at
            "#,
        )
        .bind(username)
        .bind(first_name)
        .bind(last_name)
        .bind(bio)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Remove a user and every row that references them, in one transaction.
    /// Tasks the user had accepted are released back to `open`.
    /// Returns false when no user has this email.
    pub async fn delete_user_cascade(&self, email: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let user_id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(user_id) = user_id else {
            return Ok(false);
        };

        sqlx::query(
            r#"
            DELETE FROM messages
            WHERE sender_id = ? OR receiver_id = ?
               OR task_id IN (SELECT id FROM tasks WHERE user_id = ? OR assignee_id = ?)
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE tasks SET
                assignee_id = NULL,
                status = CASE WHEN status = 'assigned' THEN 'open' ELSE status END
            WHERE assignee_id = ?
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        for sql in [
            "DELETE FROM tasks WHERE user_id = ?",
            "DELETE FROM rides WHERE driver_id = ?",
            "DELETE FROM study_sessions WHERE user_id = ?",
            "DELETE FROM email_otps WHERE user_id = ?",
            "DELETE FROM users WHERE id = ?",
        ] {
            sqlx::query(sql).bind(user_id).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        tracing::info!("Deleted user {} ({}) and dependent rows", user_id, email);
        Ok(true)
    }

    // OTP operations
    /// Single active code per user: a new code replaces the old one and resets
    /// the attempt counter and verified flag.
    pub async fn upsert_otp(
        &self,
        user_id: i64,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO email_otps (user_id, code_hash, expires_at, attempts, verified, created_at, updated_at)
            VALUES (?, ?, ?, 0, 0, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                code_hash = excluded.code_hash,
                expires_at = excluded.expires_at,
                attempts = 0,
                verified = 0,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(code_hash)
        .bind(expires_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_otp(&self, user_id: i64) -> Result<Option<EmailOtp>> {
        let otp = sqlx::query_as::<_, EmailOtp>(
            "SELECT id, code_hash, expires_at, attempts, verified FROM email_otps WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(otp)
    }

    /// Count one verification attempt; `verified` only ever turns the flag on.
    pub async fn record_otp_attempt(&self, otp_id: i64, verified: bool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE email_otps SET
                attempts = attempts + 1,
                verified = (verified OR ?),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(verified)
        .bind(Utc::now())
        .bind(otp_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // Task operations
    pub async fn create_task(&self, owner_id: i64, title: &str, description: &str) -> Result<Task> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (title, description, status, user_id, created_at)
            VALUES (?, ?, 'open', ?, ?)
            RETURNING id, title, description, status, user_id, assignee_id, created_at
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(owner_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(task)
    }

    pub async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            "SELECT id, title, description, status, user_id, assignee_id, created_at FROM tasks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT id, title, description, status, user_id, assignee_id, created_at FROM tasks ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    pub async fn list_tasks_by_owner(&self, owner_id: i64) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT id, title, description, status, user_id, assignee_id, created_at FROM tasks WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    pub async fn list_tasks_with_owner(&self) -> Result<Vec<TaskWithOwner>> {
        let tasks = sqlx::query_as::<_, TaskWithOwner>(
            r#"
            SELECT t.id, t.title, t.description, t.user_id, u.username, t.created_at
            FROM tasks t
            LEFT JOIN users u ON t.user_id = u.id
            ORDER BY t.created_at DESC, t.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    pub async fn update_task(
        &self,
        id: i64,
        title: Option<&str>,
        description: Option<&str>,
        status: Option<TaskStatus>,
    ) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                status = COALESCE(?, status)
            WHERE id = ?
            RETURNING id, title, description, status, user_id, assignee_id, created_at
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(status.map(|s| s.as_str()))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    /// Assign the task to `actor` in one guarded statement. Returns `None` when
    /// the guard fails (owner, done, or someone else already holds it).
    pub async fn assign_task(&self, id: i64, actor: i64) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks SET assignee_id = ?, status = 'assigned'
            WHERE id = ?
              AND user_id != ?
              AND status != 'done'
              AND (assignee_id IS NULL OR assignee_id = ?)
            RETURNING id, title, description, status, user_id, assignee_id, created_at
            "#,
        )
        .bind(actor)
        .bind(id)
        .bind(actor)
        .bind(actor)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    pub async fn mark_task_done(&self, id: i64) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks SET status = 'done'
            WHERE id = ?
            RETURNING id, title, description, status, user_id, assignee_id, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    /// Delete a task together with its conversation.
    pub async fn delete_task(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM messages WHERE task_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // Message operations
    pub async fn insert_message(
        &self,
        sender_id: i64,
        receiver_id: Option<i64>,
        task_id: Option<i64>,
        content: &str,
    ) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (sender_id, receiver_id, task_id, content, timestamp)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, sender_id, receiver_id, task_id, content, timestamp
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(task_id)
        .bind(content)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    /// Direct messages between two users, oldest first.
    pub async fn get_direct_messages(&self, user_id: i64, other_id: i64) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, task_id, content, timestamp FROM messages
            WHERE task_id IS NULL
              AND ((sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?))
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(user_id)
        .bind(other_id)
        .bind(other_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    pub async fn get_task_messages(&self, task_id: i64) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, sender_id, receiver_id, task_id, content, timestamp FROM messages WHERE task_id = ? ORDER BY timestamp ASC, id ASC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// The user's most recent messages, sent or received, newest first.
    pub async fn get_recent_messages_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, task_id, content, timestamp FROM messages
            WHERE sender_id = ? OR receiver_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    // Ride operations
    pub async fn create_ride(
        &self,
        driver_id: i64,
        origin: &str,
        destination: &str,
        time: &str,
    ) -> Result<Ride> {
        let ride = sqlx::query_as::<_, Ride>(
            r#"
            INSERT INTO rides (driver_id, origin, destination, time, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, driver_id, origin, destination, time, created_at
            "#,
        )
        .bind(driver_id)
        .bind(origin)
        .bind(destination)
        .bind(time)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(ride)
    }

    pub async fn list_rides(&self) -> Result<Vec<Ride>> {
        let rides = sqlx::query_as::<_, Ride>(
            "SELECT id, driver_id, origin, destination, time, created_at FROM rides ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rides)
    }

    // Study session operations
    pub async fn create_study_session(&self, session: &NewStudySession<'_>) -> Result<StudySession> {
        let session = sqlx::query_as::<_, StudySession>(
            r#"
            INSERT INTO study_sessions (user_id, course, available, campus, teacher, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, user_id, course, available, campus, teacher, description, created_at
            "#,
        )
        .bind(session.user_id)
        .bind(session.course)
        .bind(session.available)
        .bind(session.campus.as_str())
        .bind(session.teacher)
        .bind(session.description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn get_study_session(&self, id: i64) -> Result<Option<StudySession>> {
        let session = sqlx::query_as::<_, StudySession>(
            "SELECT id, user_id, course, available, campus, teacher, description, created_at FROM study_sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    /// Newest first, optionally narrowed to a campus and a course substring.
    pub async fn list_study_sessions(
        &self,
        campus: Option<shared::Campus>,
        course_query: Option<&str>,
    ) -> Result<Vec<StudySession>> {
        let pattern = course_query.map(|q| format!("%{}%", escape_like(q)));
        let sessions = sqlx::query_as::<_, StudySession>(
            r#"
            SELECT id, user_id, course, available, campus, teacher, description, created_at
            FROM study_sessions
            WHERE (? IS NULL OR campus = ?)
              AND (? IS NULL OR course LIKE ? ESCAPE '\')
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(campus.map(|c| c.as_str()))
        .bind(campus.map(|c| c.as_str()))
        .bind(pattern.as_deref())
        .bind(pattern.as_deref())
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    pub async fn update_study_session(
        &self,
        id: i64,
        changes: &StudySessionChanges,
    ) -> Result<Option<StudySession>> {
        let session = sqlx::query_as::<_, StudySession>(
            r#"
            UPDATE study_sessions SET
                course = COALESCE(?, course),
                available = COALESCE(?, available),
                campus = COALESCE(?, campus),
                teacher = COALESCE(?, teacher),
                description = COALESCE(?, description)
            WHERE id = ?
            RETURNING id, user_id, course, available, campus, teacher, description, created_at
            "#,
        )
        .bind(changes.course.as_deref())
        .bind(changes.available)
        .bind(changes.campus.map(|c| c.as_str()))
        .bind(changes.teacher.as_deref())
        .bind(changes.description.as_deref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn delete_study_session(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM study_sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Escape LIKE wildcards so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
