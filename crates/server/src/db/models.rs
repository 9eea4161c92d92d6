//! Database row types. Distinct from the `shared` API types so the
//! password and OTP hashes never leave the server.

use chrono::{DateTime, Utc};
use shared::{Campus, ChatMessage, PublicProfile, TaskStatus, UserProfile};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            bio: self.bio.clone(),
            created_at: self.created_at,
        }
    }

    pub fn public(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// Fields needed to insert a user.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Clone, FromRow)]
pub struct EmailOtp {
    pub id: i64,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: i64,
    pub verified: bool,
}

impl EmailOtp {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    pub user_id: i64,
    pub assignee_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<Task> for shared::Task {
    fn from(row: Task) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            status: row.status,
            user_id: row.user_id,
            assignee_id: row.assignee_id,
            created_at: row.created_at,
        }
    }
}

/// Task joined with its owner's username, for the public overview.
#[derive(Debug, Clone, FromRow)]
pub struct TaskWithOwner {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub user_id: i64,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<TaskWithOwner> for shared::TaskOverviewItem {
    fn from(row: TaskWithOwner) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            user_id: row.user_id,
            username: row.username,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: Option<i64>,
    pub task_id: Option<i64>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for ChatMessage {
    fn from(row: Message) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            task_id: row.task_id,
            content: row.content,
            timestamp: row.timestamp,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Ride {
    pub id: i64,
    pub driver_id: i64,
    pub origin: String,
    pub destination: String,
    pub time: String,
    pub created_at: DateTime<Utc>,
}

impl From<Ride> for shared::Ride {
    fn from(row: Ride) -> Self {
        Self {
            id: row.id,
            driver_id: row.driver_id,
            origin: row.origin,
            destination: row.destination,
            time: row.time,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StudySession {
    pub id: i64,
    pub user_id: i64,
    pub course: String,
    pub available: bool,
    #[sqlx(try_from = "String")]
    pub campus: Campus,
    pub teacher: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl StudySession {
    pub fn into_api(self, owner: Option<PublicProfile>) -> shared::StudySession {
        shared::StudySession {
            id: self.id,
            user_id: self.user_id,
            course: self.course,
            available: self.available,
            campus: self.campus,
            teacher: self.teacher,
            description: self.description,
            created_at: self.created_at,
            owner,
        }
    }
}

/// Fields needed to insert a study session.
pub struct NewStudySession<'a> {
    pub user_id: i64,
    pub course: &'a str,
    pub available: bool,
    pub campus: Campus,
    pub teacher: &'a str,
    pub description: &'a str,
}

/// Optional column updates for a study session; `None` keeps the stored value.
#[derive(Default)]
pub struct StudySessionChanges {
    pub course: Option<String>,
    pub available: Option<bool>,
    pub campus: Option<Campus>,
    pub teacher: Option<String>,
    pub description: Option<String>,
}
