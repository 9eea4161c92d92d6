use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

use crate::ConversationKey;

// ============================================================================
// Domain enums
// ============================================================================

/// Task lifecycle: `open -> assigned -> done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Assigned,
    Done,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown value {0:?}")]
pub struct UnknownVariant(pub String);

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::Done => "done",
        }
    }

    /// Whether an owner edit may move a task from `self` to `next`.
    /// Nothing leaves `done` and nothing returns to `open`.
    pub fn can_become(&self, next: TaskStatus) -> bool {
        *self == next || (*self != Self::Done && next == Self::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "assigned" => Ok(Self::Assigned),
            "done" => Ok(Self::Done),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Campuses a study session can be held at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Campus {
    #[default]
    Surrey,
    Langley,
    Richmond,
}

impl Campus {
    pub const ALL: [Campus; 3] = [Campus::Langley, Campus::Richmond, Campus::Surrey];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Surrey => "Surrey",
            Self::Langley => "Langley",
            Self::Richmond => "Richmond",
        }
    }
}

impl fmt::Display for Campus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Campus {
    type Err = UnknownVariant;

    /// Accepts any casing ("surrey", "RICHMOND") and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownVariant(trimmed.to_string()))
    }
}

impl TryFrom<String> for Campus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

/// Fields of a user that other users may see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl PublicProfile {
    /// "First Last" when either is set, the username otherwise.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

impl From<UserProfile> for PublicProfile {
    fn from(user: UserProfile) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 80, message = "Username must be 1-80 characters"))]
    pub username: Option<String>,
    #[validate(length(max = 80, message = "First name is too long"))]
    pub first_name: Option<String>,
    #[validate(length(max = 80, message = "Last name is too long"))]
    pub last_name: Option<String>,
    #[validate(length(max = 300, message = "Bio must be at most 300 characters"))]
    pub bio: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileEnvelope {
    pub msg: String,
    pub user: UserProfile,
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(email(message = "Missing or invalid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing email or password"))]
    pub password: String,
    #[validate(length(min = 1, max = 80, message = "Username must be 1-80 characters"))]
    pub username: Option<String>,
    #[serde(default)]
    #[validate(length(max = 80, message = "First name is too long"))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 80, message = "Last name is too long"))]
    pub last_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub msg: String,
    pub verify_required: bool,
    pub email_sent: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing credentials"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing credentials"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub msg: String,
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing email or OTP"))]
    pub email: String,
    #[serde(default, alias = "code")]
    #[validate(length(min = 1, message = "Missing email or OTP"))]
    pub otp: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct ResendOtpRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing email"))]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResendOtpResponse {
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_sent: Option<bool>,
}

/// Body of every plain acknowledgement and every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgResponse {
    pub msg: String,
}

impl MsgResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub user_id: i64,
    pub assignee_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Missing title"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub msg: String,
    pub task: Task,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskOverviewItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub user_id: i64,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskOverview {
    pub count: usize,
    pub tasks: Vec<TaskOverviewItem>,
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: Option<i64>,
    pub task_id: Option<i64>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub receiver_id: i64,
    #[serde(default)]
    #[validate(length(min = 1, max = 2000, message = "Message content must be 1-2000 characters"))]
    pub content: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct TaskMessageRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 2000, message = "Message content required."))]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub msg: String,
    pub message: ChatMessage,
}

/// One thread in the chat overview: the newest message under a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub key: ConversationKey,
    pub other_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<PublicProfile>,
    pub last_message: ChatMessage,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Rides
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: i64,
    pub driver_id: i64,
    pub origin: String,
    pub destination: String,
    pub time: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct CreateRideRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Missing data"))]
    pub origin: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Missing data"))]
    pub destination: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Missing data"))]
    pub time: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RideEnvelope {
    pub msg: String,
    pub ride: Ride,
}

// ============================================================================
// Study sessions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySession {
    pub id: i64,
    pub user_id: i64,
    pub course: String,
    pub available: bool,
    pub campus: Campus,
    pub teacher: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<PublicProfile>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StudyQuery {
    pub q: Option<String>,
    pub campus: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateStudySessionRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 120, message = "Missing course"))]
    pub course: String,
    #[serde(default = "default_true")]
    pub available: bool,
    pub campus: Option<String>,
    #[serde(default)]
    #[validate(length(max = 120, message = "Teacher name is too long"))]
    pub teacher: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateStudySessionRequest {
    #[validate(length(max = 120, message = "Course is too long"))]
    pub course: Option<String>,
    pub available: Option<bool>,
    pub campus: Option<String>,
    #[validate(length(max = 120, message = "Teacher name is too long"))]
    pub teacher: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudySessionEnvelope {
    pub msg: String,
    pub session: StudySession,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub msg: String,
    pub owner_id: i64,
    pub owner: PublicProfile,
    pub session: StudySession,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_transitions() {
        use TaskStatus::*;
        assert!(Open.can_become(Open));
        assert!(Open.can_become(Done));
        assert!(Assigned.can_become(Done));
        assert!(Done.can_become(Done));

        assert!(!Done.can_become(Open));
        assert!(!Done.can_become(Assigned));
        assert!(!Assigned.can_become(Open));
        assert!(!Open.can_become(Assigned));
    }

    #[test]
    fn test_task_status_parsing() {
        assert_eq!("assigned".parse::<TaskStatus>().unwrap(), TaskStatus::Assigned);
        assert!("closed".parse::<TaskStatus>().is_err());
        let json = serde_json::to_string(&TaskStatus::Done).unwrap();
        assert_eq!(json, "\"done\"");
    }

    #[test]
    fn test_campus_is_case_insensitive() {
        assert_eq!("surrey".parse::<Campus>().unwrap(), Campus::Surrey);
        assert_eq!("  LANGLEY ".parse::<Campus>().unwrap(), Campus::Langley);
        assert_eq!("Richmond".parse::<Campus>().unwrap(), Campus::Richmond);
        assert!("Vancouver".parse::<Campus>().is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let mut profile = PublicProfile {
            id: 1,
            username: "alice".to_string(),
            first_name: String::new(),
            last_name: "  ".to_string(),
        };
        assert_eq!(profile.display_name(), "alice");

        profile.first_name = "Alice".to_string();
        profile.last_name = "Nguyen".to_string();
        assert_eq!(profile.display_name(), "Alice Nguyen");
    }

    #[test]
    fn test_register_validation() {
        let req = RegisterRequest {
            email: "alice@student.kpu.ca".to_string(),
            password: "pw123".to_string(),
            ..Default::default()
        };
        assert!(req.validate().is_ok());

        let req = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "pw123".to_string(),
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let req = RegisterRequest {
            email: "alice@student.kpu.ca".to_string(),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_verify_otp_accepts_code_alias() {
        let req: VerifyOtpRequest =
            serde_json::from_str(r#"{"email":"a@student.kpu.ca","code":"012345"}"#).unwrap();
        assert_eq!(req.otp, "012345");
    }

    #[test]
    fn test_study_session_defaults() {
        let req: CreateStudySessionRequest = serde_json::from_str(r#"{"course":"MATH 1120"}"#).unwrap();
        assert!(req.available);
        assert!(req.campus.is_none());
        assert!(req.teacher.is_empty());
    }
}
