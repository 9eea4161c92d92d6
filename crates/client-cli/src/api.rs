//! REST client for the ErrandBuddy server.

use anyhow::Result;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::*;
use thiserror::Error;

use crate::session::Session;

/// A non-2xx answer from the server, carrying its `msg` when there is one.
#[derive(Debug, Error)]
#[error("{msg} ({status})")]
pub struct ApiError {
    pub status: StatusCode,
    pub msg: String,
}

pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str, session: Option<&Session>) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base, path));
        match session {
            Some(s) => builder.bearer_auth(&s.token),
            None => builder,
        }
    }

    async fn dispatch<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let msg = match resp.json::<MsgResponse>().await {
                Ok(body) => body.msg,
                Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
            };
            return Err(ApiError { status, msg }.into());
        }
        Ok(resp.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, session: Option<&Session>) -> Result<T> {
        Self::dispatch(self.request(Method::GET, path, session)).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        session: Option<&Session>,
        body: &B,
    ) -> Result<T> {
        Self::dispatch(self.request(Method::POST, path, session).json(body)).await
    }

    async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        session: &Session,
        body: &B,
    ) -> Result<T> {
        Self::dispatch(self.request(Method::PUT, path, Some(session)).json(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str, session: &Session) -> Result<T> {
        Self::dispatch(self.request(Method::DELETE, path, Some(session))).await
    }

    // ---- auth ----

    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
        self.post("/auth/register", None, req).await
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<MsgResponse> {
        let req = VerifyOtpRequest {
            email: email.to_string(),
            otp: otp.to_string(),
        };
        self.post("/auth/verify-otp", None, &req).await
    }

    pub async fn resend_otp(&self, email: &str) -> Result<ResendOtpResponse> {
        let req = ResendOtpRequest {
            email: email.to_string(),
        };
        self.post("/auth/resend-otp", None, &req).await
    }

    /// Logs in and hands back the session to persist.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse = self.post("/auth/login", None, &req).await?;
        Ok(Session {
            token: resp.token,
            user: resp.user,
        })
    }

    // ---- tasks ----

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.get("/tasks", None).await
    }

    pub async fn my_tasks(&self, session: &Session) -> Result<Vec<Task>> {
        self.get("/tasks/mine", Some(session)).await
    }

    pub async fn get_task(&self, id: i64) -> Result<Task> {
        self.get(&format!("/tasks/{}", id), None).await
    }

    pub async fn create_task(&self, session: &Session, req: &CreateTaskRequest) -> Result<TaskEnvelope> {
        self.post("/tasks", Some(session), req).await
    }

    pub async fn update_task(
        &self,
        session: &Session,
        id: i64,
        req: &UpdateTaskRequest,
    ) -> Result<TaskEnvelope> {
        self.put(&format!("/tasks/{}", id), session, req).await
    }

    pub async fn delete_task(&self, session: &Session, id: i64) -> Result<MsgResponse> {
        self.delete(&format!("/tasks/{}", id), session).await
    }

    pub async fn accept_task(&self, session: &Session, id: i64) -> Result<TaskEnvelope> {
        self.post(&format!("/tasks/{}/accept", id), Some(session), &serde_json::json!({}))
            .await
    }

    pub async fn mark_done(&self, session: &Session, id: i64) -> Result<TaskEnvelope> {
        self.post(&format!("/tasks/{}/done", id), Some(session), &serde_json::json!({}))
            .await
    }

    pub async fn overview(&self) -> Result<TaskOverview> {
        self.get("/overview", None).await
    }

    // ---- chat ----

    pub async fn conversations(&self, session: &Session) -> Result<Vec<ConversationSummary>> {
        self.get("/chat/overview", Some(session)).await
    }

    pub async fn direct_thread(&self, session: &Session, other_id: i64) -> Result<Vec<ChatMessage>> {
        self.get(&format!("/chat/messages/{}", other_id), Some(session)).await
    }

    pub async fn task_thread(&self, session: &Session, task_id: i64) -> Result<Vec<ChatMessage>> {
        self.get(&format!("/chat/task/{}", task_id), Some(session)).await
    }

    /// Messages of whichever thread `key` names.
    pub async fn thread(&self, session: &Session, key: ConversationKey) -> Result<Vec<ChatMessage>> {
        match key {
            ConversationKey::Task { task_id } => self.task_thread(session, task_id).await,
            ConversationKey::Direct { user_id } => self.direct_thread(session, user_id).await,
        }
    }

    pub async fn send(
        &self,
        session: &Session,
        key: ConversationKey,
        content: &str,
    ) -> Result<MessageEnvelope> {
        match key {
            ConversationKey::Task { task_id } => {
                let req = TaskMessageRequest {
                    content: content.to_string(),
                };
                self.post(&format!("/chat/task/{}/send", task_id), Some(session), &req)
                    .await
            }
            ConversationKey::Direct { user_id } => {
                let req = SendMessageRequest {
                    receiver_id: user_id,
                    content: content.to_string(),
                };
                self.post("/chat/send", Some(session), &req).await
            }
        }
    }

    // ---- rides ----

    pub async fn list_rides(&self) -> Result<Vec<Ride>> {
        self.get("/rides", None).await
    }

    pub async fn create_ride(&self, session: &Session, req: &CreateRideRequest) -> Result<RideEnvelope> {
        self.post("/rides", Some(session), req).await
    }

    // ---- study ----

    pub async fn list_study(&self, query: &StudyQuery) -> Result<Vec<StudySession>> {
        let builder = self.request(Method::GET, "/study", None).query(query);
        Self::dispatch(builder).await
    }

    pub async fn create_study(
        &self,
        session: &Session,
        req: &CreateStudySessionRequest,
    ) -> Result<StudySessionEnvelope> {
        self.post("/study", Some(session), req).await
    }

    pub async fn update_study(
        &self,
        session: &Session,
        id: i64,
        req: &UpdateStudySessionRequest,
    ) -> Result<StudySessionEnvelope> {
        self.put(&format!("/study/{}", id), session, req).await
    }

    pub async fn delete_study(&self, session: &Session, id: i64) -> Result<MsgResponse> {
        self.delete(&format!("/study/{}", id), session).await
    }

    pub async fn connect_study(&self, session: &Session, id: i64) -> Result<ConnectResponse> {
        self.post(&format!("/study/{}/connect", id), Some(session), &serde_json::json!({}))
            .await
    }

    // ---- users ----

    pub async fn me(&self, session: &Session) -> Result<UserProfile> {
        self.get("/users/me", Some(session)).await
    }

    pub async fn update_me(
        &self,
        session: &Session,
        req: &UpdateProfileRequest,
    ) -> Result<ProfileEnvelope> {
        self.put("/users/me", session, req).await
    }

    pub async fn user(&self, id: i64) -> Result<PublicProfile> {
        self.get(&format!("/users/{}", id), None).await
    }
}

/// The socket endpoint matching an http(s) base URL.
pub fn ws_url(base: &str) -> String {
    let swapped = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/ws", swapped.trim_end_matches('/'))
}
