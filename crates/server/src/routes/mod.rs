use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod auth;
mod chat;
mod extract;
mod health;
mod rides;
mod study;
mod tasks;
mod users;
pub(crate) mod ws;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and overview
        .route("/", get(health::banner))
        .route("/health", get(health::health_check))
        .route("/overview", get(health::task_overview))
        // Auth routes
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-otp", post(auth::verify_otp))
        .route("/auth/resend-otp", post(auth::resend_otp))
        // Tasks
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/mine", get(tasks::list_my_tasks))
        .route(
            "/tasks/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/:id/accept", post(tasks::accept_task))
        .route("/tasks/:id/done", post(tasks::mark_task_done))
        // Chat
        .route("/chat/messages/:other_id", get(chat::direct_thread))
        .route("/chat/send", post(chat::send_direct))
        .route("/chat/overview", get(chat::overview))
        .route("/chat/task/:task_id", get(chat::task_thread))
        .route("/chat/task/:task_id/send", post(chat::task_send))
        // Rides
        .route("/rides", get(rides::list_rides).post(rides::create_ride))
        // Study sessions
        .route("/study", get(study::list_sessions).post(study::create_session))
        .route(
            "/study/:id",
            put(study::update_session).delete(study::delete_session),
        )
        .route("/study/:id/connect", post(study::connect_session))
        // Users
        .route("/users/me", get(users::me).put(users::update_me))
        .route("/users/:id", get(users::get_user))
        // Realtime socket
        .route("/ws", get(ws::ws_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
