use axum::http::StatusCode;
use serde_json::json;

use super::utils::setup;

#[tokio::test]
async fn test_accept_scenario() {
    let app = setup().await;
    let (a, _) = app.signup("a@student.kpu.ca").await;
    let (b, b_id) = app.signup("b@student.kpu.ca").await;

    let task = app.create_task(&a, "Grab coffee").await;
    let (_, body) = app.get(&format!("/tasks/{}", task), None).await;
    assert_eq!(body["status"], "open");
    assert!(body["assignee_id"].is_null());

    let (status, body) = app.post(&format!("/tasks/{}/accept", task), Some(&b), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], "assigned");
    assert_eq!(body["task"]["assignee_id"], b_id);

    let (status, body) = app.post(&format!("/tasks/{}/accept", task), Some(&a), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "You cannot accept your own task.");
}

#[tokio::test]
async fn test_accept_rejections() {
    let app = setup().await;
    let (a, _) = app.signup("a@student.kpu.ca").await;
    let (b, b_id) = app.signup("b@student.kpu.ca").await;
    let (c, _) = app.signup("c@student.kpu.ca").await;

    let task = app.create_task(&a, "Return books").await;
    let accept = format!("/tasks/{}/accept", task);
    app.post(&accept, Some(&b), json!({})).await;

    // someone else already holds it
    let (status, body) = app.post(&accept, Some(&c), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Task already assigned.");

    // the assignee accepting again is harmless
    let (status, body) = app.post(&accept, Some(&b), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["assignee_id"], b_id);

    app.post(&format!("/tasks/{}/done", task), Some(&a), json!({})).await;
    let (status, body) = app.post(&accept, Some(&b), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Task already completed.");

    let (status, _) = app.post("/tasks/999/accept", Some(&b), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_owner_marks_done() {
    let app = setup().await;
    let (a, _) = app.signup("a@student.kpu.ca").await;
    let (b, _) = app.signup("b@student.kpu.ca").await;

    let task = app.create_task(&a, "Print poster").await;
    app.post(&format!("/tasks/{}/accept", task), Some(&b), json!({})).await;

    let (status, body) = app.post(&format!("/tasks/{}/done", task), Some(&b), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["msg"], "Only the owner can mark done.");
    let (_, body) = app.get(&format!("/tasks/{}", task), None).await;
    assert_eq!(body["status"], "assigned");

    let (status, body) = app.post(&format!("/tasks/{}/done", task), Some(&a), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], "done");
}

#[tokio::test]
async fn test_owner_can_close_unassigned_task() {
    let app = setup().await;
    let (a, _) = app.signup("a@student.kpu.ca").await;
    let task = app.create_task(&a, "Never mind").await;

    let (status, body) = app.post(&format!("/tasks/{}/done", task), Some(&a), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], "done");
    assert!(body["task"]["assignee_id"].is_null());
}

#[tokio::test]
async fn test_edit_rules() {
    let app = setup().await;
    let (a, _) = app.signup("a@student.kpu.ca").await;
    let (b, _) = app.signup("b@student.kpu.ca").await;
    let task = app.create_task(&a, "Buy snacks").await;
    let uri = format!("/tasks/{}", task);

    let (status, _) = app.put(&uri, Some(&b), json!({ "title": "mine now" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(&uri, Some(&a), json!({ "title": "Buy chips", "description": "salt & vinegar" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["title"], "Buy chips");
    assert_eq!(body["task"]["description"], "salt & vinegar");
    assert_eq!(body["task"]["status"], "open");

    // assignment only happens through accept
    let (status, _) = app.put(&uri, Some(&a), json!({ "status": "assigned" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.put(&uri, Some(&a), json!({ "status": "finished" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.put(&uri, Some(&a), json!({ "status": "done" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], "done");

    let (status, _) = app.put(&uri, Some(&a), json!({ "status": "open" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_removes_task_conversation() {
    let app = setup().await;
    let (a, _) = app.signup("a@student.kpu.ca").await;
    let (b, _) = app.signup("b@student.kpu.ca").await;
    let task = app.create_task(&a, "Move couch").await;
    app.post(&format!("/tasks/{}/accept", task), Some(&b), json!({})).await;
    app.post(
        &format!("/chat/task/{}/send", task),
        Some(&b),
        json!({ "content": "on my way" }),
    )
    .await;

    let (status, _) = app.delete(&format!("/tasks/{}", task), Some(&b)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.delete(&format!("/tasks/{}", task), Some(&a)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "Task deleted");

    let (status, _) = app.get(&format!("/tasks/{}", task), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.state.db.get_task_messages(task).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing() {
    let app = setup().await;
    let (a, _) = app.signup("a@student.kpu.ca").await;
    let (b, _) = app.signup("b@student.kpu.ca").await;
    let first = app.create_task(&a, "First").await;
    let second = app.create_task(&b, "Second").await;
    let third = app.create_task(&a, "Third").await;

    let (status, body) = app.get("/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body.as_array().unwrap().iter().map(|t| t["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![third, second, first]);

    let (_, body) = app.get("/tasks/mine", Some(&a)).await;
    let ids: Vec<i64> = body.as_array().unwrap().iter().map(|t| t["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![third, first]);

    let (status, body) = app.get("/overview", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["tasks"][0]["username"], "a");
    assert_eq!(body["tasks"][1]["username"], "b");
}

#[tokio::test]
async fn test_create_validation() {
    let app = setup().await;
    let (a, _) = app.signup("a@student.kpu.ca").await;

    let (status, body) = app.post("/tasks", Some(&a), json!({ "description": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Missing title");

    let (status, _) = app.post("/tasks", Some(&a), json!({ "title": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/tasks", None, json!({ "title": "anon" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.post("/tasks", Some(&a), json!({ "title": "Laundry" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["task"]["description"], "");
}

#[tokio::test]
async fn test_banner_and_health() {
    let app = setup().await;
    let (status, body) = app.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ErrandBuddy Backend Running");

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
