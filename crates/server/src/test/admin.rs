use axum::http::StatusCode;
use serde_json::json;

use super::utils::setup;

#[tokio::test]
async fn test_deleting_a_user_cleans_up_after_them() {
    let app = setup().await;
    let (gone, _) = app.signup("gone@student.kpu.ca").await;
    let (stay, stay_id) = app.signup("stay@student.kpu.ca").await;

    let own = app.create_task(&gone, "Their errand").await;
    app.post(&format!("/tasks/{}/accept", own), Some(&stay), json!({})).await;
    app.post(&format!("/chat/task/{}/send", own), Some(&stay), json!({ "content": "hi" }))
        .await;

    let held = app.create_task(&stay, "My errand").await;
    app.post(&format!("/tasks/{}/accept", held), Some(&gone), json!({})).await;
    app.post(&format!("/chat/task/{}/send", held), Some(&gone), json!({ "content": "yo" }))
        .await;

    app.post("/chat/send", Some(&gone), json!({ "receiver_id": stay_id, "content": "dm" }))
        .await;
    app.post("/study", Some(&gone), json!({ "course": "ENGL 1100" })).await;
    app.post(
        "/rides",
        Some(&gone),
        json!({ "origin": "Surrey", "destination": "Langley", "time": "now" }),
    )
    .await;

    assert!(app.state.db.delete_user_cascade("gone@student.kpu.ca").await.unwrap());

    let (_, body) = app.get("/chat/overview", Some(&stay)).await;
    assert!(body.as_array().unwrap().is_empty());

    let (_, body) = app.get("/tasks", None).await;
    let tasks = body.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], held);
    assert_eq!(tasks[0]["status"], "open");
    assert!(tasks[0]["assignee_id"].is_null());

    let (_, body) = app.get("/study", None).await;
    assert!(body.as_array().unwrap().is_empty());
    let (_, body) = app.get("/rides", None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = app.login("gone@student.kpu.ca").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // the released task can be picked up again
    let (newcomer, _) = app.signup("new@student.kpu.ca").await;
    let (status, _) = app.post(&format!("/tasks/{}/accept", held), Some(&newcomer), json!({})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reset_recreates_empty_schema() {
    let app = setup().await;
    let (a, _) = app.signup("a@student.kpu.ca").await;
    app.create_task(&a, "Temp").await;

    app.state.db.reset().await.unwrap();

    let (status, body) = app.get("/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
    let (status, _) = app.register("a@student.kpu.ca").await;
    assert_eq!(status, StatusCode::CREATED);
}
