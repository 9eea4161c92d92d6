use axum::http::StatusCode;
use serde_json::json;

use super::utils::setup;

#[tokio::test]
async fn test_create_defaults_and_campus_validation() {
    let app = setup().await;
    let (a, a_id) = app.signup("a@student.kpu.ca").await;

    let (status, body) = app.post("/study", Some(&a), json!({ "course": "MATH 1120" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["session"]["campus"], "Surrey");
    assert_eq!(body["session"]["available"], true);
    assert_eq!(body["session"]["owner"]["id"], a_id);

    let (status, body) = app
        .post("/study", Some(&a), json!({ "course": "CPSC 1150", "campus": "richmond" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["session"]["campus"], "Richmond");

    let (status, body) = app
        .post("/study", Some(&a), json!({ "course": "CPSC 1150", "campus": "Vancouver" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["msg"].as_str().unwrap().starts_with("Invalid campus"));

    let (status, _) = app.post("/study", Some(&a), json!({ "course": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/study", None, json!({ "course": "MATH 1120" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_filters() {
    let app = setup().await;
    let (a, _) = app.signup("a@student.kpu.ca").await;
    let (b, _) = app.signup("b@student.kpu.ca").await;
    app.post("/study", Some(&a), json!({ "course": "MATH 1120", "campus": "Surrey" })).await;
    app.post("/study", Some(&b), json!({ "course": "Math 2331", "campus": "Langley" })).await;
    app.post("/study", Some(&b), json!({ "course": "PHYS 1120", "campus": "Langley" })).await;

    let (status, body) = app.get("/study", None).await;
    assert_eq!(status, StatusCode::OK);
    let all = body.as_array().unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0]["course"], "PHYS 1120");
    assert_eq!(all[0]["owner"]["username"], "b");

    let (_, body) = app.get("/study?q=math", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = app.get("/study?campus=langley", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = app.get("/study?q=1120&campus=Langley", None).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["course"], "PHYS 1120");

    let (_, body) = app.get("/study?campus=Burnaby", None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_update_and_delete_are_owner_only() {
    let app = setup().await;
    let (a, _) = app.signup("a@student.kpu.ca").await;
    let (b, _) = app.signup("b@student.kpu.ca").await;
    let (_, body) = app.post("/study", Some(&a), json!({ "course": "BIOL 1110" })).await;
    let id = body["session"]["id"].as_i64().unwrap();
    let uri = format!("/study/{}", id);

    let (status, _) = app.put(&uri, Some(&b), json!({ "available": false })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(
            &uri,
            Some(&a),
            json!({ "available": false, "campus": "LANGLEY", "course": "", "teacher": " Dr. Patel " }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["available"], false);
    assert_eq!(body["session"]["campus"], "Langley");
    assert_eq!(body["session"]["course"], "BIOL 1110");
    assert_eq!(body["session"]["teacher"], "Dr. Patel");

    let (status, _) = app.put(&uri, Some(&a), json!({ "campus": "Mars" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&uri, Some(&b)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&uri, Some(&a)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&uri, Some(&a)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connect() {
    let app = setup().await;
    let (a, a_id) = app.signup("a@student.kpu.ca").await;
    let (b, _) = app.signup("b@student.kpu.ca").await;
    let (_, body) = app.post("/study", Some(&a), json!({ "course": "ECON 1150" })).await;
    let id = body["session"]["id"].as_i64().unwrap();
    let uri = format!("/study/{}/connect", id);

    let (status, body) = app.post(&uri, Some(&a), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "You own this session.");

    let (status, body) = app.post(&uri, Some(&b), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["owner_id"], a_id);
    assert_eq!(body["owner"]["username"], "a");
    assert_eq!(body["session"]["course"], "ECON 1150");

    let (status, _) = app.post("/study/999/connect", Some(&b), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
