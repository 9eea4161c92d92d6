use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use super::utils::{setup, KNOWN_CODE};
use crate::{db::NewUser, otp};

const ALICE: &str = "alice@student.kpu.ca";

#[tokio::test]
async fn test_register_verify_login_flow() {
    let app = setup().await;

    let (status, body) = app.register(ALICE).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["verify_required"], true);
    assert_eq!(body["email_sent"], true);

    let (status, body) = app.login(ALICE).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["msg"].as_str().unwrap().contains("not verified"));

    app.force_known_otp(ALICE).await;
    let (status, body) = app
        .post("/auth/verify-otp", None, json!({ "email": ALICE, "otp": KNOWN_CODE }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "Email verified successfully");

    let (status, body) = app.login(ALICE).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["user"]["email"], ALICE);
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_rejections() {
    let app = setup().await;

    let (status, _) = app
        .post("/auth/register", None, json!({ "email": ALICE }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.register("alice@gmail.com").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["msg"].as_str().unwrap().contains("student.kpu.ca"));

    let (status, _) = app.register(ALICE).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.register(ALICE).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["msg"], "Email already registered");
}

#[tokio::test]
async fn test_domain_check_ignores_case() {
    let app = setup().await;
    let (status, _) = app.register("bob@Student.KPU.ca").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_username_defaults_to_local_part_unless_given() {
    let app = setup().await;
    app.post(
        "/auth/register",
        None,
        json!({ "email": "carol@student.kpu.ca", "password": "pw", "username": "caz" }),
    )
    .await;
    app.register(ALICE).await;

    let carol = app.state.db.get_user_by_email("carol@student.kpu.ca").await.unwrap().unwrap();
    let alice = app.state.db.get_user_by_email(ALICE).await.unwrap().unwrap();
    assert_eq!(carol.username, "caz");
    assert_eq!(alice.username, "alice");
    assert_ne!(alice.password_hash, "pw123");
}

#[tokio::test]
async fn test_login_failures() {
    let app = setup().await;
    app.signup(ALICE).await;

    let (status, _) = app
        .post("/auth/login", None, json!({ "email": ALICE, "password": "wrong" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.login("nobody@student.kpu.ca").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/auth/login", None, json!({ "email": ALICE })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_without_otp_record_is_forbidden() {
    let app = setup().await;
    let hash = otp::hash_secret("pw123").unwrap();
    app.state
        .db
        .create_user(&NewUser {
            username: "legacy",
            first_name: "",
            last_name: "",
            email: "legacy@student.kpu.ca",
            password_hash: &hash,
        })
        .await
        .unwrap();

    let (status, _) = app.login("legacy@student.kpu.ca").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            "/auth/verify-otp",
            None,
            json!({ "email": "legacy@student.kpu.ca", "otp": "000000" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["msg"].as_str().unwrap().contains("No OTP request"));
}

#[tokio::test]
async fn test_wrong_codes_are_counted_and_capped() {
    let app = setup().await;
    app.register(ALICE).await;
    let user_id = app.force_known_otp(ALICE).await;

    let mut last_attempts = 0;
    for _ in 0..5 {
        let (status, _) = app
            .post("/auth/verify-otp", None, json!({ "email": ALICE, "otp": "999999" }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let attempts = app.state.db.get_otp(user_id).await.unwrap().unwrap().attempts;
        assert!(attempts > last_attempts);
        last_attempts = attempts;
    }
    assert_eq!(last_attempts, 5);

    // the right code no longer helps
    let (status, _) = app
        .post("/auth/verify-otp", None, json!({ "email": ALICE, "otp": KNOWN_CODE }))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let otp = app.state.db.get_otp(user_id).await.unwrap().unwrap();
    assert_eq!(otp.attempts, 5);
    assert!(!otp.verified);

    // a resend starts over
    let (status, body) = app
        .post("/auth/resend-otp", None, json!({ "email": ALICE }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email_sent"], true);
    assert_eq!(app.state.db.get_otp(user_id).await.unwrap().unwrap().attempts, 0);
}

#[tokio::test]
async fn test_expired_code_is_rejected() {
    let app = setup().await;
    app.register(ALICE).await;
    let user_id = app.force_known_otp(ALICE).await;
    let hash = otp::hash_secret(KNOWN_CODE).unwrap();
    app.state
        .db
        .upsert_otp(user_id, &hash, Utc::now() - Duration::seconds(1))
        .await
        .unwrap();

    let (status, body) = app
        .post("/auth/verify-otp", None, json!({ "email": ALICE, "otp": KNOWN_CODE }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["msg"].as_str().unwrap().contains("expired"));
    assert!(!app.state.db.get_otp(user_id).await.unwrap().unwrap().verified);
}

#[tokio::test]
async fn test_verify_accepts_code_alias_and_whitespace() {
    let app = setup().await;
    app.register(ALICE).await;
    app.force_known_otp(ALICE).await;

    let (status, _) = app
        .post(
            "/auth/verify-otp",
            None,
            json!({ "email": ALICE, "code": format!(" {} ", KNOWN_CODE) }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // idempotent once verified
    let (status, body) = app
        .post("/auth/verify-otp", None, json!({ "email": ALICE, "otp": "000000" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "Email already verified");
}

#[tokio::test]
async fn test_verify_and_resend_unknown_user() {
    let app = setup().await;
    let (status, _) = app
        .post("/auth/verify-otp", None, json!({ "email": ALICE, "otp": "123456" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.post("/auth/verify-otp", None, json!({ "email": ALICE })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/auth/resend-otp", None, json!({ "email": ALICE })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resend_after_verification_changes_nothing() {
    let app = setup().await;
    let (_, user_id) = app.signup(ALICE).await;
    let before = app.state.db.get_otp(user_id).await.unwrap().unwrap();

    let (status, body) = app
        .post("/auth/resend-otp", None, json!({ "email": ALICE }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "Email already verified");
    assert!(body.get("email_sent").is_none());

    let after = app.state.db.get_otp(user_id).await.unwrap().unwrap();
    assert!(after.verified);
    assert_eq!(after.code_hash, before.code_hash);
}

#[tokio::test]
async fn test_protected_routes_need_a_valid_token() {
    let app = setup().await;

    let (status, _) = app.get("/tasks/mine", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/users/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
