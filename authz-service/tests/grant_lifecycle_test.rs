//! Direct grant lifecycle integration tests.

mod common;

use axum::http::StatusCode;
use common::{create_branch, create_member, create_role, expect_json, parse_id, TestApp};

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn direct_grant_is_immediately_active() {
    let app = TestApp::spawn().await;

    let member = create_member(&app, "Aelfgifu").await;
    let role = create_role(&app, "seneschal").await;
    let branch = create_branch(&app, "shire", None).await;

    let grant = expect_json(
        app.post_json(
            "/grants",
            serde_json::json!({
                "member_id": member,
                "role_id": role,
                "branch_id": branch,
                "approver_member_id": null,
            }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(grant["entity_type_code"], "direct");
    assert!(grant["expires_on"].is_null());

    let active = expect_json(
        app.get(&format!("/members/{}/grants/active", member)).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(active.as_array().expect("array").len(), 1);
}

#[tokio::test]
#[ignore]
async fn revocation_closes_the_window_and_keeps_the_row() {
    let app = TestApp::spawn().await;

    let member = create_member(&app, "Brandr").await;
    let role = create_role(&app, "herald").await;

    let grant = expect_json(
        app.post_json(
            "/grants",
            serde_json::json!({
                "member_id": member,
                "role_id": role,
                "branch_id": null,
                "approver_member_id": null,
            }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let grant_id = parse_id(&grant, "grant_id");

    let revoked = expect_json(
        app.post_json(
            &format!("/grants/{}/revoke", grant_id),
            serde_json::json!({}),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert!(!revoked["expires_on"].is_null());

    // Gone from the active view, still present in history.
    let active = expect_json(
        app.get(&format!("/members/{}/grants/active", member)).await,
        StatusCode::OK,
    )
    .await;
    assert!(active.as_array().expect("array").is_empty());

    let history = expect_json(
        app.get(&format!("/members/{}/grants", member)).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(history.as_array().expect("array").len(), 1);
}

#[tokio::test]
#[ignore]
async fn double_revocation_is_refused() {
    let app = TestApp::spawn().await;

    let member = create_member(&app, "Ceolwulf").await;
    let role = create_role(&app, "marshal").await;

    let grant = expect_json(
        app.post_json(
            "/grants",
            serde_json::json!({
                "member_id": member,
                "role_id": role,
                "branch_id": null,
                "approver_member_id": null,
            }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let grant_id = parse_id(&grant, "grant_id");

    let first = app
        .post_json(&format!("/grants/{}/revoke", grant_id), serde_json::json!({}))
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .post_json(&format!("/grants/{}/revoke", grant_id), serde_json::json!({}))
        .await;
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn grant_for_unknown_member_is_rejected() {
    let app = TestApp::spawn().await;
    let role = create_role(&app, "herald").await;

    let response = app
        .post_json(
            "/grants",
            serde_json::json!({
                "member_id": uuid::Uuid::new_v4(),
                "role_id": role,
                "branch_id": null,
                "approver_member_id": null,
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
