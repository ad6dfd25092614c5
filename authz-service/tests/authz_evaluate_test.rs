//! Authorization evaluation integration tests.
//!
//! The kernel itself is covered by unit tests; these exercise the HTTP
//! surface end to end: context loading, scoping against the stored tree,
//! and the uniform denial shape for unknown members and permissions.

mod common;

use axum::http::StatusCode;
use common::{
    attach_permission, create_branch, create_member, create_permission, create_role, expect_json,
    unique, TestApp,
};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn subtree_grant_covers_descendant_branch() {
    let app = TestApp::spawn().await;

    let member = create_member(&app, "Leofric").await;
    let kingdom = create_branch(&app, "kingdom", None).await;
    let shire = create_branch(&app, "shire", Some(kingdom)).await;

    let permission_name = unique("Can Approve Events");
    let permission = create_permission(&app, &permission_name, "branch_and_children").await;
    let role = create_role(&app, "seneschal").await;
    attach_permission(&app, role, permission).await;

    let created = app
        .post_json(
            "/grants",
            json!({
                "member_id": member,
                "role_id": role,
                "branch_id": kingdom,
                "approver_member_id": null,
            }),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let body = expect_json(
        app.post_json(
            "/authz/evaluate",
            json!({
                "member_id": member,
                "permissions": [permission_name],
                "branch_id": shire,
            }),
        )
        .await,
        StatusCode::OK,
    )
    .await;

    assert_eq!(body["all_allowed"], true);
    assert_eq!(body["decisions"][0]["allowed"], true);
    assert_eq!(body["decisions"][0]["granted_at_branch"], kingdom.to_string());
}

#[tokio::test]
#[ignore]
async fn branch_only_grant_does_not_cover_children() {
    let app = TestApp::spawn().await;

    let member = create_member(&app, "Mildryth").await;
    let kingdom = create_branch(&app, "kingdom", None).await;
    let shire = create_branch(&app, "shire", Some(kingdom)).await;

    let permission_name = unique("Can Edit Rolls");
    let permission = create_permission(&app, &permission_name, "branch_only").await;
    let role = create_role(&app, "clerk").await;
    attach_permission(&app, role, permission).await;

    app.post_json(
        "/grants",
        json!({
            "member_id": member,
            "role_id": role,
            "branch_id": kingdom,
            "approver_member_id": null,
        }),
    )
    .await;

    let body = expect_json(
        app.post_json(
            "/authz/evaluate",
            json!({
                "member_id": member,
                "permissions": [permission_name],
                "branch_id": shire,
            }),
        )
        .await,
        StatusCode::OK,
    )
    .await;

    assert_eq!(body["all_allowed"], false);
    assert_eq!(body["decisions"][0]["allowed"], false);
}

#[tokio::test]
#[ignore]
async fn unknown_member_denies_instead_of_erroring() {
    let app = TestApp::spawn().await;

    let body = expect_json(
        app.post_json(
            "/authz/evaluate",
            json!({
                "member_id": Uuid::new_v4(),
                "permissions": ["Can Approve Events"],
                "branch_id": null,
            }),
        )
        .await,
        StatusCode::OK,
    )
    .await;

    assert_eq!(body["all_allowed"], false);
    assert_eq!(body["decisions"][0]["reason"], "Member not found");
}

#[tokio::test]
#[ignore]
async fn unknown_permission_name_is_a_denial() {
    let app = TestApp::spawn().await;
    let member = create_member(&app, "Nothelm").await;

    let body = expect_json(
        app.post_json(
            "/authz/evaluate",
            json!({
                "member_id": member,
                "permissions": [unique("No Such Permission")],
                "branch_id": null,
            }),
        )
        .await,
        StatusCode::OK,
    )
    .await;

    assert_eq!(body["all_allowed"], false);
    assert_eq!(body["decisions"][0]["allowed"], false);
}

#[tokio::test]
#[ignore]
async fn batch_evaluate_reports_per_check_results() {
    let app = TestApp::spawn().await;

    let member = create_member(&app, "Osric").await;
    let permission_name = unique("Can View Reports");
    let permission = create_permission(&app, &permission_name, "global").await;
    let role = create_role(&app, "auditor").await;
    attach_permission(&app, role, permission).await;

    app.post_json(
        "/grants",
        json!({
            "member_id": member,
            "role_id": role,
            "branch_id": null,
            "approver_member_id": null,
        }),
    )
    .await;

    let body = expect_json(
        app.post_json(
            "/authz/batch-evaluate",
            json!({
                "checks": [
                    { "member_id": member, "permissions": [permission_name], "branch_id": null },
                    { "member_id": member, "permissions": [unique("Missing")], "branch_id": null },
                ],
            }),
        )
        .await,
        StatusCode::OK,
    )
    .await;

    assert_eq!(body["results"][0]["all_allowed"], true);
    assert_eq!(body["results"][1]["all_allowed"], false);
    assert_eq!(body["all_allowed"], false);
}
