//! Integration tests for the duplicate check, decision, and match log endpoints.

mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use common::{body_json, get, post_json, send, settle};
use recordguard_core::duplicate_detection::recorder::verify_chain;
use recordguard_core::duplicate_detection::AuditSink;
use recordguard_core::match_rule::{FieldGroup, MatchLogic, MatchRule};
use recordguard_core::memory::MemoryStore;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn map(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn rule(name: &str, priority: i32, logic: MatchLogic, groups: Vec<FieldGroup>) -> MatchRule {
    MatchRule {
        id: 0,
        tenant_id: 1,
        entity_type: "leads".into(),
        name: name.into(),
        description: None,
        field_groups: groups,
        match_logic: logic,
        is_active: true,
        priority,
    }
}

/// Store with one lead and the usual email / phone / name rules.
fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_record(
        1,
        "leads",
        map(json!({
            "email": "Jane@Example.com",
            "phone": "555-0100",
            "first_name": "Jane",
            "last_name": "Doe"
        })),
    );
    store.insert_rule(rule("Email", 10, MatchLogic::Any, vec![["email"].into()]));
    store.insert_rule(rule("Phone", 9, MatchLogic::Any, vec![["phone"].into()]));
    store.insert_rule(rule(
        "Name",
        5,
        MatchLogic::Any,
        vec![["first_name", "last_name"].into()],
    ));
    store
}

// ---------------------------------------------------------------------------
// Duplicate check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn email_match_is_reported_with_normalized_comparison() {
    let app = common::build_test_app(seeded_store());
    let response = post_json(
        app,
        "/api/v1/leads/duplicates/check",
        json!({"fields": {"email": "  jane@example.COM "}}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["has_duplicates"], true);
    assert_eq!(data["deciding_rule_id"], 1);
    assert_eq!(data["matches"][0]["matched_record_id"], 1);
    assert_eq!(data["matches"][0]["confidence_score"], 1.0);
    assert_eq!(
        data["matches"][0]["matched_fields"]["email"],
        "  jane@example.COM "
    );
    assert_eq!(
        data["matches"][0]["matched_record_snapshot"]["last_name"],
        "Doe"
    );
}

#[tokio::test]
async fn lower_priority_rule_decides_when_higher_ones_miss() {
    let app = common::build_test_app(seeded_store());
    let response = post_json(
        app,
        "/api/v1/leads/duplicates/check",
        json!({"fields": {"email": "other@example.com", "first_name": "JANE", "last_name": "doe"}}),
    )
    .await;

    let json = body_json(response).await;
    assert_eq!(json["data"]["has_duplicates"], true);
    assert_eq!(json["data"]["deciding_rule_id"], 3);
}

#[tokio::test]
async fn no_match_reports_no_duplicates() {
    let app = common::build_test_app(seeded_store());
    let response = post_json(
        app,
        "/api/v1/leads/duplicates/check",
        json!({"fields": {"email": "nobody@example.com"}}),
    )
    .await;

    let json = body_json(response).await;
    assert_eq!(json["data"]["has_duplicates"], false);
    assert_eq!(json["data"]["matches"], json!([]));
    assert!(json["data"]["deciding_rule_id"].is_null());
}

#[tokio::test]
async fn saved_candidate_never_matches_itself() {
    let app = common::build_test_app(seeded_store());
    let response = post_json(
        app,
        "/api/v1/leads/duplicates/check",
        json!({"candidate_id": 1, "fields": {"email": "jane@example.com"}}),
    )
    .await;

    let json = body_json(response).await;
    assert_eq!(json["data"]["has_duplicates"], false);
}

#[tokio::test]
async fn missing_tenant_fails_open() {
    let app = common::build_test_app(seeded_store());
    let response = send(
        app,
        Method::POST,
        "/api/v1/leads/duplicates/check",
        None,
        Some(json!({"fields": {"email": "jane@example.com"}})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["has_duplicates"], false);
}

#[tokio::test]
async fn unavailable_store_fails_open() {
    let store = seeded_store();
    store.set_unavailable(true);
    let app = common::build_test_app(store);

    let response = post_json(
        app,
        "/api/v1/leads/duplicates/check",
        json!({"fields": {"email": "jane@example.com"}}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["has_duplicates"], false);
}

#[tokio::test]
async fn other_tenants_records_are_invisible() {
    let app = common::build_test_app(seeded_store());
    let response = send(
        app,
        Method::POST,
        "/api/v1/leads/duplicates/check",
        Some("2"),
        Some(json!({"fields": {"email": "jane@example.com"}})),
    )
    .await;

    let json = body_json(response).await;
    assert_eq!(json["data"]["has_duplicates"], false);
}

#[tokio::test]
async fn unknown_entity_type_is_rejected() {
    let app = common::build_test_app(seeded_store());
    let response = post_json(
        app,
        "/api/v1/invoices/duplicates/check",
        json!({"fields": {}}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn decisions_return_the_ui_outcome() {
    let cases = [
        ("created_anyway", true, Value::Null),
        ("viewed", false, json!(1)),
        ("cancelled", false, Value::Null),
    ];

    for (action, proceed, navigate_to) in cases {
        let app = common::build_test_app(seeded_store());
        let response = post_json(
            app,
            "/api/v1/leads/duplicates/decisions",
            json!({
                "matched_record_id": 1,
                "matched_fields": {"email": "jane@example.com"},
                "rule_id": 1,
                "user_action": action
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED, "{action}");
        let json = body_json(response).await;
        assert_eq!(json["data"]["proceed_with_create"], proceed, "{action}");
        assert_eq!(json["data"]["navigate_to"], navigate_to, "{action}");
    }
}

#[tokio::test]
async fn decisions_are_logged_with_a_valid_chain() {
    let store = seeded_store();

    for action in ["viewed", "created_anyway"] {
        let response = send(
            common::build_test_app(store.clone()),
            Method::POST,
            "/api/v1/leads/duplicates/decisions",
            Some("1"),
            Some(json!({
                "matched_record_id": 1,
                "matched_fields": {"email": "jane@example.com"},
                "rule_id": 1,
                "user_action": action
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        settle().await;
    }

    let mut logs = store.list_for_tenant(1, 10, 0).await.unwrap();
    assert_eq!(logs.len(), 2);
    logs.reverse();
    assert_eq!(verify_chain(&logs), None);
    assert!(logs.iter().all(|l| l.actioned_at.is_some()));

    let response = get(common::build_test_app(store), "/api/v1/duplicates/logs").await;
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["user_action"], "created_anyway");
    assert_eq!(json["data"][1]["user_action"], "viewed");
}

#[tokio::test]
async fn failed_log_write_does_not_block_the_decision() {
    let store = seeded_store();
    store.set_unavailable(true);
    let app = common::build_test_app(store);

    let response = post_json(
        app,
        "/api/v1/leads/duplicates/decisions",
        json!({"matched_record_id": 1, "user_action": "created_anyway"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["proceed_with_create"], true);
}

#[tokio::test]
async fn out_of_range_confidence_is_rejected() {
    let app = common::build_test_app(seeded_store());
    let response = post_json(
        app,
        "/api/v1/leads/duplicates/decisions",
        json!({"matched_record_id": 1, "confidence_score": 1.5}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn match_log_requires_tenant() {
    let app = common::build_test_app(seeded_store());
    let response = send(app, Method::GET, "/api/v1/duplicates/logs", None, None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "MISSING_TENANT");
}
