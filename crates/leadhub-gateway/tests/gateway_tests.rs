// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router and WebSocket session tests against the test harness.

use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use leadhub_core::{AgentDirectory, ConversationFilter, ConversationRepository, Topic};
use leadhub_core::EventPublisher;
use leadhub_gateway::ws::Connection;
use leadhub_gateway::{AuthConfig, GatewayState, HealthState, WebhookSecrets, build_router};
use leadhub_test_utils::TestHarness;
use leadhub_test_utils::fixtures::{agent, text_webhook};
use leadhub_whatsapp::SIGNATURE_HEADER;
use leadhub_whatsapp::webhook::sign;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

const TOKEN: &str = "test-token";
const PHONE: &str = "5511999990000";

fn state(harness: &TestHarness, app_secret: Option<&str>) -> GatewayState {
    GatewayState {
        storage: harness.storage_adapter(),
        bus: harness.bus.clone(),
        orchestrator: harness.orchestrator.clone(),
        dispatcher: harness.dispatcher.clone(),
        engine: harness.engine.clone(),
        webhook: WebhookSecrets {
            verify_token: Some("verify-me".into()),
            app_secret: app_secret.map(str::to_string),
        },
        auth: AuthConfig {
            bearer_token: Some(TOKEN.into()),
        },
        health: HealthState {
            start_time: Instant::now(),
        },
    }
}

fn router(harness: &TestHarness) -> Router {
    build_router(state(harness, None))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_webhook(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook/whatsapp")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn authed_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let harness = TestHarness::builder().build().await.unwrap();
    let response = router(&harness)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn subscription_handshake_echoes_challenge() {
    let harness = TestHarness::builder().build().await.unwrap();
    let ok = router(&harness)
        .oneshot(
            Request::builder()
                .uri("/webhook/whatsapp?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(ok.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"1158201444");

    let denied = router(&harness)
        .oneshot(
            Request::builder()
                .uri("/webhook/whatsapp?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn webhook_ingests_and_always_answers_ok() {
    let harness = TestHarness::builder().build().await.unwrap();
    let body = text_webhook(PHONE, "Maria", "wamid.gw1", "Olá").to_string();

    let response = router(&harness).oneshot(post_webhook(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["received"], true);
    assert_eq!(ack["events"], 1);
    assert_eq!(ack["published"], 1);

    let conversations = harness
        .storage
        .list_conversations(ConversationFilter::default())
        .await
        .unwrap();
    assert_eq!(conversations.len(), 1);

    let garbage = router(&harness)
        .oneshot(post_webhook("not json at all"))
        .await
        .unwrap();
    assert_eq!(garbage.status(), StatusCode::OK);
    assert_eq!(body_json(garbage).await["received"], false);

    let unknown = router(&harness)
        .oneshot(post_webhook(json!({"object": "page"}).to_string()))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::OK);
}

#[tokio::test]
async fn webhook_signature_is_enforced_when_secret_is_set() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = build_router(state(&harness, Some("app-secret")));
    let body = text_webhook(PHONE, "Maria", "wamid.sig", "oi").to_string();

    let unsigned = app.clone().oneshot(post_webhook(body.clone())).await.unwrap();
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

    let mut forged = post_webhook(body.clone());
    forged
        .headers_mut()
        .insert(SIGNATURE_HEADER, sign("other-secret", body.as_bytes()).parse().unwrap());
    assert_eq!(
        app.clone().oneshot(forged).await.unwrap().status(),
        StatusCode::UNAUTHORIZED
    );

    let mut signed = post_webhook(body.clone());
    signed
        .headers_mut()
        .insert(SIGNATURE_HEADER, sign("app-secret", body.as_bytes()).parse().unwrap());
    assert_eq!(app.oneshot(signed).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn rest_routes_require_bearer_token() {
    let harness = TestHarness::builder().build().await.unwrap();
    let response = router(&harness)
        .oneshot(
            Request::builder()
                .uri("/v1/conversations")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router(&harness)
        .oneshot(authed_get("/v1/conversations"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["conversations"], json!([]));
}

#[tokio::test]
async fn conversation_snapshot_routes() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .ingest(&text_webhook(PHONE, "Maria", "wamid.r1", "Olá"))
        .await;
    let conversation = harness
        .storage
        .list_conversations(ConversationFilter::default())
        .await
        .unwrap()
        .remove(0);

    let queued = router(&harness)
        .oneshot(authed_get("/v1/conversations?unassigned=true"))
        .await
        .unwrap();
    assert_eq!(body_json(queued).await["conversations"][0]["id"], json!(conversation.id));

    let messages = router(&harness)
        .oneshot(authed_get(&format!(
            "/v1/conversations/{}/messages",
            conversation.id
        )))
        .await
        .unwrap();
    assert_eq!(messages.status(), StatusCode::OK);
    let body = body_json(messages).await;
    assert_eq!(body["messages"][0]["content"], "Olá");

    let missing = router(&harness)
        .oneshot(authed_get("/v1/conversations/nope/messages"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_assignment_reports_disabled_distribution() {
    let harness = TestHarness::builder().build().await.unwrap();
    let response = router(&harness)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/assignments/run")
                .header("authorization", format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["skipped"], "disabled");
}

async fn next_frame(rx: &mut mpsc::Receiver<String>) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    serde_json::from_str(&frame).unwrap()
}

#[tokio::test]
async fn websocket_session_joins_subscribes_and_sends() {
    let harness = TestHarness::builder()
        .with_agent(agent("ana", "sales"))
        .build()
        .await
        .unwrap();
    harness
        .ingest(&text_webhook(PHONE, "Maria", "wamid.w1", "oi"))
        .await;
    let conversation = harness
        .storage
        .list_conversations(ConversationFilter::default())
        .await
        .unwrap()
        .remove(0);

    let (tx, mut rx) = mpsc::channel(16);
    let mut connection = Connection::new(state(&harness, None), tx);

    let reply = connection
        .handle_text(r#"{"event":"agent:join","data":{"agentId":"ghost"}}"#)
        .await
        .unwrap();
    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["event"], "error");

    let reply = connection
        .handle_text(r#"{"event":"agent:join","data":{"agentId":"ana"}}"#)
        .await
        .unwrap();
    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["event"], "agent:joined");
    assert_eq!(connection.agent_id(), Some("ana"));
    assert!(connection.is_subscribed(&Topic::Agent("ana".into())));
    assert!(harness.storage.get_agent("ana").await.unwrap().unwrap().online);

    let topic = Topic::ConversationMessage(conversation.id.clone());
    let reply = connection
        .handle_text(&json!({"event": "subscribe", "data": {"topic": topic.to_string()}}).to_string())
        .await
        .unwrap();
    assert_eq!(serde_json::from_str::<Value>(&reply).unwrap()["event"], "subscribed");

    let send = json!({
        "event": "message:send",
        "data": {"conversationId": conversation.id, "text": "Olá!", "userId": "ana"}
    });
    let reply = connection.handle_text(&send.to_string()).await.unwrap();
    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["event"], "message:sent");
    assert_eq!(reply["data"]["message"]["status"], "sent");

    let pushed = next_frame(&mut rx).await;
    assert_eq!(pushed["event"], json!(topic.to_string()));
    assert_eq!(pushed["data"]["message"]["content"], "Olá!");
    assert!(pushed["seq"].is_i64());

    harness
        .bus
        .publish(&Topic::Agent("ana".into()), json!({"type": "ping"}), None)
        .await
        .unwrap();
    let pushed = next_frame(&mut rx).await;
    assert_eq!(pushed["event"], "agent:ana");

    let bad = connection.handle_text("{not json").await.unwrap();
    assert_eq!(serde_json::from_str::<Value>(&bad).unwrap()["event"], "error");

    connection.close().await;
    assert!(!harness.storage.get_agent("ana").await.unwrap().unwrap().online);
}
