// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete Leadhub pipeline.
//!
//! Each test creates an isolated TestHarness with a temp SQLite database, a
//! mock provider and a real event bus, and drives it through the HTTP router
//! the way the provider and agent consoles do. Tests are independent and
//! order-insensitive.

use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use leadhub_core::{
    AgentDirectory, Channel, ConversationFilter, ConversationRepository, ConversationStatus,
    Direction, DistributionSettings, MessageStatus, MessageStore, MessageType, SettingsStore, Topic,
};
use leadhub_gateway::ws::Connection;
use leadhub_gateway::{AuthConfig, GatewayState, HealthState, WebhookSecrets, build_router};
use leadhub_ingest::SendRequest;
use leadhub_test_utils::TestHarness;
use leadhub_test_utils::fixtures::{
    AUTO_DISTRIBUTION, DISABLED_DISTRIBUTION, agent, status_webhook, text_webhook,
};
use serde_json::{Value, json};
use serial_test::serial;
use tokio::sync::mpsc;
use tower::ServiceExt;

const TOKEN: &str = "e2e-token";
const PHONE: &str = "5511999990000";

fn gateway_state(harness: &TestHarness) -> GatewayState {
    GatewayState {
        storage: harness.storage_adapter(),
        bus: harness.bus.clone(),
        orchestrator: harness.orchestrator.clone(),
        dispatcher: harness.dispatcher.clone(),
        engine: harness.engine.clone(),
        webhook: WebhookSecrets {
            verify_token: None,
            app_secret: None,
        },
        auth: AuthConfig {
            bearer_token: Some(TOKEN.into()),
        },
        health: HealthState {
            start_time: Instant::now(),
        },
    }
}

fn app(harness: &TestHarness) -> Router {
    build_router(gateway_state(harness))
}

async fn deliver(harness: &TestHarness, payload: &Value) -> Value {
    let response = app(harness)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/whatsapp")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn only_conversation(harness: &TestHarness) -> leadhub_core::Conversation {
    let mut conversations = harness
        .storage
        .list_conversations(ConversationFilter::default())
        .await
        .unwrap();
    assert_eq!(conversations.len(), 1);
    conversations.remove(0)
}

// ---- New lead inbound ----

#[tokio::test]
async fn first_contact_creates_lead_conversation_and_message() {
    let harness = TestHarness::builder().build().await.unwrap();

    let ack = deliver(&harness, &text_webhook(PHONE, "Maria", "wamid.e1", "Olá")).await;
    assert_eq!(ack["received"], true);
    assert_eq!(ack["published"], 1);

    let conversation = only_conversation(&harness).await;
    assert_eq!(conversation.status, ConversationStatus::Open);
    assert_eq!(conversation.channel, Channel::Whatsapp);
    assert_eq!(conversation.unread_count, 1);
    assert_eq!(conversation.phone, PHONE);

    let lead = harness
        .storage
        .get_lead(&conversation.lead_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lead.phone, PHONE);
    assert_eq!(lead.source, "whatsapp");

    let messages = harness
        .storage
        .list_messages(&conversation.id, None)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].direction, Direction::In);
    assert_eq!(messages[0].message_type, MessageType::Text);
    assert_eq!(messages[0].content, "Olá");
}

#[tokio::test]
async fn provider_redelivery_is_stored_once() {
    let harness = TestHarness::builder().build().await.unwrap();
    let payload = text_webhook(PHONE, "Maria", "wamid.dup", "Olá");

    deliver(&harness, &payload).await;
    let ack = deliver(&harness, &payload).await;
    assert_eq!(ack["published"], 0);

    let conversation = only_conversation(&harness).await;
    assert_eq!(conversation.unread_count, 1);
    let messages = harness
        .storage
        .list_messages(&conversation.id, None)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
}

// ---- Status updates ----

#[tokio::test]
async fn delivered_status_updates_outbound_message() {
    let harness = TestHarness::builder().build().await.unwrap();
    deliver(&harness, &text_webhook(PHONE, "Maria", "wamid.s1", "Olá")).await;
    let conversation = only_conversation(&harness).await;

    let sent = harness
        .dispatcher
        .send_text(SendRequest {
            conversation_id: conversation.id.clone(),
            text: "Oi Maria, tudo bem?".into(),
            user_id: "ana".into(),
        })
        .await
        .unwrap();
    assert_eq!(sent.status, MessageStatus::Sent);
    let provider_id = sent.provider_message_id.clone().unwrap();
    let unread_before = only_conversation(&harness).await.unread_count;

    let ack = deliver(&harness, &status_webhook(&provider_id, "delivered")).await;
    assert_eq!(ack["published"], 1);

    let stored = harness
        .storage
        .get_message_by_provider_id(&provider_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, MessageStatus::Delivered);
    assert_eq!(only_conversation(&harness).await.unread_count, unread_before);
}

// ---- Distribution ----

#[tokio::test]
async fn least_loaded_closer_receives_high_ticket_lead() {
    let harness = TestHarness::builder()
        .with_distribution(DISABLED_DISTRIBUTION)
        .with_agent(agent("A", "closer_ht"))
        .with_agent(agent("B", "closer_ht"))
        .build()
        .await
        .unwrap();

    for i in 0..5 {
        let phone = format!("551199999{i:04}");
        deliver(&harness, &text_webhook(&phone, "Lead", &format!("wamid.rr{i}"), "Olá")).await;
    }
    let conversations = harness
        .storage
        .list_conversations(ConversationFilter::default())
        .await
        .unwrap();
    assert_eq!(conversations.len(), 5);
    for (conversation, owner) in conversations.iter().zip(["A", "A", "A", "B"]) {
        harness
            .storage
            .assign_conversation(&conversation.id, owner)
            .await
            .unwrap();
    }
    let fresh = &conversations[4];

    harness
        .storage
        .put_setting(DistributionSettings::SETTINGS_KEY, AUTO_DISTRIBUTION)
        .await
        .unwrap();
    harness.engine.assign_lead(&fresh.lead_id).await.unwrap();

    let lead = harness
        .storage
        .get_lead(&fresh.lead_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lead.assigned_to.as_deref(), Some("B"));
    assert_eq!(lead.status, "qualificado");
}

#[tokio::test]
async fn disabled_distribution_leaves_conversation_queued() {
    let harness = TestHarness::builder()
        .with_distribution(DISABLED_DISTRIBUTION)
        .with_agent(agent("ana", "sales"))
        .build()
        .await
        .unwrap();

    deliver(&harness, &text_webhook(PHONE, "Maria", "wamid.d1", "Olá")).await;
    let conversation = only_conversation(&harness).await;
    assert!(conversation.assigned_to.is_none());

    let queue = harness.publisher.on(&Topic::QueueUpdate).await;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].payload["assignedTo"], Value::Null);

    let response = app(&harness)
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
    assert_eq!(body_json(response).await["skipped"], "disabled");
    assert!(only_conversation(&harness).await.assigned_to.is_none());
}

#[tokio::test]
async fn batch_run_drains_queue_once_distribution_is_enabled() {
    let harness = TestHarness::builder()
        .with_distribution(DISABLED_DISTRIBUTION)
        .with_agent(agent("ana", "sales"))
        .build()
        .await
        .unwrap();
    deliver(&harness, &text_webhook(PHONE, "Maria", "wamid.b1", "Olá")).await;

    harness
        .storage
        .put_setting(DistributionSettings::SETTINGS_KEY, AUTO_DISTRIBUTION)
        .await
        .unwrap();
    let response = app(&harness)
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
    let report = body_json(response).await;
    assert_eq!(report["conversations"]["assigned"], 1);

    let conversation = only_conversation(&harness).await;
    assert_eq!(conversation.assigned_to.as_deref(), Some("ana"));
}

// ---- Realtime ----

#[tokio::test]
async fn agent_session_sees_assigned_conversation_live() {
    let harness = TestHarness::builder()
        .with_distribution(AUTO_DISTRIBUTION)
        .with_agent(agent("ana", "sales"))
        .build()
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::channel(32);
    let mut session = Connection::new(gateway_state(&harness), tx);
    let joined = session
        .handle_text(r#"{"event":"agent:join","data":{"agentId":"ana"}}"#)
        .await
        .unwrap();
    assert_eq!(serde_json::from_str::<Value>(&joined).unwrap()["event"], "agent:joined");
    session
        .handle_text(&json!({"event": "subscribe", "data": {"topic": "conversation:assigned"}}).to_string())
        .await
        .unwrap();

    deliver(&harness, &text_webhook(PHONE, "Maria", "wamid.rt1", "Olá")).await;

    let mut events = Vec::new();
    while let Ok(Some(frame)) = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await {
        events.push(serde_json::from_str::<Value>(&frame).unwrap());
    }
    let assigned = events
        .iter()
        .find(|f| f["event"] == "conversation:assigned")
        .expect("conversation:assigned frame");
    assert_eq!(assigned["data"]["agentId"], "ana");
    assert!(events.iter().any(|f| f["event"] == "agent:ana"));

    session.close().await;
    assert!(!harness.storage.get_agent("ana").await.unwrap().unwrap().online);
}

// ---- Configuration ----

#[test]
#[serial]
fn env_overrides_config_file() {
    let path = std::env::temp_dir().join(format!("leadhub-e2e-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "[assignment]\nsales_role = \"vendas\"\n\n[gateway]\nport = 9100\n",
    )
    .unwrap();

    unsafe { std::env::set_var("LEADHUB_GATEWAY_PORT", "9200") };
    let loaded = leadhub_config::load_and_validate_path(&path);
    unsafe { std::env::remove_var("LEADHUB_GATEWAY_PORT") };
    std::fs::remove_file(&path).unwrap();

    let config = loaded.expect("config should load");
    assert_eq!(config.assignment.sales_role, "vendas");
    assert_eq!(config.gateway.port, 9200);
}

#[test]
#[serial]
fn unknown_config_keys_are_rejected() {
    let errors = leadhub_config::load_and_validate_str("[gateway]\nprot = 8080\n").unwrap_err();
    assert!(!errors.is_empty());
}
