// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp Cloud API messages endpoint.

use std::time::Duration;

use async_trait::async_trait;
use leadhub_config::model::WhatsAppConfig;
use leadhub_core::{
    AdapterType, HealthStatus, LeadhubError, MessagingProvider, PluginAdapter, ProviderError,
    SentMessage, normalize_phone,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Outbound sender bound to one phone number id.
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    messages_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentId>,
}

#[derive(Debug, Deserialize)]
struct SentId {
    id: String,
}

impl WhatsAppClient {
    /// Builds a client from the `[whatsapp]` section.
    ///
    /// Fails with a config error when the phone number id or access token is missing.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, LeadhubError> {
        let phone_number_id = config.phone_number_id.as_deref().ok_or_else(|| {
            LeadhubError::Config("whatsapp.phone_number_id is required for outbound sends".into())
        })?;
        let token = config.access_token.as_deref().ok_or_else(|| {
            LeadhubError::Config("whatsapp.access_token is required for outbound sends".into())
        })?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| LeadhubError::Config(format!("invalid access token header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LeadhubError::Internal(format!("failed to build HTTP client: {e}")))?;

        let messages_url = format!(
            "{}/{}/{}/messages",
            config.api_base_url.trim_end_matches('/'),
            config.api_version.trim_matches('/'),
            phone_number_id
        );
        Ok(Self {
            client,
            messages_url,
            timeout,
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    async fn post(&self, body: Value) -> Result<SentMessage, ProviderError> {
        let response = self
            .client
            .post(&self.messages_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    ProviderError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        debug!(status = %status, "send response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "provider rejected send");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SendResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    duration: self.timeout,
                }
            } else {
                ProviderError::InvalidResponse {
                    message: e.to_string(),
                }
            }
        })?;
        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| SentMessage {
                provider_message_id: m.id,
            })
            .ok_or_else(|| ProviderError::InvalidResponse {
                message: "response has no message id".into(),
            })
    }
}

/// Request body for a text message.
pub fn text_body(to: &str, text: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": normalize_phone(to),
        "type": "text",
        "text": {"preview_url": false, "body": text},
    })
}

/// Request body for a template message.
pub fn template_body(to: &str, name: &str, language: &str, components: Value) -> Value {
    let mut template = json!({
        "name": name,
        "language": {"code": language},
    });
    if !components.is_null() {
        template["components"] = components;
    }
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": normalize_phone(to),
        "type": "template",
        "template": template,
    })
}

#[async_trait]
impl PluginAdapter for WhatsAppClient {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadhubError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadhubError> {
        Ok(())
    }
}

#[async_trait]
impl MessagingProvider for WhatsAppClient {
    async fn send_text(&self, to: &str, text: &str) -> Result<SentMessage, ProviderError> {
        self.post(text_body(to, text)).await
    }

    async fn send_template(
        &self,
        to: &str,
        name: &str,
        language: &str,
        components: Value,
    ) -> Result<SentMessage, ProviderError> {
        self.post(template_body(to, name, language, components)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str) -> WhatsAppConfig {
        WhatsAppConfig {
            api_base_url: base.to_string(),
            phone_number_id: Some("10001".into()),
            access_token: Some("test-token".into()),
            request_timeout_secs: 1,
            ..WhatsAppConfig::default()
        }
    }

    #[test]
    fn missing_credentials_is_config_error() {
        let err = WhatsAppClient::new(&WhatsAppConfig::default()).unwrap_err();
        assert!(matches!(err, LeadhubError::Config(_)));
    }

    #[test]
    fn url_joins_base_version_and_phone_id() {
        let client = WhatsAppClient::new(&config("https://graph.example.com/")).unwrap();
        assert_eq!(
            client.messages_url(),
            "https://graph.example.com/v18.0/10001/messages"
        );
    }

    #[test]
    fn text_body_normalizes_recipient() {
        let body = text_body("+55 (11) 99999-0000", "Olá");
        assert_eq!(body["to"], "5511999990000");
        assert_eq!(body["type"], "text");
        assert_eq!(body["text"]["body"], "Olá");
        assert_eq!(text_body("5511999990000", "x")["to"], body["to"]);
    }

    #[tokio::test]
    async fn send_text_returns_provider_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/10001/messages"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "messaging_product": "whatsapp",
                "to": "5511999990000",
                "type": "text"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messaging_product": "whatsapp",
                "contacts": [{"input": "5511999990000", "wa_id": "5511999990000"}],
                "messages": [{"id": "wamid.out1"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&config(&server.uri())).unwrap();
        let sent = client.send_text("+55 11 99999-0000", "Olá").await.unwrap();
        assert_eq!(sent.provider_message_id, "wamid.out1");
    }

    #[tokio::test]
    async fn send_template_includes_components() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "type": "template",
                "template": {"name": "boas_vindas", "language": {"code": "pt_BR"}}
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"messages": [{"id": "wamid.t"}]})),
            )
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&config(&server.uri())).unwrap();
        let sent = client
            .send_template("5511999990000", "boas_vindas", "pt_BR", json!([{"type": "body"}]))
            .await
            .unwrap();
        assert_eq!(sent.provider_message_id, "wamid.t");
    }

    #[tokio::test]
    async fn rejection_keeps_raw_body_and_classifies() {
        let server = MockServer::start().await;
        let raw = r#"{"error":{"message":"Invalid OAuth access token","code":190}}"#;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string(raw))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&config(&server.uri())).unwrap();
        let err = client.send_text("1", "x").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Rejected {
                status: 401,
                body: raw.to_string()
            }
        );
        assert!(!err.is_retryable());

        let err = client.send_text("1", "x").await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"messages": [{"id": "late"}]}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&config(&server.uri())).unwrap();
        let err = client.send_text("1", "x").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Timeout {
                duration: Duration::from_secs(1)
            }
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn success_without_id_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": []})))
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&config(&server.uri())).unwrap();
        let err = client.send_text("1", "x").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn unreachable_provider_is_transport_error() {
        let client = WhatsAppClient::new(&config("http://127.0.0.1:9")).unwrap();
        let err = client.send_text("1", "x").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
