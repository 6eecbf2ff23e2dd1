//! SeaTalk system-account webhook: the outbound channel for dashboard alerts

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::{BotError, Result};
use crate::integrations::NotificationSink;

pub struct SystemAccountClient {
    http: reqwest::Client,
    webhook_url: String,
}

impl SystemAccountClient {
    pub fn new(http: reqwest::Client, webhook_url: impl Into<String>) -> Self {
        Self {
            http,
            webhook_url: webhook_url.into().trim().to_string(),
        }
    }

    async fn post(&self, payload: &Value) -> Result<Value> {
        if self.webhook_url.is_empty() {
            return Err(BotError::MissingConfig(
                "STUCKUP_DASHBOARD_ALERT_SYSTEM_WEBHOOK_URL",
            ));
        }

        let resp = self.http.post(&self.webhook_url).json(payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::api("seatalk_webhook", status.as_u16(), body));
        }

        // Some webhook variants answer with an empty or non-JSON body
        let body = resp.text().await?;
        let data: Value = serde_json::from_str(&body).unwrap_or_else(|_| json!({"ok": true}));
        match data.get("code").and_then(Value::as_i64) {
            Some(code) if code != 0 => {
                error!("System account webhook send failed: {}", data);
                Err(BotError::api(
                    "seatalk_webhook",
                    status.as_u16(),
                    format!("failed to send system account message, code={}", code),
                ))
            },
            _ => Ok(data),
        }
    }
}

#[async_trait]
impl NotificationSink for SystemAccountClient {
    fn enabled(&self) -> bool {
        !self.webhook_url.is_empty()
    }

    async fn send_text(&self, content: &str, at_all: bool) -> Result<()> {
        let mut text = json!({"content": content});
        if at_all {
            text["at_all"] = json!(true);
        }
        self.post(&json!({"tag": "text", "text": text})).await.map(|_| ())
    }

    async fn send_image(&self, image_base64: &str) -> Result<()> {
        let primary = json!({"tag": "image", "image_base64": {"content": image_base64}});
        match self.post(&primary).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Image send rejected ({}), retrying with the `image` payload", e);
                let fallback = json!({"tag": "image", "image": {"content": image_base64}});
                self.post(&fallback).await.map(|_| ())
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SystemAccountClient {
        SystemAccountClient::new(reqwest::Client::new(), format!("{}/hook", server.uri()))
    }

    #[tokio::test]
    async fn test_send_text_with_at_all() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(json!({
                "tag": "text",
                "text": {"content": "report", "at_all": true},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).send_text("report", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_image_falls_back_to_image_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"image_base64": {"content": "AAA"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 7})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"image": {"content": "AAA"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).send_image("AAA").await.unwrap();
    }

    #[tokio::test]
    async fn test_unconfigured_webhook() {
        let client = SystemAccountClient::new(reqwest::Client::new(), "  ");
        assert!(!client.enabled());
        let err = client.send_text("x", false).await.unwrap_err();
        assert!(matches!(err, BotError::MissingConfig(_)));
    }
}
