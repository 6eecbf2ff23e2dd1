//! SeaTalk open platform app client

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error};

use super::MessageSender;
use crate::config::Settings;
use crate::error::{BotError, Result};

const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
const TOKEN_MIN_LIFETIME_SECS: i64 = 30;

#[derive(Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    app_access_token: String,
    /// Unix seconds
    #[serde(default)]
    expire: i64,
}

struct CachedToken {
    token: String,
    refresh_at: i64,
}

pub struct SeaTalkClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl SeaTalkClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            token: Mutex::new(None),
        }
    }

    pub fn from_settings(http: reqwest::Client, settings: &Settings) -> Self {
        Self::new(
            http,
            settings.seatalk_api_base_url.clone(),
            settings.seatalk_app_id.clone(),
            settings.seatalk_app_secret.clone(),
        )
    }

    /// App access token, refreshed a minute before it expires
    pub async fn get_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref() {
            if now < token.refresh_at {
                return Ok(token.token.clone());
            }
        }

        let resp = self
            .http
            .post(format!("{}/auth/app_access_token", self.base_url))
            .json(&TokenRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::api("seatalk", status.as_u16(), body));
        }

        let data: TokenResponse = resp.json().await?;
        if data.code != 0 {
            return Err(BotError::Auth(format!(
                "failed to obtain app access token, code={}",
                data.code
            )));
        }

        let refresh_at = (data.expire - TOKEN_REFRESH_MARGIN_SECS).max(now + TOKEN_MIN_LIFETIME_SECS);
        debug!("SeaTalk app token refreshed, next refresh at {}", refresh_at);
        let token = data.app_access_token;
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_at,
        });
        Ok(token)
    }

    /// Send a text message to one employee, inside `thread_id` when given
    pub async fn send_text(
        &self,
        employee_code: &str,
        content: &str,
        thread_id: Option<&str>,
    ) -> Result<Value> {
        let token = self.get_token().await?;

        let mut payload = json!({
            "employee_code": employee_code,
            "message": {
                "tag": "text",
                "text": {"format": 1, "content": content},
            },
            "usable_platform": "all",
        });
        if let Some(thread_id) = thread_id.filter(|t| !t.is_empty()) {
            payload["thread_id"] = json!(thread_id);
        }

        let resp = self
            .http
            .post(format!("{}/messaging/v2/single_chat", self.base_url))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::api("seatalk", status.as_u16(), body));
        }

        let data: Value = resp.json().await?;
        let code = data.get("code").and_then(Value::as_i64).unwrap_or(-1);
        if code != 0 {
            error!("SeaTalk single_chat failed: {}", data);
            return Err(BotError::api(
                "seatalk",
                status.as_u16(),
                format!("failed to send message, code={}", code),
            ));
        }
        Ok(data)
    }
}

#[async_trait]
impl MessageSender for SeaTalkClient {
    async fn send_text_message(
        &self,
        employee_code: &str,
        content: &str,
        thread_id: Option<&str>,
    ) -> Result<()> {
        self.send_text(employee_code, content, thread_id).await.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SeaTalkClient {
        SeaTalkClient::new(reqwest::Client::new(), server.uri(), "app", "secret")
    }

    fn far_future() -> i64 {
        Utc::now().timestamp() + 7200
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/app_access_token"))
            .and(body_partial_json(json!({"app_id": "app", "app_secret": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "app_access_token": "tok-1",
                "expire": far_future(),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(client.get_token().await.unwrap(), "tok-1");
        assert_eq!(client.get_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_token_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/app_access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 100})))
            .mount(&server)
            .await;

        let err = client(&server).get_token().await.unwrap_err();
        assert!(matches!(err, BotError::Auth(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_send_text_in_thread() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/app_access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "app_access_token": "tok-2",
                "expire": far_future(),
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messaging/v2/single_chat"))
            .and(header("authorization", "Bearer tok-2"))
            .and(body_partial_json(json!({
                "employee_code": "e_1",
                "thread_id": "t-1",
                "message": {"tag": "text", "text": {"content": "hello"}},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .send_text_message("e_1", "hello", Some("t-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_text_rejects_non_zero_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/app_access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "app_access_token": "tok-3",
                "expire": far_future(),
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messaging/v2/single_chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 4001})))
            .mount(&server)
            .await;

        let err = client(&server).send_text("e_1", "x", None).await.unwrap_err();
        assert!(err.to_string().contains("code=4001"));
    }
}
