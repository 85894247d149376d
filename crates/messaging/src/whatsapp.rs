//! WhatsApp Business Cloud API sender.

use crate::sender::MessageSender;
use academy_core::config::WhatsAppConfig;
use academy_core::error::{AcademyError, AcademyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct OutboundTextMessage<'a> {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: &'a str,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub text: TextBody<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextBody<'a> {
    pub preview_url: bool,
    pub body: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

/// Strip formatting from a phone number; the Cloud API expects digits only
/// (country code included). Returns `None` when nothing is left.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

pub struct WhatsAppCloudSender {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppCloudSender {
    pub fn new(config: WhatsAppConfig) -> AcademyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AcademyError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl MessageSender for WhatsAppCloudSender {
    fn name(&self) -> &str {
        "whatsapp_cloud"
    }

    async fn send(&self, to: &str, body: &str) -> AcademyResult<String> {
        let phone = normalize_phone(to)
            .ok_or_else(|| AcademyError::Validation(format!("invalid phone number '{to}'")))?;

        let payload = OutboundTextMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: &phone,
            message_type: "text",
            text: TextBody {
                preview_url: false,
                body,
            },
        };

        let response = self
            .client
            .post(self.config.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AcademyError::Provider(format!("WhatsApp API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(to = %phone, status = %status, "WhatsApp API rejected message");
            return Err(AcademyError::Provider(format!(
                "WhatsApp API error {status}: {error_text}"
            )));
        }

        let parsed: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| AcademyError::Provider(format!("Invalid WhatsApp response: {e}")))?;

        let message_id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| AcademyError::Provider("WhatsApp response carried no message id".to_string()))?;

        debug!(to = %phone, message_id = %message_id, "WhatsApp message accepted");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> WhatsAppConfig {
        WhatsAppConfig {
            api_base_url: server.uri(),
            api_version: "v21.0".to_string(),
            access_token: "test-token-123".to_string(),
            phone_number_id: "10555".to_string(),
            request_timeout_ms: 2_000,
        }
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+55 (11) 91234-5678").as_deref(), Some("5511912345678"));
        assert_eq!(normalize_phone("n/a"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[tokio::test]
    async fn test_send_posts_text_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v21.0/10555/messages"))
            .and(header("Authorization", "Bearer test-token-123"))
            .and(body_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "5511912345678",
                "type": "text",
                "text": {"preview_url": false, "body": "Hello Maria"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "contacts": [{"input": "5511912345678", "wa_id": "5511912345678"}],
                "messages": [{"id": "wamid.ABC"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sender = WhatsAppCloudSender::new(config_for(&server)).unwrap();
        let id = sender.send("+55 (11) 91234-5678", "Hello Maria").await.unwrap();
        assert_eq!(id, "wamid.ABC");
    }

    #[tokio::test]
    async fn test_non_success_status_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"error\":{\"code\":131030}}"))
            .mount(&server)
            .await;

        let sender = WhatsAppCloudSender::new(config_for(&server)).unwrap();
        let err = sender.send("5511912345678", "Hi").await.unwrap_err();
        match err {
            AcademyError::Provider(msg) => assert!(msg.contains("400")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_phone_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let sender = WhatsAppCloudSender::new(config_for(&server)).unwrap();
        assert!(matches!(
            sender.send("---", "Hi").await,
            Err(AcademyError::Validation(_))
        ));
    }
}
