//! Send primitive used by the dispatch loop.

use crate::whatsapp::{normalize_phone, WhatsAppCloudSender};
use academy_core::config::{MessagingConfig, ProviderKind};
use academy_core::error::{AcademyError, AcademyResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Delivers one rendered message to one contact address.
///
/// `Ok` carries the provider's message id. Any `Err` is counted as a failed
/// send by the dispatch loop; it never aborts the run.
#[async_trait]
pub trait MessageSender: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, to: &str, body: &str) -> AcademyResult<String>;
}

/// Provider stand-in that only logs. Used when no WhatsApp credentials are
/// configured.
#[derive(Debug, Default)]
pub struct SimulatedSender;

impl SimulatedSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageSender for SimulatedSender {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn send(&self, to: &str, body: &str) -> AcademyResult<String> {
        let phone = normalize_phone(to)
            .ok_or_else(|| AcademyError::Validation(format!("invalid phone number '{to}'")))?;
        info!(
            to = %phone,
            body_len = body.len(),
            "Simulated WhatsApp message"
        );
        Ok(format!("sim-{}", Uuid::new_v4()))
    }
}

/// Build the configured send primitive.
pub fn build_sender(config: &MessagingConfig) -> AcademyResult<Arc<dyn MessageSender>> {
    match config.provider {
        ProviderKind::Simulated => {
            info!("Messaging provider: simulated");
            Ok(Arc::new(SimulatedSender::new()))
        }
        ProviderKind::WhatsappCloud => {
            if !config.whatsapp.is_configured() {
                return Err(AcademyError::Config(
                    "whatsapp_cloud provider requires access_token and phone_number_id".to_string(),
                ));
            }
            info!(
                phone_number_id = %config.whatsapp.phone_number_id,
                api_version = %config.whatsapp.api_version,
                "Messaging provider: WhatsApp Cloud API"
            );
            Ok(Arc::new(WhatsAppCloudSender::new(config.whatsapp.clone())?))
        }
    }
}
