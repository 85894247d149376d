//! Mass-message dispatch loop.
//!
//! `idle → sending → completed`, with `cancelled` reachable from `sending`
//! through a cooperative token checked before each recipient. Recipients are
//! processed strictly in order, one send awaited at a time, with a fixed
//! pacing delay between sends. A failed send is counted and the loop moves
//! on; there is no retry.

use crate::sender::MessageSender;
use crate::templating::{TemplateRenderer, TemplateValues};
use academy_core::config::MessagingConfig;
use academy_core::types::{progress_percent, DispatchProgress, DispatchState, Recipient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Wait between two consecutive sends. Zero disables pacing.
    pub pacing: Duration,
}

impl From<&MessagingConfig> for DispatchConfig {
    fn from(config: &MessagingConfig) -> Self {
        Self {
            pacing: config.pacing(),
        }
    }
}

/// Per-recipient result of one dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryRecord {
    pub recipient_id: Uuid,
    pub name: String,
    pub phone: String,
    pub sent: bool,
    /// Provider message id when sent.
    pub message_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DispatchOutcome {
    pub progress: DispatchProgress,
    pub deliveries: Vec<DeliveryRecord>,
}

pub struct Dispatcher {
    sender: Arc<dyn MessageSender>,
    renderer: TemplateRenderer,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn MessageSender>, config: DispatchConfig) -> Self {
        Self {
            sender,
            renderer: TemplateRenderer::new(),
            config,
        }
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Run a dispatch to completion without outside observation.
    pub async fn dispatch(
        &self,
        recipients: &[Recipient],
        body: &str,
        globals: &TemplateValues,
    ) -> DispatchOutcome {
        let (progress, _rx) = watch::channel(DispatchProgress::idle());
        self.run(recipients, body, globals, &progress, &CancellationToken::new())
            .await
    }

    /// Run a dispatch, publishing a snapshot on `progress` after every
    /// state change and every processed recipient.
    pub async fn run(
        &self,
        recipients: &[Recipient],
        body: &str,
        globals: &TemplateValues,
        progress: &watch::Sender<DispatchProgress>,
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let total = recipients.len();
        let mut snapshot = DispatchProgress {
            total,
            ..DispatchProgress::idle()
        };
        let mut deliveries = Vec::with_capacity(total);

        if total == 0 {
            snapshot.state = DispatchState::Completed;
            snapshot.progress = progress_percent(0, 0);
            progress.send_replace(snapshot);
            info!("Dispatch completed with no recipients");
            return DispatchOutcome {
                progress: snapshot,
                deliveries,
            };
        }

        snapshot.state = DispatchState::Sending;
        progress.send_replace(snapshot);
        metrics::counter!("messaging.dispatches.started").increment(1);
        info!(
            total = total,
            provider = self.sender.name(),
            pacing_ms = self.config.pacing.as_millis() as u64,
            "Dispatch started"
        );

        for (index, recipient) in recipients.iter().enumerate() {
            if cancel.is_cancelled() {
                snapshot.state = DispatchState::Cancelled;
                progress.send_replace(snapshot);
                metrics::counter!("messaging.dispatches.cancelled").increment(1);
                info!(
                    processed = snapshot.processed(),
                    total = total,
                    "Dispatch cancelled"
                );
                return DispatchOutcome {
                    progress: snapshot,
                    deliveries,
                };
            }

            let text = self.renderer.render_for(body, recipient, globals);
            let start = Instant::now();
            let result = self.sender.send(&recipient.phone, &text).await;
            metrics::histogram!("messaging.send_latency_ms")
                .record(start.elapsed().as_millis() as f64);

            let (message_id, error) = match result {
                Ok(message_id) => {
                    snapshot.succeeded += 1;
                    metrics::counter!("messaging.sent").increment(1);
                    debug!(recipient_id = %recipient.id, message_id = %message_id, "Message sent");
                    (Some(message_id), None)
                }
                Err(e) => {
                    snapshot.failed += 1;
                    metrics::counter!("messaging.failed").increment(1);
                    warn!(recipient_id = %recipient.id, error = %e, "Message send failed");
                    (None, Some(e.to_string()))
                }
            };

            deliveries.push(DeliveryRecord {
                recipient_id: recipient.id,
                name: recipient.name.clone(),
                phone: recipient.phone.clone(),
                sent: message_id.is_some(),
                message_id,
                error,
            });

            debug_assert!(snapshot.processed() <= snapshot.total);
            snapshot.progress = progress_percent(snapshot.processed(), total);
            if snapshot.processed() == total {
                snapshot.state = DispatchState::Completed;
            }
            progress.send_replace(snapshot);

            if index + 1 < total && !self.config.pacing.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.pacing) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        metrics::counter!("messaging.dispatches.completed").increment(1);
        info!(
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            total = total,
            "Dispatch completed"
        );

        DispatchOutcome {
            progress: snapshot,
            deliveries,
        }
    }
}
