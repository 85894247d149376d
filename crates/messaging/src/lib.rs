//! Mass messaging for the school back office: recipient selection,
//! placeholder rendering and the sequential WhatsApp dispatch loop.

pub mod dispatch;
pub mod recipients;
pub mod sender;
pub mod templating;
pub mod whatsapp;

pub use dispatch::{DeliveryRecord, DispatchConfig, DispatchOutcome, Dispatcher};
pub use recipients::{RecipientSelection, RecipientSource};
pub use sender::{build_sender, MessageSender, SimulatedSender};
pub use templating::{TemplateRenderer, TemplateSource, TemplateValues, Token};
pub use whatsapp::WhatsAppCloudSender;
