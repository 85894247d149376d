use serde::Deserialize;
use std::time::Duration;

/// Root application configuration. Loaded from environment variables
/// with the prefix `ACADEMY__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_school_name")]
    pub school_name: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// ─── Messaging Config ───────────────────────────────────────────────────────

/// Which send primitive backs the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Log the message and report success without any network call.
    Simulated,
    /// WhatsApp Business Cloud API over HTTPS.
    WhatsappCloud,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    /// Fixed delay between two consecutive sends of one dispatch.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// Finished dispatch jobs kept for polling before the oldest are evicted.
    #[serde(default = "default_max_finished_jobs")]
    pub max_finished_jobs: usize,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_whatsapp_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_whatsapp_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default = "default_whatsapp_timeout_ms")]
    pub request_timeout_ms: u64,
}

// Default functions
fn default_school_name() -> String {
    "Music School".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_provider() -> ProviderKind {
    ProviderKind::Simulated
}
fn default_pacing_ms() -> u64 {
    1000
}
fn default_max_finished_jobs() -> usize {
    100
}
fn default_whatsapp_base_url() -> String {
    "https://graph.facebook.com".to_string()
}
fn default_whatsapp_api_version() -> String {
    "v21.0".to_string()
}
fn default_whatsapp_timeout_ms() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            pacing_ms: default_pacing_ms(),
            max_finished_jobs: default_max_finished_jobs(),
            whatsapp: WhatsAppConfig::default(),
        }
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_whatsapp_base_url(),
            api_version: default_whatsapp_api_version(),
            access_token: String::new(),
            phone_number_id: String::new(),
            request_timeout_ms: default_whatsapp_timeout_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            school_name: default_school_name(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            messaging: MessagingConfig::default(),
        }
    }
}

impl MessagingConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl WhatsAppConfig {
    /// Both credentials are required before the Cloud API can be used.
    pub fn is_configured(&self) -> bool {
        !self.access_token.is_empty() && !self.phone_number_id.is_empty()
    }

    pub fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.api_base_url.trim_end_matches('/'),
            self.api_version,
            self.phone_number_id
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment
    /// variables (which take precedence).
    pub fn load(file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(
                config::File::with_name(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("ACADEMY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.http_port, 8080);
        assert_eq!(config.messaging.provider, ProviderKind::Simulated);
        assert_eq!(config.messaging.pacing(), Duration::from_millis(1000));
        assert_eq!(config.messaging.max_finished_jobs, 100);
        assert!(!config.messaging.whatsapp.is_configured());
    }

    #[test]
    fn test_messages_url() {
        let wa = WhatsAppConfig {
            api_base_url: "https://graph.facebook.com/".to_string(),
            phone_number_id: "10555".to_string(),
            ..Default::default()
        };
        assert_eq!(
            wa.messages_url(),
            "https://graph.facebook.com/v21.0/10555/messages"
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "school_name = \"Allegro\"\n[messaging]\nprovider = \"whatsapp_cloud\"\npacing_ms = 250\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(parsed.school_name, "Allegro");
        assert_eq!(parsed.messaging.provider, ProviderKind::WhatsappCloud);
        assert_eq!(parsed.messaging.pacing_ms, 250);
        assert_eq!(parsed.messaging.whatsapp.api_version, "v21.0");
        assert_eq!(parsed.api.host, "0.0.0.0");
    }
}
