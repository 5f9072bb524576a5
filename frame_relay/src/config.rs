use crate::dispatch::DEFAULT_INFERENCE_TIMEOUT;
use crate::freshness::DEFAULT_MAX_FRAME_AGE;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub inference: InferenceConfig,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    pub mqtt: MqttConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestFormat {
    /// JPEG bytes as the raw request body.
    #[default]
    Binary,
    /// JPEG bytes as a single multipart file field.
    Multipart,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    pub url: String,
    #[serde(default = "default_inference_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub request_format: RequestFormat,
    #[serde(default = "default_field_name")]
    pub field_name: String,
}

fn default_inference_timeout_secs() -> u64 {
    DEFAULT_INFERENCE_TIMEOUT.as_secs()
}

fn default_field_name() -> String {
    "file".into()
}

impl InferenceConfig {
    pub fn get_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FreshnessConfig {
    #[serde(default = "default_max_frame_age_secs")]
    pub max_frame_age_secs: u64,
}

fn default_max_frame_age_secs() -> u64 {
    DEFAULT_MAX_FRAME_AGE.as_secs()
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            max_frame_age_secs: default_max_frame_age_secs(),
        }
    }
}

impl FreshnessConfig {
    pub fn get_max_frame_age(&self) -> Duration {
        Duration::from_secs(self.max_frame_age_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_enabled")]
    pub enabled: bool,
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_trigger_topic")]
    pub trigger_topic: String,
    #[serde(default = "default_ack_topic")]
    pub ack_topic: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_mqtt_enabled() -> bool {
    true
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "frame-relay".into()
}

fn default_trigger_topic() -> String {
    "/esp32/ai/trigger".into()
}

fn default_ack_topic() -> String {
    "/esp32/ai/ack".into()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl MqttConfig {
    pub fn get_keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn get_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn get_max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(format!("{}.yaml", environment.as_str())),
        ))
        .add_source(
            config::Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__"),
        )
        // Hosting platforms hand out the listen port as a bare PORT variable.
        .set_override_option("server.port", std::env::var("PORT").ok())?
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let source = r#"
log_level: info
server:
  host: 0.0.0.0
  port: 5000
inference:
  url: http://localhost:8000/predict
mqtt:
  host: localhost
"#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.get_address(), "0.0.0.0:5000");
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.inference.get_timeout(), DEFAULT_INFERENCE_TIMEOUT);
        assert_eq!(config.inference.request_format, RequestFormat::Binary);
        assert_eq!(config.inference.field_name, "file");
        assert_eq!(config.freshness.get_max_frame_age(), DEFAULT_MAX_FRAME_AGE);
        assert!(config.mqtt.enabled);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.trigger_topic, "/esp32/ai/trigger");
        assert_eq!(config.mqtt.ack_topic, "/esp32/ai/ack");
    }

    #[test]
    fn test_log_level_rejects_unknown_values() {
        let level: Result<LogLevel, _> = "trace".to_string().try_into();
        assert!(level.is_err());

        let level: LogLevel = "DEBUG".to_string().try_into().unwrap();
        assert_eq!(level.as_str(), "debug");
    }

    #[test]
    fn test_multipart_request_format_parses() {
        let format: RequestFormat = serde_json::from_str("\"multipart\"").unwrap();
        assert_eq!(format, RequestFormat::Multipart);
    }
}
