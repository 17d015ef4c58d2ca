use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8774;
pub const DEFAULT_BIND: &str = "0.0.0.0";
/// Transcript fetch cap — matches the platform page size we ask for.
pub const DEFAULT_TRANSCRIPT_LIMIT: u32 = 30;

/// Env var pointing at the TOML config file.
pub const CONFIG_PATH_ENV: &str = "CONFAB_CONFIG";
/// Env var carrying the completion settings as a single JSON blob
/// (`{"apiKey": "...", "model": "...", "stream": true}`). Deployment
/// surfaces that hand secrets around as one opaque string use this; when
/// set it replaces the `[openai]` section wholesale.
pub const OPENAI_SETTINGS_ENV: &str = "CONFAB_OPENAI_SETTINGS";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("completion settings blob is not valid JSON: {0}")]
    SettingsBlob(String),

    #[error("missing configuration section: [{0}]")]
    MissingSection(&'static str),
}

/// Top-level config (confab.toml + CONFAB_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfabConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub slack: SlackConfig,
    pub openai: OpenAiSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Slack workspace credentials and identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Signing secret used to verify Events API deliveries.
    pub signing_secret: String,
    /// Bot token (`xoxb-...`) for Web API calls.
    pub bot_token: String,
    /// The bot's member id (`U...`) — mentions of this id address the bot,
    /// and messages authored by it are the bot's own replies.
    pub bot_member_id: String,
    /// How many thread messages to fetch when rebuilding context.
    #[serde(default = "default_transcript_limit")]
    pub transcript_limit: u32,
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

/// Completion API settings.
///
/// Field aliases accept the camelCase spelling used by the JSON blob form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    #[serde(alias = "apiKey")]
    pub api_key: String,
    pub model: String,
    /// When true, replies stream into a placeholder message that is edited
    /// in place; when false the reply is posted once, complete.
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_openai_base_url", alias = "baseUrl")]
    pub base_url: String,
}

impl OpenAiSettings {
    /// Parse the single-JSON-blob form.
    pub fn from_blob(blob: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(blob).map_err(|e| ConfigError::SettingsBlob(e.to_string()))
    }
}

/// Same shape as [`ConfabConfig`] but with `[openai]` optional, so a file
/// that relies on the env blob for completion settings still extracts.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    gateway: GatewayConfig,
    slack: SlackConfig,
    openai: Option<OpenAiSettings>,
}

impl ConfabConfig {
    /// Load config from a TOML file with CONFAB_* env var overrides
    /// (`CONFAB_SLACK__BOT_TOKEN` → `slack.bot_token`). A settings blob in
    /// `CONFAB_OPENAI_SETTINGS` wins over any `[openai]` section.
    ///
    /// Missing or malformed required values fail here, at startup, rather
    /// than on the first event.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(|| "confab.toml".to_string());

        let raw: RawConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CONFAB_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let openai = match std::env::var(OPENAI_SETTINGS_ENV) {
            Ok(blob) => OpenAiSettings::from_blob(&blob)?,
            Err(_) => raw.openai.ok_or(ConfigError::MissingSection("openai"))?,
        };

        Ok(ConfabConfig {
            gateway: raw.gateway,
            slack: raw.slack,
            openai,
        })
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_transcript_limit() -> u32 {
    DEFAULT_TRANSCRIPT_LIMIT
}
fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_sections_parse_with_defaults() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [slack]
            signing_secret = "sss"
            bot_token = "xoxb-1"
            bot_member_id = "U0BOT"

            [openai]
            api_key = "sk-1"
            model = "gpt-4o"
            "#,
        ));
        let raw: RawConfig = figment.extract().unwrap();

        assert_eq!(raw.gateway.port, DEFAULT_PORT);
        assert_eq!(raw.gateway.bind, DEFAULT_BIND);
        assert_eq!(raw.slack.transcript_limit, DEFAULT_TRANSCRIPT_LIMIT);
        assert_eq!(raw.slack.api_base, "https://slack.com/api");

        let openai = raw.openai.unwrap();
        assert!(!openai.stream);
        assert_eq!(openai.base_url, "https://api.openai.com");
    }

    #[test]
    fn missing_slack_section_fails() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [openai]
            api_key = "sk-1"
            model = "gpt-4o"
            "#,
        ));
        assert!(figment.extract::<RawConfig>().is_err());
    }

    #[test]
    fn settings_blob_accepts_camel_case() {
        let settings =
            OpenAiSettings::from_blob(r#"{"apiKey": "sk-2", "model": "gpt-4o", "stream": true}"#)
                .unwrap();
        assert_eq!(settings.api_key, "sk-2");
        assert_eq!(settings.model, "gpt-4o");
        assert!(settings.stream);
        assert_eq!(settings.base_url, "https://api.openai.com");
    }

    #[test]
    fn settings_blob_rejects_missing_model() {
        let err = OpenAiSettings::from_blob(r#"{"apiKey": "sk-2"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::SettingsBlob(_)));
    }

    #[test]
    fn settings_blob_rejects_garbage() {
        assert!(OpenAiSettings::from_blob("not json at all").is_err());
    }
}
