use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RelayError, Result};

pub const DEFAULT_PORT: u16 = 5701;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_ONEBOT_URL: &str = "http://127.0.0.1:5700";
pub const ENV_PREFIX: &str = "CQRELAY_";

/// Top-level config (cqrelay.toml + CQRELAY_* env overrides).
///
/// Nested keys are addressed with a double underscore in the environment,
/// e.g. `CQRELAY_AGENT__DEFAULT_MODEL=gpt-4o-mini`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub onebot: OneBotConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
}

/// Inbound HTTP listener that receives events posted by the OneBot gateway.
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

/// Outbound OneBot HTTP API (the `send_private_msg` endpoint lives under `base_url`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneBotConfig {
    #[serde(default = "default_onebot_url")]
    pub base_url: String,
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            base_url: default_onebot_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub openai: Option<OpenAiProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    /// Falls back to the `OPENAI_API_KEY` env var when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Optional HTTP(S) proxy every completion request is routed through,
    /// e.g. `http://127.0.0.1:7890`.
    pub proxy: Option<String>,
}

/// Model selection, guard thresholds and the fixed user-facing texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model for plain-text conversations.
    pub default_model: String,
    /// Model used when the message starts with `escalation_prefix`.
    pub upgraded_model: String,
    /// Model used whenever the message carries at least one image.
    pub vision_model: String,
    pub escalation_prefix: String,
    /// Messages estimated above this many tokens are rejected before any request.
    pub max_input_tokens: f64,
    /// Sentinel: this exact text is answered with `sentinel_reply`, no model call.
    pub sentinel_phrase: String,
    pub sentinel_reply: String,
    pub too_long_notice: String,
    pub escalation_notice: String,
    pub vision_notice: String,
    /// Text block sent alongside images when the user wrote nothing.
    pub default_image_prompt: String,
    /// Prepended to text conversations as a `system` message when set.
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-3.5-turbo".to_string(),
            upgraded_model: "gpt-4o".to_string(),
            vision_model: "gpt-4o".to_string(),
            escalation_prefix: "/GPT4".to_string(),
            max_input_tokens: 3000.0,
            sentinel_phrase: "无语".to_string(),
            sentinel_reply: "家人们，谁懂啊！".to_string(),
            too_long_notice: "输入太长了～ 请不要超过 2000 个字符".to_string(),
            escalation_notice: "本次回答将使用 GPT-4o 模型，请稍等..".to_string(),
            vision_notice: "已触发老鼠识图，请稍等～".to_string(),
            default_image_prompt: "请描述这张图片".to_string(),
            system_prompt: None,
        }
    }
}

/// Per-user conversation history bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Round limit: eviction starts once this many entries are held.
    pub max_entries: usize,
    /// Eviction starts once the summed token cost exceeds this.
    pub soft_token_limit: u64,
    /// Once eviction starts, the summed token cost is brought down to at most this.
    pub hard_token_limit: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 10,
            soft_token_limit: 10_000,
            hard_token_limit: 15_000,
        }
    }
}

/// Worker pool draining the inbound queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub count: usize,
    pub queue_capacity: usize,
    /// Deadline for each outbound call (completion service and OneBot delivery).
    pub call_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 8,
            queue_capacity: 256,
            call_timeout_secs: 120,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_onebot_url() -> String {
    DEFAULT_ONEBOT_URL.to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

impl RelayConfig {
    /// Load config from a TOML file with CQRELAY_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.cqrelay/cqrelay.toml
    ///
    /// A missing file is not an error; built-in defaults fill every gap.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(path = %path, "loading config");

        let config: RelayConfig = Figment::from(Serialized::defaults(RelayConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        Ok(config)
    }
}

/// Reject keys that cannot be OpenAI secret keys (they all start with `sk`).
pub fn validate_api_key(key: &str) -> Result<()> {
    if key.starts_with("sk") {
        Ok(())
    } else {
        Err(RelayError::InvalidApiKey {
            reason: "key should start with sk-".to_string(),
        })
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cqrelay/cqrelay.toml", home)
}
