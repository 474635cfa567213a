use crate::errors::{HealError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub browser: BrowserConfig,
    pub healing: HealingConfig,
    pub inference: InferenceConfig,
    pub sidecar: SidecarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub disable_images: bool,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingConfig {
    pub ai_enabled: bool,
    pub store_path: PathBuf,
    pub attach_timeout_ms: u64,
    pub dom_snapshot_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub provider: String,
    pub openai: ProviderSettings,
    pub google: ProviderSettings,
    pub xai: ProviderSettings,
    pub timeout_ms: u64,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            disable_images: false,
            args: vec![],
            timeout_ms: 30000,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            ai_enabled: false,
            store_path: PathBuf::from("./healing/healerStore.json"),
            attach_timeout_ms: 1500,
            dom_snapshot_limit: 12000,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            openai: ProviderSettings::new("gpt-4o-mini", "https://api.openai.com/v1"),
            google: ProviderSettings::new(
                "gemini-pro",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            xai: ProviderSettings::new("grok-beta", "https://api.x.ai/v1"),
            timeout_ms: 30000,
            temperature: 0.0,
        }
    }
}

impl ProviderSettings {
    pub fn new(model: &str, api_base: &str) -> Self {
        Self {
            api_key: None,
            model: model.to_string(),
            api_base: api_base.to_string(),
        }
    }
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3333/tool".to_string(),
            timeout_ms: 10000,
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Config::default();

        if let Some(value) = get("HEADLESS") {
            config.browser.headless = parse_flag("HEADLESS", &value)?;
        }

        if let Some(value) = get("AI_HEALING_ENABLED") {
            config.healing.ai_enabled = parse_flag("AI_HEALING_ENABLED", &value)?;
        }
        if let Some(value) = get("HEALING_STORE_PATH") {
            config.healing.store_path = PathBuf::from(value);
        }
        if let Some(value) = get("HEALING_ATTACH_TIMEOUT_MS") {
            config.healing.attach_timeout_ms = parse_number("HEALING_ATTACH_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get("HEALING_DOM_LIMIT") {
            config.healing.dom_snapshot_limit = parse_number("HEALING_DOM_LIMIT", &value)?;
        }

        let inference = &mut config.inference;
        if let Some(value) = get("AI_PROVIDER") {
            inference.provider = value.to_lowercase();
        }
        if let Some(value) = get("AI_TIMEOUT_MS") {
            inference.timeout_ms = parse_number("AI_TIMEOUT_MS", &value)?;
        }
        for (prefix, settings) in [
            ("OPENAI", &mut inference.openai),
            ("GOOGLE", &mut inference.google),
            ("XAI", &mut inference.xai),
        ] {
            if let Some(key) = get(&format!("{prefix}_API_KEY")) {
                settings.api_key = Some(key);
            }
            if let Some(model) = get(&format!("{prefix}_MODEL")) {
                settings.model = model;
            }
            if let Some(base) = get(&format!("{prefix}_BASE_URL")) {
                settings.api_base = base;
            }
        }

        if let Some(value) = get("MCP_SERVER_URL") {
            config.sidecar.base_url = value;
        }

        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HealError::Configuration(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| HealError::Configuration(format!("{key} must be a number, got '{value}'")))
}
