//! Configuration loading for supercon.
//! Reads supercon.toml from the current directory or the path in SUPERCON_CONFIG.
//! Every key has a default, so a missing file yields a working Gemini setup
//! as long as an API key is found in the environment.

use std::path::Path;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 3] = ["SUPERCON_API_KEY", "GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    OpenaiCompatible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides the provider's public endpoint.
    pub base_url: Option<String>,
    /// Prefer the environment; a key here wins when non-empty.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    /// Output token ceiling per lookup; the provider default applies when unset.
    pub max_output_tokens: Option<u32>,
}

fn default_provider()     -> LlmProvider { LlmProvider::Gemini }
fn default_model()        -> String      { "gemini-2.5-flash".to_string() }
fn default_timeout_secs() -> u64         { 30 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            temperature: None,
            max_output_tokens: None,
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from the config file, then the environment.
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Option<SecretString>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_file = Some(self.api_key.trim().to_string()).filter(|k| !k.is_empty());
        from_file
            .or_else(|| {
                API_KEY_ENV_VARS
                    .iter()
                    .filter_map(|name| lookup(name))
                    .map(|k| k.trim().to_string())
                    .find(|k| !k.is_empty())
            })
            .map(SecretString::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    #[serde(default = "bool_true")]
    pub normalize_temperatures: bool,
}

fn bool_true() -> bool { true }

impl Default for QuerySettings {
    fn default() -> Self {
        Self { normalize_temperatures: bool_true() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16    { 3001 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}


impl Config {
    /// Load configuration from supercon.toml.
    /// Checks SUPERCON_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("SUPERCON_CONFIG")
            .unwrap_or_else(|_| "supercon.toml".to_string());

        if !Path::new(&path).exists() {
            tracing::warn!("Config file not found: {path}; using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
