//! TOML configuration with environment overrides.
//!
//! Every section is optional; a bot can run on defaults plus the three secrets
//! read from the environment (`OPENAI_API_KEY`, `LINE_CHANNEL_ACCESS_TOKEN`,
//! `LINE_CHANNEL_SECRET`). Secrets are never read from the TOML file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Config file used when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG_PATH: &str = "./config/bot.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub line: LineConfig,
    /// Credentials, filled from the environment only.
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_dir")]
    pub dir: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_documents_dir(),
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// User-visible instruction texts used to build the system prompt.
#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    /// Used verbatim when no documents are loaded.
    #[serde(default = "default_generic_instruction")]
    pub generic_instruction: String,
    #[serde(default = "default_leading_instruction")]
    pub leading_instruction: String,
    #[serde(default = "default_trailing_instruction")]
    pub trailing_instruction: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            generic_instruction: default_generic_instruction(),
            leading_instruction: default_leading_instruction(),
            trailing_instruction: default_trailing_instruction(),
        }
    }
}

fn default_generic_instruction() -> String {
    "You are a helpful assistant. Please help answer the user's questions.".to_string()
}
fn default_leading_instruction() -> String {
    "You are a document question-answering bot. Answer the user's questions based on the following documents:"
        .to_string()
}
fn default_trailing_instruction() -> String {
    "Answer the user's question based on the documents above. If the question is unrelated to the documents, politely say so and offer general help."
        .to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sent to the user whenever the completion call fails.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_fallback_reply() -> String {
    "Sorry, I can't process your request right now. Please try again later.".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LineConfig {
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            api_base: default_line_api_base(),
        }
    }
}

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

#[derive(Clone, Default)]
pub struct Secrets {
    pub openai_api_key: Option<String>,
    pub line_channel_access_token: Option<String>,
    pub line_channel_secret: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field(
                "line_channel_access_token",
                &mask(&self.line_channel_access_token),
            )
            .field("line_channel_secret", &mask(&self.line_channel_secret))
            .finish()
    }
}

/// Loads configuration from an explicit path, the default path if present,
/// or built-in defaults, then applies environment overrides and validates.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => parse_config_file(p)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                parse_config_file(default_path)?
            } else {
                Config::default()
            }
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

/// Applies `PORT`, `DATA_DIR` and the credential variables. `lookup` is
/// injected so tests do not have to mutate the process environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = non_empty("PORT") {
        let port: u16 = port
            .trim()
            .parse()
            .with_context(|| format!("PORT must be a valid port number, got '{}'", port))?;
        config.server.bind = replace_port(&config.server.bind, port)?;
    }

    if let Some(dir) = non_empty("DATA_DIR") {
        config.documents.dir = PathBuf::from(dir);
    }

    config.secrets.openai_api_key = non_empty("OPENAI_API_KEY");
    config.secrets.line_channel_access_token = non_empty("LINE_CHANNEL_ACCESS_TOKEN");
    config.secrets.line_channel_secret = non_empty("LINE_CHANNEL_SECRET");

    Ok(())
}

fn replace_port(bind: &str, port: u16) -> Result<String> {
    let mut addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("server.bind is not a socket address: '{}'", bind))?;
    addr.set_port(port);
    Ok(addr.to_string())
}

fn validate(config: &Config) -> Result<()> {
    if config.server.bind.parse::<SocketAddr>().is_err() {
        bail!(
            "server.bind must be a socket address (e.g. 0.0.0.0:5000), got '{}'",
            config.server.bind
        );
    }

    if config.completion.max_tokens == 0 {
        bail!("completion.max_tokens must be > 0");
    }

    if !(0.0..=2.0).contains(&config.completion.temperature) {
        bail!("completion.temperature must be in [0.0, 2.0]");
    }

    if config.completion.timeout_secs == 0 {
        bail!("completion.timeout_secs must be > 0");
    }

    if config.completion.model.trim().is_empty() {
        bail!("completion.model must not be empty");
    }

    Ok(())
}

impl Config {
    /// Logs a warning for every credential that is missing. The bot still
    /// starts: completions fall back to the apology text and every webhook
    /// is rejected until the secrets are provided.
    pub fn warn_missing_secrets(&self) {
        if self.secrets.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY is not set; every reply will be the fallback text");
        }
        if self.secrets.line_channel_secret.is_none() {
            tracing::warn!("LINE_CHANNEL_SECRET is not set; all webhook calls will be rejected");
        }
        if self.secrets.line_channel_access_token.is_none() {
            tracing::warn!("LINE_CHANNEL_ACCESS_TOKEN is not set; replies cannot be delivered");
        }
    }
}
