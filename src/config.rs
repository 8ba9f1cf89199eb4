use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::util::{is_local_endpoint_url, parse_bool_flag};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SYSTEM_PROMPT_PATH: &str = "data/systemPrompt.txt";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_HEARTBEAT_MS: u64 = 15_000;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ASSISTANT_NAME: &str = "Assistant";
const DEFAULT_ASSISTANT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ASSISTANT_INSTRUCTIONS: &str = "You are a helpful assistant. \
When answering questions, please use the File Search tool to find relevant information in the documents provided.";

/// Template used when the server is asked to create a new assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantTemplate {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub vector_store_ids: Vec<String>,
}

impl Default for AssistantTemplate {
    fn default() -> Self {
        Self {
            name: DEFAULT_ASSISTANT_NAME.to_string(),
            model: DEFAULT_ASSISTANT_MODEL.to_string(),
            instructions: DEFAULT_ASSISTANT_INSTRUCTIONS.to_string(),
            vector_store_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    pub assistant_id: Option<String>,
    pub system_prompt_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub poll_interval: Duration,
    /// Relay the provider event stream instead of polling to completion.
    pub stream_responses: bool,
    pub heartbeat_interval: Duration,
    pub tool_timeout: Duration,
    pub greeting: Option<String>,
    pub assistant: AssistantTemplate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            assistant_id: None,
            system_prompt_path: PathBuf::from(DEFAULT_SYSTEM_PROMPT_PATH),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            stream_responses: false,
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_MS),
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            greeting: None,
            assistant: AssistantTemplate::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let api_url = env_string("OPENAI_BASE_URL").unwrap_or(defaults.api_url);
        let assistant = AssistantTemplate {
            name: env_string("ASSISTANT_NAME").unwrap_or(defaults.assistant.name),
            model: env_string("ASSISTANT_MODEL").unwrap_or(defaults.assistant.model),
            instructions: env_string("ASSISTANT_INSTRUCTIONS")
                .unwrap_or(defaults.assistant.instructions),
            vector_store_ids: env_string("ASSISTANT_VECTOR_STORE_IDS")
                .map(|ids| split_list(&ids))
                .unwrap_or_default(),
        };

        Ok(Self {
            api_key: env_string("OPENAI_API_KEY"),
            api_url,
            assistant_id: env_string("ASSISTANT_ID"),
            system_prompt_path: env_string("THREADCHAT_SYSTEM_PROMPT")
                .map(PathBuf::from)
                .unwrap_or(defaults.system_prompt_path),
            host: env_string("THREADCHAT_HOST").unwrap_or(defaults.host),
            port: env_parsed("THREADCHAT_PORT")?.unwrap_or(defaults.port),
            poll_interval: env_parsed("THREADCHAT_POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            stream_responses: env_string("THREADCHAT_STREAM")
                .and_then(parse_bool_flag)
                .unwrap_or(defaults.stream_responses),
            heartbeat_interval: env_parsed("THREADCHAT_HEARTBEAT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.heartbeat_interval),
            tool_timeout: env_parsed("THREADCHAT_TOOL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.tool_timeout),
            greeting: env_string("THREADCHAT_GREETING"),
            assistant,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid OPENAI_BASE_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if !self.is_local_endpoint() && self.api_key.is_none() {
            bail!(
                "OPENAI_API_KEY must be set for non-local endpoints (url: '{}')",
                self.api_url
            );
        }

        if self.poll_interval.is_zero() {
            bail!("THREADCHAT_POLL_INTERVAL_MS must be greater than zero");
        }

        if self.heartbeat_interval.is_zero() {
            bail!("THREADCHAT_HEARTBEAT_MS must be greater than zero");
        }

        if self.assistant_id.is_none() {
            tracing::warn!("ASSISTANT_ID is not set; message routes will reject requests");
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reads the system prompt from disk on every call so edits apply without a restart.
    pub async fn read_system_prompt(&self) -> std::io::Result<String> {
        tokio::fs::read_to_string(&self.system_prompt_path).await
    }

    fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_string(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("Invalid value for {key}: '{raw}'"))
        })
        .transpose()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
