use crate::error::{to_env_var, ConfigError, ENV_PREFIX};
use config::{Config, Environment};
use mcpchat::agent::MAX_ITERATIONS;
use mcpchat::providers::{
    configs::{
        AnthropicProviderConfig, OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig,
        ANTHROPIC_HOST, OLLAMA_HOST, OPENAI_HOST,
    },
    factory::ProviderType,
};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use strum::IntoEnumIterator;

/// Older deployments pick the backend with this variable
const LEGACY_PROVIDER_VAR: &str = "AI_PROVIDER";

const DEFAULT_DOWNLOADS_DIR: &str = "./downloads";

#[derive(Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
    #[serde(alias = "anthropic")]
    Claude {
        #[serde(default = "default_anthropic_host")]
        host: String,
        api_key: String,
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
    Ollama {
        #[serde(default = "default_ollama_host")]
        host: String,
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderSettings::OpenAi { .. } => ProviderType::OpenAi,
            ProviderSettings::Claude { .. } => ProviderType::Anthropic,
            ProviderSettings::Ollama { .. } => ProviderType::Ollama,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderSettings::OpenAi { model, .. }
            | ProviderSettings::Claude { model, .. }
            | ProviderSettings::Ollama { model, .. } => model,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            ProviderSettings::OpenAi { host, .. }
            | ProviderSettings::Claude { host, .. }
            | ProviderSettings::Ollama { host, .. } => host,
        }
    }

    /// Lines printed at startup, with the api key never shown
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "🤖 AI Provider: {}",
            self.provider_type().to_string().to_uppercase()
        )];
        match self {
            ProviderSettings::OpenAi { model, api_key, .. }
            | ProviderSettings::Claude { model, api_key, .. } => {
                lines.push(format!("   Model: {}", model));
                let key = if api_key.trim().is_empty() {
                    "❌ missing"
                } else {
                    "***configured***"
                };
                lines.push(format!("   API Key: {}", key));
            }
            ProviderSettings::Ollama { host, model, .. } => {
                lines.push(format!("   URL: {}", host));
                lines.push(format!("   Model: {}", model));
            }
        }
        lines
    }

    // Convert to the core ProviderConfig
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
            ProviderSettings::Claude {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Anthropic(AnthropicProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
            ProviderSettings::Ollama {
                host,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Ollama(OllamaProviderConfig {
                host,
                model,
                temperature,
                max_tokens,
            }),
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("type", &self.provider_type().to_string())
            .field("host", &self.host())
            .field("model", &self.model())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_timeout_secs: None,
            system_prompt: None,
        }
    }
}

impl AgentSettings {
    /// Zero means no limit
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
}

impl Settings {
    /// Load settings from the environment, with `provider_override` taking precedence
    /// over any configured provider type
    pub fn load(provider_override: Option<&str>) -> Result<Self, ConfigError> {
        let provider_type = resolve_provider_type(provider_override)?;

        let mut builder = Config::builder().set_default("downloads_dir", DEFAULT_DOWNLOADS_DIR)?;

        // Legacy names sit below the prefixed variables
        for (key, var) in legacy_env_vars(provider_type) {
            if let Some(value) = non_empty_var(var) {
                builder = builder.set_default(*key, value)?;
            }
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("provider.type", provider_type.to_string())?
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if let Some(field) = missing_field(&error_str) {
                    // only provider fields are required
                    let env_var = to_env_var(&format!("provider.{}", field));
                    Err(ConfigError::MissingEnvVar { env_var })
                } else if let config::ConfigError::NotFound(field) = &err {
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

/// Extract `field` from "missing field `field`"
fn missing_field(message: &str) -> Option<&str> {
    message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
}

fn resolve_provider_type(provider_override: Option<&str>) -> Result<ProviderType, ConfigError> {
    let name = provider_override
        .map(str::to_string)
        .or_else(|| non_empty_var(&to_env_var("provider.type")))
        .or_else(|| non_empty_var(LEGACY_PROVIDER_VAR))
        .unwrap_or_else(|| ProviderType::OpenAi.to_string());
    let name = name.trim().to_lowercase();

    ProviderType::from_str(&name).map_err(|_| ConfigError::UnknownProvider {
        name,
        expected: ProviderType::iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn legacy_env_vars(provider_type: ProviderType) -> &'static [(&'static str, &'static str)] {
    match provider_type {
        ProviderType::OpenAi => &[
            ("provider.api_key", "OPENAI_API_KEY"),
            ("provider.model", "OPENAI_MODEL"),
        ],
        ProviderType::Anthropic => &[
            ("provider.api_key", "ANTHROPIC_API_KEY"),
            ("provider.model", "CLAUDE_MODEL"),
        ],
        ProviderType::Ollama => &[
            ("provider.host", "OLLAMA_URL"),
            ("provider.model", "OLLAMA_MODEL"),
        ],
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_anthropic_host() -> String {
    ANTHROPIC_HOST.to_string()
}

fn default_ollama_host() -> String {
    OLLAMA_HOST.to_string()
}

fn default_max_iterations() -> usize {
    MAX_ITERATIONS
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DOWNLOADS_DIR)
}
