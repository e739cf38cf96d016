use std::fmt;

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const OLLAMA_HOST: &str = "http://localhost:11434";

/// Unified enum to wrap different provider configurations
#[derive(Clone, Debug)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Anthropic(AnthropicProviderConfig),
    Ollama(OllamaProviderConfig),
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAi(config) => &config.model,
            ProviderConfig::Anthropic(config) => &config.model,
            ProviderConfig::Ollama(config) => &config.model,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            ProviderConfig::OpenAi(config) => &config.host,
            ProviderConfig::Anthropic(config) => &config.host,
            ProviderConfig::Ollama(config) => &config.host,
        }
    }
}

#[derive(Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

#[derive(Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

#[derive(Clone, Debug)]
pub struct OllamaProviderConfig {
    pub host: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

// api keys never show up in logs
impl fmt::Debug for OpenAiProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProviderConfig")
            .field("host", &self.host)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl fmt::Debug for AnthropicProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicProviderConfig")
            .field("host", &self.host)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
