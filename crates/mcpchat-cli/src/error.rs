use thiserror::Error;

pub const ENV_PREFIX: &str = "MCPCHAT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Invalid provider '{name}'. Must be one of: {expected}")]
    UnknownProvider { name: String, expected: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Name of the environment variable that sets a dotted configuration key
pub fn to_env_var(field: &str) -> String {
    let path = field
        .split('.')
        .map(|segment| segment.to_uppercase())
        .collect::<Vec<_>>()
        .join("__");
    format!("{}_{}", ENV_PREFIX, path)
}
