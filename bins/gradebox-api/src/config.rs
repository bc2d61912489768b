// Server configuration, read once from the environment at startup
use anyhow::{Context, Result};
use gradebox_common::grading::GradingStrategy;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// `languages.json`; the built-in table is used when unset
    pub languages_config: Option<PathBuf>,
    pub strategy: GradingStrategy,
    pub exec_timeout: Option<Duration>,
    pub serialize_sandboxes: bool,
}

impl ServerConfig {
    /// BIND_ADDR, LANGUAGES_CONFIG, GRADING_STRATEGY, EXEC_TIMEOUT_MS,
    /// SERIALIZE_SANDBOXES
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let languages_config = lookup("LANGUAGES_CONFIG")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        let strategy = match lookup("GRADING_STRATEGY") {
            Some(value) => value
                .parse::<GradingStrategy>()
                .map_err(anyhow::Error::msg)
                .context("Invalid GRADING_STRATEGY")?,
            None => GradingStrategy::default(),
        };

        let exec_timeout = match lookup("EXEC_TIMEOUT_MS") {
            Some(value) if !value.is_empty() => {
                let ms: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid EXEC_TIMEOUT_MS: {}", value))?;
                (ms > 0).then(|| Duration::from_millis(ms))
            }
            _ => None,
        };

        let serialize_sandboxes = match lookup("SERIALIZE_SANDBOXES") {
            Some(value) => parse_bool(&value)
                .with_context(|| format!("Invalid SERIALIZE_SANDBOXES: {}", value))?,
            None => true,
        };

        Ok(Self {
            bind_addr,
            languages_config,
            strategy,
            exec_timeout,
            serialize_sandboxes,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("expected true or false"),
    }
}
