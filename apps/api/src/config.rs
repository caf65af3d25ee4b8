use std::time::Duration;

use anyhow::{Context, Result};

use crate::interview::conductor::Pacing;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// JSON-RPC endpoint of the digital twin service.
    pub answer_provider_url: String,
    pub answer_provider_tool: String,
    /// No timeout unless explicitly configured.
    pub answer_provider_timeout: Option<Duration>,
    pub think_delay: Duration,
    pub settle_delay: Duration,
    pub evaluation_delay: Duration,
    pub evaluator_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        let reference = Pacing::reference();

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            answer_provider_url: require_env("ANSWER_PROVIDER_URL")?,
            answer_provider_tool: std::env::var("ANSWER_PROVIDER_TOOL")
                .unwrap_or_else(|_| crate::answer_client::DEFAULT_TOOL.to_string()),
            answer_provider_timeout: optional_env::<u64>("ANSWER_PROVIDER_TIMEOUT_SECS")?
                .map(Duration::from_secs),
            think_delay: delay_env("THINK_DELAY_MS", reference.think)?,
            settle_delay: delay_env("SETTLE_DELAY_MS", reference.settle)?,
            evaluation_delay: delay_env("EVALUATION_DELAY_MS", reference.evaluation)?,
            evaluator_seed: optional_env::<u64>("EVALUATOR_SEED")?,
        })
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            think: self.think_delay,
            settle: self.settle_delay,
            evaluation: self.evaluation_delay,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        _ => Ok(None),
    }
}

fn delay_env(key: &str, default: Duration) -> Result<Duration> {
    Ok(optional_env::<u64>(key)?
        .map(Duration::from_millis)
        .unwrap_or(default))
}
