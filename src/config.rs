use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout:free";
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const BYTES_PER_MB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub openrouter_api_key: String,
    pub openrouter_model: String,
    pub openrouter_base_url: String,
    pub model_timeout: Duration,
    pub max_image_size_mb: usize,
    pub max_image_bytes: usize,
    pub bind_addr: String,
}

impl Config {
    /// Read configuration from the process environment (and `.env`, if loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openrouter_api_key = lookup("OPENROUTER_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .context("OPENROUTER_API_KEY must be set in .env file")?;

        let openrouter_model = lookup("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let openrouter_base_url =
            lookup("OPENROUTER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = match lookup("MODEL_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("MODEL_TIMEOUT_SECS is not a number: {}", raw))?,
            None => 60,
        };

        let max_image_size_mb = match lookup("MAX_IMAGE_SIZE_MB") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAX_IMAGE_SIZE_MB is not a number: {}", raw))?,
            None => 5,
        };
        if max_image_size_mb == 0 {
            anyhow::bail!("MAX_IMAGE_SIZE_MB must be greater than zero");
        }
        // Uploads are accepted up to twice the bound, so that must fit too.
        let max_image_bytes = max_image_size_mb
            .checked_mul(BYTES_PER_MB)
            .filter(|bytes| bytes.checked_mul(2).is_some())
            .with_context(|| format!("MAX_IMAGE_SIZE_MB is too large: {}", max_image_size_mb))?;

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        Ok(Self {
            openrouter_api_key,
            openrouter_model,
            openrouter_base_url,
            model_timeout: Duration::from_secs(timeout_secs),
            max_image_size_mb,
            max_image_bytes,
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("OPENROUTER_API_KEY", "sk-test")])).unwrap();

        assert_eq!(config.openrouter_api_key, "sk-test");
        assert_eq!(config.openrouter_model, DEFAULT_MODEL);
        assert_eq!(config.openrouter_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model_timeout, Duration::from_secs(60));
        assert_eq!(config.max_image_size_mb, 5);
        assert_eq!(config.max_image_bytes, 5 * 1024 * 1024);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("OPENROUTER_MODEL", "google/gemini-flash-1.5"),
            ("MODEL_TIMEOUT_SECS", "15"),
            ("MAX_IMAGE_SIZE_MB", "10"),
            ("BIND_ADDR", "127.0.0.1:3000"),
        ]))
        .unwrap();

        assert_eq!(config.openrouter_model, "google/gemini-flash-1.5");
        assert_eq!(config.model_timeout, Duration::from_secs(15));
        assert_eq!(config.max_image_size_mb, 10);
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
    }

    #[test]
    fn test_missing_api_key() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));

        assert!(Config::from_lookup(lookup(&[("OPENROUTER_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(Config::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("MAX_IMAGE_SIZE_MB", "five"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("MAX_IMAGE_SIZE_MB", "0"),
        ]))
        .is_err());
    }

    #[test]
    fn test_image_bound_overflow_is_rejected() {
        let huge = (usize::MAX / 1024).to_string();
        let err = Config::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("MAX_IMAGE_SIZE_MB", huge.as_str()),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("too large"));

        // Fits once but not doubled.
        let half = (usize::MAX / BYTES_PER_MB / 2 + 1).to_string();
        assert!(Config::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("MAX_IMAGE_SIZE_MB", half.as_str()),
        ]))
        .is_err());
    }
}
