use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
// room for the prompt and JSON framing around a base64 upload
pub const JSON_BODY_HEADROOM_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Memory,
    Disk(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub port: u16,
    pub gemini: GeminiConfig,
    pub storage: StorageConfig,
    pub strict_uploads: bool,
    pub max_upload_bytes: usize,
    pub json_body_limit: usize,
}

impl RuntimeConfig {
    // .env is optional; real environment variables win over it
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::info!("loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .context("GEMINI_API_KEY is not set")?;
        let gemini = GeminiConfig {
            api_key,
            api_base: lookup("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.into())
                .trim_end_matches('/')
                .to_string(),
            model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
            timeout: Duration::from_secs(parse_or(&lookup, "GEMINI_TIMEOUT_SECS", DEFAULT_GEMINI_TIMEOUT_SECS)?),
        };
        let storage = match lookup("UPLOAD_STORAGE").as_deref().map(str::trim) {
            None | Some("") | Some("memory") => StorageConfig::Memory,
            Some("disk") => {
                let dir = lookup("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.into());
                StorageConfig::Disk(PathBuf::from(dir))
            },
            Some(other) => bail!("UPLOAD_STORAGE must be `memory` or `disk`, got `{}`", other),
        };
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let config = Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            gemini,
            storage,
            strict_uploads: parse_bool_or(&lookup, "UPLOAD_STRICT", true)?,
            max_upload_bytes,
            json_body_limit: parse_or(&lookup, "JSON_BODY_LIMIT", default_json_body_limit(max_upload_bytes))?,
        };
        Ok(config)
    }
}

// an upload at the ceiling must still fit when sent back as fileBuffer
pub fn default_json_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.div_ceil(3)
        .saturating_mul(4)
        .saturating_add(JSON_BODY_HEADROOM_BYTES)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value.trim()
            .parse()
            .with_context(|| format!("invalid value for {}: `{}`", key, value)),
        _ => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else { return Ok(default) };
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("invalid value for {}: `{}`", key, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.gemini.api_base, DEFAULT_GEMINI_API_BASE);
        assert_eq!(config.storage, StorageConfig::Memory);
        assert!(config.strict_uploads);
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.json_body_limit, default_json_body_limit(100 * 1024 * 1024));
    }

    #[test]
    fn default_json_limit_fits_a_base64_upload_at_the_ceiling() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("MAX_UPLOAD_BYTES", "3000"),
        ])).unwrap();
        assert_eq!(config.json_body_limit, 4000 + JSON_BODY_HEADROOM_BYTES);

        for max_upload_bytes in [1, 3001, 65_537] {
            let encoded = crate::images::base64(&vec![0u8; max_upload_bytes]);
            assert!(encoded.len() + JSON_BODY_HEADROOM_BYTES <= default_json_body_limit(max_upload_bytes));
        }
        assert!(default_json_body_limit(DEFAULT_MAX_UPLOAD_BYTES) > DEFAULT_MAX_UPLOAD_BYTES / 3 * 4);
    }

    #[test]
    fn explicit_json_limit_wins() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("JSON_BODY_LIMIT", "64"),
        ])).unwrap();
        assert_eq!(config.json_body_limit, 64);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let result = RuntimeConfig::from_lookup(lookup_from(&[("PORT", "9000")]));
        assert!(result.is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("PORT", "9001"),
            ("GEMINI_API_BASE", "http://localhost:1234/"),
            ("UPLOAD_STORAGE", "disk"),
            ("UPLOAD_DIR", "/tmp/relay"),
            ("UPLOAD_STRICT", "off"),
            ("MAX_UPLOAD_BYTES", "1024"),
        ])).unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.gemini.api_base, "http://localhost:1234");
        assert_eq!(config.storage, StorageConfig::Disk(PathBuf::from("/tmp/relay")));
        assert!(!config.strict_uploads);
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(RuntimeConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "k"), ("PORT", "eighty")])).is_err());
        assert!(RuntimeConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "k"), ("UPLOAD_STORAGE", "s3")])).is_err());
        assert!(RuntimeConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "k"), ("UPLOAD_STRICT", "maybe")])).is_err());
    }
}
