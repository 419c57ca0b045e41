//! Process configuration loaded from the environment (and an optional `.env`).

use crate::ai::gemini::client::DEFAULT_BASE_URL;
use crate::models::TEMPERATURE_RANGE;
use crate::{Error, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:50051";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
/// Large enough for a ~20 MB inline image once base64-encoded.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// How structured payloads are rendered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructuredOutputMode {
    /// Every JSON value is kept.
    #[default]
    Full,
    /// Legacy behaviour: only string-valued fields survive.
    Strings,
}

impl std::str::FromStr for StructuredOutputMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(StructuredOutputMode::Full),
            "strings" | "string" | "legacy" => Ok(StructuredOutputMode::Strings),
            other => Err(Error::Config(format!(
                "STRUCTURED_OUTPUT_MODE must be 'full' or 'strings', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub default_model: String,
    pub default_temperature: f32,
    pub bind_addr: SocketAddr,
    /// `None` disables the per-call deadline.
    pub request_timeout: Option<Duration>,
    pub media_root: Option<PathBuf>,
    pub structured_output_mode: StructuredOutputMode,
    /// Upper bound on an inbound request body.
    pub max_body_bytes: usize,
}

impl Config {
    /// Loads `.env` from the working directory (if any) and reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(&std::env::vars().collect())
    }

    /// Like [`Config::from_env`] but with an explicit `.env` path, which must exist.
    /// Variables already set in the process environment take precedence.
    pub fn from_env_file(path: &Path) -> Result<Self> {
        let mut vars = load_env_file(path)?;
        vars.extend(std::env::vars().filter(|(_, v)| !v.trim().is_empty()));
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let gemini_api_key = get("GEMINI_API_KEY")
            .ok_or_else(|| Error::Config("GEMINI_API_KEY not set".to_string()))?;

        let default_model = get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let default_temperature = match get("LLM_TEMPERATURE") {
            Some(raw) => raw.parse::<f32>().map_err(|_| {
                Error::Config(format!("LLM_TEMPERATURE is not a number: '{}'", raw))
            })?,
            None => DEFAULT_TEMPERATURE,
        };
        if !default_temperature.is_finite() || !TEMPERATURE_RANGE.contains(&default_temperature) {
            return Err(Error::Config(format!(
                "LLM_TEMPERATURE {} outside {:?}",
                default_temperature, TEMPERATURE_RANGE
            )));
        }

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("BIND_ADDR is invalid: {}", e)))?;

        let timeout_secs = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                Error::Config(format!("REQUEST_TIMEOUT_SECS is not an integer: '{}'", raw))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let max_body_bytes = match get("MAX_BODY_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    Error::Config(format!("MAX_BODY_BYTES must be a positive integer: '{}'", raw))
                })?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let structured_output_mode = match get("STRUCTURED_OUTPUT_MODE") {
            Some(raw) => raw.parse()?,
            None => StructuredOutputMode::default(),
        };

        Ok(Self {
            gemini_api_key,
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            default_model,
            default_temperature,
            bind_addr,
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            media_root: get("MEDIA_ROOT").map(PathBuf::from),
            structured_output_mode,
            max_body_bytes,
        })
    }
}

fn load_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let load_error = |e: dotenvy::Error| {
        Error::Config(format!("failed to load {}: {}", path.display(), e))
    };
    dotenvy::from_path_iter(path)
        .map_err(load_error)?
        .map(|item| item.map_err(load_error))
        .collect()
}
