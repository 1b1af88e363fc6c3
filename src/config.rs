use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_N_RESULTS: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_url: String,
    pub n_results: u32,
    pub request_timeout_secs: Option<u64>,
    pub show_embeddings: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url = std::env::var("SCRIBE_API_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let n_results = match std::env::var("SCRIBE_N_RESULTS") {
            Ok(raw) => parse_n_results(&raw)?,
            Err(_) => DEFAULT_N_RESULTS,
        };

        let request_timeout_secs = match std::env::var("SCRIBE_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("invalid SCRIBE_REQUEST_TIMEOUT_SECS '{raw}'"))?,
            ),
            Err(_) => None,
        };

        let show_embeddings = std::env::var("SCRIBE_SHOW_EMBEDDINGS")
            .ok()
            .and_then(|raw| parse_switch(&raw))
            .unwrap_or(false);

        Ok(Self {
            api_url,
            n_results,
            request_timeout_secs,
            show_embeddings,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid SCRIBE_API_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if self.request_timeout_secs == Some(0) {
            bail!("SCRIBE_REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        Ok(())
    }
}

/// Reads an on/off switch: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`,
/// case-insensitive. Anything else is `None`.
fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parses a result count, rejecting negative values.
pub fn parse_n_results(raw: &str) -> Result<u32> {
    let value = raw
        .trim()
        .parse::<i64>()
        .with_context(|| format!("invalid result count '{raw}'"))?;
    if value < 0 {
        bail!("search results amount could not be negative");
    }
    u32::try_from(value).with_context(|| format!("result count '{raw}' is too large"))
}
