//! Environment variable loading.
//!
//! Every value is optional here; defaults are applied when merging.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

/// Raw configuration read from environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,

    pub tls_enabled: Option<bool>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,

    pub azure_speech_subscription_key: Option<String>,
    pub azure_speech_region: Option<String>,
    pub azure_speech_endpoint: Option<String>,

    pub voice_male_default: Option<String>,
    pub voice_female_default: Option<String>,
    pub voice_aliases: Option<HashMap<String, String>>,

    pub stream_chunk_size: Option<usize>,
    pub stream_inactivity_timeout_seconds: Option<u64>,
    pub stream_content_type: Option<String>,

    pub metering_url: Option<String>,

    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

impl EnvConfig {
    /// Read all known variables from the process environment.
    ///
    /// # Errors
    /// Returns an error when a numeric or boolean variable cannot be parsed,
    /// or `VOICE_ALIASES` is malformed.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            host: string_var("HOST"),
            port: parse_var("PORT")?,

            tls_enabled: bool_var("TLS_ENABLED")?,
            tls_cert_path: string_var("TLS_CERT_PATH"),
            tls_key_path: string_var("TLS_KEY_PATH"),

            azure_speech_subscription_key: string_var("AZURE_SPEECH_SUBSCRIPTION_KEY"),
            azure_speech_region: string_var("AZURE_SPEECH_REGION"),
            azure_speech_endpoint: string_var("AZURE_SPEECH_ENDPOINT"),

            voice_male_default: string_var("VOICE_MALE_DEFAULT"),
            voice_female_default: string_var("VOICE_FEMALE_DEFAULT"),
            voice_aliases: string_var("VOICE_ALIASES")
                .map(|raw| parse_aliases(&raw))
                .transpose()?,

            stream_chunk_size: parse_var("STREAM_CHUNK_SIZE")?,
            stream_inactivity_timeout_seconds: parse_var("STREAM_INACTIVITY_TIMEOUT_SECONDS")?,
            stream_content_type: string_var("STREAM_CONTENT_TYPE"),

            metering_url: string_var("METERING_URL"),

            cors_allowed_origins: string_var("CORS_ALLOWED_ORIGINS"),
            rate_limit_requests_per_second: parse_var("RATE_LIMIT_REQUESTS_PER_SECOND")?,
            rate_limit_burst_size: parse_var("RATE_LIMIT_BURST_SIZE")?,
        })
    }
}

/// Non-empty, trimmed variable value.
fn string_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match string_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name} '{raw}': {e}").into()),
        None => Ok(None),
    }
}

fn bool_var(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match string_var(name) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(format!("Invalid boolean for {name}: '{raw}'").into()),
        },
        None => Ok(None),
    }
}

/// Parse `Short=Full` pairs separated by commas.
pub(crate) fn parse_aliases(raw: &str) -> Result<HashMap<String, String>, String> {
    let mut aliases = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (short, full) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid voice alias '{pair}', expected Short=Full"))?;
        let (short, full) = (short.trim(), full.trim());
        if short.is_empty() || full.is_empty() {
            return Err(format!("Invalid voice alias '{pair}', expected Short=Full"));
        }
        aliases.insert(short.to_string(), full.to_string());
    }
    Ok(aliases)
}
