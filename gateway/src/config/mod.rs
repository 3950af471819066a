//! Configuration module for the speech gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use speech_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::engine::{AzureSpeechConfig, PcmFormat};
use crate::core::streaming::StreamSettings;
use crate::core::voice::VoiceTable;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 60;
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 10;

/// TLS configuration for HTTPS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains everything needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Azure Speech credentials
/// - Voice table and streaming settings
/// - Usage metering endpoint
/// - Security settings (CORS, rate limiting)
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Azure Speech Services subscription key
    pub azure_speech_subscription_key: Option<String>,
    /// Azure region where the Speech resource is deployed (e.g., "eastus")
    pub azure_speech_region: String,
    /// Full synthesis URL overriding the regional endpoint
    pub azure_speech_endpoint: Option<String>,

    // Voice table
    pub voice_male_default: String,
    pub voice_female_default: String,
    /// Short form to locale-qualified identifier
    pub voice_aliases: HashMap<String, String>,

    // Streaming
    /// Bytes requested from the engine sink per pull
    pub stream_chunk_size: usize,
    /// Longest wait for the next audio chunk
    pub stream_inactivity_timeout_seconds: u64,
    pub stream_content_type: String,

    /// Usage collector endpoint; usage is only logged when unset
    pub metering_url: Option<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Zeroize secrets when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.azure_speech_subscription_key {
            key.zeroize();
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field(
                "azure_speech_subscription_key",
                &self.azure_speech_subscription_key.as_ref().map(|_| "<redacted>"),
            )
            .field("azure_speech_region", &self.azure_speech_region)
            .field("azure_speech_endpoint", &self.azure_speech_endpoint)
            .field("voice_male_default", &self.voice_male_default)
            .field("voice_female_default", &self.voice_female_default)
            .field("voice_aliases", &self.voice_aliases)
            .field("stream_chunk_size", &self.stream_chunk_size)
            .field(
                "stream_inactivity_timeout_seconds",
                &self.stream_inactivity_timeout_seconds,
            )
            .field("stream_content_type", &self.stream_content_type)
            .field("metering_url", &self.metering_url)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field(
                "rate_limit_requests_per_second",
                &self.rate_limit_requests_per_second,
            )
            .field("rate_limit_burst_size", &self.rate_limit_burst_size)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// The `.env` file is loaded in `main` before this is called, so actual
    /// environment variables override `.env` values.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Voice resolution table built from the configured defaults and aliases.
    pub fn voice_table(&self) -> VoiceTable {
        VoiceTable {
            male_default: self.voice_male_default.clone(),
            female_default: self.voice_female_default.clone(),
            aliases: self.voice_aliases.clone(),
        }
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            chunk_size: self.stream_chunk_size,
            inactivity_timeout: Some(Duration::from_secs(self.stream_inactivity_timeout_seconds)),
            content_type: self.stream_content_type.clone(),
        }
    }

    /// Azure engine configuration, or `None` when no subscription key is set.
    pub fn azure_speech_config(&self) -> Option<AzureSpeechConfig> {
        let key = self
            .azure_speech_subscription_key
            .as_ref()
            .filter(|k| !k.is_empty())?;

        Some(AzureSpeechConfig {
            subscription_key: Zeroizing::new(key.clone()),
            region: self.azure_speech_region.clone(),
            endpoint: self.azure_speech_endpoint.clone(),
            output_format: PcmFormat::default(),
            ..Default::default()
        })
    }
}
