use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   tls:
///     enabled: true
///     cert_path: "/etc/speech-gateway/cert.pem"
///     key_path: "/etc/speech-gateway/key.pem"
///
/// azure:
///   subscription_key: "your-azure-key"
///   region: "westeurope"
///   endpoint: "https://private.example.com/cognitiveservices/v1"
///
/// voices:
///   male_default: "en-US-AndrewNeural"
///   female_default: "en-US-JennyNeural"
///   aliases:
///     JennyNeural: "en-US-JennyNeural"
///     AvaNeural: "en-US-AvaNeural"
///
/// streaming:
///   chunk_size: 4096
///   inactivity_timeout_seconds: 30
///   content_type: "audio/wav"
///
/// metering:
///   url: "https://billing.example.com/usage"
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub azure: Option<AzureYaml>,
    pub voices: Option<VoicesYaml>,
    pub streaming: Option<StreamingYaml>,
    pub metering: Option<MeteringYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Azure Speech Services credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AzureYaml {
    /// Subscription key (Azure Portal → Speech resource → Keys and Endpoint)
    pub subscription_key: Option<String>,
    /// Region the key is tied to (e.g., "eastus", "westus2")
    pub region: Option<String>,
    /// Full synthesis URL, overrides the regional endpoint
    pub endpoint: Option<String>,
}

/// Voice table from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VoicesYaml {
    pub male_default: Option<String>,
    pub female_default: Option<String>,
    /// Extra short forms, merged over the built-in ones
    pub aliases: Option<HashMap<String, String>>,
}

/// Streaming settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StreamingYaml {
    pub chunk_size: Option<usize>,
    pub inactivity_timeout_seconds: Option<u64>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MeteringYaml {
    pub url: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
