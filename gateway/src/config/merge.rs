//! Merging of environment and YAML configuration.
//!
//! Priority: YAML > environment > defaults.

use std::path::PathBuf;

use super::env::EnvConfig;
use super::yaml::YamlConfig;
use super::{
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_RATE_LIMIT_BURST, DEFAULT_RATE_LIMIT_RPS, ServerConfig,
    TlsConfig,
};
use crate::core::engine::DEFAULT_AZURE_REGION;
use crate::core::streaming::{
    DEFAULT_AUDIO_CONTENT_TYPE, DEFAULT_CHUNK_SIZE, DEFAULT_INACTIVITY_TIMEOUT,
};
use crate::core::voice::VoiceTable;

/// Build a [`ServerConfig`] from the environment with optional YAML overrides.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let env = EnvConfig::load()?;
    Ok(merge(env, yaml.unwrap_or_default()))
}

fn merge(env: EnvConfig, yaml: YamlConfig) -> ServerConfig {
    let server = yaml.server.unwrap_or_default();
    let tls_yaml = server.tls.unwrap_or_default();
    let azure = yaml.azure.unwrap_or_default();
    let voices = yaml.voices.unwrap_or_default();
    let streaming = yaml.streaming.unwrap_or_default();
    let metering = yaml.metering.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let tls_enabled = tls_yaml.enabled.or(env.tls_enabled).unwrap_or(false);
    let tls = if tls_enabled {
        let cert_path = tls_yaml.cert_path.or(env.tls_cert_path);
        let key_path = tls_yaml.key_path.or(env.tls_key_path);
        match (cert_path, key_path) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            _ => {
                tracing::warn!("TLS enabled but certificate or key path missing, TLS disabled");
                None
            }
        }
    } else {
        None
    };

    let defaults = VoiceTable::default();
    let mut voice_aliases = defaults.aliases;
    if let Some(extra) = env.voice_aliases {
        voice_aliases.extend(extra);
    }
    if let Some(extra) = voices.aliases {
        voice_aliases.extend(extra);
    }

    ServerConfig {
        host: server
            .host
            .or(env.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: server.port.or(env.port).unwrap_or(DEFAULT_PORT),
        tls,

        azure_speech_subscription_key: azure
            .subscription_key
            .or(env.azure_speech_subscription_key),
        azure_speech_region: azure
            .region
            .or(env.azure_speech_region)
            .unwrap_or_else(|| DEFAULT_AZURE_REGION.to_string()),
        azure_speech_endpoint: azure.endpoint.or(env.azure_speech_endpoint),

        voice_male_default: voices
            .male_default
            .or(env.voice_male_default)
            .unwrap_or(defaults.male_default),
        voice_female_default: voices
            .female_default
            .or(env.voice_female_default)
            .unwrap_or(defaults.female_default),
        voice_aliases,

        stream_chunk_size: streaming
            .chunk_size
            .or(env.stream_chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE),
        stream_inactivity_timeout_seconds: streaming
            .inactivity_timeout_seconds
            .or(env.stream_inactivity_timeout_seconds)
            .unwrap_or(DEFAULT_INACTIVITY_TIMEOUT.as_secs()),
        stream_content_type: streaming
            .content_type
            .or(env.stream_content_type)
            .unwrap_or_else(|| DEFAULT_AUDIO_CONTENT_TYPE.to_string()),

        metering_url: metering.url.or(env.metering_url),

        cors_allowed_origins: security.cors_allowed_origins.or(env.cors_allowed_origins),
        rate_limit_requests_per_second: security
            .rate_limit_requests_per_second
            .or(env.rate_limit_requests_per_second)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPS),
        rate_limit_burst_size: security
            .rate_limit_burst_size
            .or(env.rate_limit_burst_size)
            .unwrap_or(DEFAULT_RATE_LIMIT_BURST),
    }
}
