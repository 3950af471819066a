//! Configuration validation.

use http::HeaderValue;

use super::{ServerConfig, TlsConfig};

/// Run every check against a merged configuration.
pub fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_streaming(config.stream_chunk_size, config.stream_inactivity_timeout_seconds)?;
    validate_content_type(&config.stream_content_type)?;
    validate_voices(&config.voice_male_default, &config.voice_female_default)?;
    validate_tls(&config.tls)?;
    validate_metering_url(&config.metering_url)?;
    Ok(())
}

pub fn validate_streaming(
    chunk_size: usize,
    inactivity_timeout_seconds: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if chunk_size == 0 {
        return Err("Streaming chunk size must be greater than zero".into());
    }
    if inactivity_timeout_seconds == 0 {
        return Err("Streaming inactivity timeout must be greater than zero".into());
    }
    Ok(())
}

/// Content type must be a `type/subtype` media type usable as a header value.
pub fn validate_content_type(content_type: &str) -> Result<(), Box<dyn std::error::Error>> {
    let trimmed = content_type.trim();
    let is_media_type = trimmed
        .split_once('/')
        .is_some_and(|(kind, subtype)| !kind.is_empty() && !subtype.is_empty());
    if !is_media_type || HeaderValue::from_str(content_type).is_err() {
        return Err(format!("Invalid streaming content type: {content_type:?}").into());
    }
    Ok(())
}

pub fn validate_voices(
    male_default: &str,
    female_default: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if male_default.trim().is_empty() {
        return Err("Male default voice must not be empty".into());
    }
    if female_default.trim().is_empty() {
        return Err("Female default voice must not be empty".into());
    }
    Ok(())
}

pub fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(tls) = tls {
        if !tls.cert_path.exists() {
            return Err(format!(
                "TLS certificate file not found: {}",
                tls.cert_path.display()
            )
            .into());
        }
        if !tls.key_path.exists() {
            return Err(format!("TLS key file not found: {}", tls.key_path.display()).into());
        }
    }
    Ok(())
}

pub fn validate_metering_url(url: &Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(url) = url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("Metering URL must start with http:// or https://: {url}").into());
        }
    }
    Ok(())
}
