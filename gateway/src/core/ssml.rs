//! SSML document construction.
//!
//! Request text is embedded into a `<speak>` document with a single
//! `<voice>` element bound to the resolved voice. Text is XML-escaped before
//! embedding so that characters such as `<` or `&` are spoken rather than
//! interpreted as markup.

use thiserror::Error;

use super::voice::VoiceId;

/// W3C SSML namespace.
pub const SSML_NAMESPACE: &str = "http://www.w3.org/2001/10/synthesis";

/// Language used for `xml:lang` when the voice carries no locale.
pub const DEFAULT_SSML_LANG: &str = "en-US";

/// Errors raised while building a markup document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    /// The request text was empty or whitespace-only
    #[error("Text is required")]
    EmptyText,
}

/// A complete SSML document ready for the synthesis engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsmlDocument {
    voice: VoiceId,
    body: String,
}

impl SsmlDocument {
    /// Build the document for `text` spoken by `voice`.
    ///
    /// Fails before any engine resource is allocated when `text` has no
    /// non-whitespace content.
    pub fn build(text: &str, voice: &VoiceId) -> Result<Self, MarkupError> {
        if text.trim().is_empty() {
            return Err(MarkupError::EmptyText);
        }

        let lang = voice.locale().unwrap_or(DEFAULT_SSML_LANG);
        let body = format!(
            "<speak version=\"1.0\" xmlns=\"{SSML_NAMESPACE}\" xml:lang=\"{lang}\"><voice name=\"{}\">{}</voice></speak>",
            escape_xml(voice.as_str()),
            escape_xml(text)
        );

        Ok(Self {
            voice: voice.clone(),
            body,
        })
    }

    pub fn voice(&self) -> &VoiceId {
        &self.voice
    }

    pub fn as_str(&self) -> &str {
        &self.body
    }
}

/// Escape the five XML special characters.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
