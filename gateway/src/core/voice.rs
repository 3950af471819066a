//! Voice resolution for streaming synthesis.
//!
//! Callers may name a voice by a short form (`JennyNeural`), by a fully
//! locale-qualified identifier (`en-US-Alloy:DragonHDLatestNeural`), or not at
//! all, in which case the requested gender selects a default voice.
//!
//! Resolution is driven by a [`VoiceTable`] that is part of the server
//! configuration, so deployments can change defaults and aliases without code
//! changes.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default voice for `voiceGender = "male"`.
pub const DEFAULT_MALE_VOICE: &str = "en-US-AndrewNeural";

/// Default voice for any other (or absent) gender.
pub const DEFAULT_FEMALE_VOICE: &str = "en-US-JennyNeural";

/// Matches identifiers that already carry a locale prefix, e.g. `en-US-JennyNeural`,
/// `zh-Hans-CN-XiaoxiaoNeural` or `en-US-Alloy:DragonHDLatestNeural`.
static QUALIFIED_VOICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[A-Z][a-z]{3})?-[A-Z]{2}-\S+$").expect("valid voice pattern")
});

// =============================================================================
// Voice Gender
// =============================================================================

/// Gender hint supplied with a synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Male,
    Female,
    #[default]
    Unspecified,
}

impl VoiceGender {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Unspecified => "unspecified",
        }
    }

    /// Parse from string, with fallback to `Unspecified`.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Self::Male,
            "female" | "f" => Self::Female,
            _ => Self::default(),
        }
    }
}

impl fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Voice Identifier
// =============================================================================

/// A locale-qualified voice identifier understood by the synthesis engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceId(String);

impl VoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Locale portion of the identifier (`en-US` for `en-US-JennyNeural`).
    ///
    /// Returns `None` when the identifier does not start with a locale.
    pub fn locale(&self) -> Option<&str> {
        if !QUALIFIED_VOICE.is_match(&self.0) {
            return None;
        }
        let dashes = if self.0.split('-').nth(1).is_some_and(|s| s.len() == 4) {
            3
        } else {
            2
        };
        self.0
            .match_indices('-')
            .nth(dashes - 1)
            .map(|(idx, _)| &self.0[..idx])
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns true when `name` already names a locale-qualified voice.
pub fn is_qualified_voice(name: &str) -> bool {
    QUALIFIED_VOICE.is_match(name)
}

// =============================================================================
// Voice Table
// =============================================================================

/// Explicit resolution table: short-form aliases plus per-gender defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTable {
    pub male_default: String,
    pub female_default: String,
    pub aliases: HashMap<String, String>,
}

impl Default for VoiceTable {
    fn default() -> Self {
        let aliases = [
            ("JennyNeural", "en-US-JennyNeural"),
            ("AndrewNeural", "en-US-AndrewNeural"),
            ("FableNeural", "en-US-FableNeural"),
        ]
        .into_iter()
        .map(|(short, full)| (short.to_string(), full.to_string()))
        .collect();

        Self {
            male_default: DEFAULT_MALE_VOICE.to_string(),
            female_default: DEFAULT_FEMALE_VOICE.to_string(),
            aliases,
        }
    }
}

impl VoiceTable {
    /// Resolve a voice request to exactly one identifier. Never fails.
    ///
    /// 1. a known short form maps to its fixed identifier
    /// 2. an already qualified identifier passes through unchanged
    /// 3. anything else falls back to the gender default
    pub fn resolve(&self, voice_name: Option<&str>, gender: VoiceGender) -> VoiceId {
        if let Some(name) = voice_name.map(str::trim).filter(|n| !n.is_empty()) {
            if let Some(full) = self.aliases.get(name) {
                return VoiceId::new(full.clone());
            }
            if is_qualified_voice(name) {
                return VoiceId::new(name);
            }
        }

        self.default_for(gender)
    }

    /// Default voice for a gender hint.
    pub fn default_for(&self, gender: VoiceGender) -> VoiceId {
        match gender {
            VoiceGender::Male => VoiceId::new(self.male_default.clone()),
            VoiceGender::Female | VoiceGender::Unspecified => {
                VoiceId::new(self.female_default.clone())
            }
        }
    }
}
