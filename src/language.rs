//! Target languages the oracle is asked to answer in.
//!
//! The core never translates anything itself. It only carries the language
//! identifier into prompts, echoes it back on results and picks a speech
//! locale for emergency alerts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Bn,
    Ta,
    Te,
    Mr,
    Es,
    Fr,
    Ar,
    Zh,
}

pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language::En,
    Language::Hi,
    Language::Bn,
    Language::Ta,
    Language::Te,
    Language::Mr,
    Language::Es,
    Language::Fr,
    Language::Ar,
    Language::Zh,
];

impl Language {
    /// Two-letter identifier passed through to the oracle and echoed back.
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Hi => "hi",
            Self::Bn => "bn",
            Self::Ta => "ta",
            Self::Te => "te",
            Self::Mr => "mr",
            Self::Es => "es",
            Self::Fr => "fr",
            Self::Ar => "ar",
            Self::Zh => "zh",
        }
    }

    /// English name of the language, as used inside prompts.
    pub fn name(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Hi => "Hindi",
            Self::Bn => "Bengali",
            Self::Ta => "Tamil",
            Self::Te => "Telugu",
            Self::Mr => "Marathi",
            Self::Es => "Spanish",
            Self::Fr => "French",
            Self::Ar => "Arabic",
            Self::Zh => "Chinese",
        }
    }

    /// BCP 47 tag handed to text-to-speech.
    pub fn speech_locale(&self) -> &'static str {
        match self {
            Self::En => "en-US",
            Self::Hi => "hi-IN",
            Self::Bn => "bn-IN",
            Self::Ta => "ta-IN",
            Self::Te => "te-IN",
            Self::Mr => "mr-IN",
            Self::Es => "es-ES",
            Self::Fr => "fr-FR",
            Self::Ar => "ar-SA",
            Self::Zh => "zh-CN",
        }
    }

    /// Pick a language from a locale tag such as `hi-IN` or `fr_FR.UTF-8`.
    /// Unsupported or empty tags resolve to English.
    pub fn from_locale(tag: &str) -> Self {
        let primary = tag
            .trim()
            .split(['-', '_', '.'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        primary.parse().unwrap_or_default()
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language code: {0}")]
pub struct UnsupportedLanguage(pub String);

impl std::str::FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SUPPORTED_LANGUAGES
            .iter()
            .copied()
            .find(|lang| lang.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnsupportedLanguage(s.to_string()))
    }
}
