//! TTS voice catalog
//!
//! Voice ids look like `af_bella`: the first letter of the prefix encodes
//! the language, the second the gender.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prefixes of female voices
const FEMALE_PREFIXES: [&str; 9] = ["af", "bf", "ef", "ff", "hf", "if", "jf", "pf", "zf"];

/// Voice gender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Female => f.write_str("female"),
            Self::Male => f.write_str("male"),
        }
    }
}

/// Selectable TTS voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Voice id passed to synthesis (e.g. "af_bella")
    pub id: String,

    /// Display name (e.g. "Bella")
    pub name: String,

    /// Language tag
    pub language: String,

    /// Gender inferred from the id prefix
    pub gender: Gender,
}

impl Voice {
    /// Parse a catalog id of the form `<prefix>_<name>`
    ///
    /// Returns `None` for ids without a name part.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        let (prefix, name) = id.split_once('_')?;
        if prefix.is_empty() || name.is_empty() {
            return None;
        }

        let gender = if FEMALE_PREFIXES.contains(&prefix) {
            Gender::Female
        } else {
            Gender::Male
        };

        Some(Self {
            id: id.to_string(),
            name: capitalize(name),
            language: language_for(prefix).to_string(),
            gender,
        })
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn language_for(prefix: &str) -> &'static str {
    match prefix.chars().next() {
        Some('a') => "en-US",
        Some('b') => "en-GB",
        Some('e') => "es",
        Some('f') => "fr",
        Some('h') => "hi",
        Some('i') => "it",
        Some('j') => "ja",
        Some('p') => "pt-BR",
        Some('z') => "zh",
        _ => "en",
    }
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    voices: Vec<String>,
}

/// Fetch the voice catalog from `url`
///
/// # Errors
///
/// Returns error if the request fails or the response is malformed
pub async fn fetch_voices(client: &reqwest::Client, url: &str) -> Result<Vec<Voice>> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Tts(format!("failed to fetch voices: {status}")));
    }

    let body: VoicesResponse = response.json().await?;
    let voices: Vec<Voice> = body
        .voices
        .iter()
        .filter_map(|id| {
            let voice = Voice::from_id(id);
            if voice.is_none() {
                tracing::debug!(id = %id, "skipping malformed voice id");
            }
            voice
        })
        .collect();

    tracing::debug!(count = voices.len(), "fetched voice catalog");
    Ok(voices)
}
