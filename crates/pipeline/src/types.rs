use {
    serde::{Deserialize, Deserializer, Serialize},
    serde_json::Value,
};

use crate::quality::Tier;

/// Placeholder shown for any metadata field the source didn't provide.
pub const UNKNOWN: &str = "Unknown";

/// A discovered content item, as returned by search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    /// Opaque handle passed back to the source for details and links.
    pub locator: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub hints: CandidateHints,
}

/// Free-text hints shown next to a candidate. Never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateHints {
    pub language: Option<String>,
    pub quality: Option<String>,
    pub format: Option<String>,
}

impl CandidateHints {
    /// Present hints joined for display, e.g. "Sinhala · 1080p".
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.language, &self.quality, &self.format]
            .into_iter()
            .filter_map(|h| h.as_deref())
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" · "))
    }
}

/// Descriptive attributes of a selected candidate.
///
/// Every field may be missing, null, or of the wrong type; each one falls back
/// on its own without failing the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub duration: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub rating: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub year: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub genres: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub cast: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub crew: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub thumbnail: Option<String>,
}

/// Strings and numbers become text; anything else is treated as missing.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Value::deserialize(deserializer).map(scalar_text)
}

/// An array keeps its scalar items, a lone string is a one-item list.
fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    })
}

impl Metadata {
    #[must_use]
    pub fn title_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        or_unknown_with(&self.title, fallback)
    }

    #[must_use]
    pub fn duration(&self) -> &str {
        or_unknown(&self.duration)
    }

    #[must_use]
    pub fn rating(&self) -> &str {
        or_unknown(&self.rating)
    }

    #[must_use]
    pub fn year(&self) -> &str {
        or_unknown(&self.year)
    }

    #[must_use]
    pub fn description(&self) -> &str {
        or_unknown(&self.description)
    }

    #[must_use]
    pub fn genres(&self) -> String {
        join_or_unknown(&self.genres)
    }

    #[must_use]
    pub fn cast(&self) -> String {
        join_or_unknown(&self.cast)
    }

    #[must_use]
    pub fn crew(&self) -> String {
        join_or_unknown(&self.crew)
    }
}

fn or_unknown(field: &Option<String>) -> &str {
    or_unknown_with(field, UNKNOWN)
}

fn or_unknown_with<'a>(field: &'a Option<String>, fallback: &'a str) -> &'a str {
    field
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
}

fn join_or_unknown(items: &[String]) -> String {
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        UNKNOWN.to_string()
    } else {
        items.join(", ")
    }
}

/// A link as the source lists it, before quality normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub locator: String,
    /// Free-text quality label ("FHD 1080p", "HD 720p", ...).
    #[serde(default)]
    pub label: String,
    /// Hosting server name ("Pixeldrain", "Telegram", ...).
    #[serde(default)]
    pub server: Option<String>,
    /// Size as the source displays it ("1.4 GB").
    #[serde(default)]
    pub size: Option<String>,
    /// `false` when `locator` points at an intermediate page that has to be
    /// resolved before fetching.
    #[serde(default = "default_true")]
    pub direct: bool,
}

fn default_true() -> bool {
    true
}

/// A single retrievable asset with its canonical tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityLink {
    /// Direct-fetch locator.
    pub locator: String,
    pub tier: Tier,
    /// Original label the tier was derived from.
    pub label: String,
    pub server: Option<String>,
    pub size: Option<String>,
}
