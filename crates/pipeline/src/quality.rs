//! Canonical quality tiers for free-text labels like "FHD 1080p WEB-DL".
//!
//! [`normalize`] is the only place labels are interpreted; dedup and ordering of
//! link lists go through [`rank_links`].

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

use crate::types::QualityLink;

/// Quality tier, declared best-first so the derived `Ord` is the rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "4K")]
    Uhd4k,
    #[serde(rename = "1080p")]
    Fhd1080p,
    #[serde(rename = "720p")]
    Hd720p,
    #[serde(rename = "480p")]
    Sd480p,
    Unknown,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Self::Uhd4k,
        Self::Fhd1080p,
        Self::Hd720p,
        Self::Sd480p,
        Self::Unknown,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uhd4k => "4K",
            Self::Fhd1080p => "1080p",
            Self::Hd720p => "720p",
            Self::Sd480p => "480p",
            Self::Unknown => "Unknown",
        }
    }

    /// Sort key: lower is better.
    #[must_use]
    pub fn rank(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution markers are checked before the textual ones so "HDTV 480p" is 480p.
const NUMERIC_MARKERS: &[(&str, Tier)] = &[
    ("2160", Tier::Uhd4k),
    ("4k", Tier::Uhd4k),
    ("1080", Tier::Fhd1080p),
    ("720", Tier::Hd720p),
    ("480", Tier::Sd480p),
];

/// "uhd" and "fhd" both contain "hd", so the longer markers go first.
const TEXT_MARKERS: &[(&str, Tier)] = &[
    ("uhd", Tier::Uhd4k),
    ("fhd", Tier::Fhd1080p),
    ("hd", Tier::Hd720p),
    ("sd", Tier::Sd480p),
];

/// Map a free-text quality label to its tier.
#[must_use]
pub fn normalize(label: &str) -> Tier {
    let label = label.to_lowercase();
    NUMERIC_MARKERS
        .iter()
        .chain(TEXT_MARKERS)
        .find(|(marker, _)| label.contains(marker))
        .map_or(Tier::Unknown, |(_, tier)| *tier)
}

/// Same as [`Tier::rank`], as a free function for sort keys.
#[must_use]
pub fn rank(tier: Tier) -> u8 {
    tier.rank()
}

/// Drop later links whose tier was already seen, then order best-first.
#[must_use]
pub fn rank_links(links: impl IntoIterator<Item = QualityLink>) -> Vec<QualityLink> {
    let mut seen = HashSet::new();
    let mut out: Vec<QualityLink> = links
        .into_iter()
        .filter(|link| seen.insert(link.tier))
        .collect();
    out.sort_by_key(|link| rank(link.tier));
    out
}
