use std::{fmt, path::PathBuf, time::Duration};

use {
    reelbot_pipeline::{Candidate, Metadata, QualityLink},
    serde::{Deserialize, Serialize},
};

/// Which numbered list the user is expected to answer next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    /// A search result list was shown.
    AwaitingSelection,
    /// A quality list for the selected candidate was shown.
    AwaitingQuality,
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AwaitingSelection => "awaiting_selection",
            Self::AwaitingQuality => "awaiting_quality",
        })
    }
}

/// One user's in-progress workflow.
///
/// `AwaitingQuality` records always carry a selected candidate and at least
/// one link; the only way to build one is [`SessionRecord::with_quality_choices`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    stage: SessionStage,
    pub candidates: Vec<Candidate>,
    selected: Option<Candidate>,
    metadata: Option<Metadata>,
    links: Vec<QualityLink>,
    /// Temp file of an acquisition in flight; released if the record is swept.
    pub asset: Option<PathBuf>,
    pub created_at_ms: u64,
    pub last_touched_at_ms: u64,
}

impl SessionRecord {
    /// A fresh record after a search produced `candidates`.
    #[must_use]
    pub fn awaiting_selection(candidates: Vec<Candidate>, now_ms: u64) -> Self {
        Self {
            stage: SessionStage::AwaitingSelection,
            candidates,
            selected: None,
            metadata: None,
            links: Vec::new(),
            asset: None,
            created_at_ms: now_ms,
            last_touched_at_ms: now_ms,
        }
    }

    /// Advance to `AwaitingQuality`. Returns `None` when `links` is empty.
    #[must_use]
    pub fn with_quality_choices(
        self,
        selected: Candidate,
        metadata: Metadata,
        links: Vec<QualityLink>,
        now_ms: u64,
    ) -> Option<Self> {
        if links.is_empty() {
            return None;
        }
        Some(Self {
            stage: SessionStage::AwaitingQuality,
            selected: Some(selected),
            metadata: Some(metadata),
            links,
            last_touched_at_ms: now_ms,
            ..self
        })
    }

    #[must_use]
    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Candidate> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    #[must_use]
    pub fn links(&self) -> &[QualityLink] {
        &self.links
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_touched_at_ms = now_ms;
    }

    /// Idle for strictly longer than `ttl` as of `now_ms`.
    #[must_use]
    pub fn is_expired(&self, now_ms: u64, ttl: Duration) -> bool {
        now_ms.saturating_sub(self.last_touched_at_ms) > ttl.as_millis() as u64
    }
}
