//! Multi-stage retrieval pipeline: search → metadata → link extraction →
//! acquire and deliver, against a pluggable content [`Source`].
//!
//! Every stage is independently failable; failures surface as a
//! [`PipelineError`] carrying the message shown to the user.

pub mod asset;
pub mod error;
pub mod quality;
pub mod selection;
pub mod source;
pub mod stages;
pub mod types;

pub use {
    asset::AcquiredAsset,
    error::{PipelineError, Result, SourceError, SourceResult, Stage},
    quality::{Tier, normalize, rank},
    selection::{parse_selection, select},
    source::{AssetStream, HttpSource, Source},
    stages::{Delivered, DeliveryRequest, Pipeline},
    types::{Candidate, CandidateHints, Metadata, QualityLink, RawLink, UNKNOWN},
};
