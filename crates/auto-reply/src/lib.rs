//! Inbound message handling: the glue between a channel and the retrieval pipeline.
//!
//! Flow: inbound event → [`CommandRouter`] (keyword command, or a continuation
//! of the sender's pending session) → workflow handler → pipeline stage →
//! session update → reply via the channel outbound.

pub mod error;
pub mod format;
pub mod help;
pub mod router;
pub mod workflow;

pub use {
    error::{Error, Result},
    help::HelpCommand,
    router::{CommandContext, CommandRouter, CommandSpec, Continuation, Dispatch, KeywordCommand},
    workflow::{
        ACQUISITION_KEEPALIVE, QualityContinuation, SearchCommand, SelectionContinuation, install,
    },
};
