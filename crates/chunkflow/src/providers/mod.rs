//! Collaborator contracts for conversion and enrichment
//!
//! The batch pipeline only talks to these traits; concrete converters and
//! LLM clients are supplied by the caller.

pub mod converter;
pub mod enrichment;

pub use converter::{ContentConverter, TextConverter};
pub use enrichment::Enricher;
