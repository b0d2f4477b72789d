//! Ingestion, normalization and review-gated enrichment pipeline for
//! quarterly wildlife incident reports.
//!
//! Data flow: raw rows → structure scan (quarter contexts) → row parsing →
//! date normalization → local species detection → optional LLM enrichment →
//! review staging → bulk commit with per-record outcomes.

pub mod commit;
pub mod config;
pub mod detect;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod sheet;
pub mod staging;
