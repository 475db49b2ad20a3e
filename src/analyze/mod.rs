// src/analyze/mod.rs
//! Scoring pipeline: keyword tables, noise filter, authority list and the
//! engine that combines them into `(score, category)`.

pub mod authority;
pub mod noise;
pub mod rules;
pub mod scoring;

// Re-export convenient types.
pub use crate::analyze::authority::AuthorityList;
pub use crate::analyze::noise::{NoiseFilter, NoiseVerdict};
pub use crate::analyze::rules::{KeywordTable, CategoryMatch};
pub use crate::analyze::scoring::{ScoreBreakdown, ScoringEngine};
