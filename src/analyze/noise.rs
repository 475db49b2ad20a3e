//! Noise suppression with immunity override.
//!
//! Emotionally charged, low-information terms mark a signal as noise unless
//! a substantive (policy / macro / legal) term is also present. One immunity
//! hit cancels any number of noise hits.

use super::rules::{any_keyword, compile_keywords};

#[derive(Debug, Clone, Default)]
pub struct NoiseFilter {
    noise: Vec<String>,
    immunity: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseVerdict {
    Clean,
    /// Noise terms present but cancelled by an immunity term.
    Immune,
    Noise,
}

impl NoiseFilter {
    pub fn new(noise: &[String], immunity: &[String]) -> Self {
        Self {
            noise: compile_keywords(noise),
            immunity: compile_keywords(immunity),
        }
    }

    /// `text` must be normalized (see `rules::normalize`).
    pub fn judge(&self, text: &str) -> NoiseVerdict {
        if !any_keyword(text, &self.noise) {
            return NoiseVerdict::Clean;
        }
        if any_keyword(text, &self.immunity) {
            NoiseVerdict::Immune
        } else {
            NoiseVerdict::Noise
        }
    }
}
