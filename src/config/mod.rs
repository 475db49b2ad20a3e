// src/config/mod.rs
pub mod env;
pub mod tuning;

pub use env::{AppEnv, ArtifactTarget, IngestMode, VaultHistory};
pub use tuning::{
    CategoryRule, DigestSettings, FeaturedPool, FreshnessSettings, IngestSettings, KeywordBoost,
    RefineryConfig, ScoringProfile, SelectionSettings, SourceProfile,
};
