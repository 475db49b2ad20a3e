// tests/config_example.rs
use signal_refinery::config::RefineryConfig;
use signal_refinery::ingest::providers::SourceRegistry;
use std::path::Path;

#[test]
fn shipped_example_config_loads_and_builds_registry() {
    let cfg = RefineryConfig::load_from(Path::new("config/refinery.example.toml")).unwrap();
    assert_eq!(cfg.freshness.threshold_minutes, 65);
    assert_eq!(cfg.sources.len(), 2);
    let twitter = &cfg.sources["twitter"];
    assert!(twitter.multi_tag);
    assert_eq!(twitter.scoring.categories[0].name, "Tech");
    assert_eq!(twitter.table_name("twitter"), "twitter_logs");

    let polymarket = &cfg.sources["polymarket"];
    assert_eq!(polymarket.featured[0].name, "SNIPER");
    assert_eq!(polymarket.featured[0].tag.as_deref(), Some("sniper"));
    assert_eq!(polymarket.scoring.tag_multipliers["TAIL_RISK"], 50.0);
    assert_eq!(polymarket.scoring.keyword_boosts[0].unless, vec!["warsh".to_string()]);
    assert!(polymarket.scoring.authority.is_empty());

    let registry = SourceRegistry::from_config(&cfg).unwrap();
    assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["polymarket", "twitter"]);
}
