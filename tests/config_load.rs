// tests/config_load.rs
use feed_carousel::config::{load_from, CarouselConfig};
use std::path::Path;

#[test]
fn shipped_config_is_valid() {
    let cfg = load_from(Path::new("config/carousel.toml")).expect("shipped config loads");
    assert_eq!(cfg.total_displayed(), 22);
    assert_eq!(cfg.preload_count(), 110);
    assert!(cfg.sources.len() >= 2);
    assert!(cfg.sources.iter().all(|s| !s.name.trim().is_empty()));
}

#[test]
fn invalid_layout_is_reported_with_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let p = dir.path().join("bad.json");
    std::fs::write(&p, r#"{"regions":[{"name":"only","size":3}]}"#).expect("write");

    let err = load_from(&p).expect_err("three regions missing");
    let msg = format!("{err:#}");
    assert!(msg.contains("bad.json"), "{msg}");
    assert!(msg.contains("exactly 4"), "{msg}");
}

#[test]
fn defaults_roundtrip_through_json() {
    let text = serde_json::to_string(&CarouselConfig::default()).expect("serialize");
    let back: CarouselConfig = serde_json::from_str(&text).expect("deserialize");
    assert_eq!(back, CarouselConfig::default());
}
