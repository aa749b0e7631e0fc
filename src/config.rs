// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregator::PoolSettings;
use crate::error::ConfigError;
use crate::ingest::transport::FIXTURE_SCHEME;
use crate::ingest::FeedSource;
use crate::rotation::RotationTiming;
use crate::slots::{default_regions, RegionSpec, SlotLayout};

pub const ENV_CONFIG_PATH: &str = "CAROUSEL_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/carousel.toml";
pub const DEFAULT_JSON_PATH: &str = "config/carousel.json";

/// Service configuration. Every field has a default, so a partial file works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarouselConfig {
    pub sources: Vec<FeedSource>,
    pub regions: Vec<RegionSpec>,
    pub preload_multiplier: usize,
    pub rotation_interval_secs: u64,
    pub transition_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    /// 0 disables the periodic reload.
    pub refresh_interval_secs: u64,
    pub user_agent: String,
    /// Per-source normalizer cap; defaults to twice the preload count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items_per_source: Option<usize>,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            regions: default_regions(),
            preload_multiplier: 5,
            rotation_interval_secs: 120,
            transition_delay_ms: 500,
            fetch_timeout_secs: 20,
            refresh_interval_secs: 900,
            user_agent: concat!("feed-carousel/", env!("CARGO_PKG_VERSION")).to_string(),
            max_items_per_source: None,
        }
    }
}

impl CarouselConfig {
    /// Number of slots across all four regions.
    pub fn total_displayed(&self) -> usize {
        self.regions.iter().map(|r| r.size).sum()
    }

    pub fn preload_count(&self) -> usize {
        self.total_displayed() * self.preload_multiplier
    }

    pub fn max_items_per_source(&self) -> usize {
        self.max_items_per_source
            .unwrap_or_else(|| 2 * self.preload_count())
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            preload_count: self.preload_count(),
            total_displayed: self.total_displayed(),
        }
    }

    pub fn rotation_timing(&self) -> RotationTiming {
        RotationTiming {
            interval: Duration::from_secs(self.rotation_interval_secs),
            transition: Duration::from_millis(self.transition_delay_ms),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }

    pub fn layout(&self) -> Result<SlotLayout, ConfigError> {
        SlotLayout::new(self.regions.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout()?;
        if self.preload_multiplier == 0 {
            return Err(ConfigError::PreloadMultiplier);
        }
        if self.rotation_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        let interval_ms = self.rotation_interval_secs.saturating_mul(1_000);
        if self.transition_delay_ms >= interval_ms {
            return Err(ConfigError::TransitionTooLong {
                delay_ms: self.transition_delay_ms,
                interval_ms,
            });
        }
        for (index, src) in self.sources.iter().enumerate() {
            if src.name.trim().is_empty() {
                return Err(ConfigError::EmptySourceName { index });
            }
            if !is_supported_url(&src.url) {
                return Err(ConfigError::BadSourceUrl {
                    name: src.name.clone(),
                    url: src.url.clone(),
                });
            }
        }
        Ok(())
    }
}

fn is_supported_url(raw: &str) -> bool {
    let raw = raw.trim();
    if let Some(path) = raw.strip_prefix(FIXTURE_SCHEME) {
        return !path.is_empty();
    }
    url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

/// Load and validate config from an explicit path. Supports TOML or JSON.
pub fn load_from(path: &Path) -> Result<CarouselConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading carousel config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validating {}", path.display()))?;
    Ok(cfg)
}

/// Resolve config using explicit path + env var + fallbacks:
/// 1) `explicit`
/// 2) $CAROUSEL_CONFIG_PATH
/// 3) config/carousel.toml
/// 4) config/carousel.json
/// 5) built-in defaults (no sources)
pub fn load(explicit: Option<&Path>) -> Result<CarouselConfig> {
    if let Some(p) = explicit {
        return load_from(p);
    }
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_from(&p);
        }
    }
    Ok(CarouselConfig::default())
}

pub fn load_default() -> Result<CarouselConfig> {
    load(None)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<CarouselConfig> {
    match hint_ext {
        "toml" => return Ok(toml::from_str(s)?),
        "json" => return Ok(serde_json::from_str(s)?),
        _ => {}
    }
    // Unknown extension: sniff.
    if s.trim_start().starts_with('{') {
        if let Ok(v) = serde_json::from_str(s) {
            return Ok(v);
        }
    }
    toml::from_str(s).map_err(|e| anyhow!("unsupported carousel config format: {e}"))
}
