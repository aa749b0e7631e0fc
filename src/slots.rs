// src/slots.rs
//! # Slot Allocator
//! Projects `(pool, offset)` onto the fixed layout: a cyclic window of
//! `total` items, padded with placeholders when the pool is short, cut into
//! four contiguous named regions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;
use crate::ingest::CanonicalItem;

pub const REGION_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub name: String,
    pub size: usize,
}

impl RegionSpec {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Validated four-region layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLayout {
    regions: Vec<RegionSpec>,
    total: usize,
}

impl SlotLayout {
    pub fn new(regions: Vec<RegionSpec>) -> Result<Self, ConfigError> {
        if regions.len() != REGION_COUNT {
            return Err(ConfigError::RegionCount(regions.len()));
        }
        if let Some(index) = regions.iter().position(|r| r.name.trim().is_empty()) {
            return Err(ConfigError::EmptyRegionName { index });
        }
        let total = regions.iter().map(|r| r.size).sum();
        if total == 0 {
            return Err(ConfigError::EmptyLayout);
        }
        Ok(Self { regions, total })
    }

    /// Reference deployment: 6 + 1 + 6 + 9 = 22 slots.
    pub fn reference() -> Self {
        Self {
            regions: default_regions(),
            total: 22,
        }
    }

    pub fn regions(&self) -> &[RegionSpec] {
        &self.regions
    }

    /// Number of displayed slots across all regions.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn allocate(&self, pool: &[CanonicalItem], offset: usize) -> Allocation {
        let window = display_window(pool, offset, self.total);
        let padded = window.iter().filter(|i| i.is_placeholder()).count();

        let mut slots = window
            .into_iter()
            .enumerate()
            .map(|(position, item)| Slot {
                key: slot_key(&item.link, position),
                position,
                item,
            });

        let regions = self
            .regions
            .iter()
            .map(|spec| Region {
                name: spec.name.clone(),
                slots: slots.by_ref().take(spec.size).collect(),
            })
            .collect();

        Allocation { regions, padded }
    }
}

pub fn default_regions() -> Vec<RegionSpec> {
    vec![
        RegionSpec::new("hero", 6),
        RegionSpec::new("spotlight", 1),
        RegionSpec::new("grid", 6),
        RegionSpec::new("ticker", 9),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub key: String,
    pub position: usize,
    pub item: CanonicalItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub name: String,
    pub slots: Vec<Slot>,
}

/// Transient render projection; owns copies, never the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub regions: Vec<Region>,
    /// Slots filled with placeholders because the pool was short.
    pub padded: usize,
}

impl Allocation {
    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn slot_count(&self) -> usize {
        self.regions.iter().map(|r| r.slots.len()).sum()
    }
}

/// `total` consecutive items from `offset`, wrapping around the pool.
/// A pool shorter than `total` is shown once and padded with placeholders.
pub fn display_window(pool: &[CanonicalItem], offset: usize, total: usize) -> Vec<CanonicalItem> {
    if pool.is_empty() {
        return vec![CanonicalItem::placeholder(); total];
    }
    let start = offset % pool.len();
    let take = total.min(pool.len());

    let mut window: Vec<CanonicalItem> = pool
        .iter()
        .cycle()
        .skip(start)
        .take(take)
        .cloned()
        .collect();
    window.resize(total, CanonicalItem::placeholder());
    window
}

/// Render key from link + window position: stable while the same item sits
/// in the same slot, distinct when one link shows up twice.
pub fn slot_key(link: &str, position: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(link.as_bytes());
    hasher.update([0x1f]);
    hasher.update(position.to_le_bytes());
    hasher
        .finalize()
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}
