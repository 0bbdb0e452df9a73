//! Parameter diff engine.
//!
//! `diff_params` computes which slicer parameters changed relative to the
//! chronologically previous print; `categorize` groups every parameter into a
//! display bucket. Both are pure functions of their inputs.

use crate::gcode::ParamMap;
use serde::Serialize;
use std::collections::BTreeSet;

/// Display categories, matched against parameter names by case-insensitive
/// prefix in priority order. First match wins; anything unmatched falls into
/// [`FALLBACK_CATEGORY`]. Kept as data so the table is extensible without
/// touching the matching logic.
pub const CATEGORIES: &[&str] = &[
    "filament",
    "support",
    "infill",
    "fill",
    "perimeter",
    "layer",
    "temperature",
    "temp",
    "speed",
    "cooling",
    "fan",
    "retract",
    "skirt",
    "brim",
    "raft",
    "bed",
    "nozzle",
    "general",
];

pub const FALLBACK_CATEGORY: &str = "other";

/// Keys present in `current` whose value differs from `previous` (a key
/// missing in `previous` counts as changed). If either side is empty there is
/// no baseline to compare against and the result is empty.
pub fn diff_params(current: &ParamMap, previous: &ParamMap) -> BTreeSet<String> {
    if current.is_empty() || previous.is_empty() {
        return BTreeSet::new();
    }
    current
        .iter()
        .filter(|(key, value)| previous.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect()
}

/// The category a single parameter name belongs to.
pub fn category_for(key: &str) -> &'static str {
    let lowered = key.to_ascii_lowercase();
    CATEGORIES
        .iter()
        .find(|category| lowered.starts_with(**category))
        .copied()
        .unwrap_or(FALLBACK_CATEGORY)
}

/// One parameter within a category bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamEntry {
    pub name: String,
    pub value: String,
    pub changed: bool,
}

/// A named bucket of parameters, in the fixed category order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryBucket {
    pub name: &'static str,
    pub entries: Vec<ParamEntry>,
}

/// All parameters of one print, grouped for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorizedView {
    pub categories: Vec<CategoryBucket>,
}

/// Partition every key of `mapping` into exactly one category bucket, marking
/// entries whose key appears in `changed`. Empty buckets are omitted; bucket
/// order follows [`CATEGORIES`] with [`FALLBACK_CATEGORY`] last.
pub fn categorize(mapping: &ParamMap, changed: &BTreeSet<String>) -> CategorizedView {
    let mut categories = Vec::new();
    for category in CATEGORIES.iter().copied().chain([FALLBACK_CATEGORY]) {
        let entries: Vec<ParamEntry> = mapping
            .iter()
            .filter(|(key, _)| category_for(key) == category)
            .map(|(key, value)| ParamEntry {
                name: key.clone(),
                value: value.clone(),
                changed: changed.contains(key),
            })
            .collect();
        if !entries.is_empty() {
            categories.push(CategoryBucket { name: category, entries });
        }
    }
    CategorizedView { categories }
}
