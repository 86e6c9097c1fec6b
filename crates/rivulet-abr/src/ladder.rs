use std::sync::Arc;

use serde::Serialize;

use crate::types::{ManifestLevel, QualitySelection};

/// Label shown for the synthetic automatic entry.
pub const AUTO_LABEL: &str = "Auto";

/// One encoded quality variant of the current resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rendition {
    /// Transport level index (stable for the session).
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// Advertised bitrate in bits per second.
    pub bitrate_bps: u64,
    /// Human-readable name, e.g. `720p`.
    pub label: String,
}

impl Rendition {
    #[must_use]
    pub fn from_level(index: usize, level: &ManifestLevel) -> Self {
        Self {
            index,
            width: level.width,
            height: level.height,
            bitrate_bps: level.bitrate_bps,
            label: format!("{}p", level.height),
        }
    }
}

/// Quality-menu entry: either the synthetic Auto entry or a rendition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LadderEntry {
    pub selection: QualitySelection,
    pub label: String,
    /// Zero for the Auto entry.
    pub bitrate_bps: u64,
}

/// Renditions ordered from highest to lowest quality.
///
/// Built once per resource from the parsed manifest and never mutated.
/// Ladder *positions* (0 = best) differ from transport *indices*; lookups
/// take indices, ordering questions are answered in positions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QualityLadder {
    renditions: Arc<[Rendition]>,
}

impl QualityLadder {
    /// Build the ladder from manifest levels listed in transport order.
    #[must_use]
    pub fn from_levels(levels: &[ManifestLevel]) -> Self {
        let mut renditions: Vec<Rendition> = levels
            .iter()
            .enumerate()
            .map(|(index, level)| Rendition::from_level(index, level))
            .collect();
        // Stable: equal heights keep manifest order.
        renditions.sort_by(|a, b| b.height.cmp(&a.height));
        Self {
            renditions: renditions.into(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.renditions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.renditions.len()
    }

    /// Renditions, highest quality first.
    #[must_use]
    pub fn renditions(&self) -> &[Rendition] {
        &self.renditions
    }

    /// Menu entries: Auto first, then renditions highest quality first.
    #[must_use]
    pub fn entries(&self) -> Vec<LadderEntry> {
        std::iter::once(LadderEntry {
            selection: QualitySelection::Auto,
            label: AUTO_LABEL.to_owned(),
            bitrate_bps: 0,
        })
        .chain(self.renditions.iter().map(|r| LadderEntry {
            selection: QualitySelection::Level(r.index),
            label: r.label.clone(),
            bitrate_bps: r.bitrate_bps,
        }))
        .collect()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Rendition> {
        self.renditions.iter().find(|r| r.index == index)
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Ladder position of a transport index (0 = highest quality).
    #[must_use]
    pub fn position(&self, index: usize) -> Option<usize> {
        self.renditions.iter().position(|r| r.index == index)
    }

    #[must_use]
    pub fn bitrate(&self, index: usize) -> Option<u64> {
        self.get(index).map(|r| r.bitrate_bps)
    }

    /// Lowest-quality rendition.
    #[must_use]
    pub fn lowest(&self) -> Option<&Rendition> {
        self.renditions.last()
    }

    /// Label for a selection; unknown levels fall back to Auto.
    #[must_use]
    pub fn label_for(&self, selection: QualitySelection) -> &str {
        match selection {
            QualitySelection::Auto => AUTO_LABEL,
            QualitySelection::Level(idx) => {
                self.get(idx).map_or(AUTO_LABEL, |r| r.label.as_str())
            }
        }
    }
}
