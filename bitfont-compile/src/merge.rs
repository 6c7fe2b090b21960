//! Combining faces into output tables.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Deserialize;

use crate::face::{FaceMap, NormalizedGlyph};

/// Which end of a table's layer list has the highest priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerOrder {
    /// The first listed layer wins.
    #[default]
    FirstListed,
    /// The last listed layer wins.
    LastListed,
}

/// The glyphs of one output table, sorted by code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergedTable {
    glyphs: BTreeMap<u32, NormalizedGlyph>,
}

impl MergedTable {
    /// Merge `layers`, given in list order, according to `order`.
    ///
    /// A code taken from a higher priority layer is never replaced by a lower
    /// one. Layers are expected to cover disjoint repertoires, so collisions
    /// are reported, but they are not an error.
    pub fn merge(layers: &[&FaceMap], order: LayerOrder) -> Self {
        let mut ordered = layers.to_vec();
        if order == LayerOrder::LastListed {
            ordered.reverse();
        }
        let mut table = MergedTable::default();
        for layer in ordered {
            let shadowed = table.add_missing(layer.iter());
            if shadowed > 0 {
                warn!(
                    "{} of {} glyphs in '{}' are already provided by a higher priority layer",
                    shadowed,
                    layer.len(),
                    layer.name()
                );
            }
        }
        table
    }

    /// Fill in codes this table lacks from `fallback`.
    ///
    /// Codes already present are left alone. Returns the number of glyphs
    /// added.
    pub fn apply_fallback(&mut self, fallback: &MergedTable) -> usize {
        let before = self.len();
        self.add_missing(fallback.iter());
        self.len() - before
    }

    /// Insert each glyph whose code is not yet present; returns the number
    /// that were skipped.
    fn add_missing<'a>(&mut self, glyphs: impl Iterator<Item = &'a NormalizedGlyph>) -> usize {
        let mut skipped = 0;
        for glyph in glyphs {
            if self.glyphs.contains_key(&glyph.code) {
                debug!("U+{:04X} already present, skipping", glyph.code);
                skipped += 1;
            } else {
                self.glyphs.insert(glyph.code, glyph.clone());
            }
        }
        skipped
    }

    pub fn get(&self, code: u32) -> Option<&NormalizedGlyph> {
        self.glyphs.get(&code)
    }

    pub fn contains(&self, code: u32) -> bool {
        self.glyphs.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Iterate glyphs in ascending code order.
    pub fn iter(&self) -> impl Iterator<Item = &NormalizedGlyph> + '_ {
        self.glyphs.values()
    }

    pub fn max_code(&self) -> Option<u32> {
        self.glyphs.last_key_value().map(|(code, _)| *code)
    }
}

impl FromIterator<NormalizedGlyph> for MergedTable {
    /// Collect glyphs; on duplicate codes the first one wins.
    fn from_iter<T: IntoIterator<Item = NormalizedGlyph>>(iter: T) -> Self {
        let mut glyphs = BTreeMap::new();
        for glyph in iter {
            glyphs.entry(glyph.code).or_insert(glyph);
        }
        MergedTable { glyphs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(code: u32, fill: u16) -> NormalizedGlyph {
        NormalizedGlyph {
            code,
            is_full: code > 0xFF,
            rows: [fill; 12],
        }
    }

    fn face(name: &str, glyphs: &[NormalizedGlyph]) -> FaceMap {
        let mut face = FaceMap::new(name);
        for glyph in glyphs {
            face.insert(glyph.clone());
        }
        face
    }

    #[test]
    fn first_seen_wins() {
        let a = face("a", &[glyph(0x41, 1)]);
        let b = face("b", &[glyph(0x41, 2), glyph(0x42, 3)]);
        let merged = MergedTable::merge(&[&a, &b], LayerOrder::FirstListed);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get(0x41), Some(&glyph(0x41, 1)));
        assert_eq!(merged.get(0x42), Some(&glyph(0x42, 3)));
    }

    #[test]
    fn last_listed_order() {
        let a = face("a", &[glyph(0x41, 1)]);
        let b = face("b", &[glyph(0x41, 2), glyph(0x42, 3)]);
        let merged = MergedTable::merge(&[&a, &b], LayerOrder::LastListed);
        assert_eq!(merged.get(0x41), Some(&glyph(0x41, 2)));
        assert_eq!(merged.get(0x42), Some(&glyph(0x42, 3)));
    }

    #[test]
    fn every_layer_code_is_kept() {
        let a = face("a", &[glyph(0x3042, 1), glyph(0x41, 1)]);
        let b = face("b", &[glyph(0x20AC, 2), glyph(0x41, 2)]);
        let c = face("c", &[glyph(0x1F600, 3)]);
        let merged = MergedTable::merge(&[&a, &b, &c], LayerOrder::FirstListed);
        for layer in [&a, &b, &c] {
            assert!(layer.iter().all(|g| merged.contains(g.code)));
        }
        let codes: Vec<_> = merged.iter().map(|g| g.code).collect();
        assert_eq!(codes, [0x41, 0x20AC, 0x3042, 0x1F600]);
        assert_eq!(merged.max_code(), Some(0x1F600));
    }

    #[test]
    fn fallback_only_fills_gaps() {
        let mut primary = MergedTable::from_iter([glyph(0x3000, 1), glyph(0x3043, 1)]);
        let fallback = MergedTable::from_iter([glyph(0x3042, 2), glyph(0x3043, 2)]);
        let original = primary.clone();

        assert_eq!(primary.apply_fallback(&fallback), 1);
        assert_eq!(primary.get(0x3042), Some(&glyph(0x3042, 2)));
        for glyph in original.iter() {
            assert_eq!(primary.get(glyph.code), Some(glyph));
        }
        assert_eq!(primary.len(), 3);
    }

    #[test]
    fn empty() {
        let merged = MergedTable::merge(&[], LayerOrder::FirstListed);
        assert!(merged.is_empty());
        assert_eq!(merged.max_code(), None);
    }
}
