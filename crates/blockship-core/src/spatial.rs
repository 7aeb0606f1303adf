//! Broad-phase spatial index over all dynamic solids
//!
//! An R-tree keyed by slack-expanded bounding boxes. Small moves stay inside
//! the stored envelope and cost nothing; queries return candidate ids only,
//! exact narrow-phase tests are the caller's job.

use ahash::AHashMap;
use blockship_grid::IRect;
use rstar::{RTree, RTreeObject, AABB};

use crate::ship::SolidId;

/// Fixed expansion applied to stored boxes to reduce update churn.
pub const SLACK_MARGIN: i32 = 2;

#[derive(Debug, Clone, PartialEq)]
struct TreeEntry {
    id: SolidId,
    envelope: AABB<[i32; 2]>,
}

impl RTreeObject for TreeEntry {
    type Envelope = AABB<[i32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Inclusive-corner envelope for a half-open pixel rectangle.
fn envelope_for(rect: IRect) -> AABB<[i32; 2]> {
    AABB::from_corners([rect.min.x, rect.min.y], [rect.max.x - 1, rect.max.y - 1])
}

/// Spatial index of every body and piston rectangle. Rebuilt per level load.
#[derive(Debug, Default)]
pub struct DynamicSolidTree {
    tree: RTree<TreeEntry>,
    /// Slack-expanded boxes as stored in the tree, for update/removal.
    stored: AHashMap<SolidId, IRect>,
}

impl DynamicSolidTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: SolidId) -> bool {
        self.stored.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }

    /// Register a solid. Inserting an id twice is a programmer error.
    pub fn insert(&mut self, id: SolidId, rect: IRect) {
        debug_assert!(!self.stored.contains_key(&id), "solid inserted twice: {id:?}");
        let expanded = rect.expand(SLACK_MARGIN);
        self.tree.insert(TreeEntry {
            id,
            envelope: envelope_for(expanded),
        });
        self.stored.insert(id, expanded);
    }

    /// Move a solid's box. A no-op while the new rectangle still fits in the
    /// stored slack envelope.
    pub fn update(&mut self, id: SolidId, rect: IRect) {
        let Some(&old) = self.stored.get(&id) else {
            debug_assert!(false, "update of unknown solid: {id:?}");
            return;
        };
        if old.contains_rect(rect) {
            return;
        }
        let removed = self.tree.remove(&TreeEntry {
            id,
            envelope: envelope_for(old),
        });
        debug_assert!(removed.is_some(), "stored box missing from tree: {id:?}");
        let expanded = rect.expand(SLACK_MARGIN);
        self.tree.insert(TreeEntry {
            id,
            envelope: envelope_for(expanded),
        });
        self.stored.insert(id, expanded);
    }

    /// Unregister a solid. Removing an unknown id is a programmer error.
    pub fn remove(&mut self, id: SolidId) {
        let Some(old) = self.stored.remove(&id) else {
            debug_assert!(false, "remove of unknown solid: {id:?}");
            return;
        };
        let removed = self.tree.remove(&TreeEntry {
            id,
            envelope: envelope_for(old),
        });
        debug_assert!(removed.is_some(), "stored box missing from tree: {id:?}");
    }

    /// Enumerate candidates whose slack envelope intersects `rect`.
    /// The visitor returns true to short-circuit ("blocking overlap found");
    /// the final result is whether any visitor call did.
    pub fn query_overlapping(&self, rect: IRect, mut visitor: impl FnMut(SolidId) -> bool) -> bool {
        if rect.is_empty() {
            return false;
        }
        for entry in self.tree.locate_in_envelope_intersecting(&envelope_for(rect)) {
            if visitor(entry.id) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ship::BlockKey;
    use glam::IVec2;
    use slotmap::KeyData;

    fn id(n: u64) -> SolidId {
        SolidId::Blocks(BlockKey::from(KeyData::from_ffi(n | (1 << 32))))
    }

    fn rect(x: i32, y: i32, w: i32, h: i32) -> IRect {
        IRect::from_pos_size(IVec2::new(x, y), IVec2::new(w, h))
    }

    fn collect(tree: &DynamicSolidTree, r: IRect) -> Vec<SolidId> {
        let mut out = Vec::new();
        tree.query_overlapping(r, |id| {
            out.push(id);
            false
        });
        out
    }

    #[test]
    fn test_insert_and_query() {
        let mut tree = DynamicSolidTree::new();
        tree.insert(id(1), rect(0, 0, 10, 10));
        tree.insert(id(2), rect(100, 100, 10, 10));

        let hits = collect(&tree, rect(5, 5, 10, 10));
        assert_eq!(hits, vec![id(1)]);
        assert!(collect(&tree, rect(500, 500, 5, 5)).is_empty());
    }

    #[test]
    fn test_query_short_circuits() {
        let mut tree = DynamicSolidTree::new();
        tree.insert(id(1), rect(0, 0, 10, 10));
        tree.insert(id(2), rect(2, 2, 10, 10));

        let mut visits = 0;
        let blocked = tree.query_overlapping(rect(0, 0, 20, 20), |_| {
            visits += 1;
            true
        });
        assert!(blocked);
        assert_eq!(visits, 1);
    }

    #[test]
    fn test_update_moves_entry() {
        let mut tree = DynamicSolidTree::new();
        tree.insert(id(1), rect(0, 0, 10, 10));
        tree.update(id(1), rect(200, 200, 10, 10));

        assert!(collect(&tree, rect(0, 0, 20, 20)).is_empty());
        assert_eq!(collect(&tree, rect(195, 195, 10, 10)), vec![id(1)]);
    }

    #[test]
    fn test_small_move_stays_within_slack() {
        let mut tree = DynamicSolidTree::new();
        tree.insert(id(1), rect(10, 10, 10, 10));
        // One pixel inside the slack margin: still answers queries correctly.
        tree.update(id(1), rect(11, 10, 10, 10));
        assert_eq!(collect(&tree, rect(15, 15, 2, 2)), vec![id(1)]);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut tree = DynamicSolidTree::new();
        tree.insert(id(1), rect(0, 0, 10, 10));
        tree.remove(id(1));
        assert!(tree.is_empty());
        assert!(collect(&tree, rect(0, 0, 20, 20)).is_empty());
    }
}
