//! Connectivity traversal over the body/piston link graph

use ahash::AHashSet;

use super::{BlockKey, PartArena, PistonKey, PistonSide, SolidId};

/// Result of a connectivity query: every body and piston rigidly reachable
/// through piston links, plus a combined id set for O(1) membership tests
/// during collision queries.
#[derive(Debug, Clone, Default)]
pub struct ConnectedParts {
    pub blocks: AHashSet<BlockKey>,
    pub pistons: AHashSet<PistonKey>,
    pub ids: AHashSet<SolidId>,
    /// Set when a requested skip side turned out to sit on a cycle; the
    /// severed piston would not actually disconnect the graph, so the
    /// traversal aborted and the part sets are not meaningful.
    pub cant_skip_because_of_cycle: bool,
}

impl ConnectedParts {
    pub fn new() -> Self {
        Self::default()
    }

    /// A group of exactly one body, for single-body collision tests.
    pub fn single_blocks(key: BlockKey) -> Self {
        let mut ret = Self::default();
        ret.insert_blocks(key);
        ret
    }

    pub fn contains(&self, id: SolidId) -> bool {
        self.ids.contains(&id)
    }

    /// Merge another group in. Id sets stay consistent with the part sets.
    pub fn append(&mut self, other: &ConnectedParts) {
        self.blocks.extend(other.blocks.iter().copied());
        self.pistons.extend(other.pistons.iter().copied());
        self.ids.extend(other.ids.iter().copied());
    }

    fn insert_blocks(&mut self, key: BlockKey) -> bool {
        let inserted = self.blocks.insert(key);
        if inserted {
            self.ids.insert(SolidId::Blocks(key));
        }
        inserted
    }

    fn insert_piston(&mut self, key: PistonKey) {
        if self.pistons.insert(key) {
            self.ids.insert(SolidId::Piston(key));
        }
    }
}

enum Node {
    Blocks {
        key: BlockKey,
        from: Option<PistonKey>,
    },
    Piston {
        key: PistonKey,
        from: Option<BlockKey>,
    },
}

/// Find all parts rigidly connected to `start`.
///
/// `skip` virtually severs one side of the starting piston, to answer "what
/// moves if this piston pushes its A (or B) end?". It is only meaningful when
/// starting from a piston; passing it with a body start is a programmer error.
///
/// If the traversal comes back around to the starting piston and would cross
/// the severed side, the piston sits on a cycle: `cant_skip_because_of_cycle`
/// is set and the traversal aborts.
pub fn find_connected_parts(
    arena: &PartArena,
    start: SolidId,
    skip: Option<PistonSide>,
) -> ConnectedParts {
    let mut out = ConnectedParts::default();

    let start_piston = match start {
        SolidId::Blocks(_) => {
            assert!(
                skip.is_none(),
                "skip side is only meaningful when starting from a piston"
            );
            None
        }
        SolidId::Piston(key) => skip.map(|_| key),
    };

    let mut stack = vec![match start {
        SolidId::Blocks(key) => Node::Blocks { key, from: None },
        SolidId::Piston(key) => Node::Piston { key, from: None },
    }];

    while let Some(node) = stack.pop() {
        match node {
            Node::Blocks { key, from } => {
                if !out.insert_blocks(key) {
                    continue;
                }
                for &piston in &arena.blocks[key].pistons {
                    if Some(piston) == from {
                        continue;
                    }
                    stack.push(Node::Piston {
                        key: piston,
                        from: Some(key),
                    });
                }
            }
            Node::Piston { key, from } => {
                out.insert_piston(key);
                let piston = &arena.pistons[key];
                for (side, endpoint) in [(PistonSide::A, piston.a), (PistonSide::B, piston.b)] {
                    // The severed side is not taken on the way out of the start.
                    if from.is_none() && skip == Some(side) {
                        continue;
                    }
                    if Some(endpoint) == from {
                        continue;
                    }
                    // Arriving back at the start piston from the far side
                    // means the severed link is part of a cycle.
                    if from.is_some()
                        && start_piston == Some(key)
                        && skip == Some(side.opposite())
                    {
                        out.cant_skip_because_of_cycle = true;
                        return out;
                    }
                    stack.push(Node::Blocks {
                        key: endpoint,
                        from: Some(key),
                    });
                }
            }
        }
    }

    out
}
