//! World facade: terrain, entity arenas, per-tick simulation and goal logic

use ahash::AHashSet;
use blockship_grid::{IRect, TileGrid, WorldTile};
use glam::IVec2;

use crate::ship::{
    collide_parts, extend_or_retract, move_ships_by_gravity, BlockKey, CollideCtx, CollideMode,
    ConnectedParts, ExtendRetractStatus, GravityConfig, PartArena, PistonKey, SolidId, DIRS4,
};
use crate::spatial::DynamicSolidTree;

/// Static level terrain at the coarse tile resolution.
#[derive(Debug, Clone, Default)]
pub struct Terrain {
    /// World-space pixel position of the grid origin.
    pub pos: IVec2,
    pub map: TileGrid<WorldTile>,
}

/// Fire-and-forget audio events produced by the simulation, drained by the
/// caller's audio sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    BlockLanded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoalStatus {
    #[default]
    InProgress,
    Won,
    Failed,
}

/// Win/lose bookkeeping over the goal bodies of a level.
#[derive(Debug, Default)]
pub struct GoalTracker {
    goal_blocks: AHashSet<BlockKey>,
    grav_blocks: AHashSet<BlockKey>,
    /// A goal body falling below this world y fails the level.
    pub fail_below_y: Option<i32>,
}

impl GoalTracker {
    pub fn register_goal(&mut self, key: BlockKey) {
        self.goal_blocks.insert(key);
    }

    pub fn register_gravity_toggle(&mut self, key: BlockKey) {
        self.grav_blocks.insert(key);
    }

    pub fn is_goal(&self, key: BlockKey) -> bool {
        self.goal_blocks.contains(&key)
    }

    /// Bodies marked as gravity toggles in the level file, for the external
    /// interaction layer.
    pub fn is_gravity_toggle(&self, key: BlockKey) -> bool {
        self.grav_blocks.contains(&key)
    }

    /// A goal body is seated when probes in at least 3 of the 4 cardinal
    /// directions hit the terrain or another goal body. Everything else is
    /// filtered out so resting on a regular crate does not count.
    fn seated(
        &self,
        arena: &PartArena,
        tree: &DynamicSolidTree,
        terrain: Option<&Terrain>,
        key: BlockKey,
    ) -> bool {
        let parts = ConnectedParts::single_blocks(key);
        let ctx = CollideCtx {
            arena,
            terrain,
            tree: Some(tree),
        };
        let filter = |id: SolidId| match id {
            SolidId::Blocks(b) => b != key && self.goal_blocks.contains(&b),
            SolidId::Piston(_) => false,
        };
        let hits = DIRS4
            .iter()
            .filter(|&&dir| collide_parts(ctx, &parts, dir, Some(&filter), CollideMode::Test))
            .count();
        hits >= 3
    }

    /// Current level status. A level with no goal bodies never completes.
    pub fn evaluate(
        &self,
        arena: &PartArena,
        tree: &DynamicSolidTree,
        terrain: Option<&Terrain>,
    ) -> GoalStatus {
        if let Some(limit) = self.fail_below_y {
            if self
                .goal_blocks
                .iter()
                .any(|&key| arena.blocks[key].pos.y > limit)
            {
                return GoalStatus::Failed;
            }
        }
        if !self.goal_blocks.is_empty()
            && self
                .goal_blocks
                .iter()
                .all(|&key| self.seated(arena, tree, terrain, key))
        {
            GoalStatus::Won
        } else {
            GoalStatus::InProgress
        }
    }
}

/// The whole simulated level: terrain, ship entities, spatial index, gravity
/// and goal state. Single threaded; one `tick` per frame.
#[derive(Debug, Default)]
pub struct ShipWorld {
    pub arena: PartArena,
    pub tree: DynamicSolidTree,
    pub terrain: Terrain,
    pub gravity: GravityConfig,
    pub goal: GoalTracker,
    pub cues: Vec<Cue>,
}

impl ShipWorld {
    pub fn new(terrain: Terrain, gravity: GravityConfig, fail_below_y: Option<i32>) -> Self {
        Self {
            terrain,
            gravity,
            goal: GoalTracker {
                fail_below_y,
                ..GoalTracker::default()
            },
            ..Self::default()
        }
    }

    /// One simulation step: gravity integration, then goal evaluation.
    pub fn tick(&mut self) -> GoalStatus {
        move_ships_by_gravity(
            &mut self.arena,
            &mut self.tree,
            Some(&self.terrain),
            &self.gravity,
            &mut self.cues,
        );
        self.goal
            .evaluate(&self.arena, &self.tree, Some(&self.terrain))
    }

    pub fn drain_cues(&mut self) -> impl Iterator<Item = Cue> + '_ {
        self.cues.drain(..)
    }

    /// UI-driven piston actuation.
    pub fn extend_or_retract(
        &mut self,
        piston: PistonKey,
        extend: bool,
        max_length: i32,
    ) -> ExtendRetractStatus {
        extend_or_retract(
            &mut self.arena,
            &mut self.tree,
            Some(&self.terrain),
            &self.gravity,
            piston,
            extend,
            max_length,
        )
    }

    pub fn piston_rect(&self, key: PistonKey) -> IRect {
        self.arena.pistons[key].last_rect
    }

    pub fn piston_is_vertical(&self, key: PistonKey) -> bool {
        self.arena.pistons[key].is_vertical
    }

    /// The piston closest to `point` within a small pick radius.
    pub fn pick_piston(&self, point: IVec2) -> Option<PistonKey> {
        const EXTRA_RADIUS: i32 = 4;
        let probe = IRect::from_pos_size(point, IVec2::ONE).expand(EXTRA_RADIUS);
        let mut best: Option<(i32, PistonKey)> = None;
        self.tree.query_overlapping(probe, |id| {
            if let SolidId::Piston(key) = id {
                let dist = self.arena.pistons[key].distance_to_point(&self.arena.blocks, point);
                if dist <= EXTRA_RADIUS && best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, key));
                }
            }
            false
        });
        best.map(|(_, key)| key)
    }
}
