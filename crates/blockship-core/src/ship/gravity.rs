//! Gravity integration over whole connected groups
//!
//! Speed is accumulated per body as a fraction of pixels per tick; movement is
//! applied in whole pixels with a carried remainder so fractional speeds do
//! not drift or get lost.

use ahash::AHashSet;
use glam::IVec2;

use super::{
    add_dragged_parts, collide_parts, find_connected_parts, move_parts, BlockKey, CollideCtx,
    CollideMode, GravityState, PartArena, SolidId,
};
use crate::spatial::DynamicSolidTree;
use crate::world::{Cue, Terrain};

/// Global gravity parameters of one simulation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GravityConfig {
    /// Unit cardinal direction gravity pulls in.
    pub dir: IVec2,
    /// Speed gained per tick, in pixels.
    pub acceleration: f32,
    /// Terminal speed, in pixels per tick.
    pub max_speed: f32,
    pub enabled: bool,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            dir: IVec2::new(0, 1),
            acceleration: 0.05,
            max_speed: 3.0,
            enabled: true,
        }
    }
}

/// Round `value` to whole pixels, carrying the error into `comp` so the
/// rounded steps sum to the true total over time.
fn round_with_compensation(value: f32, comp: &mut f32) -> i32 {
    let sum = value + *comp;
    let rounded = sum.round();
    *comp = sum - rounded;
    rounded as i32
}

/// Advance every falling group by one tick of gravity.
///
/// Each connected group moves as one unit and drags whatever rests on it.
/// Groups containing a fixed or gravity-disabled body do not fall. After the
/// move the initiating body's speed state is shared across its whole group so
/// later decompositions inherit a consistent state.
pub fn move_ships_by_gravity(
    arena: &mut PartArena,
    tree: &mut DynamicSolidTree,
    terrain: Option<&Terrain>,
    config: &GravityConfig,
    cues: &mut Vec<Cue>,
) {
    if !config.enabled || config.dir == IVec2::ZERO {
        return;
    }

    let mut visited: AHashSet<SolidId> = AHashSet::new();
    let keys: Vec<BlockKey> = arena.blocks.keys().collect();

    for key in keys {
        if visited.contains(&SolidId::Blocks(key)) {
            continue;
        }
        let parts = find_connected_parts(arena, SolidId::Blocks(key), None);
        visited.extend(parts.ids.iter().copied());

        let grounded = parts
            .blocks
            .iter()
            .any(|&b| !arena.blocks[b].can_move || !arena.blocks[b].gravity.enabled);
        if grounded {
            for &b in &parts.blocks {
                let state = &mut arena.blocks[b].gravity;
                state.speed = 0.0;
                state.speed_comp = 0.0;
            }
            continue;
        }

        let mut state = arena.blocks[key].gravity;
        if state.last_dir != config.dir {
            state.speed = 0.0;
            state.speed_comp = 0.0;
        }
        state.last_dir = config.dir;
        state.speed = (state.speed + config.acceleration).min(config.max_speed);
        let step = round_with_compensation(state.speed, &mut state.speed_comp);

        for _ in 0..step {
            let (moving, blocked) = {
                let ctx = CollideCtx {
                    arena,
                    terrain,
                    tree: Some(tree),
                };
                let moving = add_dragged_parts(ctx, &parts, config.dir, config.dir);
                let blocked = collide_parts(ctx, &moving, config.dir, None, CollideMode::Test);
                (moving, blocked)
            };
            if blocked {
                if state.speed > 1.0 {
                    cues.push(Cue::BlockLanded);
                }
                state.speed = 0.0;
                state.speed_comp = 0.0;
                break;
            }
            visited.extend(moving.ids.iter().copied());
            move_parts(arena, tree, &moving, config.dir);
        }

        for &b in &parts.blocks {
            let enabled = arena.blocks[b].gravity.enabled;
            arena.blocks[b].gravity = GravityState { enabled, ..state };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ship::test_support::block_body;
    use blockship_grid::{TileGrid, TileSet, WorldTile};

    fn floor_at(y_tiles: i32, width_tiles: i32) -> Terrain {
        let mut map = TileGrid::<WorldTile>::new(IVec2::new(width_tiles, 1));
        for x in 0..width_tiles {
            map.cell_mut(IVec2::new(x, 0)).unwrap().tile = WorldTile::Wall;
        }
        Terrain {
            pos: IVec2::new(0, y_tiles * WorldTile::SIZE),
            map,
        }
    }

    fn unit_gravity() -> GravityConfig {
        GravityConfig {
            dir: IVec2::new(0, 1),
            acceleration: 1.0,
            max_speed: 1.0,
            enabled: true,
        }
    }

    fn spawn(arena: &mut PartArena, tree: &mut DynamicSolidTree, pos: IVec2) -> BlockKey {
        let key = arena.blocks.insert(block_body(pos, IVec2::splat(2)));
        tree.insert(SolidId::Blocks(key), arena.blocks[key].world_rect());
        key
    }

    #[test]
    fn test_body_falls_one_pixel_per_tick_at_unit_speed() {
        let mut arena = PartArena::new();
        let mut tree = DynamicSolidTree::new();
        let body = spawn(&mut arena, &mut tree, IVec2::ZERO);
        let config = unit_gravity();

        let mut cues = Vec::new();
        for _ in 0..5 {
            move_ships_by_gravity(&mut arena, &mut tree, None, &config, &mut cues);
        }
        assert_eq!(arena.blocks[body].pos, IVec2::new(0, 5));
        assert!(cues.is_empty());
    }

    #[test]
    fn test_body_lands_on_terrain_and_speed_resets() {
        let mut arena = PartArena::new();
        let mut tree = DynamicSolidTree::new();
        // Body bottom at y=8, floor surface at y=12: 4 pixels of fall.
        let body = spawn(&mut arena, &mut tree, IVec2::ZERO);
        let terrain = floor_at(1, 4);
        let config = unit_gravity();

        let mut cues = Vec::new();
        for _ in 0..10 {
            move_ships_by_gravity(&mut arena, &mut tree, Some(&terrain), &config, &mut cues);
        }
        assert_eq!(arena.blocks[body].pos, IVec2::new(0, 4));
        assert_eq!(arena.blocks[body].gravity.speed, 0.0);
        assert_eq!(arena.blocks[body].gravity.speed_comp, 0.0);
        // Landing at speed 1.0 is silent.
        assert!(cues.is_empty());
    }

    #[test]
    fn test_fast_landing_emits_cue() {
        let mut arena = PartArena::new();
        let mut tree = DynamicSolidTree::new();
        spawn(&mut arena, &mut tree, IVec2::ZERO);
        let terrain = floor_at(4, 4);
        let config = GravityConfig {
            dir: IVec2::new(0, 1),
            acceleration: 2.0,
            max_speed: 5.0,
            enabled: true,
        };

        let mut cues = Vec::new();
        for _ in 0..20 {
            move_ships_by_gravity(&mut arena, &mut tree, Some(&terrain), &config, &mut cues);
            if !cues.is_empty() {
                break;
            }
        }
        assert_eq!(cues, vec![Cue::BlockLanded]);
    }

    #[test]
    fn test_gravity_disabled_body_stays_put() {
        let mut arena = PartArena::new();
        let mut tree = DynamicSolidTree::new();
        let body = spawn(&mut arena, &mut tree, IVec2::ZERO);
        arena.blocks[body].gravity.enabled = false;
        let config = unit_gravity();

        let mut cues = Vec::new();
        move_ships_by_gravity(&mut arena, &mut tree, None, &config, &mut cues);
        assert_eq!(arena.blocks[body].pos, IVec2::ZERO);
    }

    #[test]
    fn test_direction_change_resets_speed() {
        let mut arena = PartArena::new();
        let mut tree = DynamicSolidTree::new();
        let body = spawn(&mut arena, &mut tree, IVec2::ZERO);
        let mut config = GravityConfig {
            dir: IVec2::new(0, 1),
            acceleration: 0.25,
            max_speed: 3.0,
            enabled: true,
        };

        let mut cues = Vec::new();
        for _ in 0..8 {
            move_ships_by_gravity(&mut arena, &mut tree, None, &config, &mut cues);
        }
        assert!(arena.blocks[body].gravity.speed > 1.0);

        config.dir = IVec2::new(1, 0);
        move_ships_by_gravity(&mut arena, &mut tree, None, &config, &mut cues);
        // First tick in the new direction starts from zero speed.
        assert_eq!(arena.blocks[body].gravity.speed, 0.25);
        assert_eq!(arena.blocks[body].gravity.last_dir, IVec2::new(1, 0));
    }

    #[test]
    fn test_stack_falls_as_separate_groups_without_overlap() {
        let mut arena = PartArena::new();
        let mut tree = DynamicSolidTree::new();
        let top = spawn(&mut arena, &mut tree, IVec2::ZERO);
        let bottom = spawn(&mut arena, &mut tree, IVec2::new(0, 8));
        let terrain = floor_at(2, 4);
        let config = unit_gravity();

        let mut cues = Vec::new();
        for _ in 0..20 {
            move_ships_by_gravity(&mut arena, &mut tree, Some(&terrain), &config, &mut cues);
        }
        // Bottom rests on the floor, top rests on bottom.
        assert_eq!(arena.blocks[bottom].pos, IVec2::new(0, 16));
        assert_eq!(arena.blocks[top].pos, IVec2::new(0, 8));
    }

    #[test]
    fn test_rounding_compensation_accumulates_fractional_speed() {
        let mut comp = 0.0;
        let mut total = 0;
        for _ in 0..10 {
            total += round_with_compensation(0.3, &mut comp);
        }
        assert_eq!(total, 3);
        assert!(comp.abs() <= 0.5);
    }
}
