//! Piston actuation
//!
//! Extending or retracting a piston moves one of its two sides by a single
//! pixel. Which side moves is decided by a ladder of tie-breaks: side
//! mobility, rest state under gravity, push activity, and finally an
//! alternating flip-flop so a fully symmetric piston does not always favor
//! the same side.

use blockship_grid::{ShipTile, TileSet};
use glam::IVec2;

use super::{
    add_dragged_parts, axis_vec, collide_parts, find_connected_parts, move_parts, CollideCtx,
    CollideMode, GravityConfig, PartArena, PistonKey, PistonSide, PushResult, SolidId,
};
use crate::spatial::DynamicSolidTree;
use crate::world::Terrain;

/// Shortest allowed gap between the two attachment edges, in pixels.
pub const MIN_PISTON_LENGTH: i32 = ShipTile::SIZE;

/// Outcome of one actuation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendRetractStatus {
    /// One side moved by one pixel.
    Ok,
    /// Both sides are blocked or immovable; nothing moved.
    Stuck,
    /// Retraction refused at the minimum length; nothing moved.
    AtMinLength,
    /// Extension refused at the configured maximum length; nothing moved.
    AtMaxLength,
    /// The piston sits on a connectivity cycle, so neither side can move
    /// independently; nothing moved.
    Cycle,
}

/// Extend (or retract) `key` by one pixel.
pub fn extend_or_retract(
    arena: &mut PartArena,
    tree: &mut DynamicSolidTree,
    terrain: Option<&Terrain>,
    gravity: &GravityConfig,
    key: PistonKey,
    extend: bool,
    max_length: i32,
) -> ExtendRetractStatus {
    let length = arena.pistons[key].current_length(&arena.blocks);
    if extend {
        if length >= max_length {
            return ExtendRetractStatus::AtMaxLength;
        }
    } else if length <= MIN_PISTON_LENGTH {
        return ExtendRetractStatus::AtMinLength;
    }

    let is_vertical = arena.pistons[key].is_vertical;
    // Extension moves A (the top/left side) against the axis, B along it.
    let offset_a = axis_vec(is_vertical, if extend { -1 } else { 1 });
    let offset_b = -offset_a;

    let mut parts_a = find_connected_parts(arena, SolidId::Piston(key), Some(PistonSide::B));
    let mut parts_b = find_connected_parts(arena, SolidId::Piston(key), Some(PistonSide::A));
    if parts_a.cant_skip_because_of_cycle || parts_b.cant_skip_because_of_cycle {
        return ExtendRetractStatus::Cycle;
    }
    // The actuated piston changes length instead of translating. Keep it out
    // of the moving sets but leave it in the id sets so it never blocks its
    // own sides.
    parts_a.pistons.remove(&key);
    parts_b.pistons.remove(&key);

    let movable_a = parts_a.blocks.iter().all(|&b| arena.blocks[b].can_move);
    let movable_b = parts_b.blocks.iter().all(|&b| arena.blocks[b].can_move);
    if !movable_a && !movable_b {
        return ExtendRetractStatus::Stuck;
    }

    let decision = {
        let ctx = CollideCtx {
            arena,
            terrain,
            tree: Some(tree),
        };
        let filter_not_b = |id: SolidId| !parts_b.contains(id);
        let filter_not_a = |id: SolidId| !parts_a.contains(id);

        // Resting side stays put; computed only when the tie-break can apply.
        let grounded = if gravity.enabled && movable_a && movable_b {
            let resting = |parts, filter: &dyn Fn(SolidId) -> bool| {
                let f = |id: SolidId| {
                    if !filter(id) {
                        return false;
                    }
                    match id {
                        SolidId::Blocks(b) => ctx.arena.blocks[b].gravity.enabled,
                        SolidId::Piston(_) => true,
                    }
                };
                collide_parts(ctx, parts, gravity.dir, Some(&f), CollideMode::Test)
            };
            Some((
                resting(&parts_a, &filter_not_b),
                resting(&parts_b, &filter_not_a),
            ))
        } else {
            None
        };

        let mut push_a = PushResult::default();
        let blocked_a = !movable_a
            || collide_parts(
                ctx,
                &parts_a,
                offset_a,
                Some(&filter_not_b),
                CollideMode::Push {
                    result: &mut push_a,
                    allowed: None,
                },
            );
        let mut push_b = PushResult::default();
        let blocked_b = !movable_b
            || collide_parts(
                ctx,
                &parts_b,
                offset_b,
                Some(&filter_not_a),
                CollideMode::Push {
                    result: &mut push_b,
                    allowed: None,
                },
            );

        if blocked_a && blocked_b {
            None
        } else {
            let move_a = if blocked_a {
                false
            } else if blocked_b {
                true
            } else if let Some((_, gb)) = grounded.filter(|&(ga, gb)| ga != gb) {
                // The grounded side stays put.
                gb
            } else if push_a.at_least_one_pushed != push_b.at_least_one_pushed {
                // Prefer the move that disturbs nothing else.
                push_b.at_least_one_pushed
            } else {
                !arena.pistons[key].dir_flip_flop
            };

            let (push, parts, offset) = if move_a {
                (push_a, parts_a, offset_a)
            } else {
                (push_b, parts_b, offset_b)
            };
            let mut moving = if push.at_least_one_pushed {
                push.all_pushed_parts
            } else {
                parts
            };
            if gravity.enabled {
                moving = add_dragged_parts(ctx, &moving, offset, gravity.dir);
            }
            Some((moving, offset))
        }
    };

    let Some((moving, offset)) = decision else {
        return ExtendRetractStatus::Stuck;
    };
    let piston = &mut arena.pistons[key];
    piston.dir_flip_flop = !piston.dir_flip_flop;

    move_parts(arena, tree, &moving, offset);

    // The actuated piston was excluded from the moving set; refresh it here.
    let rect = arena.pistons[key].world_rect(&arena.blocks);
    arena.pistons[key].last_rect = rect;
    tree.update(SolidId::Piston(key), rect);

    ExtendRetractStatus::Ok
}
