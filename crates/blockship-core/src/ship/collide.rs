//! Push-based collision resolution for rigid part groups
//!
//! One routine serves plain hit-testing, gravity dragging and piston
//! actuation. Resolver calls only *test*; movement is applied by the caller
//! after the whole decision tree has succeeded, so a partially applied push
//! is never observable.

use blockship_grid::IRect;
use glam::IVec2;

use super::{find_connected_parts, ConnectedParts, PartArena, ShipBlocks, SolidId};
use crate::spatial::DynamicSolidTree;
use crate::world::Terrain;

/// Shared read-only view of everything a collision query can touch.
#[derive(Clone, Copy)]
pub struct CollideCtx<'a> {
    pub arena: &'a PartArena,
    pub terrain: Option<&'a Terrain>,
    pub tree: Option<&'a DynamicSolidTree>,
}

/// Candidate entities excluded from a query when the filter returns false.
pub type EntityFilter<'a> = &'a dyn Fn(SolidId) -> bool;

/// Accumulated outcome of a push-mode query.
#[derive(Debug, Clone, Default)]
pub struct PushResult {
    /// At least one obstacle had to be (and could be) pushed.
    pub at_least_one_pushed: bool,
    /// Every group that will move if the caller commits the push, the
    /// original query group included. Membership checks keep recursion from
    /// pushing the same group twice.
    pub all_pushed_parts: ConnectedParts,
}

/// What to do when a candidate entity overlaps the destination.
pub enum CollideMode<'m> {
    /// Plain test: any overlap blocks.
    Test,
    /// Caller decides per candidate. The inner closure tests the candidate at
    /// a hypothetical candidate offset against the moving solid.
    Callback(&'m mut dyn FnMut(SolidId, &dyn Fn(IVec2) -> bool) -> bool),
    /// Try to recursively move blocking movable obstacles out of the way.
    Push {
        result: &'m mut PushResult,
        /// Obstacles this predicate rejects may not be pushed (they block).
        allowed: Option<&'m dyn Fn(SolidId) -> bool>,
    },
}

/// One moving solid of the query group.
enum Moving<'p> {
    Blocks(&'p ShipBlocks),
    Rect(IRect),
}

/// Test whether `parts` can occupy its position shifted by `offset`.
///
/// Returns true when blocked. Group members never block themselves; `filter`
/// can exclude further candidates. See [`CollideMode`] for the three
/// obstacle-handling behaviors.
pub fn collide_parts(
    ctx: CollideCtx<'_>,
    parts: &ConnectedParts,
    offset: IVec2,
    filter: Option<EntityFilter<'_>>,
    mut mode: CollideMode<'_>,
) -> bool {
    if let CollideMode::Push { result, .. } = &mut mode {
        result.all_pushed_parts.append(parts);
    }

    for &key in &parts.blocks {
        let moving = Moving::Blocks(&ctx.arena.blocks[key]);
        if check_moving(ctx, parts, offset, filter, &mut mode, &moving) {
            return true;
        }
    }
    for &key in &parts.pistons {
        let moving = Moving::Rect(ctx.arena.pistons[key].last_rect);
        if check_moving(ctx, parts, offset, filter, &mut mode, &moving) {
            return true;
        }
    }
    false
}

fn check_moving(
    ctx: CollideCtx<'_>,
    parts: &ConnectedParts,
    offset: IVec2,
    filter: Option<EntityFilter<'_>>,
    mode: &mut CollideMode<'_>,
    moving: &Moving<'_>,
) -> bool {
    if let Some(terrain) = ctx.terrain {
        let hit = match moving {
            Moving::Blocks(b) => b
                .map
                .collides_with_grid(&terrain.map, b.pos + offset - terrain.pos),
            Moving::Rect(r) => terrain.map.collides_with_box(r.offset(offset - terrain.pos)),
        };
        if hit {
            return true;
        }
    }

    let Some(tree) = ctx.tree else {
        return false;
    };
    let query_rect = match moving {
        Moving::Blocks(b) => b.world_rect().offset(offset),
        Moving::Rect(r) => r.offset(offset),
    };

    tree.query_overlapping(query_rect, |id| {
        if parts.contains(id) {
            return false;
        }
        if let Some(f) = filter {
            if !f(id) {
                return false;
            }
        }
        let collide = |cand_off: IVec2| candidate_overlaps(ctx.arena, id, cand_off, moving, offset);
        match mode {
            CollideMode::Test => collide(IVec2::ZERO),
            CollideMode::Callback(cb) => cb(id, &collide),
            CollideMode::Push { result, allowed } => {
                if result.all_pushed_parts.contains(id) {
                    // Already pushed this query; only its new position counts.
                    let hit = collide(offset);
                    if hit {
                        log::debug!("push blocked by already-pushed {id:?}");
                    }
                    hit
                } else if !collide(IVec2::ZERO) {
                    // Blocks neither the destination nor anything else.
                    false
                } else {
                    if let Some(allowed) = allowed {
                        if !allowed(id) {
                            return true;
                        }
                    }
                    if let SolidId::Blocks(key) = id {
                        if !ctx.arena.blocks[key].can_move {
                            return true;
                        }
                    }
                    if collide(offset) {
                        // Even moved out of the way it would still overlap.
                        return true;
                    }
                    let pushed_group = find_connected_parts(ctx.arena, id, None);
                    let blocked = collide_parts(
                        ctx,
                        &pushed_group,
                        offset,
                        filter,
                        CollideMode::Push {
                            result: &mut **result,
                            allowed: *allowed,
                        },
                    );
                    if !blocked {
                        result.at_least_one_pushed = true;
                    }
                    blocked
                }
            }
        }
    })
}

/// Exact overlap test between candidate `id` displaced by `cand_off` and a
/// moving solid displaced by `offset`.
fn candidate_overlaps(
    arena: &PartArena,
    id: SolidId,
    cand_off: IVec2,
    moving: &Moving<'_>,
    offset: IVec2,
) -> bool {
    match (id, moving) {
        (SolidId::Blocks(key), Moving::Blocks(mb)) => {
            let cand = &arena.blocks[key];
            mb.map
                .collides_with_grid(&cand.map, mb.pos + offset - (cand.pos + cand_off))
        }
        (SolidId::Blocks(key), Moving::Rect(r)) => {
            let cand = &arena.blocks[key];
            cand.map
                .collides_with_box(r.offset(offset - (cand.pos + cand_off)))
        }
        (SolidId::Piston(key), Moving::Blocks(mb)) => {
            let rect = arena.pistons[key].last_rect.offset(cand_off);
            mb.map.collides_with_box(rect.offset(-(mb.pos + offset)))
        }
        (SolidId::Piston(key), Moving::Rect(r)) => arena.pistons[key]
            .last_rect
            .offset(cand_off)
            .intersects(r.offset(offset)),
    }
}

/// Apply a decided move to a whole group and refresh the spatial index.
pub fn move_parts(
    arena: &mut PartArena,
    tree: &mut DynamicSolidTree,
    parts: &ConnectedParts,
    offset: IVec2,
) {
    for &key in &parts.blocks {
        let blocks = &mut arena.blocks[key];
        blocks.pos += offset;
        let rect = blocks.world_rect();
        tree.update(SolidId::Blocks(key), rect);
    }
    // Pistons derive their rectangle from their endpoints; recompute caches.
    for &key in &parts.pistons {
        let rect = arena.pistons[key].world_rect(&arena.blocks);
        arena.pistons[key].last_rect = rect;
        tree.update(SolidId::Piston(key), rect);
    }
}

/// Extend a moving group with everything resting on it against gravity that
/// is movable, gravity-enabled, and free to follow the same move.
pub fn add_dragged_parts(
    ctx: CollideCtx<'_>,
    parts: &ConnectedParts,
    offset: IVec2,
    gravity_dir: IVec2,
) -> ConnectedParts {
    if ctx.tree.is_none() || gravity_dir == IVec2::ZERO {
        return parts.clone();
    }

    let mut new_parts = parts.clone();

    // Probe one pixel against gravity; whatever we touch there rests on us.
    let probe_ctx = CollideCtx {
        terrain: None,
        ..ctx
    };
    let _ = collide_parts(
        probe_ctx,
        parts,
        -gravity_dir,
        None,
        CollideMode::Callback(&mut |id, collide| {
            if new_parts.contains(id) {
                return false;
            }
            if collide(IVec2::ZERO) {
                if let SolidId::Blocks(key) = id {
                    let b = &ctx.arena.blocks[key];
                    if !b.can_move || !b.gravity.enabled {
                        return false;
                    }
                }
                let dragged = find_connected_parts(ctx.arena, id, None);
                // The dragged group may follow if nothing outside the moving
                // group blocks it at the destination.
                let blocked = collide_parts(
                    ctx,
                    &dragged,
                    offset,
                    None,
                    CollideMode::Callback(&mut |other, collide2| {
                        if parts.contains(other) {
                            false
                        } else {
                            collide2(IVec2::ZERO)
                        }
                    }),
                );
                if !blocked {
                    new_parts.append(&dragged);
                }
            }
            false
        }),
    );

    new_parts
}
