//! Decomposition of a composite tile grid into rigid bodies and pistons
//!
//! Level files draw a whole ship as one grid. Flood fill splits it into
//! 4-connected islands of regular tiles; runs of piston tiles between two
//! attachable tiles become piston entities joining the islands.

use ahash::AHashMap;
use blockship_grid::{PistonRelation, ShipTile, TileGrid, TileSet};
use glam::IVec2;

use super::{axis, axis_vec, BlockKey, PartArena, Piston, ShipBlocks, SolidId, DIRS4};
use crate::spatial::DynamicSolidTree;

/// A piston run seen from its first-flooded side, waiting for the flood to
/// reach the tile at the far end.
struct QueuedPiston {
    is_vertical: bool,
    a: BlockKey,
    /// World pixel position of the attachment edge on the A side.
    abs_pixel_a: IVec2,
    b: Option<BlockKey>,
    abs_pixel_b: IVec2,
    /// Both ends landed in the same island; the piston is dropped.
    discarded: bool,
}

/// Split `source` into its connected components, create the pistons between
/// them, and delete the source body.
///
/// `finalize` runs once per created body, after it is positioned and indexed,
/// so the caller can apply per-ship properties.
///
/// Panics if a queued piston run ends at a tile the flood never reaches;
/// regular tiles are always flooded, so this indicates a corrupt grid.
pub fn decompose_and_delete(
    arena: &mut PartArena,
    tree: &mut DynamicSolidTree,
    source: BlockKey,
    mut finalize: impl FnMut(BlockKey, &mut ShipBlocks),
) {
    let Some(source_body) = arena.blocks.remove(source) else {
        return;
    };
    debug_assert!(
        source_body.pistons.is_empty(),
        "decomposing a body that already has pistons"
    );
    if tree.contains(SolidId::Blocks(source)) {
        tree.remove(SolidId::Blocks(source));
    }

    let size = source_body.map.size();
    let idx = |p: IVec2| (p.y * size.x + p.x) as usize;
    let mut visited = vec![false; (size.x * size.y).max(0) as usize];
    // Piston runs keyed by the tile position of their far terminal.
    let mut queued: AHashMap<IVec2, Vec<QueuedPiston>> = AHashMap::new();

    for start_y in 0..size.y {
        for start_x in 0..size.x {
            let start = IVec2::new(start_x, start_y);
            if !source_body.map.tile_at(start).is_regular() || visited[idx(start)] {
                continue;
            }

            let new_key = arena
                .blocks
                .insert(ShipBlocks::new(IVec2::ZERO, TileGrid::new(IVec2::ZERO)));
            let mut part_map = TileGrid::<ShipTile>::new(IVec2::ZERO);
            // Source tile position of the part grid's origin; shifts as the
            // grid grows toward negative coordinates.
            let mut tile_offset = start;

            let mut stack = vec![start];
            while let Some(abs) = stack.pop() {
                let Some(&cell) = source_body.map.cell(abs) else {
                    continue;
                };
                if !cell.tile.is_regular() || visited[idx(abs)] {
                    continue;
                }
                visited[idx(abs)] = true;

                let mut rel = abs - tile_offset;
                if !part_map.in_bounds(rel) {
                    let delta = rel.min(IVec2::ZERO);
                    let new_size = part_map.size().max(rel + IVec2::ONE) - delta;
                    part_map.resize_with_offset(new_size, -delta);
                    tile_offset += delta;
                    rel -= delta;
                }
                part_map.set_cell(rel, cell);

                // Piston runs ending on this tile.
                if let Some(elems) = queued.get_mut(&abs) {
                    for elem in elems {
                        debug_assert!(elem.b.is_none(), "piston terminal visited twice");
                        if elem.a == new_key {
                            elem.discarded = true;
                            continue;
                        }
                        let pixel_b = abs * ShipTile::SIZE + source_body.pos;
                        if axis(elem.abs_pixel_a, elem.is_vertical)
                            > axis(pixel_b, elem.is_vertical)
                        {
                            // Swap so A precedes B along the axis; the edge
                            // positions move to the far side of their tiles.
                            let step = axis_vec(elem.is_vertical, ShipTile::SIZE);
                            elem.b = Some(elem.a);
                            elem.abs_pixel_b = elem.abs_pixel_a + step;
                            elem.a = new_key;
                            elem.abs_pixel_a = pixel_b + step;
                        } else {
                            elem.b = Some(new_key);
                            elem.abs_pixel_b = pixel_b;
                        }
                    }
                }

                // Piston runs starting on this tile.
                if cell.tile.piston_relation() == PistonRelation::SolidAttachable {
                    for vertical in [false, true] {
                        for backward in [false, true] {
                            let marker = ShipTile::piston_marker(vertical);
                            let step = axis_vec(vertical, if backward { -1 } else { 1 });

                            let mut run = abs;
                            while source_body.map.tile_at(run + step) == marker {
                                run += step;
                            }
                            if run == abs {
                                continue;
                            }
                            let end = run + step;
                            if source_body.map.in_bounds(end)
                                && source_body.map.tile_at(end).piston_relation()
                                    == PistonRelation::SolidAttachable
                                && !visited[idx(end)]
                            {
                                queued.entry(end).or_default().push(QueuedPiston {
                                    is_vertical: vertical,
                                    a: new_key,
                                    abs_pixel_a: (abs + step) * ShipTile::SIZE + source_body.pos,
                                    b: None,
                                    abs_pixel_b: IVec2::ZERO,
                                    discarded: false,
                                });
                            }
                        }
                    }
                }

                for dir in DIRS4 {
                    stack.push(abs + dir);
                }
            }

            let body = &mut arena.blocks[new_key];
            body.pos = source_body.pos + tile_offset * ShipTile::SIZE;
            body.map = part_map;
            body.can_move = source_body.can_move;
            body.gravity = source_body.gravity;
            let rect = body.world_rect();
            tree.insert(SolidId::Blocks(new_key), rect);
            finalize(new_key, body);
        }
    }

    for elems in queued.into_values() {
        for elem in elems {
            if elem.discarded {
                continue;
            }
            let Some(b) = elem.b else {
                panic!("piston run never reached a terminal tile near {:?}", elem.abs_pixel_a);
            };
            let key = arena.pistons.insert(Piston {
                is_vertical: elem.is_vertical,
                a: elem.a,
                b,
                pos_relative_to_a: elem.abs_pixel_a - arena.blocks[elem.a].pos,
                pos_relative_to_b: elem.abs_pixel_b - arena.blocks[b].pos,
                last_rect: blockship_grid::IRect::ZERO,
                dir_flip_flop: false,
            });
            let rect = arena.pistons[key].world_rect(&arena.blocks);
            arena.pistons[key].last_rect = rect;
            arena.blocks[elem.a].pistons.push(key);
            arena.blocks[b].pistons.push(key);
            tree.insert(SolidId::Piston(key), rect);
            log::debug!("created piston {key:?} between {:?} and {:?}", elem.a, b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockship_grid::IRect;

    const TS: i32 = ShipTile::SIZE;

    fn parse(rows: &[&str]) -> TileGrid<ShipTile> {
        let size = IVec2::new(rows[0].len() as i32, rows.len() as i32);
        let mut map = TileGrid::new(size);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let tile = match ch {
                    '#' => ShipTile::Block,
                    '-' => ShipTile::PistonH,
                    '|' => ShipTile::PistonV,
                    'G' => ShipTile::Goal,
                    'E' => ShipTile::Emerald,
                    '.' => ShipTile::Air,
                    other => panic!("bad test tile {other:?}"),
                };
                map.cell_mut(IVec2::new(x as i32, y as i32)).unwrap().tile = tile;
            }
        }
        map
    }

    fn decompose(rows: &[&str], pos: IVec2) -> (PartArena, DynamicSolidTree) {
        let mut arena = PartArena::new();
        let mut tree = DynamicSolidTree::new();
        let source = arena.blocks.insert(ShipBlocks::new(pos, parse(rows)));
        decompose_and_delete(&mut arena, &mut tree, source, |_, _| {});
        (arena, tree)
    }

    fn body_at(arena: &PartArena, pos: IVec2) -> BlockKey {
        arena
            .blocks
            .iter()
            .find(|(_, b)| b.pos == pos)
            .map(|(k, _)| k)
            .unwrap_or_else(|| panic!("no body at {pos:?}"))
    }

    #[test]
    fn test_single_island() {
        let (arena, tree) = decompose(&["##", "##"], IVec2::new(40, 8));
        assert_eq!(arena.blocks.len(), 1);
        assert_eq!(arena.pistons.len(), 0);
        let (_, body) = arena.blocks.iter().next().unwrap();
        assert_eq!(body.pos, IVec2::new(40, 8));
        assert_eq!(body.map.size(), IVec2::new(2, 2));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_source_body_is_deleted() {
        let mut arena = PartArena::new();
        let mut tree = DynamicSolidTree::new();
        let source = arena
            .blocks
            .insert(ShipBlocks::new(IVec2::ZERO, parse(&["#"])));
        decompose_and_delete(&mut arena, &mut tree, source, |_, _| {});
        assert!(!arena.blocks.contains_key(source));
    }

    #[test]
    fn test_diagonal_tiles_do_not_connect() {
        let (arena, _) = decompose(&["#.", ".#"], IVec2::ZERO);
        assert_eq!(arena.blocks.len(), 2);
        assert_eq!(arena.pistons.len(), 0);
    }

    #[test]
    fn test_air_gap_without_piston_splits() {
        let (arena, _) = decompose(&["#.#"], IVec2::ZERO);
        assert_eq!(arena.blocks.len(), 2);
        assert_eq!(arena.pistons.len(), 0);
    }

    #[test]
    fn test_horizontal_piston_connects_two_islands() {
        let (arena, _) = decompose(&["#-#"], IVec2::ZERO);
        assert_eq!(arena.blocks.len(), 2);
        assert_eq!(arena.pistons.len(), 1);

        let left = body_at(&arena, IVec2::ZERO);
        let right = body_at(&arena, IVec2::new(2 * TS, 0));
        let (_, piston) = arena.pistons.iter().next().unwrap();
        assert!(!piston.is_vertical);
        assert_eq!(piston.a, left);
        assert_eq!(piston.b, right);
        assert_eq!(piston.pos_relative_to_a, IVec2::new(TS, 0));
        assert_eq!(piston.pos_relative_to_b, IVec2::ZERO);
        assert_eq!(piston.current_length(&arena.blocks), TS);
        assert_eq!(piston.last_rect, IRect::new(IVec2::new(TS, 0), IVec2::new(2 * TS, TS)));
        assert_eq!(arena.blocks[left].pistons.as_slice(), &[arena.pistons.keys().next().unwrap()]);
    }

    #[test]
    fn test_vertical_piston_connects_two_islands() {
        let (arena, _) = decompose(&["#", "|", "#"], IVec2::ZERO);
        assert_eq!(arena.blocks.len(), 2);
        assert_eq!(arena.pistons.len(), 1);

        let top = body_at(&arena, IVec2::ZERO);
        let bottom = body_at(&arena, IVec2::new(0, 2 * TS));
        let (_, piston) = arena.pistons.iter().next().unwrap();
        assert!(piston.is_vertical);
        assert_eq!(piston.a, top);
        assert_eq!(piston.b, bottom);
        assert_eq!(piston.current_length(&arena.blocks), TS);
    }

    #[test]
    fn test_longer_piston_run() {
        let (arena, _) = decompose(&["#--#"], IVec2::ZERO);
        assert_eq!(arena.pistons.len(), 1);
        let (_, piston) = arena.pistons.iter().next().unwrap();
        assert_eq!(piston.current_length(&arena.blocks), 2 * TS);
    }

    #[test]
    fn test_endpoints_are_canonical_when_flooded_from_the_right() {
        // The right island owns the topmost-leftmost regular tile, so the
        // flood reaches it first and the piston is scanned backward.
        let (arena, _) = decompose(&["..#", "#-#"], IVec2::ZERO);
        assert_eq!(arena.blocks.len(), 2);
        assert_eq!(arena.pistons.len(), 1);

        let left = body_at(&arena, IVec2::new(0, TS));
        let right = body_at(&arena, IVec2::new(2 * TS, 0));
        let (_, piston) = arena.pistons.iter().next().unwrap();
        assert_eq!(piston.a, left);
        assert_eq!(piston.b, right);
        assert_eq!(piston.pos_relative_to_a, IVec2::new(TS, 0));
        assert_eq!(piston.pos_relative_to_b, IVec2::new(0, TS));
        assert_eq!(piston.current_length(&arena.blocks), TS);
    }

    #[test]
    fn test_piston_within_one_island_is_dropped() {
        // A U shape whose arms are bridged by a piston: one island, and the
        // piston would link it to itself.
        let (arena, _) = decompose(&["#-#", "#.#", "###"], IVec2::ZERO);
        assert_eq!(arena.blocks.len(), 1);
        assert_eq!(arena.pistons.len(), 0);
    }

    #[test]
    fn test_non_attachable_tiles_take_no_pistons() {
        // Goal tiles are solid but pistons cannot attach to them.
        let (arena, _) = decompose(&["G-#"], IVec2::ZERO);
        assert_eq!(arena.blocks.len(), 2);
        assert_eq!(arena.pistons.len(), 0);
    }

    #[test]
    fn test_dangling_piston_tiles_are_dropped() {
        // No terminal tile on the right: the run is not a piston, and piston
        // tiles are not regular, so only the block island survives.
        let (arena, _) = decompose(&["#--."], IVec2::ZERO);
        assert_eq!(arena.blocks.len(), 1);
        assert_eq!(arena.pistons.len(), 0);
        let (_, body) = arena.blocks.iter().next().unwrap();
        assert_eq!(body.map.size(), IVec2::new(1, 1));
    }

    #[test]
    fn test_cell_noise_is_preserved() {
        let mut arena = PartArena::new();
        let mut tree = DynamicSolidTree::new();
        let mut map = parse(&["##"]);
        map.cell_mut(IVec2::new(1, 0)).unwrap().noise = 7;
        let source = arena.blocks.insert(ShipBlocks::new(IVec2::ZERO, map));
        decompose_and_delete(&mut arena, &mut tree, source, |_, _| {});

        let (_, body) = arena.blocks.iter().next().unwrap();
        assert_eq!(body.map.cell(IVec2::new(1, 0)).unwrap().noise, 7);
    }

    #[test]
    fn test_finalize_runs_once_per_part() {
        let mut arena = PartArena::new();
        let mut tree = DynamicSolidTree::new();
        let source = arena
            .blocks
            .insert(ShipBlocks::new(IVec2::ZERO, parse(&["#.#"])));
        let mut seen = Vec::new();
        decompose_and_delete(&mut arena, &mut tree, source, |key, body| {
            seen.push((key, body.pos));
        });
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().any(|&(_, p)| p == IVec2::ZERO));
        assert!(seen.iter().any(|&(_, p)| p == IVec2::new(2 * TS, 0)));
    }
}
