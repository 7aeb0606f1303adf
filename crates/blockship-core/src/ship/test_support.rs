//! Shared builders for ship unit tests.

use blockship_grid::{ShipTile, TileGrid};
use glam::IVec2;

use super::ShipBlocks;

/// A fully solid Block grid of the given tile dimensions.
pub(crate) fn block_grid(tiles: IVec2) -> TileGrid<ShipTile> {
    let mut map = TileGrid::new(tiles);
    for y in 0..tiles.y {
        for x in 0..tiles.x {
            map.cell_mut(IVec2::new(x, y)).unwrap().tile = ShipTile::Block;
        }
    }
    map
}

/// A movable, fully solid body at `pos` with the given tile dimensions.
pub(crate) fn block_body(pos: IVec2, tiles: IVec2) -> ShipBlocks {
    ShipBlocks::new(pos, block_grid(tiles))
}
