//! Ship entities - rigid tile bodies and the pistons connecting them

pub mod collide;
pub mod connectivity;
pub mod decompose;
pub mod gravity;
pub mod piston;

#[cfg(test)]
pub(crate) mod test_support;

use blockship_grid::{IRect, ShipTile, TileGrid, TileSet};
use glam::IVec2;
use slotmap::SlotMap;
use smallvec::SmallVec;

pub use collide::{
    add_dragged_parts, collide_parts, move_parts, CollideCtx, CollideMode, PushResult,
};
pub use connectivity::{find_connected_parts, ConnectedParts};
pub use decompose::decompose_and_delete;
pub use gravity::{move_ships_by_gravity, GravityConfig};
pub use piston::{extend_or_retract, ExtendRetractStatus, MIN_PISTON_LENGTH};

slotmap::new_key_type! {
    pub struct BlockKey;
    pub struct PistonKey;
}

/// Tagged identifier of one dynamic solid, as stored in the spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolidId {
    Blocks(BlockKey),
    Piston(PistonKey),
}

/// Per-body gravity integration state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityState {
    /// Current speed in pixels per tick (fractional).
    pub speed: f32,
    /// Carried rounding remainder so fractional speeds are not lost.
    pub speed_comp: f32,
    /// Direction the speed was accumulated in; a change resets the speed.
    pub last_dir: IVec2,
    pub enabled: bool,
}

impl Default for GravityState {
    fn default() -> Self {
        Self {
            speed: 0.0,
            speed_comp: 0.0,
            last_dir: IVec2::ZERO,
            enabled: true,
        }
    }
}

/// A rigid island of ship tiles, one simulation entity.
#[derive(Debug, Clone)]
pub struct ShipBlocks {
    /// World-space pixel position of the grid origin.
    pub pos: IVec2,
    pub map: TileGrid<ShipTile>,
    /// False for bodies fixed to the world (never pushed, never falling).
    pub can_move: bool,
    pub gravity: GravityState,
    /// Pistons attached to this body. Non-owning back references.
    pub pistons: SmallVec<[PistonKey; 4]>,
}

impl ShipBlocks {
    pub fn new(pos: IVec2, map: TileGrid<ShipTile>) -> Self {
        Self {
            pos,
            map,
            can_move: true,
            gravity: GravityState::default(),
            pistons: SmallVec::new(),
        }
    }

    /// World-space pixel footprint.
    pub fn world_rect(&self) -> IRect {
        IRect::from_pos_size(self.pos, self.map.pixel_size())
    }
}

/// Which endpoint of a piston, in canonical top-left to bottom-right order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PistonSide {
    A,
    B,
}

impl PistonSide {
    pub fn opposite(self) -> PistonSide {
        match self {
            PistonSide::A => PistonSide::B,
            PistonSide::B => PistonSide::A,
        }
    }
}

/// A variable-length rigid connector between two bodies.
///
/// Endpoint offsets locate the top-left corner of the attachment edge
/// relative to each body's anchor; A always precedes B along the piston axis.
#[derive(Debug, Clone)]
pub struct Piston {
    pub is_vertical: bool,
    pub a: BlockKey,
    pub b: BlockKey,
    pub pos_relative_to_a: IVec2,
    pub pos_relative_to_b: IVec2,
    /// Cached world rectangle, refreshed whenever an endpoint moves.
    pub last_rect: IRect,
    /// Alternates which side moves when actuation is otherwise tied.
    pub dir_flip_flop: bool,
}

impl Piston {
    /// Current length along the piston axis, in pixels.
    pub fn current_length(&self, blocks: &SlotMap<BlockKey, ShipBlocks>) -> i32 {
        let a = blocks[self.a].pos + self.pos_relative_to_a;
        let b = blocks[self.b].pos + self.pos_relative_to_b;
        axis(b - a, self.is_vertical)
    }

    /// World rectangle spanned between the two attachment edges.
    pub fn world_rect(&self, blocks: &SlotMap<BlockKey, ShipBlocks>) -> IRect {
        let a = blocks[self.a].pos + self.pos_relative_to_a;
        let b = blocks[self.b].pos + self.pos_relative_to_b;
        if self.is_vertical {
            IRect::new(a, IVec2::new(a.x + ShipTile::SIZE, b.y))
        } else {
            IRect::new(a, IVec2::new(b.x, a.y + ShipTile::SIZE))
        }
    }

    /// Distance from a world-space point to the piston's center line segment,
    /// used by UI hit-testing.
    pub fn distance_to_point(&self, blocks: &SlotMap<BlockKey, ShipBlocks>, point: IVec2) -> i32 {
        let half = ShipTile::SIZE / 2;
        let a = blocks[self.a].pos + self.pos_relative_to_a + axis_vec(!self.is_vertical, half);
        let relative = axis(point, self.is_vertical) - axis(a, self.is_vertical);
        let length =
            axis(blocks[self.b].pos + self.pos_relative_to_b, self.is_vertical) - axis(a, self.is_vertical);

        let mut ret = ((axis(point, !self.is_vertical) - axis(a, !self.is_vertical)).abs() - half).max(0);
        if relative < 0 {
            ret = ret.max(-relative);
        }
        if relative > length {
            ret = ret.max(relative - length);
        }
        ret
    }
}

/// Arenas for all ship entities. Keys stay stable across removals.
#[derive(Debug, Default)]
pub struct PartArena {
    pub blocks: SlotMap<BlockKey, ShipBlocks>,
    pub pistons: SlotMap<PistonKey, Piston>,
}

impl PartArena {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Unit vector along the vertical (true) or horizontal (false) axis.
pub(crate) fn axis_vec(vertical: bool, sign: i32) -> IVec2 {
    if vertical {
        IVec2::new(0, sign)
    } else {
        IVec2::new(sign, 0)
    }
}

/// Component of `v` along the vertical (true) or horizontal (false) axis.
pub(crate) fn axis(v: IVec2, vertical: bool) -> i32 {
    if vertical {
        v.y
    } else {
        v.x
    }
}

/// The four cardinal neighbor offsets.
pub(crate) const DIRS4: [IVec2; 4] = [
    IVec2::new(1, 0),
    IVec2::new(0, 1),
    IVec2::new(-1, 0),
    IVec2::new(0, -1),
];
