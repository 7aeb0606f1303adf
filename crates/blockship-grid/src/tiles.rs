//! Tile enums for the two grid resolutions

/// Common interface of a tile alphabet at one grid resolution.
pub trait TileSet: Copy + Eq + std::fmt::Debug {
    /// Edge length of one tile in pixels.
    const SIZE: i32;

    /// The empty tile.
    const AIR: Self;

    fn is_solid(self) -> bool;

    /// Decode a raw tile index from a level file.
    /// Returns None for indices outside the alphabet (load-time validation).
    fn from_index(index: u32) -> Option<Self>;
}

/// Coarse terrain tiles. Immovable, loaded once per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorldTile {
    #[default]
    Air,
    Wall,
    /// Decorative background, not solid.
    Bg,
}

impl TileSet for WorldTile {
    const SIZE: i32 = 12;
    const AIR: Self = WorldTile::Air;

    fn is_solid(self) -> bool {
        self == WorldTile::Wall
    }

    fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(WorldTile::Air),
            1 => Some(WorldTile::Wall),
            2 => Some(WorldTile::Bg),
            _ => None,
        }
    }
}

/// How a ship tile relates to piston attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PistonRelation {
    /// Empty space.
    Empty,
    /// A solid block a piston can attach to.
    SolidAttachable,
    /// A solid block that never takes piston attachments.
    SolidNonAttachable,
    /// A piston segment marker.
    Piston,
}

/// Fine per-body ship tiles.
///
/// Piston markers only exist until decomposition splits the grid into rigid
/// parts; after that pistons are entities and the markers are gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShipTile {
    #[default]
    Air,
    Block,
    PistonH,
    PistonV,
    Goal,
    Emerald,
}

impl TileSet for ShipTile {
    const SIZE: i32 = 4;
    const AIR: Self = ShipTile::Air;

    fn is_solid(self) -> bool {
        self != ShipTile::Air
    }

    fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(ShipTile::Air),
            1 => Some(ShipTile::Block),
            2 => Some(ShipTile::PistonH),
            3 => Some(ShipTile::PistonV),
            4 => Some(ShipTile::Goal),
            5 => Some(ShipTile::Emerald),
            _ => None,
        }
    }
}

impl ShipTile {
    pub fn piston_relation(self) -> PistonRelation {
        match self {
            ShipTile::Air => PistonRelation::Empty,
            ShipTile::Block => PistonRelation::SolidAttachable,
            ShipTile::PistonH | ShipTile::PistonV => PistonRelation::Piston,
            ShipTile::Goal | ShipTile::Emerald => PistonRelation::SolidNonAttachable,
        }
    }

    /// Solid and not a piston marker; these tiles form the rigid islands.
    pub fn is_regular(self) -> bool {
        matches!(
            self.piston_relation(),
            PistonRelation::SolidAttachable | PistonRelation::SolidNonAttachable
        )
    }

    /// The marker tile for a piston run of the given orientation.
    pub fn piston_marker(is_vertical: bool) -> ShipTile {
        if is_vertical {
            ShipTile::PistonV
        } else {
            ShipTile::PistonH
        }
    }
}
