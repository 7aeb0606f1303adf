//! Level loading
//!
//! Levels are RON files: one coarse terrain layer plus ship spawns drawn as
//! composite tile grids. Spawned grids decompose into rigid bodies and
//! pistons immediately, so a freshly loaded world contains only final
//! entities.

use blockship_grid::{Cell, ShipTile, TileGrid, TileSet, WorldTile};
use glam::IVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ship::{decompose_and_delete, GravityConfig, ShipBlocks};
use crate::world::{ShipWorld, Terrain};

#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("level file syntax: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("unknown tile index {index} at ({x}, {y}) in {layer}")]
    BadTile {
        index: u32,
        x: usize,
        y: usize,
        layer: String,
    },
    #[error("rows of {0} differ in length")]
    RaggedRows(String),
    #[error("unknown ship modifier {0:?}")]
    UnknownModifier(String),
}

/// One ship drawn as a composite grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipSpawn {
    #[serde(default)]
    pub name: String,
    /// World-space pixel position of the grid origin.
    pub pos: IVec2,
    /// Row-major tile indices at the ship resolution.
    pub tiles: Vec<Vec<u32>>,
    /// Per-spawn property flags: `nograv`, `fixed`, `goal`, `grav`.
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// A level file as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelFile {
    pub name: String,
    #[serde(default)]
    pub terrain_pos: IVec2,
    /// Row-major tile indices at the terrain resolution.
    pub terrain: Vec<Vec<u32>>,
    #[serde(default)]
    pub ships: Vec<ShipSpawn>,
    #[serde(default)]
    pub fail_below_y: Option<i32>,
    #[serde(default)]
    pub gravity: GravityConfig,
}

#[derive(Debug, Clone, Copy, Default)]
struct Modifiers {
    nograv: bool,
    fixed: bool,
    goal: bool,
    grav: bool,
}

fn parse_modifiers(names: &[String]) -> Result<Modifiers, LevelError> {
    let mut out = Modifiers::default();
    for name in names {
        match name.as_str() {
            "nograv" => out.nograv = true,
            "fixed" => out.fixed = true,
            "goal" => out.goal = true,
            "grav" => out.grav = true,
            other => return Err(LevelError::UnknownModifier(other.to_string())),
        }
    }
    Ok(out)
}

/// Decode a row-major index layer into a grid, regenerating cell noise.
fn parse_grid<T: TileSet + Default>(
    rows: &[Vec<u32>],
    layer: &str,
    rng: &mut impl Rng,
) -> Result<TileGrid<T>, LevelError> {
    let height = rows.len();
    let width = rows.first().map_or(0, |row| row.len());
    if rows.iter().any(|row| row.len() != width) {
        return Err(LevelError::RaggedRows(layer.to_string()));
    }

    let mut map = TileGrid::new(IVec2::new(width as i32, height as i32));
    for (y, row) in rows.iter().enumerate() {
        for (x, &index) in row.iter().enumerate() {
            let tile = T::from_index(index).ok_or_else(|| LevelError::BadTile {
                index,
                x,
                y,
                layer: layer.to_string(),
            })?;
            map.set_cell(
                IVec2::new(x as i32, y as i32),
                Cell {
                    tile,
                    noise: rng.gen(),
                },
            );
        }
    }
    Ok(map)
}

/// Parse a RON level and build the simulated world from it.
pub fn load_level(source: &str) -> Result<ShipWorld, LevelError> {
    let file: LevelFile = ron::from_str(source)?;
    build_world(&file)
}

/// Build a world from an already-parsed level file.
pub fn build_world(file: &LevelFile) -> Result<ShipWorld, LevelError> {
    let mut rng = rand::thread_rng();

    let terrain = Terrain {
        pos: file.terrain_pos,
        map: parse_grid::<WorldTile>(&file.terrain, "terrain", &mut rng)?,
    };
    let mut world = ShipWorld::new(terrain, file.gravity, file.fail_below_y);

    for spawn in &file.ships {
        let modifiers = parse_modifiers(&spawn.modifiers)?;
        let layer = if spawn.name.is_empty() {
            "ship"
        } else {
            spawn.name.as_str()
        };
        let map = parse_grid::<ShipTile>(&spawn.tiles, layer, &mut rng)?;

        let source = world.arena.blocks.insert(ShipBlocks::new(spawn.pos, map));
        let ShipWorld {
            arena, tree, goal, ..
        } = &mut world;
        decompose_and_delete(arena, tree, source, |key, body| {
            // A fixed ship neither moves nor falls.
            body.gravity.enabled = !modifiers.nograv && !modifiers.fixed;
            body.can_move = !modifiers.fixed;
            if modifiers.goal {
                goal.register_goal(key);
            }
            if modifiers.grav {
                goal.register_gravity_toggle(key);
            }
        });
        log::debug!("spawned ship {layer:?} at {}", spawn.pos);
    }

    log::info!(
        "loaded level {:?}: {} bodies, {} pistons",
        file.name,
        world.arena.blocks.len(),
        world.arena.pistons.len()
    );
    Ok(world)
}
