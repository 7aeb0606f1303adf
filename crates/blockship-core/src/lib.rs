//! Ship simulation core for Blockship
//!
//! A "ship" is a set of rigid tile bodies connected by extensible pistons.
//! This crate owns the simulation of those ships against a static tile map:
//! - Broad-phase spatial index over all dynamic solids (`spatial`)
//! - Entity arenas, connectivity traversal, grid decomposition, the
//!   push-based collision resolver, piston actuation and gravity (`ship`)
//! - Level file loading (`level`) and the per-tick world facade (`world`)

pub mod level;
pub mod ship;
pub mod spatial;
pub mod world;

pub use level::{load_level, LevelError, LevelFile, ShipSpawn};
pub use ship::{
    BlockKey, ConnectedParts, ExtendRetractStatus, GravityConfig, GravityState, PartArena, Piston,
    PistonKey, PistonSide, ShipBlocks, SolidId,
};
pub use spatial::DynamicSolidTree;
pub use world::{Cue, GoalStatus, GoalTracker, ShipWorld, Terrain};
