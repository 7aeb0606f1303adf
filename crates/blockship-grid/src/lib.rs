//! Tile data and grid collision queries for Blockship
//!
//! This crate provides the foundational tile types and grid queries:
//! - Tile enums for the two grid resolutions (WorldTile, ShipTile)
//! - Typed tile grids with point/box/grid-vs-grid collision queries
//! - Integer rectangle math shared by the simulation core

mod grid;
mod rect;
mod tiles;

pub use grid::{Cell, TileGrid};
pub use rect::IRect;
pub use tiles::{PistonRelation, ShipTile, TileSet, WorldTile};
