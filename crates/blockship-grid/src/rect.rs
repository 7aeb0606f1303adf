//! Integer rectangle math

use glam::IVec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned integer rectangle in pixel coordinates.
///
/// Half-open: a point `p` is inside iff `min <= p < max` componentwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IRect {
    pub min: IVec2,
    pub max: IVec2,
}

impl IRect {
    pub const ZERO: IRect = IRect {
        min: IVec2::ZERO,
        max: IVec2::ZERO,
    };

    pub fn new(min: IVec2, max: IVec2) -> Self {
        Self { min, max }
    }

    pub fn from_pos_size(pos: IVec2, size: IVec2) -> Self {
        Self {
            min: pos,
            max: pos + size,
        }
    }

    pub fn size(self) -> IVec2 {
        self.max - self.min
    }

    /// True if the rectangle covers no pixels.
    pub fn is_empty(self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    pub fn offset(self, by: IVec2) -> Self {
        Self {
            min: self.min + by,
            max: self.max + by,
        }
    }

    /// Grow the rectangle by `margin` pixels on every side.
    pub fn expand(self, margin: i32) -> Self {
        Self {
            min: self.min - IVec2::splat(margin),
            max: self.max + IVec2::splat(margin),
        }
    }

    pub fn contains_point(self, p: IVec2) -> bool {
        p.x >= self.min.x && p.y >= self.min.y && p.x < self.max.x && p.y < self.max.y
    }

    pub fn contains_rect(self, other: IRect) -> bool {
        other.is_empty()
            || (other.min.x >= self.min.x
                && other.min.y >= self.min.y
                && other.max.x <= self.max.x
                && other.max.y <= self.max.y)
    }

    pub fn intersects(self, other: IRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }
}
