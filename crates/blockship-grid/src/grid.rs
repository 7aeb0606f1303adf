//! Typed 2D tile grids and their collision queries

use glam::IVec2;

use crate::rect::IRect;
use crate::tiles::TileSet;

/// One grid cell: a tile plus a cosmetic noise byte used by rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cell<T> {
    pub tile: T,
    pub noise: u8,
}

/// A rectangular grid of typed tiles at the resolution of its tile set.
///
/// Positions passed to `tile_at`/`cell` are tile coordinates; collision
/// queries take pixel coordinates relative to the grid origin.
#[derive(Debug, Clone, Default)]
pub struct TileGrid<T: TileSet> {
    size: IVec2,
    cells: Vec<Cell<T>>,
}

impl<T: TileSet + Default> TileGrid<T> {
    /// Create an air-filled grid. A zero size is allowed (decomposition grows
    /// destination grids from nothing).
    pub fn new(size: IVec2) -> Self {
        assert!(size.x >= 0 && size.y >= 0, "negative grid size");
        Self {
            size,
            cells: vec![Cell::default(); (size.x * size.y) as usize],
        }
    }

    /// Grow to `new_size`, shifting existing cells by `shift` (non-negative).
    /// New cells are air.
    pub fn resize_with_offset(&mut self, new_size: IVec2, shift: IVec2) {
        assert!(shift.x >= 0 && shift.y >= 0, "negative cell shift");
        assert!(
            new_size.x >= self.size.x + shift.x && new_size.y >= self.size.y + shift.y,
            "resize would drop cells"
        );
        let mut cells = vec![Cell::default(); (new_size.x * new_size.y) as usize];
        for y in 0..self.size.y {
            for x in 0..self.size.x {
                let src = (y * self.size.x + x) as usize;
                let dst = ((y + shift.y) * new_size.x + (x + shift.x)) as usize;
                cells[dst] = self.cells[src];
            }
        }
        self.size = new_size;
        self.cells = cells;
    }
}

impl<T: TileSet> TileGrid<T> {
    pub fn size(&self) -> IVec2 {
        self.size
    }

    pub fn has_area(&self) -> bool {
        self.size.x > 0 && self.size.y > 0
    }

    /// Pixel footprint of the whole grid, origin at (0, 0).
    pub fn pixel_size(&self) -> IVec2 {
        self.size * T::SIZE
    }

    pub fn pixel_rect(&self) -> IRect {
        IRect::from_pos_size(IVec2::ZERO, self.pixel_size())
    }

    pub fn in_bounds(&self, tile_pos: IVec2) -> bool {
        tile_pos.x >= 0 && tile_pos.y >= 0 && tile_pos.x < self.size.x && tile_pos.y < self.size.y
    }

    fn index(&self, tile_pos: IVec2) -> usize {
        (tile_pos.y * self.size.x + tile_pos.x) as usize
    }

    pub fn cell(&self, tile_pos: IVec2) -> Option<&Cell<T>> {
        self.in_bounds(tile_pos).then(|| &self.cells[self.index(tile_pos)])
    }

    pub fn cell_mut(&mut self, tile_pos: IVec2) -> Option<&mut Cell<T>> {
        if self.in_bounds(tile_pos) {
            let i = self.index(tile_pos);
            Some(&mut self.cells[i])
        } else {
            None
        }
    }

    /// Tile at a tile position; out of bounds reads as air.
    pub fn tile_at(&self, tile_pos: IVec2) -> T {
        self.cell(tile_pos).map_or(T::AIR, |c| c.tile)
    }

    /// Overwrite one cell. Writing out of bounds is a programmer error.
    pub fn set_cell(&mut self, tile_pos: IVec2, cell: Cell<T>) {
        let slot = self
            .cell_mut(tile_pos)
            .unwrap_or_else(|| panic!("set_cell out of bounds at {tile_pos}"));
        *slot = cell;
    }

    /// Solid test at a pixel position relative to the grid origin.
    pub fn collides_with_point(&self, point: IVec2) -> bool {
        let tile_pos = IVec2::new(point.x.div_euclid(T::SIZE), point.y.div_euclid(T::SIZE));
        self.tile_at(tile_pos).is_solid()
    }

    /// Solid test against a pixel box relative to the grid origin.
    ///
    /// Samples the box on a `T::SIZE`-spaced lattice that always includes the
    /// far edges, so no solid tile strictly inside the box can be skipped.
    pub fn collides_with_box(&self, b: IRect) -> bool {
        if b.is_empty() {
            return false;
        }
        let last = b.max - IVec2::ONE;
        stepped(b.min.y, last.y, T::SIZE, |y| {
            stepped(b.min.x, last.x, T::SIZE, |x| {
                self.collides_with_point(IVec2::new(x, y))
            })
        })
    }

    /// Solid overlap test between two grids of possibly different resolutions.
    ///
    /// `self_relative_pos` is this grid's pixel origin in the other grid's
    /// frame. The finer grid drives: it walks its own solid cells restricted
    /// to the other grid's footprint and probes each cell's pixel contour, so
    /// the cost is proportional to solid-cell perimeter. Calling this on the
    /// coarser grid recurses once with the roles swapped.
    pub fn collides_with_grid<U: TileSet>(
        &self,
        other: &TileGrid<U>,
        self_relative_pos: IVec2,
    ) -> bool {
        if T::SIZE > U::SIZE {
            return other.collides_with_grid(self, -self_relative_pos);
        }

        if !self
            .pixel_rect()
            .offset(self_relative_pos)
            .intersects(other.pixel_rect())
        {
            return false;
        }

        // Own tile range overlapping the other grid's footprint.
        let lo = -self_relative_pos;
        let hi = -self_relative_pos + other.pixel_size() - IVec2::ONE;
        let a = IVec2::new(lo.x.div_euclid(T::SIZE), lo.y.div_euclid(T::SIZE)).max(IVec2::ZERO);
        let b = IVec2::new(hi.x.div_euclid(T::SIZE), hi.y.div_euclid(T::SIZE))
            .min(self.size - IVec2::ONE);

        for ty in a.y..=b.y {
            for tx in a.x..=b.x {
                let tile_pos = IVec2::new(tx, ty);
                if !self.tile_at(tile_pos).is_solid() {
                    continue;
                }
                let origin = tile_pos * T::SIZE + self_relative_pos;
                if cell_contour(origin, T::SIZE, |point| other.collides_with_point(point)) {
                    return true;
                }
            }
        }
        false
    }
}

/// Walk `from..=last` in steps of `step`, always visiting `last`.
fn stepped(from: i32, last: i32, step: i32, mut f: impl FnMut(i32) -> bool) -> bool {
    let mut x = from;
    loop {
        if f(x) {
            return true;
        }
        if x >= last {
            return false;
        }
        x = (x + step).min(last);
    }
}

/// Visit the boundary pixels of a `size`-by-`size` cell at `origin`.
fn cell_contour(origin: IVec2, size: i32, mut f: impl FnMut(IVec2) -> bool) -> bool {
    let hi = origin + IVec2::splat(size - 1);
    for x in origin.x..=hi.x {
        if f(IVec2::new(x, origin.y)) || f(IVec2::new(x, hi.y)) {
            return true;
        }
    }
    for y in origin.y + 1..hi.y {
        if f(IVec2::new(origin.x, y)) || f(IVec2::new(hi.x, y)) {
            return true;
        }
    }
    false
}
