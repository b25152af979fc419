use vroute_common::geom::Coord;
use vroute_common::geom::coord::GridCoord;
use vroute_common::geom::point::Point;
use vroute_common::geom::rect::Rect;

/// Maps database coordinates onto the tile grid and back.
#[derive(Clone, Copy, Debug)]
pub struct GridConverter {
    origin: Point,
    tile_w: Coord,
    tile_h: Coord,
    grid_w: u32,
    grid_h: u32,
}

impl GridConverter {
    /// Covers `area` with tiles of `tile_w × tile_h` starting at `origin`.
    pub fn new(area: Rect, origin: Point, tile_w: Coord, tile_h: Coord) -> Self {
        let tile_w = tile_w.max(1);
        let tile_h = tile_h.max(1);
        let span_x = (area.max.x - origin.x).max(1);
        let span_y = (area.max.y - origin.y).max(1);
        Self {
            origin,
            tile_w,
            tile_h,
            grid_w: (span_x / tile_w + (span_x % tile_w != 0) as Coord).max(1) as u32,
            grid_h: (span_y / tile_h + (span_y % tile_h != 0) as Coord).max(1) as u32,
        }
    }

    pub fn grid_width(&self) -> u32 {
        self.grid_w
    }

    pub fn grid_height(&self) -> u32 {
        self.grid_h
    }

    pub fn tile_width(&self) -> Coord {
        self.tile_w
    }

    pub fn tile_height(&self) -> Coord {
        self.tile_h
    }

    fn col(&self, x: Coord) -> u32 {
        ((x - self.origin.x).div_euclid(self.tile_w)).clamp(0, self.grid_w as Coord - 1) as u32
    }

    fn row(&self, y: Coord) -> u32 {
        ((y - self.origin.y).div_euclid(self.tile_h)).clamp(0, self.grid_h as Coord - 1) as u32
    }

    /// Tile containing `p`, clamped onto the grid.
    pub fn to_grid(&self, p: Point, layer: u8) -> GridCoord {
        GridCoord::new(self.col(p.x), self.row(p.y), layer)
    }

    /// Center of the tile, in database units.
    pub fn to_world(&self, g: GridCoord) -> Point {
        self.tile_rect(g.x, g.y).center()
    }

    pub fn tile_rect(&self, x: u32, y: u32) -> Rect {
        let min = Point::new(
            self.origin.x + x as Coord * self.tile_w,
            self.origin.y + y as Coord * self.tile_h,
        );
        Rect::new(min, Point::new(min.x + self.tile_w, min.y + self.tile_h))
    }

    /// Inclusive tile range `(x0, y0, x1, y1)` whose interiors overlap `rect`.
    pub fn tiles_overlapping(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let grid = Rect::new(
            self.origin,
            Point::new(
                self.origin.x + self.grid_w as Coord * self.tile_w,
                self.origin.y + self.grid_h as Coord * self.tile_h,
            ),
        );
        if !grid.overlaps(&rect) && !(rect.area() == 0 && grid.contains(rect.min)) {
            return None;
        }
        let x0 = self.col(rect.min.x);
        let y0 = self.row(rect.min.y);
        // A max edge sitting on a tile boundary does not reach into the next tile.
        let x1 = self.col(rect.max.x - 1).max(x0);
        let y1 = self.row(rect.max.y - 1).max(y0);
        Some((x0, y0, x1, y1))
    }
}
