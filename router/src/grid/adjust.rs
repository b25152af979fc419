//! Nominal edge capacities and the adjustment passes that reduce them.
//!
//! Adjustments always run global, per-layer, per-region, then obstacles, each one
//! scaling the capacity left by the previous pass.

use super::{DenseGrid, Edge, EdgeDir, RoutingGrid};
use crate::error::RouteError;
use crate::utils::conversion::GridConverter;
use vroute_common::db::core::{DesignDB, LayerDirection, LayerRange, ObstructionKind};
use vroute_common::db::indices::LayerId;
use vroute_common::geom::Coord;
use vroute_common::geom::point::Point;
use vroute_common::geom::rect::Rect;
use vroute_common::util::config::GlobalRoutingConfig;
use vroute_common::util::profiler::ScopedTimer;
use vroute_rules::RuleDb;

/// Track pattern of one routing layer as the grid sees it.
#[derive(Clone, Copy, Debug)]
pub struct LayerTracks {
    pub layer: LayerId,
    pub direction: LayerDirection,
    pub pitch: Coord,
    /// Position of one track on each axis; the others follow at `pitch`.
    pub origin: Point,
}

impl LayerTracks {
    /// Tracks that cross an edge in `dir` over a tile side of `span`.
    fn nominal(&self, dir: EdgeDir, span: Coord, unidirectional: bool) -> u32 {
        let preferred = !matches!(
            (dir, self.direction),
            (EdgeDir::Horizontal, LayerDirection::Vertical)
                | (EdgeDir::Vertical, LayerDirection::Horizontal)
        );
        if !preferred && unidirectional {
            return 0;
        }
        (span / self.pitch).max(0) as u32
    }
}

/// Inclusive routing layer range for signal nets, from 1-based config layers.
pub fn signal_range(config: &GlobalRoutingConfig, available: usize) -> Result<LayerRange, RouteError> {
    let max = if config.max_routing_layer == 0 {
        available
    } else {
        config.max_routing_layer
    };
    to_range(config.min_routing_layer.max(1), max, available)
}

/// Clock layer range; falls back to the signal range when not configured.
pub fn clock_range(config: &GlobalRoutingConfig, available: usize) -> Result<LayerRange, RouteError> {
    if config.min_layer_for_clock == 0 && config.max_layer_for_clock == 0 {
        return signal_range(config, available);
    }
    let max = if config.max_layer_for_clock == 0 {
        available
    } else {
        config.max_layer_for_clock
    };
    to_range(config.min_layer_for_clock.max(1), max, available)
}

fn to_range(min: usize, max: usize, available: usize) -> Result<LayerRange, RouteError> {
    if min > max || max > available || available > u8::MAX as usize {
        return Err(RouteError::BadLayerRange { min, max, available });
    }
    Ok(LayerRange::new((min - 1) as u8, (max - 1) as u8))
}

/// Pitch of every routing layer after config overrides and spacing rules.
///
/// A layer whose minimum width plus spacing exceeds its pitch loses tracks.
pub fn layer_tracks(
    db: &DesignDB,
    rules: Option<&RuleDb>,
    config: &GlobalRoutingConfig,
) -> Result<Vec<LayerTracks>, RouteError> {
    let origin = grid_origin(db, config);
    let mut out = Vec::with_capacity(db.tech.num_routing_layers());
    for (z, layer) in db.tech.routing_layers().enumerate() {
        let base = config
            .layer_pitches
            .iter()
            .find(|p| p.layer == z + 1)
            .map(|p| p.pitch)
            .unwrap_or(layer.pitch);

        let mut pitch = base;
        if let Some(rules) = rules {
            let width = rules.min_width(layer.id).unwrap_or(layer.width);
            let prl = base * config.pitches_in_tile as Coord;
            if let Some(spacing) = rules.min_spacing(layer.id, width, prl) {
                let needed = width + spacing;
                if needed > pitch {
                    log::debug!(
                        "{}: width {} + spacing {} exceeds pitch {}",
                        layer.name,
                        width,
                        spacing,
                        pitch
                    );
                    pitch = needed;
                }
            }
        }
        if pitch <= 0 {
            return Err(RouteError::NoPitch(layer.name.clone()));
        }

        let mut track_origin = Point::new(origin.x + layer.offset, origin.y + layer.offset);
        for t in db.tracks_on(layer.id) {
            match t.direction {
                LayerDirection::Horizontal => track_origin.y = t.start,
                LayerDirection::Vertical => track_origin.x = t.start,
                LayerDirection::Unknown => {}
            }
        }
        log::debug!("{} (z={}): pitch {}", layer.name, z, pitch);
        out.push(LayerTracks {
            layer: layer.id,
            direction: layer.direction,
            pitch,
            origin: track_origin,
        });
    }
    Ok(out)
}

pub fn grid_origin(db: &DesignDB, config: &GlobalRoutingConfig) -> Point {
    config
        .grid_origin
        .map(|[x, y]| Point::new(x, y))
        .unwrap_or(db.die_area.min)
}

/// Tile grid over the die, sized from the lowest routing layer's pitch.
pub fn converter_for(
    db: &DesignDB,
    config: &GlobalRoutingConfig,
    tracks: &[LayerTracks],
) -> Result<GridConverter, RouteError> {
    if db.die_area.width() <= 0 || db.die_area.height() <= 0 {
        return Err(RouteError::EmptyDie);
    }
    let first = tracks.first().ok_or(RouteError::NoRoutingLayers)?;
    let tile = first.pitch * config.pitches_in_tile.max(1) as Coord;
    Ok(GridConverter::new(
        db.die_area,
        grid_origin(db, config),
        tile,
        tile,
    ))
}

/// Fills in nominal capacities. Planar edges on layers outside `range` stay at zero.
pub fn compute_capacities(
    grid: &mut DenseGrid,
    conv: &GridConverter,
    die: Rect,
    tracks: &[LayerTracks],
    range: LayerRange,
    unidirectional: bool,
) {
    let edges: Vec<Edge> = grid.edges().collect();
    for e in edges {
        let tile = clip(conv.tile_rect(e.x, e.y), die);
        let cap = match e.dir {
            EdgeDir::Via => {
                let (lo, hi) = (&tracks[e.z as usize], &tracks[e.z as usize + 1]);
                let pitch = lo.pitch.max(hi.pitch);
                ((tile.width() / pitch) * (tile.height() / pitch)).max(0) as u32
            }
            EdgeDir::Horizontal | EdgeDir::Vertical if !range.contains(e.z) => 0,
            EdgeDir::Horizontal => {
                tracks[e.z as usize].nominal(e.dir, tile.height(), unidirectional)
            }
            EdgeDir::Vertical => tracks[e.z as usize].nominal(e.dir, tile.width(), unidirectional),
        };
        grid.set_capacity(e, cap);
    }
}

fn clip(tile: Rect, die: Rect) -> Rect {
    tile.intersection(&die).unwrap_or(tile)
}

fn reduce(cap: u32, pct: f64) -> u32 {
    (cap as f64 * (1.0 - pct.clamp(0.0, 1.0))).floor() as u32
}

/// Scales every planar edge on layer `z` by `1 - pct`.
pub fn apply_layer_adjustment(grid: &mut DenseGrid, z: u8, pct: f64) {
    if z >= grid.layers() {
        log::warn!("Layer adjustment for z={} ignored: no such layer", z);
        return;
    }
    let edges: Vec<Edge> = grid.layer_edges(z).collect();
    for e in edges {
        let cap = reduce(grid.capacity(e), pct);
        grid.set_capacity(e, cap);
    }
}

/// Like [`apply_layer_adjustment`], restricted to edges whose tile overlaps `rect`.
pub fn apply_region_adjustment(
    grid: &mut DenseGrid,
    conv: &GridConverter,
    rect: Rect,
    z: u8,
    pct: f64,
) {
    if z >= grid.layers() {
        log::warn!("Region adjustment for z={} ignored: no such layer", z);
        return;
    }
    let Some((x0, y0, x1, y1)) = conv.tiles_overlapping(rect) else {
        log::warn!("Region adjustment {:?} lies outside the grid", rect);
        return;
    };
    for y in y0..=y1 {
        for x in x0..=x1 {
            for dir in [EdgeDir::Horizontal, EdgeDir::Vertical] {
                let e = Edge::new(x, y, z, dir);
                if grid.contains(e) {
                    let cap = reduce(grid.capacity(e), pct);
                    grid.set_capacity(e, cap);
                }
            }
        }
    }
}

/// Number of tracks `origin + k * pitch` inside the closed interval `[lo, hi]`.
fn tracks_in(lo: Coord, hi: Coord, origin: Coord, pitch: Coord) -> u32 {
    if hi < lo {
        return 0;
    }
    let first = -(-(lo - origin)).div_euclid(pitch);
    let last = (hi - origin).div_euclid(pitch);
    (last - first + 1).max(0) as u32
}

/// Subtracts the tracks each obstruction blocks from every edge it crosses.
///
/// Macro blockages are grown by `macro_extension` tiles first.
pub fn apply_obstacle_adjustment(
    grid: &mut DenseGrid,
    conv: &GridConverter,
    db: &DesignDB,
    tracks: &[LayerTracks],
    macro_extension: u32,
) -> usize {
    let mut touched = 0;
    for obs in &db.obstructions {
        let Some(z) = db.tech.layer(obs.layer).routing_index else {
            continue;
        };
        if z >= grid.layers() {
            continue;
        }
        let rect = match obs.kind {
            ObstructionKind::Macro if macro_extension > 0 => {
                let dx = conv.tile_width() * macro_extension as Coord;
                let dy = conv.tile_height() * macro_extension as Coord;
                Rect::new(
                    Point::new(obs.rect.min.x - dx, obs.rect.min.y - dy),
                    Point::new(obs.rect.max.x + dx, obs.rect.max.y + dy),
                )
            }
            _ => obs.rect,
        };
        let Some((x0, y0, x1, y1)) = conv.tiles_overlapping(rect) else {
            continue;
        };
        let t = &tracks[z as usize];
        // Edges reaching one tile outside the box still cross it at their far end.
        for y in y0.saturating_sub(1)..=y1 {
            for x in x0.saturating_sub(1)..=x1 {
                for dir in [EdgeDir::Horizontal, EdgeDir::Vertical] {
                    let e = Edge::new(x, y, z, dir);
                    if !grid.contains(e) {
                        continue;
                    }
                    let a = conv.to_world(e.lower());
                    let b = conv.to_world(e.upper());
                    let tile = conv.tile_rect(x, y);
                    let blocked = match dir {
                        EdgeDir::Horizontal if rect.min.x < b.x && rect.max.x > a.x => tracks_in(
                            rect.min.y.max(tile.min.y),
                            rect.max.y.min(tile.max.y - 1),
                            t.origin.y,
                            t.pitch,
                        ),
                        EdgeDir::Vertical if rect.min.y < b.y && rect.max.y > a.y => tracks_in(
                            rect.min.x.max(tile.min.x),
                            rect.max.x.min(tile.max.x - 1),
                            t.origin.x,
                            t.pitch,
                        ),
                        _ => 0,
                    };
                    if blocked > 0 {
                        let cap = grid.capacity(e).saturating_sub(blocked);
                        grid.set_capacity(e, cap);
                        touched += 1;
                    }
                }
            }
        }
    }
    touched
}

/// Builds the grid and runs every capacity pass in order.
pub fn build_grid(
    db: &DesignDB,
    rules: Option<&RuleDb>,
    config: &GlobalRoutingConfig,
) -> Result<(DenseGrid, GridConverter, Vec<LayerTracks>), RouteError> {
    let _timer = ScopedTimer::new("Grid construction");
    let layers = db.tech.num_routing_layers();
    if layers == 0 {
        return Err(RouteError::NoRoutingLayers);
    }
    let range = signal_range(config, layers)?;
    let tracks = layer_tracks(db, rules, config)?;
    let conv = converter_for(db, config, &tracks)?;

    let directions = tracks.iter().map(|t| t.direction).collect();
    let mut grid = DenseGrid::new(conv.grid_width(), conv.grid_height(), directions);
    grid.set_limit_vias(config.limit_via_capacity);
    compute_capacities(
        &mut grid,
        &conv,
        db.die_area,
        &tracks,
        range,
        config.unidirectional_route,
    );
    log::info!(
        "Grid {}x{}x{}, tile {}x{}",
        conv.grid_width(),
        conv.grid_height(),
        layers,
        conv.tile_width(),
        conv.tile_height()
    );

    if config.adjustment > 0.0 {
        for z in 0..grid.layers() {
            apply_layer_adjustment(&mut grid, z, config.adjustment);
        }
    }
    for adj in &config.layer_adjustments {
        match adj.layer.checked_sub(1) {
            Some(z) if z < layers => apply_layer_adjustment(&mut grid, z as u8, adj.reduction),
            _ => log::warn!("Layer adjustment for unknown layer {} ignored", adj.layer),
        }
    }
    for adj in &config.region_adjustments {
        let rect = Rect::from_array([adj.min_x, adj.min_y, adj.max_x, adj.max_y]);
        match adj.layer.checked_sub(1) {
            Some(z) if z < layers => {
                apply_region_adjustment(&mut grid, &conv, rect, z as u8, adj.reduction)
            }
            _ => log::warn!("Region adjustment for unknown layer {} ignored", adj.layer),
        }
    }
    let touched = apply_obstacle_adjustment(&mut grid, &conv, db, &tracks, config.macro_extension);
    log::info!(
        "Capacity adjustments done: {} edges reduced by {} obstructions",
        touched,
        db.obstructions.len()
    );
    for z in 0..grid.layers() {
        log::debug!("z={} planar capacity {}", z, grid.layer_capacity(z));
    }
    Ok((grid, conv, tracks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vroute_common::db::core::{LayerType, Obstruction, Tech};

    fn tech() -> Tech {
        let mut tech = Tech::new();
        tech.add_layer("M1".into(), LayerType::Routing, LayerDirection::Horizontal, 100, 50)
            .unwrap();
        tech.add_layer("V1".into(), LayerType::Cut, LayerDirection::Unknown, 0, 50)
            .unwrap();
        tech.add_layer("M2".into(), LayerType::Routing, LayerDirection::Vertical, 100, 50)
            .unwrap();
        tech
    }

    fn design() -> DesignDB {
        DesignDB::new("t".into(), tech(), Rect::from_array([0, 0, 4000, 3000]))
    }

    fn config() -> GlobalRoutingConfig {
        GlobalRoutingConfig {
            pitches_in_tile: 10,
            ..GlobalRoutingConfig::default()
        }
    }

    #[test]
    fn nominal_capacity_is_tracks_per_tile() {
        let db = design();
        let mut cfg = config();
        let (grid, conv, _) = build_grid(&db, None, &cfg).unwrap();
        assert_eq!((conv.grid_width(), conv.grid_height()), (4, 3));
        assert_eq!(grid.capacity(Edge::new(0, 0, 0, EdgeDir::Horizontal)), 10);
        assert_eq!(grid.capacity(Edge::new(0, 0, 0, EdgeDir::Vertical)), 10);
        assert_eq!(grid.capacity(Edge::new(0, 0, 0, EdgeDir::Via)), 100);

        cfg.unidirectional_route = true;
        let (grid, _, _) = build_grid(&db, None, &cfg).unwrap();
        assert_eq!(grid.capacity(Edge::new(0, 0, 0, EdgeDir::Vertical)), 0);
        assert_eq!(grid.capacity(Edge::new(0, 0, 1, EdgeDir::Horizontal)), 0);
        assert_eq!(grid.capacity(Edge::new(0, 0, 1, EdgeDir::Vertical)), 10);
    }

    #[test]
    fn layers_outside_range_get_no_capacity() {
        let db = design();
        let cfg = GlobalRoutingConfig {
            min_routing_layer: 2,
            ..config()
        };
        let (grid, _, _) = build_grid(&db, None, &cfg).unwrap();
        assert_eq!(grid.layer_capacity(0), 0);
        assert!(grid.layer_capacity(1) > 0);
    }

    #[test]
    fn region_adjustment_halves_capacity_before_obstacles() {
        let conv = GridConverter::new(
            Rect::from_array([0, 0, 3000, 3000]),
            Point::new(0, 0),
            1000,
            1000,
        );
        let mut grid = DenseGrid::uniform(3, 3, vec![LayerDirection::Horizontal], 10);
        apply_region_adjustment(&mut grid, &conv, Rect::from_array([0, 0, 1000, 1000]), 0, 0.5);
        assert_eq!(grid.capacity(Edge::new(0, 0, 0, EdgeDir::Horizontal)), 5);
        assert_eq!(grid.capacity(Edge::new(1, 0, 0, EdgeDir::Horizontal)), 10);
    }

    #[test]
    fn adjustments_compound_in_order() {
        let db = design();
        let mut cfg = config();
        cfg.adjustment = 0.2;
        cfg.layer_adjustments
            .push(vroute_common::util::config::LayerAdjustment {
                layer: 1,
                reduction: 0.5,
            });
        let (grid, _, _) = build_grid(&db, None, &cfg).unwrap();
        // 10 -> 8 -> 4
        assert_eq!(grid.capacity(Edge::new(1, 1, 0, EdgeDir::Horizontal)), 4);
        assert_eq!(grid.capacity(Edge::new(1, 1, 1, EdgeDir::Vertical)), 8);
    }

    #[test]
    fn obstacles_block_tracks_and_clamp_at_zero() {
        let mut db = design();
        // covers the lower half of row 0, tiles 1 and 2
        db.add_obstruction(Obstruction {
            layer: LayerId(0),
            rect: Rect::from_array([1000, 0, 3000, 499]),
            kind: ObstructionKind::Net,
        });
        db.add_obstruction(Obstruction {
            layer: LayerId(2),
            rect: Rect::from_array([0, 0, 4000, 3000]),
            kind: ObstructionKind::Macro,
        });
        let (grid, _, _) = build_grid(&db, None, &config()).unwrap();
        assert_eq!(grid.capacity(Edge::new(1, 0, 0, EdgeDir::Horizontal)), 5);
        assert_eq!(grid.capacity(Edge::new(0, 0, 0, EdgeDir::Horizontal)), 5);
        assert_eq!(grid.capacity(Edge::new(0, 1, 0, EdgeDir::Horizontal)), 10);
        assert_eq!(grid.layer_capacity(1), 0);
    }

    #[test]
    fn track_counting() {
        assert_eq!(tracks_in(0, 499, 0, 100), 5);
        assert_eq!(tracks_in(50, 150, 0, 100), 1);
        assert_eq!(tracks_in(-250, -50, 0, 100), 2);
        assert_eq!(tracks_in(10, 5, 0, 100), 0);
    }

    #[test]
    fn clock_range_defaults_to_signal_range() {
        let cfg = GlobalRoutingConfig {
            max_routing_layer: 2,
            ..config()
        };
        assert_eq!(clock_range(&cfg, 3).unwrap(), LayerRange::new(0, 1));
        let cfg = GlobalRoutingConfig {
            min_layer_for_clock: 2,
            ..config()
        };
        assert_eq!(clock_range(&cfg, 3).unwrap(), LayerRange::new(1, 2));
        let bad = GlobalRoutingConfig {
            max_routing_layer: 5,
            ..config()
        };
        assert!(signal_range(&bad, 3).is_err());
    }
}
