use crate::algo::astar::{AStar, SearchParams};
use crate::algo::steiner;
use crate::error::RouteError;
use crate::finalize;
use crate::grid::adjust::{self, LayerTracks};
use crate::grid::{DenseGrid, Edge, RoutingGrid};
use crate::pin_access;
use crate::report::{OverflowedEdge, RoutingReport};
use crate::utils::conversion::GridConverter;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use vroute_common::db::core::{DesignDB, LayerRange, NetClass, Tech};
use vroute_common::db::indices::NetId;
use vroute_common::db::parser::guide::GuideMap;
use vroute_common::db::route::{GRoute, NetStatus};
use vroute_common::geom::coord::GridCoord;
use vroute_common::util::config::GlobalRoutingConfig;
use vroute_common::util::profiler::ScopedTimer;
use vroute_rules::RuleDb;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Init,
    InitialRoute,
    OverflowIterate(usize),
    Finalize,
    Done,
}

/// A net as the router sees it: pin tiles plus cost settings.
#[derive(Clone, Debug)]
pub struct RouteNet {
    pub id: NetId,
    pub name: String,
    pub class: NetClass,
    /// Distinct pin tiles, z on the pin's access layer.
    pub pins: Vec<GridCoord>,
    pub alpha: f64,
    /// Supply nets and nets with fewer than two pins.
    pub skip: bool,
}

impl RouteNet {
    pub fn new(id: NetId, pins: Vec<GridCoord>) -> Self {
        Self {
            id,
            name: format!("net{}", id.index()),
            class: NetClass::Signal,
            pins,
            alpha: 0.0,
            skip: false,
        }
    }

    /// Every pin sits in the same tile column.
    pub fn is_local(&self) -> bool {
        self.pins
            .first()
            .is_some_and(|p| self.pins.iter().all(|q| (q.x, q.y) == (p.x, p.y)))
    }

    pub fn is_clock(&self) -> bool {
        self.class == NetClass::Clock
    }
}

#[derive(Clone, Debug, Default)]
struct NetRoute {
    paths: Vec<Vec<GridCoord>>,
    /// Sorted, each edge once.
    edges: Vec<Edge>,
    routed: bool,
    failed: bool,
}

/// Connects every pin of `net` to a growing tree, pins taken in Prim order.
fn route_net(grid: &DenseGrid, solver: &mut AStar, net: &RouteNet, params: &SearchParams) -> NetRoute {
    let mut out = NetRoute {
        routed: true,
        ..NetRoute::default()
    };
    let mut tree: Vec<GridCoord> = Vec::new();
    let mut in_tree: HashSet<GridCoord> = HashSet::new();

    for (i, _) in steiner::prim_order(&net.pins) {
        let pin = net.pins[i];
        if tree.is_empty() {
            tree.push(pin);
            in_tree.insert(pin);
            continue;
        }
        if in_tree.contains(&pin) {
            continue;
        }
        match solver.route(grid, &tree, pin, params) {
            Some(path) => {
                for &c in &path {
                    if in_tree.insert(c) {
                        tree.push(c);
                    }
                }
                out.paths.push(path);
            }
            None => {
                log::debug!("{}: pin tile {:?} unreachable", net.name, pin);
                out.failed = true;
            }
        }
    }

    out.edges = out
        .paths
        .iter()
        .flat_map(|p| p.windows(2).filter_map(|w| Edge::between(w[0], w[1])))
        .collect();
    out.edges.sort_unstable();
    out.edges.dedup();
    out
}

/// Negotiated-congestion global router over a [`DenseGrid`].
///
/// One run walks `Init -> InitialRoute -> OverflowIterate -> Finalize`, first
/// for signal nets and then once more for clock nets on their own layer range.
pub struct GlobalRouter<'a> {
    config: &'a GlobalRoutingConfig,
    grid: DenseGrid,
    conv: GridConverter,
    nets: Vec<RouteNet>,
    params: Vec<SearchParams>,
    routes: Vec<NetRoute>,
    signal_range: LayerRange,
    clock_range: LayerRange,
    rng: StdRng,
    penalty: f64,
    phase: Phase,
    iterations: usize,
    cancelled: bool,
}

impl<'a> GlobalRouter<'a> {
    /// Builds the grid, applies every capacity adjustment and resolves pin access.
    pub fn new(
        db: &DesignDB,
        rules: Option<&RuleDb>,
        config: &'a GlobalRoutingConfig,
    ) -> Result<Self, RouteError> {
        let (grid, conv, tracks) = adjust::build_grid(db, rules, config)?;
        let nets = build_nets(db, &conv, &tracks, config);
        Self::with_grid(grid, conv, nets, config, db.tech.num_routing_layers())
    }

    /// Router over a prepared grid and net list.
    pub fn with_grid(
        grid: DenseGrid,
        conv: GridConverter,
        nets: Vec<RouteNet>,
        config: &'a GlobalRoutingConfig,
        routing_layers: usize,
    ) -> Result<Self, RouteError> {
        let signal_range = adjust::signal_range(config, routing_layers)?;
        let clock_range = adjust::clock_range(config, routing_layers)?;
        let params = nets
            .iter()
            .map(|n| SearchParams {
                wire_weight: 1.0 + n.alpha,
                via_cost: config.via_cost,
                wrong_way_cost: config.wrong_way_cost,
                heuristic_weight: config.heuristic_weight,
                margin: config.margin,
                max_expansions: config.max_expansions,
                range: if n.is_clock() {
                    clock_range
                } else {
                    signal_range
                },
            })
            .collect();
        let routes = vec![NetRoute::default(); nets.len()];
        Ok(Self {
            config,
            grid,
            conv,
            nets,
            params,
            routes,
            signal_range,
            clock_range,
            rng: StdRng::seed_from_u64(config.seed),
            penalty: config.initial_penalty,
            phase: Phase::Init,
            iterations: 0,
            cancelled: false,
        })
    }

    pub fn grid(&self) -> &DenseGrid {
        &self.grid
    }

    pub fn converter(&self) -> &GridConverter {
        &self.conv
    }

    pub fn nets(&self) -> &[RouteNet] {
        &self.nets
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("GR phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Runs every phase and returns one route per net, in net order.
    ///
    /// `cancel` is polled at the top of each overflow iteration; on cancel the
    /// remaining passes are skipped and the routes found so far are finalized.
    pub fn run(&mut self, cancel: &AtomicBool) -> Vec<GRoute> {
        let _timer = ScopedTimer::new("Global routing");
        self.enter(Phase::Init);
        self.grid.set_penalty(self.penalty);
        let routable = self.routable_nets();
        let (clock, signal): (Vec<usize>, Vec<usize>) =
            routable.into_iter().partition(|&i| self.nets[i].is_clock());
        log::info!(
            "Starting Global Routing: {} signal nets, {} clock nets, layers {}..={} (clock {}..={})",
            signal.len(),
            clock.len(),
            self.signal_range.min,
            self.signal_range.max,
            self.clock_range.min,
            self.clock_range.max
        );

        self.pass(&signal, cancel);

        if !clock.is_empty() && !self.cancelled {
            log::info!("GR: clock pass for {} nets", clock.len());
            self.pass(&clock, cancel);
        }

        self.enter(Phase::Finalize);
        let routes = self.finalize();
        self.enter(Phase::Done);
        routes
    }

    /// Initial route then negotiation for one group of nets.
    fn pass(&mut self, nets: &[usize], cancel: &AtomicBool) {
        self.enter(Phase::InitialRoute);
        let order = self.degree_order(nets);
        self.initial_route(&order);
        self.negotiate(&order, cancel);
    }

    fn routable_nets(&self) -> Vec<usize> {
        (0..self.nets.len())
            .filter(|&i| !self.nets[i].skip && !self.nets[i].is_local())
            .collect()
    }

    /// Smaller nets first, then shorter ones.
    fn degree_order(&self, nets: &[usize]) -> Vec<usize> {
        let mut order: Vec<(usize, u32, usize)> = nets
            .iter()
            .map(|&i| {
                let n = &self.nets[i];
                (n.pins.len(), steiner::mst_length(&n.pins), i)
            })
            .collect();
        order.sort_unstable();
        order.into_iter().map(|(_, _, i)| i).collect()
    }

    fn initial_route(&mut self, order: &[usize]) {
        let start = Instant::now();
        let total = order.len();
        let mut done = 0;
        for chunk in order.chunks(self.config.batch_size.max(1)) {
            self.route_parallel(chunk);
            done += chunk.len();
            log::debug!(
                "GR Init: {}/{} nets, {:.1}s",
                done,
                total,
                start.elapsed().as_secs_f32()
            );
        }
        log::info!(
            "GR Init: routed {} nets, overflow {}, {}ms",
            total,
            self.grid.total_overflow(),
            start.elapsed().as_millis()
        );
    }

    /// Routes a batch against a frozen grid, then commits in order.
    fn route_parallel(&mut self, chunk: &[usize]) {
        let grid = &self.grid;
        let nets = &self.nets;
        let params = &self.params;
        let results: Vec<(usize, NetRoute)> = chunk
            .par_iter()
            .map_with(AStar::new(), |solver, &i| {
                (i, route_net(grid, solver, &nets[i], &params[i]))
            })
            .collect();
        for (i, route) in results {
            self.commit(i, route);
        }
    }

    /// Routes one net at a time so each sees the previous commits.
    fn route_sequential(&mut self, nets: &[usize]) {
        let mut solver = AStar::new();
        for &i in nets {
            let route = route_net(&self.grid, &mut solver, &self.nets[i], &self.params[i]);
            self.commit(i, route);
        }
    }

    fn commit(&mut self, i: usize, route: NetRoute) {
        for &e in &route.edges {
            self.grid.add_usage(e);
        }
        self.routes[i] = route;
    }

    fn rip_up(&mut self, i: usize) {
        let route = std::mem::take(&mut self.routes[i]);
        for &e in &route.edges {
            self.grid.remove_usage(e);
        }
    }

    fn crossing(&self, nets: &[usize], over: &HashSet<Edge>) -> Vec<usize> {
        nets.iter()
            .copied()
            .filter(|&i| self.routes[i].edges.iter().any(|e| over.contains(e)))
            .collect()
    }

    fn overflowed(&self) -> HashSet<Edge> {
        self.grid
            .overflowed_edges(self.config.allowed_overflow_slack)
            .into_iter()
            .collect()
    }

    /// Rip-up and reroute until no net in `nets` crosses an overflowed edge.
    /// Returns whether that state was reached.
    fn negotiate(&mut self, nets: &[usize], cancel: &AtomicBool) -> bool {
        for iter in 0..self.config.overflow_iterations {
            if cancel.load(Ordering::Relaxed) {
                log::warn!("GR: cancelled before overflow iteration {}", iter);
                self.cancelled = true;
                return false;
            }
            self.enter(Phase::OverflowIterate(iter));
            let start = Instant::now();
            let over = self.overflowed();
            let mut ripped = self.crossing(nets, &over);
            if ripped.is_empty() {
                log::info!("Global Routing converged at iter {}", iter);
                return true;
            }

            self.grid.update_history(self.config.history_increment);
            for &i in &ripped {
                self.rip_up(i);
            }
            // Shuffle to prevent livelock
            ripped.shuffle(&mut self.rng);

            if ripped.len() < self.config.batch_size {
                self.route_sequential(&ripped);
            } else {
                for chunk in ripped.chunks(self.config.batch_size.max(1)) {
                    self.route_parallel(chunk);
                }
            }
            self.iterations += 1;

            log::info!(
                "GR Iter {}: Overflowed edges: {}, Ripped: {}, Penalty: {:.2}, Time: {}ms",
                iter,
                over.len(),
                ripped.len(),
                self.penalty,
                start.elapsed().as_millis()
            );

            self.penalty *= self.config.penalty_multiplier;
            self.grid.set_penalty(self.penalty);
        }

        let left = self.crossing(nets, &self.overflowed());
        if left.is_empty() {
            return true;
        }
        if self.config.allow_overflow {
            log::warn!(
                "GR: iteration budget spent, {} nets still cross overflowed edges (overflow allowed)",
                left.len()
            );
        } else {
            log::warn!(
                "GR: iteration budget spent, {} nets unroutable without overflow",
                left.len()
            );
        }
        false
    }

    fn finalize(&self) -> Vec<GRoute> {
        let slack = self.config.allowed_overflow_slack;
        self.nets
            .iter()
            .zip(&self.routes)
            .map(|(net, r)| {
                let mut route = GRoute::new(net.id);
                if net.skip {
                    route.status = NetStatus::Skipped;
                } else if net.is_local() {
                    route.status = NetStatus::Local;
                    route.segments = finalize::local_connection(&net.pins);
                } else if r.routed {
                    let segments: Vec<_> = r
                        .paths
                        .iter()
                        .flat_map(|p| finalize::path_to_segments(p))
                        .collect();
                    route.segments = finalize::merge_segments(&segments);
                    route.status = if r.failed {
                        NetStatus::Unroutable
                    } else if r.edges.iter().any(|&e| self.grid.is_overflowed(e, slack)) {
                        if self.config.allow_overflow {
                            NetStatus::Overflowed
                        } else {
                            NetStatus::Unroutable
                        }
                    } else {
                        NetStatus::Routed
                    };
                }
                route
            })
            .collect()
    }

    /// Guides for every net that produced wiring or local connections.
    pub fn guides(&self, tech: &Tech, routes: &[GRoute]) -> GuideMap {
        let mut map = GuideMap::new();
        for (net, route) in self.nets.iter().zip(routes) {
            if matches!(route.status, NetStatus::Skipped | NetStatus::Pending) {
                continue;
            }
            let guides = finalize::net_guides(tech, &self.conv, &route.segments, &net.pins);
            if !guides.is_empty() {
                map.insert(net.id, guides);
            }
        }
        map
    }

    /// Pin tiles indexed by net, for route verification.
    pub fn pin_tiles(&self) -> Vec<Vec<GridCoord>> {
        let len = self.nets.iter().map(|n| n.id.index() + 1).max().unwrap_or(0);
        let mut out = vec![Vec::new(); len];
        for n in &self.nets {
            out[n.id.index()] = n.pins.clone();
        }
        out
    }

    pub fn report(&self, tech: &Tech, routes: &[GRoute]) -> RoutingReport {
        let slack = self.config.allowed_overflow_slack;
        let overflowed = self
            .grid
            .overflowed_edges(slack)
            .into_iter()
            .map(|e| OverflowedEdge {
                edge: e,
                layer: tech
                    .routing_layer(e.z)
                    .map(|l| l.name.clone())
                    .unwrap_or_else(|| format!("z{}", e.z)),
                usage: self.grid.usage(e),
                capacity: self.grid.capacity(e),
            })
            .collect();
        RoutingReport::new(routes, overflowed, self.grid.total_overflow(), self.iterations, self.cancelled)
    }
}

/// Resolves every net's pins to tiles through their best access points.
pub fn build_nets(
    db: &DesignDB,
    conv: &GridConverter,
    tracks: &[LayerTracks],
    config: &GlobalRoutingConfig,
) -> Vec<RouteNet> {
    db.nets
        .iter()
        .enumerate()
        .map(|(i, net)| {
            let mut pins: Vec<GridCoord> = net
                .pins
                .iter()
                .filter_map(|&pid| pin_access::best_access(db, db.pin(pid), tracks))
                .map(|ap| conv.to_grid(ap.point, ap.z))
                .collect();
            pins.sort_unstable();
            pins.dedup();
            let alpha = config
                .net_alpha
                .get(&net.name)
                .copied()
                .or(net.alpha)
                .unwrap_or(config.alpha);
            let skip = net.class.is_supply() || net.pins.len() < 2 || pins.is_empty();
            if !skip && pins.len() == 1 {
                log::debug!("{}: all pins share one tile", net.name);
            }
            RouteNet {
                id: NetId::new(i),
                name: net.name.clone(),
                class: net.class,
                pins,
                alpha,
                skip,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::EdgeDir;
    use rstest::rstest;
    use vroute_common::db::core::LayerDirection;
    use vroute_common::geom::point::Point;
    use vroute_common::geom::rect::Rect;

    fn g(x: u32, y: u32, z: u8) -> GridCoord {
        GridCoord::new(x, y, z)
    }

    fn setup(w: u32, h: u32, cap: u32) -> (DenseGrid, GridConverter) {
        let grid = DenseGrid::uniform(
            w,
            h,
            vec![LayerDirection::Horizontal, LayerDirection::Vertical],
            cap,
        );
        let conv = GridConverter::new(
            Rect::from_array([0, 0, w as i64 * 100, h as i64 * 100]),
            Point::new(0, 0),
            100,
            100,
        );
        (grid, conv)
    }

    #[test]
    fn shared_edge_over_capacity_is_negotiated_away() {
        let (grid, conv) = setup(5, 3, 2);
        let config = GlobalRoutingConfig::default();
        let nets = (0..3)
            .map(|i| RouteNet::new(NetId(i), vec![g(0, 1, 0), g(2, 1, 0)]))
            .collect();
        let mut router = GlobalRouter::with_grid(grid, conv, nets, &config, 2).unwrap();
        let routes = router.run(&AtomicBool::new(false));

        let shared = Edge::new(0, 1, 0, EdgeDir::Horizontal);
        assert!(router.grid().usage(shared) <= 2);
        assert!(routes.iter().all(|r| r.status == NetStatus::Routed));
        assert!(router.grid().overflowed_edges(0).is_empty());
        assert_eq!(router.phase(), Phase::Done);
        let detoured = routes
            .iter()
            .filter(|r| r.segments.len() > 1)
            .count();
        assert!(detoured >= 1);
    }

    #[rstest]
    #[case::overflow_allowed(true, NetStatus::Overflowed)]
    #[case::overflow_forbidden(false, NetStatus::Unroutable)]
    fn budget_exhausted_status_follows_allow_overflow(
        #[case] allow_overflow: bool,
        #[case] expected: NetStatus,
    ) {
        // One row, one layer: there is no way around.
        let grid = DenseGrid::uniform(4, 1, vec![LayerDirection::Horizontal], 1);
        let conv = GridConverter::new(
            Rect::from_array([0, 0, 400, 100]),
            Point::new(0, 0),
            100,
            100,
        );
        let config = GlobalRoutingConfig {
            overflow_iterations: 3,
            allow_overflow,
            ..GlobalRoutingConfig::default()
        };
        let nets = (0..2)
            .map(|i| RouteNet::new(NetId(i), vec![g(0, 0, 0), g(3, 0, 0)]))
            .collect();
        let mut router = GlobalRouter::with_grid(grid, conv, nets, &config, 1).unwrap();
        let routes = router.run(&AtomicBool::new(false));
        assert!(routes.iter().all(|r| r.status == expected));
        // best-effort wiring is kept either way
        assert!(routes.iter().all(|r| !r.segments.is_empty()));
        let report = router.report(&Tech::new(), &routes);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.overflowed.len(), 3);
        assert_eq!(report.wirelength, 6);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.unroutable, if allow_overflow { 0 } else { 2 });
    }

    #[test]
    fn local_and_skipped_nets_use_no_capacity() {
        let (grid, conv) = setup(4, 4, 2);
        let config = GlobalRoutingConfig::default();
        let mut skipped = RouteNet::new(NetId(1), vec![g(0, 0, 0), g(3, 3, 0)]);
        skipped.skip = true;
        let nets = vec![
            RouteNet::new(NetId(0), vec![g(2, 2, 0), g(2, 2, 1)]),
            skipped,
        ];
        let mut router = GlobalRouter::with_grid(grid, conv, nets, &config, 2).unwrap();
        let routes = router.run(&AtomicBool::new(false));
        assert_eq!(routes[0].status, NetStatus::Local);
        assert_eq!(routes[0].segments.len(), 1);
        assert_eq!(routes[1].status, NetStatus::Skipped);
        assert!(router.grid().edges().all(|e| router.grid().usage(e) == 0));
    }

    #[test]
    fn cancel_stops_before_negotiation() {
        let grid = DenseGrid::uniform(4, 1, vec![LayerDirection::Horizontal], 1);
        let conv = GridConverter::new(
            Rect::from_array([0, 0, 400, 100]),
            Point::new(0, 0),
            100,
            100,
        );
        let config = GlobalRoutingConfig::default();
        let nets = (0..2)
            .map(|i| RouteNet::new(NetId(i), vec![g(0, 0, 0), g(3, 0, 0)]))
            .collect();
        let mut router = GlobalRouter::with_grid(grid, conv, nets, &config, 1).unwrap();
        let routes = router.run(&AtomicBool::new(true));
        let report = router.report(&Tech::new(), &routes);
        assert!(report.cancelled);
        assert_eq!(report.iterations, 0);
        // initial routes survive cancellation
        assert!(routes.iter().all(|r| !r.segments.is_empty()));
    }

    #[test]
    fn clock_nets_stay_in_their_layer_range() {
        let grid = DenseGrid::uniform(
            6,
            6,
            vec![
                LayerDirection::Horizontal,
                LayerDirection::Vertical,
                LayerDirection::Horizontal,
                LayerDirection::Vertical,
            ],
            4,
        );
        let conv = GridConverter::new(
            Rect::from_array([0, 0, 600, 600]),
            Point::new(0, 0),
            100,
            100,
        );
        let config = GlobalRoutingConfig {
            min_layer_for_clock: 3,
            max_layer_for_clock: 4,
            ..GlobalRoutingConfig::default()
        };
        let mut clk = RouteNet::new(NetId(0), vec![g(0, 0, 0), g(5, 5, 0)]);
        clk.class = NetClass::Clock;
        let sig = RouteNet::new(NetId(1), vec![g(0, 5, 0), g(5, 0, 0)]);
        let mut router = GlobalRouter::with_grid(grid, conv, vec![clk, sig], &config, 4).unwrap();
        let before: Vec<u32> = router.grid().edges().map(|e| router.grid().capacity(e)).collect();
        let routes = router.run(&AtomicBool::new(false));
        assert!(
            routes[0]
                .segments
                .iter()
                .filter(|s| !s.is_via())
                .all(|s| s.from.z >= 2)
        );
        let after: Vec<u32> = router.grid().edges().map(|e| router.grid().capacity(e)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn clock_pass_leaves_signal_layers_alone() {
        let grid = DenseGrid::uniform(
            6,
            6,
            vec![
                LayerDirection::Horizontal,
                LayerDirection::Vertical,
                LayerDirection::Horizontal,
                LayerDirection::Vertical,
            ],
            1,
        );
        let conv = GridConverter::new(
            Rect::from_array([0, 0, 600, 600]),
            Point::new(0, 0),
            100,
            100,
        );
        let config = GlobalRoutingConfig {
            min_layer_for_clock: 3,
            max_layer_for_clock: 4,
            ..GlobalRoutingConfig::default()
        };
        let mut clk = RouteNet::new(NetId(0), vec![g(0, 0, 0), g(5, 5, 0)]);
        clk.class = NetClass::Clock;
        let sig = RouteNet::new(NetId(1), vec![g(0, 2, 0), g(5, 2, 0)]);
        let mut router = GlobalRouter::with_grid(grid, conv, vec![clk, sig], &config, 4).unwrap();
        let routes = router.run(&AtomicBool::new(false));

        let grid = router.grid();
        let low: Vec<Edge> = (0..2).flat_map(|z| grid.layer_edges(z)).collect();
        assert!(low.iter().any(|&e| grid.usage(e) > 0), "signal net left layers 0..=1");
        assert!(low.iter().all(|&e| grid.history(e) == 0.0));
        assert!(grid.overflowed_edges(0).is_empty());
        assert!(routes.iter().all(|r| r.status == NetStatus::Routed));
        let report = router.report(&Tech::new(), &routes);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.total_overflow, 0);
    }
}
