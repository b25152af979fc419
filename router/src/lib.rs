pub mod algo;
pub mod error;
pub mod finalize;
pub mod global_router;
pub mod grid;
pub mod pin_access;
pub mod post;
pub mod report;
pub mod utils;

use error::RouteError;
use global_router::GlobalRouter;
use report::RoutingReport;
use std::sync::atomic::AtomicBool;
use vroute_common::db::core::DesignDB;
use vroute_common::db::parser::guide::GuideMap;
use vroute_common::db::route::GRoute;
use vroute_common::geom::coord::GridCoord;
use vroute_common::util::config::GlobalRoutingConfig;
use vroute_rules::RuleDb;

/// Everything a global routing run hands back to its caller.
pub struct RoutingOutcome {
    /// One entry per net, in net order.
    pub routes: Vec<GRoute>,
    pub guides: GuideMap,
    pub report: RoutingReport,
    pub pin_tiles: Vec<Vec<GridCoord>>,
    /// `(usage, capacity)` of every capacity-limited edge at the end of the run.
    pub usage: Vec<(u32, u32)>,
}

pub fn route(
    db: &DesignDB,
    rules: Option<&RuleDb>,
    config: &GlobalRoutingConfig,
    cancel: &AtomicBool,
) -> Result<RoutingOutcome, RouteError> {
    let mut router = GlobalRouter::new(db, rules, config)?;
    let routes = router.run(cancel);
    let guides = router.guides(&db.tech, &routes);
    let report = router.report(&db.tech, &routes);
    report.log_summary();
    Ok(RoutingOutcome {
        pin_tiles: router.pin_tiles(),
        usage: router.grid().usage_snapshot(),
        routes,
        guides,
        report,
    })
}
