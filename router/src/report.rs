use crate::grid::{Edge, EdgeDir};
use std::io::Write;
use vroute_common::db::route::{GRoute, NetStatus};

#[derive(Clone, Debug, PartialEq)]
pub struct OverflowedEdge {
    pub edge: Edge,
    pub layer: String,
    pub usage: u32,
    pub capacity: u32,
}

/// Summary of one global routing run.
#[derive(Clone, Debug, Default)]
pub struct RoutingReport {
    pub routed: usize,
    pub local: usize,
    pub overflowed_nets: usize,
    pub unroutable: usize,
    pub skipped: usize,
    pub pending: usize,
    /// Planar tile hops over all nets.
    pub wirelength: u64,
    pub vias: u64,
    pub total_overflow: u64,
    pub iterations: usize,
    pub cancelled: bool,
    pub overflowed: Vec<OverflowedEdge>,
}

impl RoutingReport {
    pub fn new(
        routes: &[GRoute],
        overflowed: Vec<OverflowedEdge>,
        total_overflow: u64,
        iterations: usize,
        cancelled: bool,
    ) -> Self {
        let mut report = Self {
            total_overflow,
            iterations,
            cancelled,
            overflowed,
            ..Self::default()
        };
        for r in routes {
            match r.status {
                NetStatus::Routed => report.routed += 1,
                NetStatus::Local => report.local += 1,
                NetStatus::Overflowed => report.overflowed_nets += 1,
                NetStatus::Unroutable => report.unroutable += 1,
                NetStatus::Skipped => report.skipped += 1,
                NetStatus::Pending => report.pending += 1,
            }
            report.wirelength += r.wirelength() as u64;
            report.vias += r.via_count() as u64;
        }
        report
    }

    /// Nets that ended overflowed, unreachable or never routed.
    pub fn failed(&self) -> usize {
        self.overflowed_nets + self.unroutable + self.pending
    }

    pub fn log_summary(&self) {
        log::info!(
            "GR result: {} routed, {} local, {} skipped, {} overflowed, {} unroutable, {} pending",
            self.routed,
            self.local,
            self.skipped,
            self.overflowed_nets,
            self.unroutable,
            self.pending
        );
        log::info!(
            "GR totals: wirelength {} tiles, {} vias, overflow {} on {} edges after {} iterations",
            self.wirelength,
            self.vias,
            self.total_overflow,
            self.overflowed.len(),
            self.iterations
        );
        if self.cancelled {
            log::warn!("GR run was cancelled; results are partial");
        }
    }
}

/// One line per overflowed edge: `x y layer dir usage capacity`.
pub fn write_congestion_report<W: Write>(mut w: W, report: &RoutingReport) -> std::io::Result<()> {
    writeln!(w, "# x y layer dir usage capacity")?;
    for e in &report.overflowed {
        let dir = match e.edge.dir {
            EdgeDir::Horizontal => "H",
            EdgeDir::Vertical => "V",
            EdgeDir::Via => "Z",
        };
        writeln!(
            w,
            "{} {} {} {} {} {}",
            e.edge.x, e.edge.y, e.layer, dir, e.usage, e.capacity
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vroute_common::db::indices::NetId;
    use vroute_common::db::route::GSegment;
    use vroute_common::geom::coord::GridCoord;

    #[test]
    fn counts_and_report_lines() {
        let mut a = GRoute::new(NetId(0));
        a.status = NetStatus::Routed;
        a.segments = vec![
            GSegment::new(GridCoord::new(0, 0, 0), GridCoord::new(3, 0, 0)),
            GSegment::new(GridCoord::new(3, 0, 0), GridCoord::new(3, 0, 1)),
        ];
        let mut b = GRoute::new(NetId(1));
        b.status = NetStatus::Overflowed;
        let edge = OverflowedEdge {
            edge: Edge::new(2, 5, 1, EdgeDir::Vertical),
            layer: "M2".into(),
            usage: 3,
            capacity: 2,
        };
        let report = RoutingReport::new(&[a, b], vec![edge], 1, 4, false);
        assert_eq!(report.routed, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!((report.wirelength, report.vias), (3, 1));

        let mut buf = Vec::new();
        write_congestion_report(&mut buf, &report).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().nth(1), Some("2 5 M2 V 3 2"));
    }
}
