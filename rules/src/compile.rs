//! Turns per-layer rule records into a [`RuleDb`].

use crate::constraint::{Constraint, ConstraintKind, MinWidthRule};
use crate::db::RuleDb;
use crate::error::Result as RuleResult;
use crate::parse::{self, ParseContext};
use crate::token::TokenStream;
use vroute_common::db::core::{LayerType, Tech};
use vroute_common::db::error::TechError;
use vroute_common::db::indices::LayerId;
use vroute_common::db::parser::design::RuleRecord;
use vroute_common::util::profiler::ScopedTimer;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompileReport {
    pub compiled: usize,
    pub cut_classes: usize,
    pub overridden: usize,
    pub skipped: usize,
    pub unknown_properties: usize,
}

const CUT_CLASS: &str = "LEF58_CUTCLASS";

/// Compiles `records` against `tech`. Rules that fail to parse are dropped with a warning;
/// only a record naming a layer the technology does not have is fatal.
pub fn compile(
    tech: &Tech,
    records: &[RuleRecord],
    scale: f64,
) -> Result<(RuleDb, CompileReport), TechError> {
    let _t = ScopedTimer::new("Rule compilation");
    let mut db = RuleDb::new(tech.layers.len());
    let mut report = CompileReport::default();

    let mut resolved = Vec::with_capacity(records.len());
    for rec in records {
        let layer = tech
            .layer_by_name(&rec.layer)
            .ok_or_else(|| TechError::UnknownLayer {
                owner: format!("rule {}", rec.property),
                layer: rec.layer.clone(),
            })?;
        resolved.push((layer, rec));
    }

    // Cut classes go first so spacing rules can refer to them whatever the record order.
    for &(layer, rec) in resolved.iter().filter(|(_, r)| r.property == CUT_CLASS) {
        if tech.layer(layer).layer_type != LayerType::Cut {
            log::warn!("{} on non-cut layer {} ignored", CUT_CLASS, rec.layer);
            report.unknown_properties += 1;
            continue;
        }
        for mut stmt in TokenStream::new(&rec.text, scale).statements() {
            match parse::cut_class::parse_cut_class(&mut stmt) {
                Ok(class) => {
                    db.add_cut_class(layer, class);
                    report.cut_classes += 1;
                }
                Err(e) => {
                    log::warn!("{} on {}: {}", CUT_CLASS, rec.layer, e);
                    report.skipped += 1;
                }
            }
        }
    }

    for &(layer, rec) in resolved.iter().filter(|(_, r)| r.property != CUT_CLASS) {
        let Some(parser) = parser_for(tech.layer(layer).layer_type, &rec.property) else {
            log::warn!("unsupported property {} on {}", rec.property, rec.layer);
            report.unknown_properties += 1;
            continue;
        };
        for mut stmt in TokenStream::new(&rec.text, scale).statements() {
            let ctx = ParseContext {
                tech,
                layer,
                cut_classes: db.cut_classes(layer),
            };
            match parser(&mut stmt, &ctx) {
                Ok(c) => {
                    let before = db.len();
                    db.add(layer, c);
                    if db.len() == before {
                        report.overridden += 1;
                    } else {
                        report.compiled += 1;
                    }
                }
                Err(e) if e.is_unsupported() => {
                    log::warn!("{} on {}: skipping, {}", rec.property, rec.layer, e);
                    report.skipped += 1;
                }
                Err(e) => {
                    log::warn!("{} on {}: malformed rule dropped, {}", rec.property, rec.layer, e);
                    report.skipped += 1;
                }
            }
        }
    }

    add_default_min_widths(tech, &mut db, &mut report);

    log::info!(
        "Compiled {} rules and {} cut classes ({} overridden, {} skipped, {} unknown properties)",
        report.compiled,
        report.cut_classes,
        report.overridden,
        report.skipped,
        report.unknown_properties
    );
    Ok((db, report))
}

type StatementParser = fn(&mut TokenStream, &ParseContext) -> RuleResult<Constraint>;

fn parser_for(layer_type: LayerType, property: &str) -> Option<StatementParser> {
    use parse::*;
    let p: StatementParser = match (layer_type, property) {
        (LayerType::Routing, "SPACING") => |ts, _| spacing::parse_routing_spacing(ts),
        (LayerType::Routing, "SPACINGTABLE") => |ts, _| spacing::parse_spacing_table(ts),
        (LayerType::Routing, "AREA") => |ts, _| basic::parse_area(ts),
        (LayerType::Routing, "MINENCLOSEDAREA") => |ts, _| basic::parse_min_enclosed_area(ts),
        (LayerType::Routing, "MINSTEP") => |ts, _| min_step::parse_min_step(ts),
        (LayerType::Routing, "MINWIDTH") => |ts, _| basic::parse_min_width(ts),
        (LayerType::Routing, "LEF58_SPACING" | "LEF57_SPACING") => {
            |ts, _| eol::parse_lef58_spacing(ts)
        }
        (LayerType::Routing, "LEF58_SPACINGTABLE") => {
            |ts, _| spacing::parse_lef58_spacing_table(ts)
        }
        (LayerType::Routing, "LEF58_CORNERSPACING") => {
            |ts, _| corner_spacing::parse_corner_spacing(ts)
        }
        (LayerType::Routing, "LEF58_MINSTEP") => |ts, _| min_step::parse_lef58_min_step(ts),
        (LayerType::Routing, "LEF58_RECTONLY") => |ts, _| basic::parse_rect_only(ts),
        (LayerType::Routing, "LEF58_RIGHTWAYONGRIDONLY") => {
            |ts, _| basic::parse_right_way_on_grid_only(ts)
        }
        (LayerType::Cut, "SPACING") => cut_spacing::parse_cut_spacing,
        (LayerType::Cut, "LEF58_SPACING") => cut_spacing::parse_lef58_cut_spacing,
        (LayerType::Cut, "LEF58_SPACINGTABLE") => cut_spacing_table::parse_cut_spacing_table,
        _ => return None,
    };
    Some(p)
}

/// Routing layers always carry a minimum width: the drawn width unless a `MINWIDTH` rule
/// asks for less.
fn add_default_min_widths(tech: &Tech, db: &mut RuleDb, report: &mut CompileReport) {
    for layer in tech.routing_layers() {
        let explicit = db.min_width(layer.id);
        let min_width = match explicit {
            Some(w) if layer.width > 0 && w > layer.width => {
                log::warn!(
                    "MINWIDTH {} on {} exceeds the drawn width {}",
                    w,
                    layer.name,
                    layer.width
                );
                layer.width
            }
            Some(_) => continue,
            None if layer.width > 0 => layer.width,
            None => continue,
        };
        db.add(layer.id, Constraint::MinWidth(MinWidthRule { min_width }));
        if explicit.is_none() {
            report.compiled += 1;
        }
    }
}

/// Tags each via definition with the cut class its cut shape matches on its cut layer.
/// Returns the number of vias tagged.
pub fn assign_via_cut_classes(tech: &mut Tech, db: &RuleDb) -> usize {
    let mut tagged = 0;
    for via in &mut tech.via_defs {
        let r = via.cut_rect;
        via.cut_class = db
            .cut_class_of(via.cut, r.width(), r.height())
            .map(|c| c.name.clone());
        if via.cut_class.is_some() {
            tagged += 1;
        }
    }
    tagged
}

/// Whether `layer` has any compiled rule of `kind`.
pub fn has_rule(db: &RuleDb, layer: LayerId, kind: ConstraintKind) -> bool {
    db.constraints_of(layer, kind).next().is_some()
}
