//! Net wiring files: per-net path segments, vias and patch wires as TOML.
//!
//! ```toml
//! [[nets]]
//! name = "n1"
//! segments = [{ layer = "M1", from = [0, 100], to = [200, 100] }]
//! vias = [{ via = "VIA12", at = [150, 100] }]
//! ```
//! Layers and vias are referenced by name. A segment without a width or end
//! extension takes the layer's default style.

use crate::db::conn_fig::{ConnFig, PatchWire, PathSeg, SegEnd, Via};
use crate::db::core::DesignDB;
use crate::db::indices::{LayerId, NetId};
use crate::geom::Coord;
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub type NetGeometry = (NetId, Vec<ConnFig>);

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeometryRecords {
    #[serde(default)]
    pub nets: Vec<NetGeometryRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetGeometryRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<SegmentRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vias: Vec<ViaPlacementRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<PatchRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SegmentRecord {
    pub layer: String,
    pub from: [Coord; 2],
    pub to: [Coord; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Coord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<SegEnd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<SegEnd>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViaPlacementRecord {
    pub via: String,
    pub at: [Coord; 2],
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatchRecord {
    pub layer: String,
    pub at: [Coord; 2],
    pub rect: [Coord; 4],
}

fn point([x, y]: [Coord; 2]) -> Point {
    Point::new(x, y)
}

fn layer_of(db: &DesignDB, net: &str, name: &str) -> anyhow::Result<LayerId> {
    db.tech
        .layer_by_name(name)
        .ok_or_else(|| anyhow!("Net '{}': unknown layer '{}'", net, name))
}

/// Resolves names against `db`. Any unknown net, layer or via fails the whole file.
pub fn resolve(db: &DesignDB, records: GeometryRecords) -> anyhow::Result<Vec<NetGeometry>> {
    let mut out = Vec::with_capacity(records.nets.len());
    for rec in records.nets {
        let net = db
            .net_by_name(&rec.name)
            .ok_or_else(|| anyhow!("Unknown net '{}'", rec.name))?;
        let mut figs = Vec::new();
        for s in &rec.segments {
            let layer = layer_of(db, &rec.name, &s.layer)?;
            let mut style = db.tech.layer(layer).default_style();
            if let Some(w) = s.width {
                style.width = w;
            }
            if let Some(b) = s.begin {
                style.begin = b;
            }
            if let Some(e) = s.end {
                style.end = e;
            }
            figs.push(PathSeg::new(layer, point(s.from), point(s.to), style).into());
        }
        for v in &rec.vias {
            let def = db
                .tech
                .via_name_map
                .get(&v.via)
                .copied()
                .ok_or_else(|| anyhow!("Net '{}': unknown via '{}'", rec.name, v.via))?;
            figs.push(
                Via {
                    origin: point(v.at),
                    def,
                }
                .into(),
            );
        }
        for p in &rec.patches {
            figs.push(
                PatchWire {
                    layer: layer_of(db, &rec.name, &p.layer)?,
                    origin: point(p.at),
                    offset_box: Rect::from_array(p.rect),
                }
                .into(),
            );
        }
        out.push((net, figs));
    }
    Ok(out)
}

pub fn to_records(db: &DesignDB, nets: &[NetGeometry]) -> GeometryRecords {
    let nets = nets
        .iter()
        .map(|(net, figs)| {
            let mut rec = NetGeometryRecord {
                name: db.nets[net.index()].name.clone(),
                segments: Vec::new(),
                vias: Vec::new(),
                patches: Vec::new(),
            };
            for fig in figs {
                match fig {
                    ConnFig::PathSeg(s) => rec.segments.push(SegmentRecord {
                        layer: db.tech.layer(s.layer).name.clone(),
                        from: [s.begin.x, s.begin.y],
                        to: [s.end.x, s.end.y],
                        width: Some(s.style.width),
                        begin: Some(s.style.begin),
                        end: Some(s.style.end),
                    }),
                    ConnFig::Via(v) => rec.vias.push(ViaPlacementRecord {
                        via: db.tech.via_def(v.def).name.clone(),
                        at: [v.origin.x, v.origin.y],
                    }),
                    ConnFig::PatchWire(p) => rec.patches.push(PatchRecord {
                        layer: db.tech.layer(p.layer).name.clone(),
                        at: [p.origin.x, p.origin.y],
                        rect: [
                            p.offset_box.min.x,
                            p.offset_box.min.y,
                            p.offset_box.max.x,
                            p.offset_box.max.y,
                        ],
                    }),
                }
            }
            rec
        })
        .collect();
    GeometryRecords { nets }
}

pub fn parse_str(db: &DesignDB, text: &str) -> anyhow::Result<Vec<NetGeometry>> {
    let records: GeometryRecords = toml::from_str(text).context("Failed to parse geometry TOML")?;
    resolve(db, records)
}

pub fn load(path: &Path, db: &DesignDB) -> anyhow::Result<Vec<NetGeometry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read geometry file {:?}", path))?;
    let nets = parse_str(db, &text)?;
    log::info!("Loaded geometry for {} nets from {:?}", nets.len(), path);
    Ok(nets)
}

pub fn save(path: &Path, db: &DesignDB, nets: &[NetGeometry]) -> anyhow::Result<()> {
    let text = toml::to_string(&to_records(db, nets)).context("Failed to encode geometry")?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
    log::info!("Wrote geometry for {} nets to {:?}", nets.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::conn_fig::EndStyle;
    use crate::db::core::{LayerDirection, LayerType, NetClass, Tech};

    fn db() -> DesignDB {
        let mut tech = Tech::new();
        tech.add_layer("M1".into(), LayerType::Routing, LayerDirection::Horizontal, 100, 40)
            .unwrap();
        tech.add_layer("V1".into(), LayerType::Cut, LayerDirection::Unknown, 0, 20)
            .unwrap();
        tech.add_layer("M2".into(), LayerType::Routing, LayerDirection::Vertical, 100, 40)
            .unwrap();
        let names: Vec<String> = ["M1", "V1", "M2"].iter().map(|s| s.to_string()).collect();
        tech.add_via_def("VIA12".into(), &names, Rect::from_array([-10, -10, 10, 10]), true)
            .unwrap();
        let mut db = DesignDB::new("g".into(), tech, Rect::from_array([0, 0, 1000, 1000]));
        db.add_net("n1".into(), NetClass::Signal);
        db
    }

    const TEXT: &str = r#"
[[nets]]
name = "n1"
segments = [
    { layer = "M1", from = [200, 100], to = [0, 100] },
    { layer = "M2", from = [150, 100], to = [150, 300], width = 60, end = { style = "extend", ext = 30 } },
]
vias = [{ via = "VIA12", at = [150, 100] }]
patches = [{ layer = "M1", at = [0, 100], rect = [-20, -20, 20, 20] }]
"#;

    #[test]
    fn parses_and_applies_layer_defaults() {
        let db = db();
        let nets = parse_str(&db, TEXT).unwrap();
        assert_eq!(nets.len(), 1);
        let figs = &nets[0].1;
        assert_eq!(figs.len(), 4);
        let ConnFig::PathSeg(first) = figs[0] else {
            panic!("expected a segment");
        };
        assert_eq!(first.begin, Point::new(0, 100));
        assert_eq!(first.style.width, 40);
        let ConnFig::PathSeg(second) = figs[1] else {
            panic!("expected a segment");
        };
        assert_eq!(second.style.width, 60);
        assert_eq!(second.style.end, SegEnd::new(EndStyle::Extend, 30));
    }

    #[test]
    fn unknown_names_fail_the_file() {
        let db = db();
        let bad_layer = TEXT.replace("\"M2\"", "\"M9\"");
        assert!(parse_str(&db, &bad_layer).is_err());
        let bad_net = TEXT.replace("\"n1\"", "\"nope\"");
        assert!(parse_str(&db, &bad_net).is_err());
    }

    #[test]
    fn save_then_load() {
        let db = db();
        let nets = parse_str(&db, TEXT).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geom.toml");
        save(&path, &db, &nets).unwrap();
        assert_eq!(load(&path, &db).unwrap(), nets);
    }
}
