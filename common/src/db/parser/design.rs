//! Structured design import.
//!
//! The design arrives as a TOML record file: layer stack, vias, tracks, nets with pin shapes,
//! obstructions and per-layer rule text. Structural technology problems are fatal.

use crate::db::conn_fig::EndStyle;
use crate::db::core::*;
use crate::db::error::TechError;
use crate::geom::Coord;
use crate::geom::rect::Rect;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DesignRecords {
    #[serde(default = "default_design_name")]
    pub name: String,
    pub die_area: [Coord; 4],
    #[serde(default)]
    pub layers: Vec<LayerRecord>,
    #[serde(default)]
    pub vias: Vec<ViaRecord>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
    #[serde(default)]
    pub nets: Vec<NetRecord>,
    #[serde(default)]
    pub obstructions: Vec<ObstructionRecord>,
    #[serde(default)]
    pub rules: Vec<RuleRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayerRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub layer_type: LayerType,
    #[serde(default = "default_direction")]
    pub direction: LayerDirection,
    #[serde(default)]
    pub pitch: Coord,
    #[serde(default)]
    pub width: Coord,
    #[serde(default)]
    pub spacing: Coord,
    #[serde(default)]
    pub offset: Coord,
    #[serde(default)]
    pub end_style: EndStyle,
    #[serde(default)]
    pub end_ext: Coord,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViaRecord {
    pub name: String,
    pub layers: Vec<String>,
    #[serde(default)]
    pub cut: [Coord; 4],
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackRecord {
    pub layer: String,
    pub direction: LayerDirection,
    pub start: Coord,
    pub num_tracks: u32,
    pub step: Coord,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetRecord {
    pub name: String,
    #[serde(default)]
    pub class: NetClass,
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub pins: Vec<PinRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PinRecord {
    pub name: String,
    #[serde(default)]
    pub port: bool,
    pub shapes: Vec<ShapeRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShapeRecord {
    pub layer: String,
    pub rect: [Coord; 4],
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObstructionRecord {
    pub layer: String,
    pub rect: [Coord; 4],
    pub kind: ObstructionKind,
}

/// One rule property attached to a layer, e.g. `LEF58_SPACING` with its text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleRecord {
    pub layer: String,
    pub property: String,
    pub text: String,
}

fn default_design_name() -> String {
    "top".to_string()
}

fn default_direction() -> LayerDirection {
    LayerDirection::Unknown
}

impl DesignRecords {
    /// Builds the design database. Rule records are checked for known layers and handed back
    /// untouched for rule compilation.
    pub fn build(self) -> Result<(DesignDB, Vec<RuleRecord>), TechError> {
        let mut tech = Tech::new();
        for l in &self.layers {
            let id = tech.add_layer(
                l.name.clone(),
                l.layer_type,
                l.direction,
                l.pitch,
                l.width,
            )?;
            let layer = tech.layer_mut(id);
            layer.spacing = l.spacing;
            layer.offset = l.offset;
            layer.end_style = l.end_style;
            layer.end_ext = l.end_ext;
        }
        if tech.num_routing_layers() == 0 {
            return Err(TechError::NoRoutingLayers);
        }
        for v in &self.vias {
            tech.add_via_def(
                v.name.clone(),
                &v.layers,
                Rect::from_array(v.cut),
                v.default,
            )?;
        }

        let layer_of = |tech: &Tech, owner: &str, name: &str| {
            tech.layer_by_name(name).ok_or_else(|| TechError::UnknownLayer {
                owner: owner.to_string(),
                layer: name.to_string(),
            })
        };

        for r in &self.rules {
            layer_of(&tech, &format!("rule {}", r.property), &r.layer)?;
        }

        let mut db = DesignDB::new(self.name, tech, Rect::from_array(self.die_area));

        for t in &self.tracks {
            let layer = layer_of(&db.tech, "tracks", &t.layer)?;
            db.tracks.push(TrackDef {
                layer,
                direction: t.direction,
                start: t.start,
                num_tracks: t.num_tracks,
                step: t.step,
            });
        }

        for n in &self.nets {
            let net = db.add_net(n.name.clone(), n.class);
            db.nets[net.index()].alpha = n.alpha;
            for p in &n.pins {
                let mut shapes = Vec::with_capacity(p.shapes.len());
                for s in &p.shapes {
                    shapes.push(PinShape {
                        layer: layer_of(&db.tech, &format!("pin '{}'", p.name), &s.layer)?,
                        rect: Rect::from_array(s.rect),
                    });
                }
                db.add_pin(net, p.name.clone(), shapes, p.port)?;
            }
        }

        for o in &self.obstructions {
            let layer = layer_of(&db.tech, "obstruction", &o.layer)?;
            db.add_obstruction(Obstruction {
                layer,
                rect: Rect::from_array(o.rect),
                kind: o.kind,
            });
        }

        log::info!(
            "Design '{}': {} layers ({} routing), {} vias, {} nets, {} pins, {} obstructions, {} rules",
            db.name,
            db.tech.layers.len(),
            db.tech.num_routing_layers(),
            db.tech.via_defs.len(),
            db.nets.len(),
            db.pins.len(),
            db.obstructions.len(),
            self.rules.len()
        );

        Ok((db, self.rules))
    }
}

pub fn parse_str(text: &str) -> anyhow::Result<(DesignDB, Vec<RuleRecord>)> {
    let records: DesignRecords =
        toml::from_str(text).map_err(|e| anyhow::anyhow!("Failed to parse design TOML: {}", e))?;
    records
        .build()
        .map_err(|e| anyhow::anyhow!("Invalid technology: {}", e))
}

pub fn load(path: &Path) -> anyhow::Result<(DesignDB, Vec<RuleRecord>)> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read design file {:?}: {}", path, e))?;
    parse_str(&text)
}
