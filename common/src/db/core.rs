use crate::db::conn_fig::{EndStyle, SegEnd, SegStyle};
use crate::db::error::TechError;
use crate::db::indices::*;
use crate::geom::Coord;
use crate::geom::rect::Rect;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerDirection {
    Vertical,
    Horizontal,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Routing,
    Cut,
    Masterslice,
}

#[derive(Clone, Debug)]
pub struct LayerData {
    pub name: String,
    pub id: LayerId,
    pub layer_type: LayerType,
    pub direction: LayerDirection,
    pub pitch: Coord,
    pub width: Coord,
    pub spacing: Coord,
    pub offset: Coord,
    /// Position among routing layers (grid z), `None` for cut and masterslice layers.
    pub routing_index: Option<u8>,
    pub end_style: EndStyle,
    pub end_ext: Coord,
}

impl LayerData {
    /// End style given to wire ends that a split creates.
    pub fn default_style(&self) -> SegStyle {
        SegStyle::uniform(self.width, SegEnd::new(self.end_style, self.end_ext))
    }

    pub fn is_routing(&self) -> bool {
        self.layer_type == LayerType::Routing
    }
}

#[derive(Clone, Debug)]
pub struct ViaDef {
    pub name: String,
    pub bottom: LayerId,
    pub cut: LayerId,
    pub top: LayerId,
    pub cut_rect: Rect,
    pub is_default: bool,
    pub cut_class: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TrackDef {
    pub layer: LayerId,
    /// Direction the tracks run in.
    pub direction: LayerDirection,
    pub start: Coord,
    pub num_tracks: u32,
    pub step: Coord,
}

/// Layer stack and via definitions.
#[derive(Clone, Debug, Default)]
pub struct Tech {
    pub layers: Vec<LayerData>,
    pub via_defs: Vec<ViaDef>,
    pub layer_name_map: HashMap<String, LayerId>,
    pub via_name_map: HashMap<String, ViaDefId>,
    routing_layers: Vec<LayerId>,
}

impl Tech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_layer(
        &mut self,
        name: String,
        layer_type: LayerType,
        direction: LayerDirection,
        pitch: Coord,
        width: Coord,
    ) -> Result<LayerId, TechError> {
        if self.layer_name_map.contains_key(&name) {
            return Err(TechError::DuplicateLayer(name));
        }
        let id = LayerId::new(self.layers.len());
        let routing_index = if layer_type == LayerType::Routing {
            self.routing_layers.push(id);
            Some((self.routing_layers.len() - 1) as u8)
        } else {
            None
        };
        self.layer_name_map.insert(name.clone(), id);
        self.layers.push(LayerData {
            name,
            id,
            layer_type,
            direction,
            pitch,
            width,
            spacing: 0,
            offset: 0,
            routing_index,
            end_style: EndStyle::Truncate,
            end_ext: 0,
        });
        Ok(id)
    }

    /// Registers a via. `layer_names` must name a bottom routing, cut and top routing layer
    /// that sit next to each other in the stack.
    pub fn add_via_def(
        &mut self,
        name: String,
        layer_names: &[String],
        cut_rect: Rect,
        is_default: bool,
    ) -> Result<ViaDefId, TechError> {
        if layer_names.len() != 3 {
            return Err(TechError::ViaLayerCount {
                via: name,
                count: layer_names.len(),
            });
        }
        let mut ids = Vec::with_capacity(3);
        for layer in layer_names {
            match self.layer_by_name(layer) {
                Some(id) => ids.push(id),
                None => {
                    return Err(TechError::ViaUnknownLayer {
                        via: name,
                        layer: layer.clone(),
                    });
                }
            }
        }
        ids.sort();
        let (bottom, cut, top) = (ids[0], ids[1], ids[2]);
        let consecutive = cut.index() == bottom.index() + 1 && top.index() == cut.index() + 1;
        if !consecutive
            || self.layer(cut).layer_type != LayerType::Cut
            || !self.layer(bottom).is_routing()
            || !self.layer(top).is_routing()
        {
            return Err(TechError::ViaNonConsecutive { via: name });
        }
        let id = ViaDefId::new(self.via_defs.len());
        self.via_name_map.insert(name.clone(), id);
        self.via_defs.push(ViaDef {
            name,
            bottom,
            cut,
            top,
            cut_rect,
            is_default,
            cut_class: None,
        });
        Ok(id)
    }

    pub fn layer(&self, id: LayerId) -> &LayerData {
        &self.layers[id.index()]
    }

    pub fn layer_mut(&mut self, id: LayerId) -> &mut LayerData {
        &mut self.layers[id.index()]
    }

    pub fn layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layer_name_map.get(name).copied()
    }

    pub fn via_def(&self, id: ViaDefId) -> &ViaDef {
        &self.via_defs[id.index()]
    }

    pub fn num_routing_layers(&self) -> usize {
        self.routing_layers.len()
    }

    /// Tech layer of routing layer `z`.
    pub fn routing_layer(&self, z: u8) -> Option<&LayerData> {
        self.routing_layers
            .get(z as usize)
            .map(|id| &self.layers[id.index()])
    }

    pub fn routing_layers(&self) -> impl Iterator<Item = &LayerData> {
        self.routing_layers.iter().map(|id| &self.layers[id.index()])
    }

    /// Via used when a route climbs from routing layer `z` to `z + 1`.
    pub fn default_via(&self, z: u8) -> Option<ViaDefId> {
        let bottom = *self.routing_layers.get(z as usize)?;
        let mut fallback = None;
        for (i, v) in self.via_defs.iter().enumerate() {
            if v.bottom == bottom {
                if v.is_default {
                    return Some(ViaDefId::new(i));
                }
                fallback.get_or_insert(ViaDefId::new(i));
            }
        }
        fallback
    }

    /// Cut layer directly above routing layer `layer`, if any.
    pub fn cut_above(&self, layer: LayerId) -> Option<LayerId> {
        self.layers
            .get(layer.index() + 1)
            .filter(|l| l.layer_type == LayerType::Cut)
            .map(|l| l.id)
    }

    /// The lowest cut layer in the stack; some rules are not allowed there.
    pub fn is_first_cut_layer(&self, layer: LayerId) -> bool {
        self.layers
            .iter()
            .find(|l| l.layer_type == LayerType::Cut)
            .is_some_and(|l| l.id == layer)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetClass {
    #[default]
    Signal,
    Clock,
    Power,
    Ground,
}

impl NetClass {
    pub fn is_supply(&self) -> bool {
        matches!(self, NetClass::Power | NetClass::Ground)
    }
}

#[derive(Clone, Debug)]
pub struct NetData {
    pub name: String,
    pub class: NetClass,
    pub alpha: Option<f64>,
    pub pins: Vec<PinId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinShape {
    pub layer: LayerId,
    pub rect: Rect,
}

#[derive(Clone, Debug)]
pub struct PinData {
    pub name: String,
    pub net: NetId,
    pub shapes: Vec<PinShape>,
    /// Block-level terminal (pad or port) rather than an instance pin.
    pub is_port: bool,
}

impl PinData {
    pub fn bbox(&self) -> Option<Rect> {
        self.shapes.iter().map(|s| s.rect).reduce(|a, b| a.merge(&b))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstructionKind {
    Macro,
    Net,
    Pad,
}

#[derive(Clone, Copy, Debug)]
pub struct Obstruction {
    pub layer: LayerId,
    pub rect: Rect,
    pub kind: ObstructionKind,
}

/// Inclusive range of routing layer indices (grid z).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerRange {
    pub min: u8,
    pub max: u8,
}

impl LayerRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, z: u8) -> bool {
        z >= self.min && z <= self.max
    }
}

#[derive(Debug)]
pub struct DesignDB {
    pub name: String,
    pub tech: Tech,
    pub die_area: Rect,
    pub nets: Vec<NetData>,
    pub pins: Vec<PinData>,
    pub obstructions: Vec<Obstruction>,
    pub tracks: Vec<TrackDef>,
    pub net_name_map: HashMap<String, NetId>,
}

impl DesignDB {
    pub fn new(name: String, tech: Tech, die_area: Rect) -> Self {
        Self {
            name,
            tech,
            die_area,
            nets: Vec::new(),
            pins: Vec::new(),
            obstructions: Vec::new(),
            tracks: Vec::new(),
            net_name_map: HashMap::new(),
        }
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    pub fn net_by_name(&self, name: &str) -> Option<NetId> {
        self.net_name_map.get(name).copied()
    }

    pub fn add_net(&mut self, name: String, class: NetClass) -> NetId {
        if let Some(&id) = self.net_name_map.get(&name) {
            return id;
        }
        let id = NetId::new(self.nets.len());
        self.nets.push(NetData {
            name: name.clone(),
            class,
            alpha: None,
            pins: Vec::new(),
        });
        self.net_name_map.insert(name, id);
        id
    }

    pub fn add_pin(
        &mut self,
        net: NetId,
        name: String,
        shapes: Vec<PinShape>,
        is_port: bool,
    ) -> Result<PinId, TechError> {
        for s in &shapes {
            if s.layer.index() >= self.tech.layers.len() {
                return Err(TechError::UnknownLayer {
                    owner: format!("pin '{}'", name),
                    layer: format!("{:?}", s.layer),
                });
            }
        }
        let pid = PinId::new(self.pins.len());
        self.pins.push(PinData {
            name,
            net,
            shapes,
            is_port,
        });
        self.nets[net.index()].pins.push(pid);
        Ok(pid)
    }

    pub fn add_obstruction(&mut self, obs: Obstruction) {
        self.obstructions.push(obs);
    }

    pub fn pin(&self, id: PinId) -> &PinData {
        &self.pins[id.index()]
    }

    pub fn tracks_on(&self, layer: LayerId) -> impl Iterator<Item = &TrackDef> {
        self.tracks.iter().filter(move |t| t.layer == layer)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// M1/V1/M2/V2/M3 stack with 100 dbu pitch.
    pub(crate) fn three_layer_tech() -> Tech {
        let mut tech = Tech::new();
        let dirs = [LayerDirection::Horizontal, LayerDirection::Vertical];
        for i in 0..3 {
            tech.add_layer(
                format!("M{}", i + 1),
                LayerType::Routing,
                dirs[i % 2],
                100,
                50,
            )
            .unwrap();
            if i < 2 {
                tech.add_layer(
                    format!("V{}", i + 1),
                    LayerType::Cut,
                    LayerDirection::Unknown,
                    0,
                    50,
                )
                .unwrap();
            }
        }
        tech
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn via_with_wrong_layer_count_is_fatal() {
        let mut tech = three_layer_tech();
        let err = tech
            .add_via_def("VX".into(), &names(&["M1", "V1"]), Rect::default(), true)
            .unwrap_err();
        assert_eq!(
            err,
            TechError::ViaLayerCount {
                via: "VX".into(),
                count: 2
            }
        );
    }

    #[test]
    fn via_with_unknown_layer_is_fatal() {
        let mut tech = three_layer_tech();
        let err = tech
            .add_via_def("VX".into(), &names(&["M1", "V9", "M2"]), Rect::default(), true)
            .unwrap_err();
        assert!(matches!(err, TechError::ViaUnknownLayer { .. }));
    }

    #[test]
    fn via_spanning_two_cuts_is_rejected() {
        let mut tech = three_layer_tech();
        let err = tech
            .add_via_def("VX".into(), &names(&["M1", "V1", "M3"]), Rect::default(), true)
            .unwrap_err();
        assert_eq!(err, TechError::ViaNonConsecutive { via: "VX".into() });
    }

    #[test]
    fn default_via_lookup_by_bottom_layer() {
        let mut tech = three_layer_tech();
        let v12 = tech
            .add_via_def("V12".into(), &names(&["M2", "V1", "M1"]), Rect::default(), false)
            .unwrap();
        let v23 = tech
            .add_via_def("V23".into(), &names(&["M2", "V2", "M3"]), Rect::default(), true)
            .unwrap();
        assert_eq!(tech.default_via(0), Some(v12));
        assert_eq!(tech.default_via(1), Some(v23));
        assert_eq!(tech.default_via(2), None);
        assert_eq!(tech.via_def(v12).cut, LayerId(1));
        assert!(tech.is_first_cut_layer(LayerId(1)));
        assert!(!tech.is_first_cut_layer(LayerId(3)));
        assert_eq!(tech.routing_layer(2).map(|l| l.name.as_str()), Some("M3"));
    }
}
