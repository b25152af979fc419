use crate::constraint::*;
use std::collections::HashMap;
use vroute_common::db::indices::{ConstraintId, LayerId};
use vroute_common::geom::Coord;

#[derive(Clone, Debug, Default)]
pub struct LayerRules {
    slots: HashMap<ConstraintKind, Vec<ConstraintId>>,
    cut_classes: Vec<CutClass>,
}

impl LayerRules {
    pub fn ids(&self, kind: ConstraintKind) -> &[ConstraintId] {
        self.slots.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cut_classes(&self) -> &[CutClass] {
        &self.cut_classes
    }
}

/// Compiled design rules.
///
/// Constraints live in one arena. Each id is referenced from the owning layer's slot for its
/// kind and from the flat list; both point at the same arena entry. Read-only after compilation.
#[derive(Clone, Debug, Default)]
pub struct RuleDb {
    constraints: Vec<Constraint>,
    owners: Vec<LayerId>,
    flat: Vec<ConstraintId>,
    layers: Vec<LayerRules>,
}

impl RuleDb {
    pub fn new(num_layers: usize) -> Self {
        Self {
            layers: vec![LayerRules::default(); num_layers],
            ..Self::default()
        }
    }

    fn layer_rules(&self, layer: LayerId) -> Option<&LayerRules> {
        self.layers.get(layer.index())
    }

    /// Registers `c` on `layer`. A single-slot kind whose slot is already taken overrides the
    /// occupant in place and keeps its id, even when the occupant is another kind of its group.
    pub fn add(&mut self, layer: LayerId, c: Constraint) -> ConstraintId {
        if layer.index() >= self.layers.len() {
            self.layers.resize_with(layer.index() + 1, LayerRules::default);
        }
        let kind = c.kind();
        let rules = &mut self.layers[layer.index()];
        let occupant = kind
            .slot_group()
            .iter()
            .find_map(|&k| rules.ids(k).first().map(|&id| (k, id)));
        if let Some((old, id)) = occupant {
            log::warn!("{:?} on {:?} overrides an earlier {:?}", kind, layer, old);
            self.constraints[id.index()] = c;
            if old != kind {
                rules.slots.remove(&old);
                rules.slots.entry(kind).or_default().push(id);
            }
            return id;
        }
        let id = ConstraintId::new(self.constraints.len());
        self.constraints.push(c);
        self.owners.push(layer);
        self.flat.push(id);
        self.layers[layer.index()]
            .slots
            .entry(kind)
            .or_default()
            .push(id);
        id
    }

    pub fn add_cut_class(&mut self, layer: LayerId, class: CutClass) {
        if layer.index() >= self.layers.len() {
            self.layers.resize_with(layer.index() + 1, LayerRules::default);
        }
        let classes = &mut self.layers[layer.index()].cut_classes;
        match classes.iter_mut().find(|c| c.name == class.name) {
            Some(existing) => {
                log::warn!("cut class {} on {:?} redefined", class.name, layer);
                *existing = class;
            }
            None => classes.push(class),
        }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn constraint(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id.index()]
    }

    pub fn layer_of(&self, id: ConstraintId) -> LayerId {
        self.owners[id.index()]
    }

    pub fn constraints_of(
        &self,
        layer: LayerId,
        kind: ConstraintKind,
    ) -> impl Iterator<Item = &Constraint> + '_ {
        self.layer_rules(layer)
            .map(|l| l.ids(kind))
            .unwrap_or(&[])
            .iter()
            .map(move |id| self.constraint(*id))
    }

    /// Every constraint in registration order.
    pub fn all(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> + '_ {
        self.flat.iter().map(move |&id| (id, self.constraint(id)))
    }

    /// Largest spacing any spacing rule on `layer` asks for between wires of `width` that
    /// run alongside each other for `prl`.
    pub fn min_spacing(&self, layer: LayerId, width: Coord, prl: Coord) -> Option<Coord> {
        let prl_tables = self
            .constraints_of(layer, ConstraintKind::SpacingPrl)
            .chain(self.constraints_of(layer, ConstraintKind::Lef58SpacingPrl))
            .filter_map(|c| match c {
                Constraint::SpacingPrl(r) => Some(r.spacing(width, prl)),
                Constraint::Lef58SpacingPrl(r) if !r.wrong_direction => {
                    Some(r.spacing(width, prl))
                }
                _ => None,
            });
        let two_widths = self
            .constraints_of(layer, ConstraintKind::SpacingTwoWidths)
            .filter_map(|c| match c {
                Constraint::SpacingTwoWidths(r) => Some(r.spacing(width, width, prl)),
                _ => None,
            });
        prl_tables.chain(two_widths).max()
    }

    pub fn eol_rules(&self, layer: LayerId) -> Vec<&Constraint> {
        self.constraints_of(layer, ConstraintKind::EolSpacing)
            .chain(self.constraints_of(layer, ConstraintKind::Lef58Eol))
            .collect()
    }

    /// Same-layer cut class spacing as `(spacing, spacing without projection overlap)`.
    pub fn cut_class_spacing(
        &self,
        layer: LayerId,
        class1: &str,
        edge1: CutEdge,
        class2: &str,
        edge2: CutEdge,
    ) -> Option<(Coord, Coord)> {
        self.constraints_of(layer, ConstraintKind::CutClassSpacingTable)
            .find_map(|c| match c {
                Constraint::CutClassSpacingTable(r) if r.second_layer.is_none() => {
                    r.spacing(class1, edge1, class2, edge2)
                }
                _ => None,
            })
    }

    pub fn corner_spacing(
        &self,
        layer: LayerId,
        kind: CornerKind,
        width: Coord,
    ) -> Option<(Coord, Coord)> {
        self.constraints_of(layer, ConstraintKind::CornerSpacing)
            .filter_map(|c| match c {
                Constraint::CornerSpacing(r) if r.kind() == kind => Some(r.spacing(width)),
                _ => None,
            })
            .max()
    }

    pub fn min_area(&self, layer: LayerId) -> Option<i64> {
        self.constraints_of(layer, ConstraintKind::MinArea)
            .find_map(|c| match c {
                Constraint::MinArea(r) => Some(r.area),
                _ => None,
            })
    }

    pub fn min_step(&self, layer: LayerId) -> Option<&MinStepRule> {
        self.constraints_of(layer, ConstraintKind::MinStep)
            .find_map(|c| match c {
                Constraint::MinStep(r) => Some(r),
                _ => None,
            })
    }

    pub fn min_width(&self, layer: LayerId) -> Option<Coord> {
        self.constraints_of(layer, ConstraintKind::MinWidth)
            .find_map(|c| match c {
                Constraint::MinWidth(r) => Some(r.min_width),
                _ => None,
            })
    }

    pub fn cut_classes(&self, layer: LayerId) -> &[CutClass] {
        self.layer_rules(layer)
            .map(LayerRules::cut_classes)
            .unwrap_or(&[])
    }

    pub fn cut_class(&self, layer: LayerId, name: &str) -> Option<&CutClass> {
        self.cut_classes(layer).iter().find(|c| c.name == name)
    }

    /// Class whose via footprint matches `width` x `length` in either orientation.
    pub fn cut_class_of(&self, layer: LayerId, width: Coord, length: Coord) -> Option<&CutClass> {
        let (lo, hi) = (width.min(length), width.max(length));
        self.cut_classes(layer).iter().find(|c| {
            c.via_width.min(c.via_length) == lo && c.via_width.max(c.via_length) == hi
        })
    }

    /// Every flat entry is in its owner's slot and every slot entry is in the flat list.
    pub fn is_consistent(&self) -> bool {
        let mut in_slots = 0;
        for (li, rules) in self.layers.iter().enumerate() {
            for (kind, ids) in &rules.slots {
                for id in ids {
                    in_slots += 1;
                    let ok = id.index() < self.constraints.len()
                        && self.owners[id.index()].index() == li
                        && self.constraints[id.index()].kind() == *kind;
                    if !ok {
                        return false;
                    }
                }
            }
        }
        in_slots == self.flat.len() && self.flat.len() == self.constraints.len()
    }
}
