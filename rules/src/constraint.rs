//! Compiled rule kinds.
//!
//! The set of rules is closed, so every constraint is one variant of [`Constraint`].

use crate::table::{Lookup1D, Lookup2D};
use std::collections::BTreeMap;
use vroute_common::db::indices::LayerId;
use vroute_common::geom::Coord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintKind {
    MinWidth,
    SpacingPrl,
    SpacingTwoWidths,
    Lef58SpacingPrl,
    SameNetSpacing,
    EolSpacing,
    Lef58Eol,
    MinStep,
    Lef58MinStep,
    MinArea,
    MinEnclosedArea,
    CutSpacing,
    Lef58CutSpacing,
    CutClassSpacingTable,
    CornerSpacing,
    RectOnly,
    RightWayOnGridOnly,
}

impl ConstraintKind {
    /// Kinds sharing this kind's slot on a layer; empty for kinds a layer may hold many of.
    /// A later rule in a slot replaces the earlier one. The two minimum spacing table forms
    /// share a slot, so a layer keeps only the last table written in either form.
    pub fn slot_group(&self) -> &'static [ConstraintKind] {
        match self {
            ConstraintKind::SpacingPrl | ConstraintKind::SpacingTwoWidths => {
                &[ConstraintKind::SpacingPrl, ConstraintKind::SpacingTwoWidths]
            }
            ConstraintKind::MinWidth => &[ConstraintKind::MinWidth],
            ConstraintKind::SameNetSpacing => &[ConstraintKind::SameNetSpacing],
            ConstraintKind::MinStep => &[ConstraintKind::MinStep],
            ConstraintKind::MinArea => &[ConstraintKind::MinArea],
            ConstraintKind::RectOnly => &[ConstraintKind::RectOnly],
            ConstraintKind::RightWayOnGridOnly => &[ConstraintKind::RightWayOnGridOnly],
            _ => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MinWidthRule {
    pub min_width: Coord,
}

/// Spacing indexed by wire width (rows) and parallel run length (columns).
#[derive(Clone, Debug, PartialEq)]
pub struct SpacingPrlRule {
    pub table: Lookup2D<Coord, Coord, Coord>,
    pub wrong_direction: bool,
    pub same_mask: bool,
    pub except_eol: Option<Coord>,
    /// Width row index to the `(low, high)` spacing range the row does not apply to.
    pub except_within: BTreeMap<usize, (Coord, Coord)>,
}

impl SpacingPrlRule {
    pub fn spacing(&self, width: Coord, prl: Coord) -> Coord {
        *self.table.find(&width, &prl)
    }

    pub fn min_spacing(&self) -> Coord {
        self.table.values()[0][0]
    }
}

/// Spacing between two wires indexed by both widths.
#[derive(Clone, Debug, PartialEq)]
pub struct TwoWidthsRule {
    pub widths: Vec<Coord>,
    /// Minimum parallel run length for a width row to apply.
    pub prls: Vec<Option<Coord>>,
    pub values: Vec<Vec<Coord>>,
}

impl TwoWidthsRule {
    pub fn spacing(&self, width1: Coord, width2: Coord, prl: Coord) -> Coord {
        let floor = |w: Coord| self.widths.partition_point(|&k| k <= w).saturating_sub(1);
        let mut row = floor(width1.max(width2));
        while row > 0 && self.prls[row].is_some_and(|p| prl < p) {
            row -= 1;
        }
        let col = floor(width1.min(width2));
        self.values[row][col]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SameNetSpacingRule {
    pub spacing: Coord,
    pub pg_only: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParallelEdge {
    pub par_space: Coord,
    pub par_within: Coord,
    pub two_edges: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EolSpacingRule {
    pub eol_space: Coord,
    pub eol_width: Coord,
    pub eol_within: Coord,
    pub parallel_edge: Option<ParallelEdge>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EndToEnd {
    pub space: Coord,
    pub one_cut_space: Option<Coord>,
    pub two_cut_space: Option<Coord>,
    pub extension: Option<Coord>,
    pub wrong_dir_extension: Option<Coord>,
    pub other_end_width: Option<Coord>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lef58ParallelEdge {
    pub subtract_eol_width: bool,
    pub par_space: Coord,
    pub par_within: Coord,
    pub prl: Option<Coord>,
    pub min_length: Option<Coord>,
    pub two_edges: bool,
    pub same_metal: bool,
    pub non_eol_corner_only: bool,
    pub parallel_same_mask: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EolLength {
    /// `MAXLENGTH` when true, `MINLENGTH` otherwise.
    pub is_max: bool,
    pub length: Coord,
    pub two_sides: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lef58EolRule {
    pub eol_space: Coord,
    pub eol_width: Coord,
    pub exact_width: bool,
    pub wrong_dir_space: Option<Coord>,
    pub opposite_width: Option<Coord>,
    pub eol_within: Coord,
    pub wrong_dir_within: Option<Coord>,
    pub same_mask: bool,
    pub end_to_end: Option<EndToEnd>,
    pub parallel_edge: Option<Lef58ParallelEdge>,
    pub length: Option<EolLength>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinStepType {
    InsideCorner,
    OutsideCorner,
    Step,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MinStepRule {
    pub min_step_length: Coord,
    pub max_edges: Option<u32>,
    pub step_type: Option<MinStepType>,
    /// `LENGTHSUM` limit.
    pub max_length: Option<Coord>,
    pub min_adjacent_length: Option<Coord>,
    pub no_between_eol: Option<Coord>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MinAreaRule {
    pub area: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MinEnclosedAreaRule {
    pub area: i64,
    pub width: Option<Coord>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdjacentCuts {
    pub count: u32,
    pub within: Coord,
    pub except_same_pg_net: bool,
}

/// Plain cut-layer `SPACING`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CutSpacingRule {
    pub spacing: Coord,
    pub center_to_center: bool,
    pub same_net: bool,
    pub second_layer: Option<LayerId>,
    pub stack: bool,
    pub adjacent_cuts: Option<AdjacentCuts>,
    pub parallel_overlap: bool,
    pub area: Option<i64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConcaveCornerCut {
    Width {
        width: Coord,
        enclosure: Coord,
        edge_length: Coord,
    },
    Parallel {
        par_length: Coord,
        par_within: Coord,
        enclosure: Coord,
    },
    EdgeLength {
        edge_length: Coord,
        edge_enclosure: Coord,
        adj_enclosure: Coord,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum CutClassMode {
    Plain,
    ShortEdgeOnly { prl: Option<Coord> },
    ConcaveCorner(ConcaveCornerCut),
    Extension(Coord),
    NonEolConvexCorner { eol_width: Coord, min_length: Option<Coord> },
    AboveWidth { width: Coord, enclosure: Option<Coord> },
    MaskOverlap,
    WrongDirection,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerBranch {
    pub second_layer: LayerId,
    pub stack: bool,
    pub orthogonal_spacing: Option<Coord>,
    pub cut_class: Option<(String, CutClassMode)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnclosureSide {
    Either,
    Above,
    Below,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdjacentCutsBranch {
    pub cuts: u32,
    pub exact_aligned: Option<u32>,
    pub two_cuts: Option<u32>,
    pub two_cuts_spacing: Option<Coord>,
    pub same_cut: bool,
    pub within: Coord,
    /// Second `WITHIN` bound; cuts between the two bounds count as adjacent.
    pub within2: Option<Coord>,
    pub except_same_pg_net: bool,
    pub except_all_within: Option<Coord>,
    pub enclosure: Option<(EnclosureSide, Coord)>,
    pub cut_class: Option<String>,
    pub to_all: bool,
    pub no_prl: bool,
    pub side_parallel_overlap: bool,
    pub same_mask: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Lef58CutBranch {
    Layer(LayerBranch),
    AdjacentCuts(AdjacentCutsBranch),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lef58CutSpacingRule {
    pub spacing: Coord,
    pub same_mask: bool,
    pub max_xy: bool,
    pub center_to_center: bool,
    pub same_net: bool,
    pub same_metal: bool,
    pub same_via: bool,
    pub branch: Lef58CutBranch,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CutClass {
    pub name: String,
    pub via_width: Coord,
    pub via_length: Coord,
    pub num_cuts: u32,
}

/// Which edge of a cut a cut-class spacing entry refers to.
///
/// `End` sorts before `Side`, matching the label order `xEND < xSIDE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CutEdge {
    End,
    Side,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CutClassKey {
    pub class: String,
    pub edge: CutEdge,
}

impl CutClassKey {
    pub fn new(class: impl Into<String>, edge: CutEdge) -> Self {
        Self {
            class: class.into(),
            edge,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrlDirection {
    Any,
    Horizontal,
    Vertical,
    MaxXY,
}

/// Cut-to-cut spacing by cut class pair. Each entry is a pair of spacings, the second
/// applying when the cuts do not overlap in projection.
#[derive(Clone, Debug, PartialEq)]
pub struct CutSpacingTableRule {
    pub default_spacing: Option<Coord>,
    pub second_layer: Option<LayerId>,
    pub nonzero_enclosure: bool,
    pub prl: Option<(Coord, PrlDirection)>,
    pub table: Lookup2D<CutClassKey, CutClassKey, (Coord, Coord)>,
}

impl CutSpacingTableRule {
    pub fn spacing(
        &self,
        class1: &str,
        edge1: CutEdge,
        class2: &str,
        edge2: CutEdge,
    ) -> Option<(Coord, Coord)> {
        self.table
            .get_exact(
                &CutClassKey::new(class1, edge1),
                &CutClassKey::new(class2, edge2),
            )
            .copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CornerKind {
    Convex,
    Concave,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConvexCorner {
    pub same_mask: bool,
    pub corner_only: Option<Coord>,
    pub except_eol: Option<Coord>,
    pub except_jog_length: Option<Coord>,
    pub edge_length: bool,
    pub include_lshape: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConcaveCorner {
    pub min_length: Option<Coord>,
    pub except_notch: bool,
    pub notch_length: Option<Coord>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CornerType {
    Convex(ConvexCorner),
    Concave(ConcaveCorner),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CornerSpacingRule {
    pub corner: CornerType,
    pub except_same_net: bool,
    pub except_same_metal: bool,
    /// Both spacing directions use one value.
    pub same_xy: bool,
    /// Width to `(x spacing, y spacing)`.
    pub table: Lookup1D<Coord, (Coord, Coord)>,
}

impl CornerSpacingRule {
    pub fn kind(&self) -> CornerKind {
        match self.corner {
            CornerType::Convex(_) => CornerKind::Convex,
            CornerType::Concave(_) => CornerKind::Concave,
        }
    }

    pub fn spacing(&self, width: Coord) -> (Coord, Coord) {
        *self.table.find(&width)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RectOnlyRule {
    pub except_non_core_pins: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RightWayOnGridOnlyRule {
    pub check_mask: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    MinWidth(MinWidthRule),
    SpacingPrl(SpacingPrlRule),
    SpacingTwoWidths(TwoWidthsRule),
    Lef58SpacingPrl(SpacingPrlRule),
    SameNetSpacing(SameNetSpacingRule),
    EolSpacing(EolSpacingRule),
    Lef58Eol(Lef58EolRule),
    MinStep(MinStepRule),
    Lef58MinStep(MinStepRule),
    MinArea(MinAreaRule),
    MinEnclosedArea(MinEnclosedAreaRule),
    CutSpacing(CutSpacingRule),
    Lef58CutSpacing(Lef58CutSpacingRule),
    CutClassSpacingTable(CutSpacingTableRule),
    CornerSpacing(CornerSpacingRule),
    RectOnly(RectOnlyRule),
    RightWayOnGridOnly(RightWayOnGridOnlyRule),
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::MinWidth(_) => ConstraintKind::MinWidth,
            Constraint::SpacingPrl(_) => ConstraintKind::SpacingPrl,
            Constraint::SpacingTwoWidths(_) => ConstraintKind::SpacingTwoWidths,
            Constraint::Lef58SpacingPrl(_) => ConstraintKind::Lef58SpacingPrl,
            Constraint::SameNetSpacing(_) => ConstraintKind::SameNetSpacing,
            Constraint::EolSpacing(_) => ConstraintKind::EolSpacing,
            Constraint::Lef58Eol(_) => ConstraintKind::Lef58Eol,
            Constraint::MinStep(_) => ConstraintKind::MinStep,
            Constraint::Lef58MinStep(_) => ConstraintKind::Lef58MinStep,
            Constraint::MinArea(_) => ConstraintKind::MinArea,
            Constraint::MinEnclosedArea(_) => ConstraintKind::MinEnclosedArea,
            Constraint::CutSpacing(_) => ConstraintKind::CutSpacing,
            Constraint::Lef58CutSpacing(_) => ConstraintKind::Lef58CutSpacing,
            Constraint::CutClassSpacingTable(_) => ConstraintKind::CutClassSpacingTable,
            Constraint::CornerSpacing(_) => ConstraintKind::CornerSpacing,
            Constraint::RectOnly(_) => ConstraintKind::RectOnly,
            Constraint::RightWayOnGridOnly(_) => ConstraintKind::RightWayOnGridOnly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_widths_uses_wider_row_and_prl_threshold() {
        let rule = TwoWidthsRule {
            widths: vec![0, 100, 200],
            prls: vec![None, None, Some(500)],
            values: vec![vec![10, 20, 30], vec![20, 40, 50], vec![30, 50, 90]],
        };
        assert_eq!(rule.spacing(50, 150, 0), 20);
        assert_eq!(rule.spacing(250, 250, 600), 90);
        // Row 2 needs PRL >= 500.
        assert_eq!(rule.spacing(250, 250, 100), 50);
    }

    #[test]
    fn cut_class_keys_order_by_class_then_edge() {
        let mut keys = vec![
            CutClassKey::new("VB", CutEdge::Side),
            CutClassKey::new("VA", CutEdge::Side),
            CutClassKey::new("VA", CutEdge::End),
        ];
        keys.sort();
        assert_eq!(keys[0], CutClassKey::new("VA", CutEdge::End));
        assert_eq!(keys[2], CutClassKey::new("VB", CutEdge::Side));
    }
}
