use crate::geom::Coord;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub global_routing: GlobalRoutingConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub post_process: PostProcessConfig,
    #[serde(default)]
    pub input: InputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global_routing: GlobalRoutingConfig::default(),
            rules: RulesConfig::default(),
            post_process: PostProcessConfig::default(),
            input: InputConfig::default(),
        }
    }
}

/// Capacity reduction for one routing layer. Layers are numbered from 1 (lowest metal).
#[derive(Debug, Deserialize, Clone)]
pub struct LayerAdjustment {
    pub layer: usize,
    pub reduction: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegionAdjustment {
    pub min_x: Coord,
    pub min_y: Coord,
    pub max_x: Coord,
    pub max_y: Coord,
    pub layer: usize,
    pub reduction: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LayerPitch {
    pub layer: usize,
    pub pitch: Coord,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalRoutingConfig {
    /// Capacity reduction applied to every layer, 0.0..=1.0.
    #[serde(default)]
    pub adjustment: f64,
    #[serde(default)]
    pub layer_adjustments: Vec<LayerAdjustment>,
    #[serde(default)]
    pub region_adjustments: Vec<RegionAdjustment>,
    #[serde(default = "default_min_routing_layer")]
    pub min_routing_layer: usize,
    /// 0 means the topmost routing layer.
    #[serde(default)]
    pub max_routing_layer: usize,
    /// 0 means the signal range.
    #[serde(default)]
    pub min_layer_for_clock: usize,
    #[serde(default)]
    pub max_layer_for_clock: usize,
    #[serde(default)]
    pub unidirectional_route: bool,
    #[serde(default = "default_overflow_iterations")]
    pub overflow_iterations: usize,
    #[serde(default)]
    pub allow_overflow: bool,
    #[serde(default)]
    pub allowed_overflow_slack: u32,
    /// Extra tiles blocked around macro obstructions.
    #[serde(default)]
    pub macro_extension: u32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub net_alpha: HashMap<String, f64>,
    #[serde(default = "default_pitches_in_tile")]
    pub pitches_in_tile: u32,
    #[serde(default)]
    pub layer_pitches: Vec<LayerPitch>,
    #[serde(default)]
    pub grid_origin: Option<[Coord; 2]>,
    #[serde(default = "default_gr_history_increment")]
    pub history_increment: f64,
    #[serde(default = "default_gr_initial_penalty")]
    pub initial_penalty: f64,
    #[serde(default = "default_gr_penalty_multiplier")]
    pub penalty_multiplier: f64,
    #[serde(default = "default_gr_heuristic")]
    pub heuristic_weight: f64,
    #[serde(default = "default_gr_margin")]
    pub margin: u32,
    #[serde(default = "default_via_cost")]
    pub via_cost: f64,
    #[serde(default = "default_wrong_way_cost")]
    pub wrong_way_cost: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_expansions")]
    pub max_expansions: u32,
    /// Count via usage against via capacity during overflow detection.
    #[serde(default)]
    pub limit_via_capacity: bool,
    #[serde(default)]
    pub congestion_report: Option<String>,
}

impl Default for GlobalRoutingConfig {
    fn default() -> Self {
        Self {
            adjustment: 0.0,
            layer_adjustments: Vec::new(),
            region_adjustments: Vec::new(),
            min_routing_layer: default_min_routing_layer(),
            max_routing_layer: 0,
            min_layer_for_clock: 0,
            max_layer_for_clock: 0,
            unidirectional_route: false,
            overflow_iterations: default_overflow_iterations(),
            allow_overflow: false,
            allowed_overflow_slack: 0,
            macro_extension: 0,
            seed: 0,
            alpha: default_alpha(),
            net_alpha: HashMap::new(),
            pitches_in_tile: default_pitches_in_tile(),
            layer_pitches: Vec::new(),
            grid_origin: None,
            history_increment: default_gr_history_increment(),
            initial_penalty: default_gr_initial_penalty(),
            penalty_multiplier: default_gr_penalty_multiplier(),
            heuristic_weight: default_gr_heuristic(),
            margin: default_gr_margin(),
            via_cost: default_via_cost(),
            wrong_way_cost: default_wrong_way_cost(),
            batch_size: default_batch_size(),
            max_expansions: default_max_expansions(),
            limit_via_capacity: false,
            congestion_report: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RulesConfig {
    /// Multiplier from rule-text numbers to database units.
    #[serde(default = "default_rule_scale")]
    pub scale: f64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            scale: default_rule_scale(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostProcessConfig {
    #[serde(default = "default_true")]
    pub merge_split: bool,
    #[serde(default = "default_true")]
    pub check_shorts: bool,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            merge_split: true,
            check_shorts: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_design_file")]
    pub design_file: String,
    #[serde(default = "default_guide_output")]
    pub guide_output: String,
    #[serde(default = "default_geometry_output")]
    pub geometry_output: String,
    #[serde(default)]
    pub guide_input: Option<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            design_file: default_design_file(),
            guide_output: default_guide_output(),
            geometry_output: default_geometry_output(),
            guide_input: None,
        }
    }
}

fn default_min_routing_layer() -> usize {
    1
}

fn default_overflow_iterations() -> usize {
    50
}

fn default_alpha() -> f64 {
    0.3
}

fn default_pitches_in_tile() -> u32 {
    15
}

fn default_gr_history_increment() -> f64 {
    0.5
}

fn default_gr_initial_penalty() -> f64 {
    1.0
}

fn default_gr_penalty_multiplier() -> f64 {
    1.5
}

fn default_gr_heuristic() -> f64 {
    1.0
}

fn default_gr_margin() -> u32 {
    10
}

fn default_via_cost() -> f64 {
    2.0
}

fn default_wrong_way_cost() -> f64 {
    4.0
}

fn default_batch_size() -> usize {
    500
}

fn default_max_expansions() -> u32 {
    500_000
}

fn default_rule_scale() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_design_file() -> String {
    "inputs/design.toml".to_string()
}

fn default_guide_output() -> String {
    "output/route.guide".to_string()
}

fn default_geometry_output() -> String {
    "output/route.geom".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[global_routing]
adjustment = 0.2
allow_overflow = true

[[global_routing.region_adjustments]]
min_x = 0
min_y = 0
max_x = 100
max_y = 100
layer = 2
reduction = 0.5

[global_routing.net_alpha]
clk = 0.8
"#,
        )
        .unwrap();
        assert_eq!(cfg.global_routing.adjustment, 0.2);
        assert!(cfg.global_routing.allow_overflow);
        assert_eq!(cfg.global_routing.region_adjustments[0].layer, 2);
        assert_eq!(cfg.global_routing.net_alpha["clk"], 0.8);
        assert_eq!(cfg.global_routing.pitches_in_tile, 15);
        assert_eq!(cfg.rules.scale, 1.0);
        assert!(cfg.post_process.merge_split);
        assert_eq!(cfg.input.design_file, "inputs/design.toml");
    }
}
