use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use vroute_common::db::core::{LayerDirection, LayerType, Tech};
use vroute_common::db::indices::LayerId;
use vroute_common::db::parser::design::RuleRecord;
use vroute_rules::Constraint;
use vroute_rules::constraint::CutEdge;
use vroute_rules::table::Lookup2D;

fn tech() -> Tech {
    let mut tech = Tech::new();
    for (name, ty) in [
        ("M1", LayerType::Routing),
        ("V1", LayerType::Cut),
        ("M2", LayerType::Routing),
    ] {
        tech.add_layer(name.into(), ty, LayerDirection::Horizontal, 100, 50)
            .unwrap();
    }
    tech
}

/// One logical table label: a class that is either split into END and SIDE or given once
/// for both edges.
struct Label {
    class: String,
    split: bool,
}

/// Monotone values per expanded key, in sorted key order.
fn monotone(rng: &mut StdRng, n: usize) -> Vec<i64> {
    let mut v = 0;
    (0..n)
        .map(|_| {
            v += rng.gen_range(0..20);
            v
        })
        .collect()
}

fn expanded_len(labels: &[Label]) -> usize {
    labels.iter().map(|l| if l.split { 2 } else { 1 }).sum()
}

/// Text for a label and the value index of each of its edges, `(end, side)`.
fn label_parts(labels: &[Label], i: usize) -> Vec<(String, usize)> {
    let base: usize = labels[..i].iter().map(|l| if l.split { 2 } else { 1 }).sum();
    let l = &labels[i];
    if l.split {
        vec![
            (format!("{} END", l.class), base),
            (format!("{} SIDE", l.class), base + 1),
        ]
    } else {
        vec![(l.class.clone(), base)]
    }
}

#[test]
fn cut_class_table_stays_monotone_after_expansion() {
    let tech = tech();
    for seed in 0..40u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = rng.gen_range(1..6);
        let labels: Vec<Label> = (0..n)
            .map(|i| Label {
                class: format!("VC{:02}", i),
                split: rng.gen_bool(0.5),
            })
            .collect();
        let m = expanded_len(&labels);
        let row_vals = monotone(&mut rng, m);
        let col_vals = monotone(&mut rng, m);

        // Columns and rows are written in shuffled order.
        let mut col_order: Vec<(String, usize)> =
            (0..n).flat_map(|i| label_parts(&labels, i)).collect();
        col_order.shuffle(&mut rng);
        let mut row_order = col_order.clone();
        row_order.shuffle(&mut rng);

        let mut text = String::from("SPACINGTABLE CUTCLASS");
        for (name, _) in &col_order {
            text.push_str(&format!(" {}", name));
        }
        for (name, r) in &row_order {
            text.push_str(&format!(" {}", name));
            for (_, c) in &col_order {
                let v = row_vals[*r] + col_vals[*c];
                text.push_str(&format!(" {} {}", v, v + 5));
            }
        }
        text.push_str(" ;");

        let records = vec![RuleRecord {
            layer: "V1".into(),
            property: "LEF58_SPACINGTABLE".into(),
            text,
        }];
        let (db, report) = vroute_rules::compile(&tech, &records, 1.0).unwrap();
        assert_eq!(report.skipped, 0, "seed {}", seed);
        let Some(Constraint::CutClassSpacingTable(rule)) = db
            .constraints_of(LayerId(1), vroute_rules::ConstraintKind::CutClassSpacingTable)
            .next()
        else {
            panic!("seed {}: table missing", seed);
        };
        let table = &rule.table;
        assert!(table.rows().windows(2).all(|w| w[0] < w[1]));
        assert!(table.cols().windows(2).all(|w| w[0] < w[1]));
        for row in table.values() {
            assert!(row.windows(2).all(|w| w[0].0 <= w[1].0), "seed {}", seed);
        }
        for c in 0..table.cols().len() {
            for r in 1..table.rows().len() {
                assert!(table.values()[r - 1][c].0 <= table.values()[r][c].0);
            }
        }
        // Spot check one exact lookup against the generated values.
        let first = &labels[0];
        let edge = if first.split { CutEdge::End } else { CutEdge::Side };
        let expected = row_vals[0] + col_vals[0];
        assert_eq!(
            db.cut_class_spacing(LayerId(1), &first.class, edge, &first.class, edge),
            Some((expected, expected + 5))
        );
    }
}

#[test]
fn floor_lookup_is_monotone_in_both_axes() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let rows = rng.gen_range(1..6);
        let cols = rng.gen_range(1..6);
        let row_keys = monotone(&mut rng, rows);
        let col_keys = monotone(&mut rng, cols);
        let rv = monotone(&mut rng, rows);
        let cv = monotone(&mut rng, cols);
        let values = (0..rows)
            .map(|r| (0..cols).map(|c| rv[r] + cv[c]).collect())
            .collect();
        let t = Lookup2D::new("WIDTH", row_keys, "PRL", col_keys, values).unwrap();
        let w = rng.gen_range(-10..200);
        let mut prev = i64::MIN;
        for prl in -10..200 {
            let s = *t.find(&w, &prl);
            assert!(s >= prev);
            prev = s;
        }
    }
}
