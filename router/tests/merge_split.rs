use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vroute_common::db::conn_fig::{ConnFig, EndStyle, PathSeg, SegEnd, SegStyle, Via};
use vroute_common::db::core::{LayerDirection, LayerType, Tech};
use vroute_common::db::indices::{LayerId, NetId, ViaDefId};
use vroute_common::geom::point::Point;
use vroute_common::geom::rect::Rect;
use vroute_common::util::check;
use vroute_router::post::{merge_split, merge_split_nets};

fn tech() -> Tech {
    let mut tech = Tech::new();
    tech.add_layer("M1".into(), LayerType::Routing, LayerDirection::Horizontal, 100, 20)
        .unwrap();
    tech.add_layer("V1".into(), LayerType::Cut, LayerDirection::Unknown, 0, 10)
        .unwrap();
    tech.add_layer("M2".into(), LayerType::Routing, LayerDirection::Vertical, 100, 20)
        .unwrap();
    let names: Vec<String> = ["M1", "V1", "M2"].iter().map(|s| s.to_string()).collect();
    tech.add_via_def("VIA12".into(), &names, Rect::from_array([-5, -5, 5, 5]), true)
        .unwrap();
    tech
}

const M1: LayerId = LayerId(0);
const M2: LayerId = LayerId(2);

fn wire(layer: LayerId, a: (i64, i64), b: (i64, i64)) -> PathSeg {
    PathSeg::new(
        layer,
        Point::new(a.0, a.1),
        Point::new(b.0, b.1),
        SegStyle::uniform(20, SegEnd::TRUNCATE),
    )
}

fn segments(figs: &[ConnFig]) -> Vec<PathSeg> {
    let mut out: Vec<PathSeg> = figs
        .iter()
        .filter_map(|f| match f {
            ConnFig::PathSeg(s) => Some(*s),
            _ => None,
        })
        .collect();
    out.sort_by_key(|s| (s.layer, s.begin, s.end));
    out
}

#[test]
fn touching_runs_on_one_track_merge() {
    let t = tech();
    let figs = [
        wire(M1, (0, 100), (100, 100)).into(),
        wire(M1, (100, 100), (200, 100)).into(),
    ];
    let (out, _) = merge_split(&t, &figs);
    assert_eq!(segments(&out), vec![wire(M1, (0, 100), (200, 100))]);
}

#[test]
fn via_inside_a_run_splits_it_with_truncated_ends() {
    let t = tech();
    let figs = [
        wire(M1, (0, 100), (200, 100)).into(),
        ConnFig::Via(Via {
            origin: Point::new(150, 100),
            def: ViaDefId(0),
        }),
    ];
    let (out, stats) = merge_split(&t, &figs);
    let segs = segments(&out);
    assert_eq!(
        segs.iter().map(|s| (s.begin, s.end)).collect::<Vec<_>>(),
        vec![
            (Point::new(0, 100), Point::new(150, 100)),
            (Point::new(150, 100), Point::new(200, 100)),
        ]
    );
    assert_eq!(segs[0].style.end.style, EndStyle::Truncate);
    assert_eq!(segs[1].style.begin.style, EndStyle::Truncate);
    assert_eq!(stats.via_splits, 1);
}

#[test]
fn via_at_a_run_end_does_not_split() {
    let t = tech();
    let figs = [
        wire(M2, (200, 0), (200, 300)).into(),
        ConnFig::Via(Via {
            origin: Point::new(200, 300),
            def: ViaDefId(0),
        }),
    ];
    let (out, stats) = merge_split(&t, &figs);
    assert_eq!(segments(&out).len(), 1);
    assert_eq!(stats.via_splits, 0);
}

/// Separated runs: horizontal on M1, vertical on M2, distinct tracks, gaps between.
fn clean_net(rng: &mut StdRng) -> Vec<ConnFig> {
    let mut figs = Vec::new();
    for (i, layer) in [M1, M2].into_iter().enumerate() {
        let runs = rng.gen_range(1..6);
        for k in 0..runs {
            let track = k as i64 * 100 + rng.gen_range(0..50);
            let lo = rng.gen_range(0..1_000);
            let hi = lo + rng.gen_range(1..500);
            let style = SegStyle {
                width: rng.gen_range(10..40),
                begin: SegEnd::new(EndStyle::Extend, rng.gen_range(0..20)),
                end: SegEnd::new(EndStyle::Truncate, rng.gen_range(0..20)),
            };
            let (a, b) = if i == 0 {
                (Point::new(lo, track), Point::new(hi, track))
            } else {
                (Point::new(track, lo), Point::new(track, hi))
            };
            figs.push(PathSeg::new(layer, a, b, style).into());
        }
    }
    figs
}

#[test]
fn clean_input_passes_through_unchanged() {
    let t = tech();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let figs = clean_net(&mut rng);
        let (out, stats) = merge_split(&t, &figs);
        assert_eq!(segments(&out), segments(&figs));
        assert_eq!(stats.via_splits + stats.crossing_splits, 0);
    }
}

#[test]
fn nets_are_processed_independently_and_stay_short_free() {
    let t = tech();
    let nets = vec![
        (
            NetId(0),
            vec![
                wire(M1, (0, 100), (100, 100)).into(),
                wire(M1, (50, 100), (300, 100)).into(),
            ],
        ),
        (NetId(1), vec![wire(M1, (0, 500), (300, 500)).into()]),
    ];
    let (out, stats) = merge_split_nets(&t, &nets);
    assert_eq!(out.len(), 2);
    assert_eq!(segments(&out[0].1), vec![wire(M1, (0, 100), (300, 100))]);
    assert_eq!(stats.segments_in, 3);
    assert_eq!(stats.segments_out, 2);
    check::check_geometry(&t, &out).unwrap();
}
