use vroute_common::geom::coord::GridCoord;

fn distance(a: GridCoord, b: GridCoord) -> u32 {
    a.planar_distance(b) + a.z.abs_diff(b.z) as u32
}

/// Order in which to connect `pins` so every pin joins the tree through the
/// nearest already-connected pin (Prim's MST over rectilinear distance).
///
/// Returns `(pin, parent)` pairs; the first entry is the root with no parent.
pub fn prim_order(pins: &[GridCoord]) -> Vec<(usize, Option<usize>)> {
    let n = pins.len();
    let mut order = Vec::with_capacity(n);
    if n == 0 {
        return order;
    }
    let mut in_tree = vec![false; n];
    let mut best = vec![(u32::MAX, 0usize); n];
    in_tree[0] = true;
    order.push((0, None));
    for i in 1..n {
        best[i] = (distance(pins[0], pins[i]), 0);
    }
    for _ in 1..n {
        let Some(next) = (0..n)
            .filter(|&i| !in_tree[i])
            .min_by_key(|&i| (best[i].0, i))
        else {
            break;
        };
        in_tree[next] = true;
        order.push((next, Some(best[next].1)));
        for i in 0..n {
            if !in_tree[i] {
                let d = distance(pins[next], pins[i]);
                if d < best[i].0 {
                    best[i] = (d, next);
                }
            }
        }
    }
    order
}

/// Sum of MST edge lengths; a cheap lower bound on a net's wirelength.
pub fn mst_length(pins: &[GridCoord]) -> u32 {
    prim_order(pins)
        .iter()
        .filter_map(|&(i, p)| p.map(|p| distance(pins[i], pins[p])))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(x: u32, y: u32) -> GridCoord {
        GridCoord::new(x, y, 0)
    }

    #[test]
    fn connects_through_nearest_tree_pin() {
        let pins = [g(0, 0), g(10, 0), g(1, 0), g(9, 1)];
        let order = prim_order(&pins);
        assert_eq!(order, vec![(0, None), (2, Some(0)), (1, Some(2)), (3, Some(1))]);
        assert_eq!(mst_length(&pins), 1 + 9 + 2);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(prim_order(&[]).is_empty());
        assert_eq!(prim_order(&[g(3, 3)]), vec![(0, None)]);
        assert_eq!(mst_length(&[g(3, 3), g(3, 3)]), 0);
    }
}
