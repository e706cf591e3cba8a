//! Force kernels. Each one adds a velocity delta to every node.

use crate::grid::UniformGrid;
use crate::model::Node;

use super::quadtree::QuadNode;

/// Magnitude of the nudge used to separate coincident points
const JIGGLE_SPAN: f64 = 1e-6;

/// Deterministic stand-in for a random nudge, keyed by a pair of node ids
pub(super) fn jiggle(a: u64, b: u64, axis: u64) -> f64 {
    let mut h = a
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(b.wrapping_mul(2_654_435_761))
        .wrapping_add(axis.wrapping_mul(0xBF58_476D_1CE4_E5B9));
    h ^= h >> 30;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 27;
    h = h.wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^= h >> 31;
    let unit = (h >> 11) as f64 / (1u64 << 53) as f64;
    (unit - 0.5) * JIGGLE_SPAN
}

/// Pull every node toward its target x
pub(super) fn attract_x(nodes: &mut [Node], strength: f64, alpha: f64) {
    let k = strength * alpha;
    for node in nodes {
        node.vx += (node.target_x - node.x) * k;
    }
}

/// Pull every node toward its target y
pub(super) fn attract_y(nodes: &mut [Node], strength: f64, alpha: f64) {
    let k = strength * alpha;
    for node in nodes {
        node.vy += (node.target_y - node.y) * k;
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) struct CollideParams {
    pub(super) padding: f64,
    pub(super) strength: f64,
    pub(super) iterations: usize,
}

/// Push apart overlapping circles, judged at their predicted next positions.
///
/// Each pass resolves pairs in index order and updates velocities in place,
/// so later pairs see earlier corrections. The impulse is split by squared
/// radius: the smaller circle moves more. Not scaled by alpha.
pub(super) fn collide(nodes: &mut [Node], params: CollideParams) {
    if nodes.len() < 2 {
        return;
    }
    let max_radius = nodes
        .iter()
        .map(|node| node.radius + params.padding)
        .fold(0.0, f64::max);

    let mut candidates = Vec::new();
    for _ in 0..params.iterations {
        let predicted: Vec<(f64, f64)> = nodes
            .iter()
            .map(|node| (node.x + node.vx, node.y + node.vy))
            .collect();
        let grid = UniformGrid::build(&predicted, max_radius * 2.0);

        for i in 0..nodes.len() {
            let ri = nodes[i].radius + params.padding;
            let ri2 = ri * ri;
            let xi = nodes[i].x + nodes[i].vx;
            let yi = nodes[i].y + nodes[i].vy;

            candidates.clear();
            grid.for_each_candidate(predicted[i].0, predicted[i].1, ri + max_radius, |j| {
                if j > i {
                    candidates.push(j);
                }
            });

            for &j in &candidates {
                let rj = nodes[j].radius + params.padding;
                let r = ri + rj;
                let mut dx = xi - nodes[j].x - nodes[j].vx;
                let mut dy = yi - nodes[j].y - nodes[j].vy;
                let mut l = dx * dx + dy * dy;
                if l >= r * r {
                    continue;
                }
                if dx == 0.0 {
                    dx = jiggle(nodes[i].id, nodes[j].id, 0);
                    l += dx * dx;
                }
                if dy == 0.0 {
                    dy = jiggle(nodes[i].id, nodes[j].id, 1);
                    l += dy * dy;
                }
                let dist = l.sqrt();
                let push = (r - dist) / dist * params.strength;
                dx *= push;
                dy *= push;

                let rj2 = rj * rj;
                let share = rj2 / (ri2 + rj2);
                nodes[i].vx += dx * share;
                nodes[i].vy += dy * share;
                nodes[j].vx -= dx * (1.0 - share);
                nodes[j].vy -= dy * (1.0 - share);
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) struct ChargeParams {
    pub(super) strength: f64,
    pub(super) theta: f64,
    pub(super) distance_min: f64,
    pub(super) distance_max: f64,
}

/// Mild inverse-distance repulsion between nodes closer than `distance_max`.
///
/// Distant cells are collapsed to their centroid when `side / distance < theta`.
pub(super) fn charge(nodes: &mut [Node], params: ChargeParams, alpha: f64) {
    if nodes.len() < 2 || params.strength == 0.0 {
        return;
    }
    let points: Vec<(f64, f64)> = nodes.iter().map(|node| (node.x, node.y)).collect();
    let Some(tree) = QuadNode::build(&points) else {
        return;
    };
    let ids: Vec<u64> = nodes.iter().map(|node| node.id).collect();
    let ctx = ChargeContext {
        points: &points,
        ids: &ids,
        strength: params.strength * alpha,
        theta2: params.theta * params.theta,
        distance_min2: params.distance_min * params.distance_min,
        distance_max2: params.distance_max * params.distance_max,
    };

    for (index, node) in nodes.iter_mut().enumerate() {
        let mut force = (0.0, 0.0);
        ctx.accumulate(&tree, index, &mut force);
        node.vx += force.0;
        node.vy += force.1;
    }
}

struct ChargeContext<'a> {
    points: &'a [(f64, f64)],
    ids: &'a [u64],
    /// Per-node strength already scaled by alpha
    strength: f64,
    theta2: f64,
    distance_min2: f64,
    distance_max2: f64,
}

impl ChargeContext<'_> {
    fn accumulate(&self, cell: &QuadNode, index: usize, force: &mut (f64, f64)) {
        let (x, y) = self.points[index];
        if cell.count == 0 || cell.bounds.distance_sq_to(x, y) >= self.distance_max2 {
            return;
        }

        if !cell.is_leaf() {
            let dx = cell.centroid_x - x;
            let dy = cell.centroid_y - y;
            let l = dx * dx + dy * dy;
            let side = cell.bounds.side_length();
            if !cell.bounds.contains(x, y) && side * side / self.theta2 < l {
                if l < self.distance_max2 {
                    let l = if l < self.distance_min2 {
                        (self.distance_min2 * l).sqrt()
                    } else {
                        l
                    };
                    let w = self.strength * cell.count as f64 / l;
                    force.0 += dx * w;
                    force.1 += dy * w;
                }
                return;
            }
            for child in cell.children.iter().flatten() {
                self.accumulate(child, index, force);
            }
            return;
        }

        for &other in &cell.indices {
            if other == index {
                continue;
            }
            let mut dx = self.points[other].0 - x;
            let mut dy = self.points[other].1 - y;
            let mut l = dx * dx + dy * dy;
            if l >= self.distance_max2 {
                continue;
            }
            if dx == 0.0 {
                dx = jiggle(self.ids[index], self.ids[other], 2);
                l += dx * dx;
            }
            if dy == 0.0 {
                dy = jiggle(self.ids[index], self.ids[other], 3);
                l += dy * dy;
            }
            if l < self.distance_min2 {
                l = (self.distance_min2 * l).sqrt();
            }
            let w = self.strength / l;
            force.0 += dx * w;
            force.1 += dy * w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Band;

    fn node(id: u64, x: f64, y: f64, radius: f64) -> Node {
        Node::at_target(id, radius, x, y, Band::new(-1000.0, 1000.0))
    }

    #[test]
    fn jiggle_is_tiny_deterministic_and_signed() {
        assert_eq!(jiggle(1, 2, 0), jiggle(1, 2, 0));
        let values: Vec<f64> = (0..64).map(|i| jiggle(i, i + 1, 1)).collect();
        assert!(values.iter().all(|v| v.abs() <= JIGGLE_SPAN / 2.0));
        assert!(values.iter().any(|v| *v > 0.0));
        assert!(values.iter().any(|v| *v < 0.0));
    }

    #[test]
    fn attraction_scales_with_alpha() {
        let mut nodes = vec![node(1, 0.0, 0.0, 1.0)];
        nodes[0].target_x = 10.0;
        nodes[0].target_y = -10.0;
        attract_x(&mut nodes, 1.0, 0.5);
        attract_y(&mut nodes, 0.2, 0.5);
        assert_eq!(nodes[0].vx, 5.0);
        assert_eq!(nodes[0].vy, -1.0);
    }

    #[test]
    fn overlapping_circles_are_pushed_apart() {
        let mut nodes = vec![node(1, 0.0, 0.0, 5.0), node(2, 4.0, 0.0, 5.0)];
        collide(
            &mut nodes,
            CollideParams {
                padding: 0.0,
                strength: 1.0,
                iterations: 1,
            },
        );
        // Equal radii share the correction evenly: 6px of overlap, 3px each
        assert!((nodes[0].vx + 3.0).abs() < 1e-9);
        assert!((nodes[1].vx - 3.0).abs() < 1e-9);
        assert!(nodes[0].vy.abs() < 1e-6);
    }

    #[test]
    fn smaller_circle_moves_more() {
        let mut nodes = vec![node(1, 0.0, 0.0, 2.0), node(2, 5.0, 0.0, 6.0)];
        collide(
            &mut nodes,
            CollideParams {
                padding: 0.0,
                strength: 1.0,
                iterations: 1,
            },
        );
        assert!(nodes[0].vx.abs() > nodes[1].vx.abs());
    }

    #[test]
    fn coincident_circles_separate_vertically_via_jiggle() {
        let mut nodes = vec![node(1, 0.0, 0.0, 3.0), node(2, 2.0, 0.0, 3.0)];
        collide(
            &mut nodes,
            CollideParams {
                padding: 0.8,
                strength: 0.9,
                iterations: 3,
            },
        );
        assert!(nodes[0].vy != 0.0);
        assert!(nodes[0].vy.signum() != nodes[1].vy.signum());
    }

    #[test]
    fn distant_circles_are_untouched() {
        let mut nodes = vec![node(1, 0.0, 0.0, 2.0), node(2, 50.0, 0.0, 2.0)];
        collide(
            &mut nodes,
            CollideParams {
                padding: 0.8,
                strength: 0.9,
                iterations: 3,
            },
        );
        assert_eq!(nodes[0].vx, 0.0);
        assert_eq!(nodes[1].vx, 0.0);
    }

    fn charge_params() -> ChargeParams {
        ChargeParams {
            strength: -1.0,
            theta: 0.9,
            distance_min: 1.0,
            distance_max: 50.0,
        }
    }

    #[test]
    fn charge_repels_nearby_nodes() {
        let mut nodes = vec![node(1, 0.0, 0.0, 1.0), node(2, 10.0, 0.0, 1.0)];
        charge(&mut nodes, charge_params(), 1.0);
        // strength * dx / d^2 = -1 * 10 / 100
        assert!((nodes[0].vx + 0.1).abs() < 1e-12);
        assert!((nodes[1].vx - 0.1).abs() < 1e-12);
    }

    #[test]
    fn charge_ignores_nodes_beyond_cutoff() {
        let mut nodes = vec![node(1, 0.0, 0.0, 1.0), node(2, 80.0, 0.0, 1.0)];
        charge(&mut nodes, charge_params(), 1.0);
        assert_eq!(nodes[0].vx, 0.0);
        assert_eq!(nodes[1].vx, 0.0);
    }

    fn direct_charge(nodes: &mut [Node]) {
        let points: Vec<(f64, f64)> = nodes.iter().map(|n| (n.x, n.y)).collect();
        for (i, n) in nodes.iter_mut().enumerate() {
            for (j, &(x, y)) in points.iter().enumerate() {
                let (dx, dy) = (x - points[i].0, y - points[i].1);
                let l = dx * dx + dy * dy;
                if i != j && l < 2500.0 {
                    n.vx += -dx / l;
                    n.vy += -dy / l;
                }
            }
        }
    }

    fn cluster() -> Vec<Node> {
        (0..60)
            .map(|i| node(i, (i % 10) as f64 * 4.0 + 0.5, (i / 10) as f64 * 4.0 + 0.25, 1.0))
            .collect()
    }

    #[test]
    fn tiny_theta_reproduces_direct_sum() {
        let mut nodes = cluster();
        let mut exact = nodes.clone();
        let params = ChargeParams {
            theta: 1e-6,
            ..charge_params()
        };
        charge(&mut nodes, params, 1.0);
        direct_charge(&mut exact);
        for (a, b) in nodes.iter().zip(&exact) {
            assert!((a.vx - b.vx).abs() < 1e-5);
            assert!((a.vy - b.vy).abs() < 1e-5);
        }
    }

    #[test]
    fn barnes_hut_stays_close_to_direct_sum() {
        let mut nodes = cluster();
        let mut exact = nodes.clone();
        charge(&mut nodes, charge_params(), 1.0);
        direct_charge(&mut exact);

        let error: f64 = nodes
            .iter()
            .zip(&exact)
            .map(|(a, b)| (a.vx - b.vx).abs() + (a.vy - b.vy).abs())
            .sum();
        let magnitude: f64 = exact.iter().map(|n| n.vx.abs() + n.vy.abs()).sum();
        assert!(error / magnitude < 0.1, "relative error {}", error / magnitude);
    }
}
