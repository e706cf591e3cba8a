const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 16;

#[derive(Clone, Copy, Debug)]
pub(super) struct QuadBounds {
    pub(super) center_x: f64,
    pub(super) center_y: f64,
    pub(super) half_extent: f64,
}

impl QuadBounds {
    fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for &(x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }

        let span = (max_x - min_x).max(max_y - min_y).max(1.0);
        Some(Self {
            center_x: (min_x + max_x) * 0.5,
            center_y: (min_y + max_y) * 0.5,
            half_extent: span * 0.5 + 1.0,
        })
    }

    pub(super) fn contains(self, x: f64, y: f64) -> bool {
        (x - self.center_x).abs() <= self.half_extent && (y - self.center_y).abs() <= self.half_extent
    }

    pub(super) fn side_length(self) -> f64 {
        self.half_extent * 2.0
    }

    /// Squared distance from a point to the closest point of the square
    pub(super) fn distance_sq_to(self, x: f64, y: f64) -> f64 {
        let dx = ((x - self.center_x).abs() - self.half_extent).max(0.0);
        let dy = ((y - self.center_y).abs() - self.half_extent).max(0.0);
        dx * dx + dy * dy
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let (ox, oy) = match quadrant {
            0 => (-quarter, -quarter),
            1 => (quarter, -quarter),
            2 => (-quarter, quarter),
            _ => (quarter, quarter),
        };
        Self {
            center_x: self.center_x + ox,
            center_y: self.center_y + oy,
            half_extent: quarter,
        }
    }

    fn quadrant_for(self, x: f64, y: f64) -> usize {
        match (x >= self.center_x, y >= self.center_y) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }
}

/// Barnes-Hut cell: point count and centroid of everything below it
pub(super) struct QuadNode {
    pub(super) bounds: QuadBounds,
    pub(super) centroid_x: f64,
    pub(super) centroid_y: f64,
    pub(super) count: usize,
    pub(super) indices: Vec<usize>,
    pub(super) children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    pub(super) fn build(points: &[(f64, f64)]) -> Option<Self> {
        let bounds = QuadBounds::from_points(points)?;
        let indices = (0..points.len()).collect::<Vec<_>>();
        Some(Self::build_node(bounds, indices, points, 0))
    }

    fn build_node(bounds: QuadBounds, indices: Vec<usize>, points: &[(f64, f64)], depth: usize) -> Self {
        let (mut sum_x, mut sum_y) = (0.0, 0.0);
        for &index in &indices {
            sum_x += points[index].0;
            sum_y += points[index].1;
        }
        let count = indices.len();
        let (centroid_x, centroid_y) = if count > 0 {
            (sum_x / count as f64, sum_y / count as f64)
        } else {
            (bounds.center_x, bounds.center_y)
        };

        let mut node = Self {
            bounds,
            centroid_x,
            centroid_y,
            count,
            indices,
            children: std::array::from_fn(|_| None),
        };

        if depth >= MAX_DEPTH || node.indices.len() <= LEAF_CAPACITY {
            return node;
        }

        let mut buckets = std::array::from_fn::<_, 4, _>(|_| Vec::new());
        for &index in &node.indices {
            let (x, y) = points[index];
            buckets[bounds.quadrant_for(x, y)].push(index);
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            node.children[quadrant] = Some(Box::new(Self::build_node(
                bounds.child(quadrant),
                bucket,
                points,
                depth + 1,
            )));
        }
        node.indices.clear();
        node
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_leaf_points(node: &QuadNode) -> usize {
        if node.is_leaf() {
            return node.indices.len();
        }
        node.children
            .iter()
            .flatten()
            .map(|child| total_leaf_points(child))
            .sum()
    }

    #[test]
    fn every_point_lands_in_exactly_one_leaf() {
        let points: Vec<(f64, f64)> = (0..200)
            .map(|i| ((i % 20) as f64 * 7.0, (i / 20) as f64 * 3.0))
            .collect();
        let tree = QuadNode::build(&points).unwrap();
        assert_eq!(tree.count, 200);
        assert_eq!(total_leaf_points(&tree), 200);
        assert!(!tree.is_leaf());
    }

    #[test]
    fn coincident_points_stop_at_depth_limit() {
        let points = vec![(5.0, 5.0); 50];
        let tree = QuadNode::build(&points).unwrap();
        assert_eq!(total_leaf_points(&tree), 50);
        assert_eq!(tree.centroid_x, 5.0);
    }

    #[test]
    fn bounds_distance_is_zero_inside() {
        let bounds = QuadBounds {
            center_x: 0.0,
            center_y: 0.0,
            half_extent: 10.0,
        };
        assert_eq!(bounds.distance_sq_to(3.0, -4.0), 0.0);
        assert_eq!(bounds.distance_sq_to(13.0, 0.0), 9.0);
        assert!(bounds.contains(10.0, 10.0));
        assert!(!bounds.contains(10.5, 0.0));
    }

    #[test]
    fn no_points_no_tree() {
        assert!(QuadNode::build(&[]).is_none());
    }
}
