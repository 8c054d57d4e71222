//! Spatial indexes for the force layout: a Barnes-Hut quadtree for
//! repulsion and a uniform grid for collision, so a tick stays near
//! n log n instead of visiting every pair.

use std::collections::HashMap;

/// Past this depth coincident points share a leaf instead of splitting.
const MAX_DEPTH: usize = 32;

#[derive(Debug)]
struct Quad {
    x0: f64,
    y0: f64,
    size: f64,
    mass: f64,
    cx: f64,
    cy: f64,
    children: Option<[usize; 4]>,
    points: Vec<usize>,
}

impl Quad {
    fn new(x0: f64, y0: f64, size: f64) -> Self {
        Self {
            x0,
            y0,
            size,
            mass: 0.0,
            cx: 0.0,
            cy: 0.0,
            children: None,
            points: Vec::new(),
        }
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x0 + self.size && y >= self.y0 && y <= self.y0 + self.size
    }

    fn quadrant(&self, x: f64, y: f64) -> usize {
        let half = self.size / 2.0;
        let right = x >= self.x0 + half;
        let below = y >= self.y0 + half;
        usize::from(right) | usize::from(below) << 1
    }
}

/// What a point feels during a tree walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Source {
    Point(usize),
    /// A far-away group acting as one mass at its centroid.
    Cluster { x: f64, y: f64, mass: f64 },
}

pub(crate) struct QuadTree {
    quads: Vec<Quad>,
}

impl QuadTree {
    pub(crate) fn new(points: &[(f64, f64)]) -> Self {
        let mut tree = Self { quads: Vec::new() };
        let finite = || points.iter().filter(|(x, y)| x.is_finite() && y.is_finite());
        let Some(&(first_x, first_y)) = finite().next() else {
            return tree;
        };

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first_x, first_y, first_x, first_y);
        for &(x, y) in finite() {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let size = (max_x - min_x).max(max_y - min_y).max(1.0);
        tree.quads.push(Quad::new(min_x, min_y, size));

        for (index, (x, y)) in points.iter().enumerate() {
            if x.is_finite() && y.is_finite() {
                tree.insert(points, index);
            }
        }
        tree.accumulate(points);
        tree
    }

    fn insert(&mut self, points: &[(f64, f64)], index: usize) {
        let (x, y) = points[index];
        let mut quad = 0;
        let mut depth = 0;

        loop {
            if let Some(children) = self.quads[quad].children {
                quad = children[self.quads[quad].quadrant(x, y)];
                depth += 1;
                continue;
            }
            if self.quads[quad].points.is_empty() || depth >= MAX_DEPTH {
                self.quads[quad].points.push(index);
                return;
            }
            self.split(quad, points);
        }
    }

    fn split(&mut self, quad: usize, points: &[(f64, f64)]) {
        let Quad { x0, y0, size, .. } = self.quads[quad];
        let half = size / 2.0;
        let first = self.quads.len();
        for k in 0..4 {
            let x = if k & 1 == 1 { x0 + half } else { x0 };
            let y = if k & 2 == 2 { y0 + half } else { y0 };
            self.quads.push(Quad::new(x, y, half));
        }

        let children = [first, first + 1, first + 2, first + 3];
        let moved = std::mem::take(&mut self.quads[quad].points);
        self.quads[quad].children = Some(children);
        for index in moved {
            let (x, y) = points[index];
            let child = children[self.quads[quad].quadrant(x, y)];
            self.quads[child].points.push(index);
        }
    }

    /// Children always sit after their parent, so one reverse pass is bottom-up.
    fn accumulate(&mut self, points: &[(f64, f64)]) {
        for q in (0..self.quads.len()).rev() {
            let (mass, sum_x, sum_y) = match self.quads[q].children {
                Some(children) => children.iter().fold((0.0, 0.0, 0.0), |(m, sx, sy), &c| {
                    let child = &self.quads[c];
                    (m + child.mass, sx + child.cx * child.mass, sy + child.cy * child.mass)
                }),
                None => self.quads[q]
                    .points
                    .iter()
                    .fold((0.0, 0.0, 0.0), |(m, sx, sy), &p| (m + 1.0, sx + points[p].0, sy + points[p].1)),
            };

            let quad = &mut self.quads[q];
            quad.mass = mass;
            if mass > 0.0 {
                quad.cx = sum_x / mass;
                quad.cy = sum_y / mass;
            }
        }
    }

    /// Walk the tree from the point at `index`. A cell that does not hold the
    /// point and satisfies `size² < theta² · distance²` is reported as one
    /// cluster; everything else is opened down to individual points.
    pub(crate) fn visit(&self, index: usize, points: &[(f64, f64)], theta2: f64, mut each: impl FnMut(Source)) {
        if self.quads.is_empty() {
            return;
        }
        let (x, y) = points[index];
        let mut stack = vec![0];

        while let Some(q) = stack.pop() {
            let quad = &self.quads[q];
            if quad.mass == 0.0 {
                continue;
            }
            match quad.children {
                Some(children) => {
                    let (dx, dy) = (quad.cx - x, quad.cy - y);
                    if !quad.contains(x, y) && quad.size * quad.size < theta2 * (dx * dx + dy * dy) {
                        each(Source::Cluster {
                            x: quad.cx,
                            y: quad.cy,
                            mass: quad.mass,
                        });
                    } else {
                        stack.extend(children);
                    }
                }
                None => {
                    for &p in quad.points.iter().filter(|&&p| p != index) {
                        each(Source::Point(p));
                    }
                }
            }
        }
    }
}

/// Uniform grid whose cells are as wide as the largest collision reach, so
/// any overlapping pair sits in the same or an adjacent cell.
pub(crate) struct CollisionGrid {
    cell: f64,
    buckets: HashMap<(i64, i64), Vec<usize>>,
}

impl CollisionGrid {
    pub(crate) fn new(points: &[(f64, f64)], reach: f64) -> Self {
        let cell = reach.max(1.0);
        let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (index, &(x, y)) in points.iter().enumerate() {
            buckets.entry(Self::key(x, y, cell)).or_default().push(index);
        }
        Self { cell, buckets }
    }

    fn key(x: f64, y: f64, cell: f64) -> (i64, i64) {
        ((x / cell).floor() as i64, (y / cell).floor() as i64)
    }

    /// Indices greater than `index` in the 3x3 cells around `point`, ascending.
    pub(crate) fn neighbours_after(&self, index: usize, point: (f64, f64)) -> Vec<usize> {
        let (kx, ky) = Self::key(point.0, point.1, self.cell);
        let mut found: Vec<usize> = (-1..=1)
            .flat_map(|dx| (-1..=1).map(move |dy| (kx.saturating_add(dx), ky.saturating_add(dy))))
            .filter_map(|key| self.buckets.get(&key))
            .flatten()
            .copied()
            .filter(|&j| j > index)
            .collect();
        found.sort_unstable();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(tree: &QuadTree, index: usize, points: &[(f64, f64)], theta2: f64) -> Vec<Source> {
        let mut seen = Vec::new();
        tree.visit(index, points, theta2, |source| seen.push(source));
        seen
    }

    #[test]
    fn exact_walk_reports_every_other_point() {
        let points: Vec<(f64, f64)> = (0..50).map(|i| ((i * 37 % 101) as f64, (i * 53 % 97) as f64)).collect();
        let tree = QuadTree::new(&points);

        let mut seen: Vec<usize> = collect(&tree, 7, &points, 0.0)
            .into_iter()
            .map(|source| match source {
                Source::Point(p) => p,
                Source::Cluster { .. } => panic!("theta 0 must not approximate"),
            })
            .collect();
        seen.sort_unstable();
        let expected: Vec<usize> = (0..50).filter(|&i| i != 7).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn distant_group_collapses_to_its_centroid() {
        let mut points: Vec<(f64, f64)> = (0..16).map(|i| ((i % 4) as f64, (i / 4) as f64)).collect();
        points.push((1000.0, 1.5));
        let tree = QuadTree::new(&points);

        let seen = collect(&tree, 16, &points, 0.81);
        let mass: f64 = seen
            .iter()
            .map(|source| match source {
                Source::Point(_) => 1.0,
                Source::Cluster { mass, .. } => *mass,
            })
            .sum();
        assert_eq!(mass, 16.0);
        match seen.as_slice() {
            [Source::Cluster { x, y, .. }] => assert!((x - 1.5).abs() < 1e-9 && (y - 1.5).abs() < 1e-9),
            other => panic!("expected one cluster, got {:?}", other),
        }
    }

    #[test]
    fn coincident_points_share_a_leaf() {
        let points = vec![(5.0, 5.0); 200];
        let tree = QuadTree::new(&points);
        assert_eq!(collect(&tree, 0, &points, 0.81).len(), 199);
        assert!(tree.quads.len() <= 1 + 4 * MAX_DEPTH);
    }

    #[test]
    fn grid_finds_only_nearby_later_points() {
        let points = vec![(0.0, 0.0), (30.0, 0.0), (45.0, 45.0), (500.0, 500.0), (-20.0, 10.0)];
        let grid = CollisionGrid::new(&points, 50.0);

        assert_eq!(grid.neighbours_after(0, points[0]), vec![1, 2, 4]);
        assert_eq!(grid.neighbours_after(1, points[1]), vec![2, 4]);
        assert!(grid.neighbours_after(3, points[3]).is_empty());
    }
}
