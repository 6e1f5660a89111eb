//! Target geometry
//!
//! Lays out the targets for one amplitude/width condition. The 2D task places
//! circular targets evenly around a layout circle of diameter A; the 1D task uses
//! two tall rectangles at opposite ends of that diameter.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::types::{Condition, Point, TaskDimension};

/// Shape of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetShape {
    Rectangle,
    Circle,
}

/// Display status of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Normal,
    /// The target to select next
    Target,
}

/// A single selectable target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub shape: TargetShape,
    pub center: Point,
    pub width: f64,
    pub height: f64,
}

impl Target {
    pub fn circle(center: Point, diameter: f64) -> Self {
        Self {
            shape: TargetShape::Circle,
            center,
            width: diameter,
            height: diameter,
        }
    }

    pub fn rectangle(center: Point, width: f64, height: f64) -> Self {
        Self {
            shape: TargetShape::Rectangle,
            center,
            width,
            height,
        }
    }

    /// Returns true if the point lies inside the target (boundary included)
    pub fn contains(&self, point: Point) -> bool {
        match self.shape {
            TargetShape::Circle => self.center.distance_to(&point) <= self.width / 2.0,
            TargetShape::Rectangle => {
                (point.x - self.center.x).abs() <= self.width / 2.0
                    && (point.y - self.center.y).abs() <= self.height / 2.0
            }
        }
    }
}

/// Ordered targets for one sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSet {
    pub dimension: TaskDimension,
    pub condition: Condition,
    targets: Vec<Target>,
}

impl TargetSet {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Target> {
        self.targets.get(index)
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Index of the next target to select after `to_index`.
    ///
    /// The 1D task alternates between its two targets. The 2D task jumps to the
    /// target across the layout circle, `ceil(N/2)` steps ahead; with an odd
    /// target count this visits every target while working around the circle.
    pub fn next_index(&self, to_index: usize) -> usize {
        let n = self.targets.len();
        match self.dimension {
            TaskDimension::OneD => (to_index + 1) % 2,
            TaskDimension::TwoD => (to_index + n.div_ceil(2)) % n,
        }
    }

    /// Index of the target the drag object starts on before the first selection
    pub fn initial_from_index(&self) -> usize {
        self.targets.len() / 2
    }
}

/// Lay out the targets for a condition.
///
/// `target_count` is ignored for the 1D task, which always uses two targets.
pub fn layout(
    condition: Condition,
    target_count: usize,
    dimension: TaskDimension,
    screen_center: Point,
    one_d_target_height: f64,
) -> TargetSet {
    let n = match dimension {
        TaskDimension::OneD => 2,
        TaskDimension::TwoD => target_count,
    };
    let radius = condition.amplitude / 2.0;

    let targets = (0..n)
        .map(|i| {
            let theta = TAU * (i as f64 / n as f64);
            let center = Point::new(
                screen_center.x + radius * theta.cos(),
                screen_center.y + radius * theta.sin(),
            );
            match dimension {
                TaskDimension::OneD => {
                    Target::rectangle(center, condition.width, one_d_target_height)
                }
                TaskDimension::TwoD => Target::circle(center, condition.width),
            }
        })
        .collect();

    TargetSet {
        dimension,
        condition,
        targets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: Point = Point::new(500.0, 400.0);

    #[test]
    fn test_two_d_targets_on_layout_circle() {
        let set = layout(Condition::new(240.0, 50.0), 9, TaskDimension::TwoD, CENTER, 0.0);
        assert_eq!(set.len(), 9);
        for target in set.targets() {
            assert_eq!(target.shape, TargetShape::Circle);
            assert!((target.center.distance_to(&CENTER) - 120.0).abs() < 1e-9);
        }
        let first = set.get(0).unwrap();
        assert!((first.center.x - 620.0).abs() < 1e-9);
        assert!((first.center.y - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_d_uses_two_rectangles() {
        let set = layout(Condition::new(300.0, 40.0), 15, TaskDimension::OneD, CENTER, 720.0);
        assert_eq!(set.len(), 2);
        let left = set.get(1).unwrap();
        let right = set.get(0).unwrap();
        assert_eq!(right.shape, TargetShape::Rectangle);
        assert!((right.center.x - 650.0).abs() < 1e-9);
        assert!((left.center.x - 350.0).abs() < 1e-9);
        assert!((left.center.y - 400.0).abs() < 1e-6);
        assert_eq!(right.height, 720.0);
    }

    #[test]
    fn test_circle_containment_boundary() {
        let target = Target::circle(Point::new(0.0, 0.0), 50.0);
        assert!(target.contains(Point::new(25.0, 0.0)));
        assert!(target.contains(Point::new(0.0, -25.0)));
        assert!(!target.contains(Point::new(20.0, 20.0)));
    }

    #[test]
    fn test_rectangle_containment() {
        let target = Target::rectangle(Point::new(100.0, 100.0), 40.0, 200.0);
        assert!(target.contains(Point::new(120.0, 199.0)));
        assert!(target.contains(Point::new(80.0, 0.0)));
        assert!(!target.contains(Point::new(121.0, 100.0)));
        assert!(!target.contains(Point::new(100.0, 201.0)));
    }

    #[test]
    fn test_one_d_advancement_alternates() {
        let set = layout(Condition::new(300.0, 40.0), 2, TaskDimension::OneD, CENTER, 720.0);
        let mut to = 0;
        let mut visited = vec![to];
        for _ in 0..5 {
            to = set.next_index(to);
            visited.push(to);
        }
        assert_eq!(visited, vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_two_d_advancement_with_five_targets() {
        let set = layout(Condition::new(240.0, 50.0), 5, TaskDimension::TwoD, CENTER, 0.0);
        let mut to = 0;
        let mut visited = vec![to];
        for _ in 0..5 {
            to = set.next_index(to);
            visited.push(to);
        }
        assert_eq!(visited, vec![0, 3, 1, 4, 2, 0]);
    }

    #[test]
    fn test_two_d_advancement_visits_every_target() {
        let set = layout(Condition::new(240.0, 50.0), 15, TaskDimension::TwoD, CENTER, 0.0);
        let mut seen = vec![false; 15];
        let mut to = 0;
        for _ in 0..15 {
            seen[to] = true;
            to = set.next_index(to);
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(to, 0);
    }

    #[test]
    fn test_initial_from_index() {
        let set = layout(Condition::new(240.0, 50.0), 9, TaskDimension::TwoD, CENTER, 0.0);
        assert_eq!(set.initial_from_index(), 4);
    }
}
