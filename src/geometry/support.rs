use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;

/// Estimation target: a point or a block discretized at spacing `disc`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Support {
    Point(Point3<f64>),
    Aabb { aabb: Aabb, disc: Vector3<f64> },
}

impl Support {
    #[inline(always)]
    pub fn center(&self) -> Point3<f64> {
        match self {
            Support::Point(p) => *p,
            Support::Aabb { aabb, disc: _ } => aabb.center,
        }
    }

    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        match self {
            Support::Point(_) => 1,
            Support::Aabb { aabb, disc } => aabb.discretization_counts(disc).iter().product(),
        }
    }

    #[inline(always)]
    pub fn discretize_in(&self, out: &mut Vec<Point3<f64>>) {
        match self {
            Support::Point(p) => out.push(*p),
            Support::Aabb { aabb, disc } => aabb.discretize_in(disc, out),
        }
    }

    /// Separation vectors between every discretization node of `self` and `other`.
    #[inline(always)]
    pub fn dists_to_other(
        &self,
        other: &Self,
        out: &mut Vec<Vector3<f64>>,
        pt_buffer: &mut Vec<Point3<f64>>,
    ) {
        pt_buffer.clear();

        self.discretize_in(pt_buffer);
        let split = pt_buffer.len();
        other.discretize_in(pt_buffer);

        for p1 in pt_buffer[0..split].iter() {
            for p2 in pt_buffer[split..].iter() {
                out.push(*p2 - *p1)
            }
        }
    }

    #[must_use]
    pub fn is_aabb(&self) -> bool {
        matches!(self, Self::Aabb { .. })
    }
}

impl From<Point3<f64>> for Support {
    fn from(value: Point3<f64>) -> Self {
        Support::Point(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_to_point_distances() {
        let block = Support::Aabb {
            aabb: Aabb::from_min_max(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0)),
            disc: Vector3::new(1.0, 1.0, 1.0),
        };
        let point = Support::Point(Point3::new(1.0, 1.0, 1.0));

        let mut out = Vec::new();
        let mut buf = Vec::new();
        block.dists_to_other(&point, &mut out, &mut buf);

        assert_eq!(block.num_nodes(), 8);
        assert_eq!(out.len(), 8);
        assert!(out.iter().all(|h| (h.norm() - 0.75f64.sqrt()).abs() < 1e-12));
        assert!(block.is_aabb());
        assert!(!point.is_aabb());
    }
}
