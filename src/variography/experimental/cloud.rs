use serde::{Deserialize, Serialize};

use crate::spatial_database::rtree_point_set::point_set::PointSet;

/// One unordered sample pair of a variogram cloud.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloudPair {
    pub i: usize,
    pub j: usize,
    pub distance: f64,
    /// Half squared difference of the pair values.
    pub value: f64,
}

/// Lazily enumerated variogram cloud, pairs are produced in (i, j) order with i < j.
pub struct VariogramCloud<'a> {
    data: &'a PointSet,
    max_dist: Option<f64>,
}

impl<'a> VariogramCloud<'a> {
    pub fn new(data: &'a PointSet) -> Self {
        Self {
            data,
            max_dist: None,
        }
    }

    /// Skip pairs further apart than `max_dist`.
    pub fn with_max_dist(mut self, max_dist: f64) -> Self {
        self.max_dist = Some(max_dist);
        self
    }

    pub fn iter(&self) -> CloudIter<'a> {
        CloudIter {
            data: self.data,
            max_dist: self.max_dist,
            i: 0,
            j: 1,
        }
    }
}

impl<'a> IntoIterator for &VariogramCloud<'a> {
    type Item = CloudPair;
    type IntoIter = CloudIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct CloudIter<'a> {
    data: &'a PointSet,
    max_dist: Option<f64>,
    i: usize,
    j: usize,
}

impl<'a> Iterator for CloudIter<'a> {
    type Item = CloudPair;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.data.len();
        while self.i + 1 < n {
            if self.j >= n {
                self.i += 1;
                self.j = self.i + 1;
                continue;
            }
            let (i, j) = (self.i, self.j);
            self.j += 1;

            let distance = nalgebra::distance(&self.data.points[i], &self.data.points[j]);
            if self.max_dist.is_some_and(|max| distance > max) {
                continue;
            }
            let diff = self.data.data[i] - self.data.data[j];
            return Some(CloudPair {
                i,
                j,
                distance,
                value: 0.5 * diff * diff,
            });
        }
        None
    }
}
