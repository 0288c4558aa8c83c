use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Point3<f64>,
    pub half_extents: Vector3<f64>,
}

impl Aabb {
    #[inline(always)]
    pub fn new(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    #[inline(always)]
    pub fn from_min_max(min: Point3<f64>, max: Point3<f64>) -> Self {
        let center = nalgebra::center(&min, &max);
        let half_extents = (max - min) / 2.0;
        Self {
            center,
            half_extents,
        }
    }

    /// Smallest box containing every point, `None` for an empty slice.
    pub fn from_points(points: &[Point3<f64>]) -> Option<Self> {
        let first = points.first()?;
        let (min, max) = points.iter().fold((*first, *first), |(min, max), p| {
            (min.inf(p), max.sup(p))
        });
        Some(Self::from_min_max(min, max))
    }

    #[inline(always)]
    pub fn mins(&self) -> Point3<f64> {
        self.center - self.half_extents
    }

    #[inline(always)]
    pub fn maxs(&self) -> Point3<f64> {
        self.center + self.half_extents
    }

    #[inline(always)]
    pub fn contains_point(&self, point: &Point3<f64>) -> bool {
        let mins = self.mins();
        let maxs = self.maxs();

        mins.x <= point.x
            && mins.y <= point.y
            && mins.z <= point.z
            && maxs.x >= point.x
            && maxs.y >= point.y
            && maxs.z >= point.z
    }

    /// Box grown by `margin` on both sides of each axis.
    pub fn expanded(&self, margin: &Vector3<f64>) -> Self {
        Self::new(self.center, self.half_extents + margin)
    }

    /// Number of cells per axis when discretizing with spacing at most `disc`.
    pub fn discretization_counts(&self, disc: &Vector3<f64>) -> [usize; 3] {
        let full = self.half_extents * 2.0;
        let count = |extent: f64, d: f64| {
            if extent <= 0.0 || d <= 0.0 {
                1
            } else {
                ((extent / d).ceil() as usize).max(1)
            }
        };
        [
            count(full.x, disc.x),
            count(full.y, disc.y),
            count(full.z, disc.z),
        ]
    }

    /// Pushes the centres of a regular sub-grid covering the box.
    #[inline(always)]
    pub fn discretize_in(&self, disc: &Vector3<f64>, out: &mut Vec<Point3<f64>>) {
        //ceil gaurantees that the resulting discretization will have dimensions upperbounded by disc
        let [nx, ny, nz] = self.discretization_counts(disc);
        let mins = self.mins();
        let full = self.half_extents * 2.0;

        let step_x = full.x / nx as f64;
        let step_y = full.y / ny as f64;
        let step_z = full.z / nz as f64;

        for i in 0..nx {
            let x = mins.x + (i as f64 + 0.5) * step_x;
            for j in 0..ny {
                let y = mins.y + (j as f64 + 0.5) * step_y;
                for k in 0..nz {
                    let z = mins.z + (k as f64 + 0.5) * step_z;
                    out.push(Point3::new(x, y, z));
                }
            }
        }
    }
}
