use std::collections::HashMap;
use std::path::Path;

use nalgebra::Point3;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::{Deserialize, Serialize};

use crate::error::{GeostatError, Result};
use crate::geometry::ellipsoid::Ellipsoid;
use crate::spatial_database::{ConditioningDataCollector, ConditioningParams, Neighborhood};

pub type Point = GeomWithData<[f64; 3], usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    Two,
    Three,
}

/// Sample set indexed by an R-tree built once at construction.
///
/// Point indices are stable: the i-th point, value and tag always refer to the same sample.
#[derive(Clone)]
pub struct PointSet {
    pub tree: RTree<Point>,
    pub points: Vec<Point3<f64>>,
    pub data: Vec<f64>,
    pub tags: Vec<u32>,
    pub dimension: Dimension,
}

impl PointSet {
    pub fn new(points: Vec<Point3<f64>>, data: Vec<f64>) -> Result<Self> {
        let tags = vec![0; points.len()];
        Self::with_tags(points, data, tags, Dimension::Three)
    }

    pub fn with_tags(
        points: Vec<Point3<f64>>,
        data: Vec<f64>,
        tags: Vec<u32>,
        dimension: Dimension,
    ) -> Result<Self> {
        if points.len() != data.len() || points.len() != tags.len() {
            return Err(GeostatError::InvalidInput(format!(
                "{} points, {} values and {} tags",
                points.len(),
                data.len(),
                tags.len()
            )));
        }
        if let Some(i) = points
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
        {
            return Err(GeostatError::InvalidInput(format!(
                "non-finite coordinate at sample {i}"
            )));
        }
        if let Some(i) = data.iter().position(|v| !v.is_finite()) {
            return Err(GeostatError::InvalidInput(format!(
                "non-finite value at sample {i}"
            )));
        }

        let tree_points = points
            .iter()
            .enumerate()
            .map(|(i, p)| Point::new([p.x, p.y, p.z], i))
            .collect();
        let tree = RTree::bulk_load(tree_points);

        Ok(Self {
            tree,
            points,
            data,
            tags,
            dimension,
        })
    }

    /// Planar samples, stored with z = 0.
    pub fn from_xy(coords: &[[f64; 2]], data: Vec<f64>) -> Result<Self> {
        let points = coords.iter().map(|c| Point3::new(c[0], c[1], 0.0)).collect();
        let tags = vec![0; coords.len()];
        Self::with_tags(points, data, tags, Dimension::Two)
    }

    pub fn from_xyz(coords: &[[f64; 3]], data: Vec<f64>) -> Result<Self> {
        let points = coords.iter().map(|c| Point3::from(*c)).collect();
        Self::new(points, data)
    }

    /// Read samples from a csv file with a header row. Without `z_col` the set is planar.
    pub fn from_csv_index(
        csv_path: impl AsRef<Path>,
        x_col: &str,
        y_col: &str,
        z_col: Option<&str>,
        value_col: &str,
    ) -> Result<Self> {
        //storage for data
        let mut point_vec = Vec::new();
        let mut value_vec = Vec::new();

        let parse = |record: &HashMap<String, String>, col: &str| -> Result<f64> {
            let field = record
                .get(col)
                .ok_or_else(|| GeostatError::InvalidInput(format!("missing column {col}")))?;
            field.trim().parse::<f64>().map_err(|e| {
                GeostatError::InvalidInput(format!("column {col}: {e} ({field:?})"))
            })
        };

        //read data from csv
        let mut rdr = csv::Reader::from_path(csv_path)?;
        for result in rdr.deserialize() {
            let record: HashMap<String, String> = result?;

            let x = parse(&record, x_col)?;
            let y = parse(&record, y_col)?;
            let z = match z_col {
                Some(col) => parse(&record, col)?,
                None => 0.0,
            };

            point_vec.push(Point3::new(x, y, z));
            value_vec.push(parse(&record, value_col)?);
        }

        let dimension = if z_col.is_some() {
            Dimension::Three
        } else {
            Dimension::Two
        };
        let tags = vec![0; point_vec.len()];
        Self::with_tags(point_vec, value_vec, tags, dimension)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Same locations with new values, reusing the index.
    pub fn with_values(&self, data: Vec<f64>) -> Result<Self> {
        if data.len() != self.len() {
            return Err(GeostatError::InvalidInput(format!(
                "expected {} values, got {}",
                self.len(),
                data.len()
            )));
        }
        Ok(Self {
            tree: self.tree.clone(),
            points: self.points.clone(),
            data,
            tags: self.tags.clone(),
            dimension: self.dimension,
        })
    }

    /// Samples carrying the given zone tag.
    pub fn filter_tag(&self, tag: u32) -> Result<Self> {
        let (points, (data, tags)): (Vec<_>, (Vec<_>, Vec<_>)) = self
            .points
            .iter()
            .zip(self.data.iter().zip(self.tags.iter()))
            .filter(|(_, (_, t))| **t == tag)
            .map(|(p, (v, t))| (*p, (*v, *t)))
            .unzip();
        Self::with_tags(points, data, tags, self.dimension)
    }

    pub fn mean(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.len() as f64
    }

    /// Population variance of the values.
    pub fn variance(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.len() as f64
    }

    /// Push every sample inside the ellipsoid accepted by `filter` into the collector.
    pub fn collect_into<F>(
        &self,
        point: &Point3<f64>,
        collector: &mut ConditioningDataCollector<'_>,
        filter: F,
    ) where
        F: Fn(usize) -> bool,
    {
        let max_dist = collector.ellipsoid.bounding_radius();
        let max_dist_sq = max_dist * max_dist;

        for (geom, dist_sq) in self
            .tree
            .nearest_neighbor_iter_with_distance_2(&[point.x, point.y, point.z])
        {
            // nothing further than the largest semi-axis can be inside the ellipsoid
            if dist_sq > max_dist_sq {
                break;
            }
            let idx = geom.data;
            if !filter(idx) {
                continue;
            }
            collector.try_insert(self.points[idx], self.data[idx], idx, false);
        }
    }

    /// Conditioning samples for `point`, the ellipsoid is centred on the query.
    pub fn query(
        &self,
        point: &Point3<f64>,
        ellipsoid: &Ellipsoid,
        params: &ConditioningParams,
    ) -> Result<Neighborhood> {
        self.query_filtered(point, ellipsoid, params, |_| true)
    }

    pub fn query_filtered<F>(
        &self,
        point: &Point3<f64>,
        ellipsoid: &Ellipsoid,
        params: &ConditioningParams,
        filter: F,
    ) -> Result<Neighborhood>
    where
        F: Fn(usize) -> bool,
    {
        let mut ellipsoid = ellipsoid.clone();
        ellipsoid.translate_to(point);

        let mut collector = ConditioningDataCollector::new(&ellipsoid, params);
        self.collect_into(point, &mut collector, filter);
        collector.finish(None)
    }
}
