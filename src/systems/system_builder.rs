use nalgebra::{DMatrix, DVector, Point3, Vector3};

use crate::geometry::support::Support;
use crate::variography::model_variograms::VariogramModel;

/// Scratch space reused across kriging systems to avoid allocating in the hot loop.
#[derive(Debug, Default, Clone)]
pub struct SystemBuffers {
    pub h_buffer: Vec<Vector3<f64>>,
    pub pt_buffer: Vec<Point3<f64>>,
    pub var_buffer: Vec<f64>,
    pub ind_buffer: Vec<usize>,
}

impl SystemBuffers {
    fn clear(&mut self) {
        self.h_buffer.clear();
        self.pt_buffer.clear();
        self.var_buffer.clear();
        self.ind_buffer.clear();
        self.ind_buffer.push(0);
    }

    /// Mean covariance of each group of separation vectors delimited by `ind_buffer`.
    fn averaged_covariances<V: VariogramModel>(&mut self, vgram: &V) -> impl Iterator<Item = f64> + '_ {
        self.var_buffer
            .extend(self.h_buffer.iter().map(|h| vgram.covariogram(*h)));
        let vars = &self.var_buffer;
        self.ind_buffer.windows(2).map(move |w| {
            let group = &vars[w[0]..w[1]];
            group.iter().sum::<f64>() / group.len() as f64
        })
    }
}

/// Support averaged covariances between conditioning data and targets.
pub struct CovarianceBuilder;

impl CovarianceBuilder {
    /// Fill the leading `cond.len()` square block of `cov_mat` with the symmetric covariance matrix.
    pub fn build_cov_mat<V: VariogramModel>(
        cov_mat: &mut DMatrix<f64>,
        cond: &[Support],
        vgram: &V,
        buffers: &mut SystemBuffers,
    ) {
        buffers.clear();

        // 1. separation vectors for lower triangular pairs
        for (i, p1) in cond.iter().enumerate() {
            for p2 in cond.iter().take(i + 1) {
                p1.dists_to_other(p2, &mut buffers.h_buffer, &mut buffers.pt_buffer);
                buffers.ind_buffer.push(buffers.h_buffer.len());
            }
        }

        // 2. populate both triangles
        let mut covs = buffers.averaged_covariances(vgram);
        for i in 0..cond.len() {
            for j in 0..i + 1 {
                let cov = covs.next().unwrap_or(0.0);
                cov_mat[(i, j)] = cov;
                cov_mat[(j, i)] = cov;
            }
        }
    }

    /// Fill the first `cond.len()` entries of `cov_vec` with data to target covariances.
    pub fn build_cov_vec<V: VariogramModel>(
        cov_vec: &mut DVector<f64>,
        cond: &[Support],
        target: &Support,
        vgram: &V,
        buffers: &mut SystemBuffers,
    ) {
        buffers.clear();

        for p1 in cond.iter() {
            target.dists_to_other(p1, &mut buffers.h_buffer, &mut buffers.pt_buffer);
            buffers.ind_buffer.push(buffers.h_buffer.len());
        }

        for (i, cov) in buffers.averaged_covariances(vgram).enumerate() {
            cov_vec[i] = cov;
        }
    }

    /// Mean covariance within the target, C(0) for a point.
    pub fn target_cov<V: VariogramModel>(
        target: &Support,
        vgram: &V,
        buffers: &mut SystemBuffers,
    ) -> f64 {
        buffers.clear();
        target.dists_to_other(target, &mut buffers.h_buffer, &mut buffers.pt_buffer);
        buffers.ind_buffer.push(buffers.h_buffer.len());
        buffers.averaged_covariances(vgram).next().unwrap_or(0.0)
    }
}
