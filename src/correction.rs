//! Multiple-comparison correction.
//!
//! Two strategies are supported, both supplied by a numerical backend:
//!
//! * [`ClusterPermutationTest`]: cluster-level inference driven by a
//!   [`StatFun`], like `mne.stats.permutation_cluster_test`.
//! * [`FdrCorrection`]: Benjamini-Hochberg style correction of p-values,
//!   like `mne.stats.fdr_correction`.
//!
//! The masking helpers turn their outputs into "significant only" images:
//! entries that did not survive correction become `NaN`.
use anyhow::{bail, Result};
use ndarray::{ArrayD, ArrayViewD, Zip};

use crate::stat_fun::StatFun;

/// Which side(s) of the null distribution count as extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tail {
    /// `tail = -1`
    Lower,
    /// `tail = 0`
    Both,
    /// `tail = 1`, the only sensible choice for F statistics.
    #[default]
    Upper,
}

impl Tail {
    /// MNE integer encoding.
    pub fn as_i8(self) -> i8 {
        match self {
            Tail::Lower => -1,
            Tail::Both => 0,
            Tail::Upper => 1,
        }
    }

    pub fn from_i8(v: i8) -> Result<Self> {
        Ok(match v {
            -1 => Tail::Lower,
            0 => Tail::Both,
            1 => Tail::Upper,
            _ => bail!("tail must be -1, 0 or 1, got {v}"),
        })
    }
}

/// Parameters forwarded to a [`ClusterPermutationTest`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTestConfig {
    /// Cluster-forming threshold on the statistic.
    ///
    /// `None` lets the backend pick its default (usually the statistic at
    /// p = 0.05).
    pub threshold: Option<f64>,

    /// Default: [`Tail::Upper`].
    pub tail: Tail,

    /// Number of permutations. Default: `256`.
    pub n_permutations: usize,

    /// Concurrency hint for the backend; `None` means no parallelism.
    pub n_jobs: Option<usize>,

    /// Block size for chunked statistic evaluation; `None` disables chunking.
    pub buffer_size: Option<usize>,

    /// RNG seed for the permutations; `None` for a fresh seed.
    pub seed: Option<u64>,
}

impl Default for ClusterTestConfig {
    fn default() -> Self {
        Self {
            threshold:      None,
            tail:           Tail::Upper,
            n_permutations: 256,
            n_jobs:         None,
            buffer_size:    None,
            seed:           None,
        }
    }
}

/// Output of a cluster permutation test with mask-type clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult {
    /// Observed statistic, observation shape.
    pub stat_obs: ArrayD<f64>,
    /// One boolean mask per cluster, observation shape.
    pub clusters: Vec<ArrayD<bool>>,
    /// One p-value per cluster.
    pub cluster_p_values: Vec<f64>,
    /// Max cluster statistic of each permutation.
    pub h0: Vec<f64>,
}

impl ClusterResult {
    /// Indices of clusters with `p < alpha`.
    pub fn good_clusters(&self, alpha: f64) -> Vec<usize> {
        self.cluster_p_values
            .iter()
            .enumerate()
            .filter(|(_, p)| **p < alpha)
            .map(|(i, _)| i)
            .collect()
    }

    /// Union of all clusters with `p < alpha`; all-false when there are none.
    pub fn significant_mask(&self, alpha: f64) -> Result<ArrayD<bool>> {
        let mut mask = ArrayD::from_elem(self.stat_obs.raw_dim(), false);
        for i in self.good_clusters(alpha) {
            let Some(cluster) = self.clusters.get(i) else {
                bail!("p-value {i} has no matching cluster ({} clusters)", self.clusters.len());
            };
            if cluster.shape() != mask.shape() {
                bail!("cluster {i} has shape {:?}, statistic has {:?}", cluster.shape(), mask.shape());
            }
            Zip::from(&mut mask).and(cluster).for_each(|m, &c| *m |= c);
        }
        Ok(mask)
    }
}

/// A cluster-level permutation test backend.
pub trait ClusterPermutationTest {
    /// `conditions[c]` is `[replications, *observation_shape]`.
    fn permutation_cluster_test(
        &self,
        conditions: &[ArrayViewD<'_, f64>],
        stat_fun: &dyn StatFun,
        config: &ClusterTestConfig,
    ) -> Result<ClusterResult>;
}

/// A false-discovery-rate correction backend.
pub trait FdrCorrection {
    /// Returns `(reject, corrected_p)`, both shaped like `p_values`.
    fn fdr_correction(
        &self,
        p_values: ArrayViewD<'_, f64>,
        alpha: f64,
    ) -> Result<(ArrayD<bool>, ArrayD<f64>)>;
}

/// Copy of `stat` with every entry where `keep` is false set to NaN.
pub fn mask_where_not(stat: ArrayViewD<'_, f64>, keep: ArrayViewD<'_, bool>) -> Result<ArrayD<f64>> {
    if stat.shape() != keep.shape() {
        bail!("mask shape {:?} does not match statistic shape {:?}", keep.shape(), stat.shape());
    }
    Ok(Zip::from(&stat)
        .and(&keep)
        .map_collect(|&s, &k| if k { s } else { f64::NAN }))
}

/// Copy of `stat` with every entry where `p >= alpha` set to NaN.
pub fn mask_by_pvalues(
    stat: ArrayViewD<'_, f64>,
    p_values: ArrayViewD<'_, f64>,
    alpha: f64,
) -> Result<ArrayD<f64>> {
    let keep = p_values.mapv(|p| p < alpha);
    mask_where_not(stat, keep.view())
}
