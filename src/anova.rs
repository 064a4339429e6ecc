//! Repeated-measures ANOVA routine interface.
//!
//! The F statistics themselves are computed by a numerical backend. This
//! module fixes the calling convention that backend must honour, mirroring
//! `mne.stats.f_mway_rm` and `mne.stats.f_threshold_mway_rm`.
use anyhow::Result;
use ndarray::{Array2, ArrayView3};

use crate::design::{Effects, FactorLevels};

/// Output of a mass-univariate M-way repeated-measures ANOVA.
///
/// Rows follow the order of [`Effects::indices`]; columns are the flattened
/// observations of the input tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct FTest {
    /// `[n_effects, S]`
    pub f_values: Array2<f64>,
    /// `[n_effects, S]`, `None` when p-values were not requested.
    pub p_values: Option<Array2<f64>>,
}

impl FTest {
    pub fn n_effects(&self) -> usize {
        self.f_values.nrows()
    }
}

/// An M-way repeated-measures ANOVA backend.
pub trait RepeatedMeasuresAnova {
    /// Compute F statistics for `data` shaped `[subjects, conditions, S]`.
    ///
    /// Implementations must reject a conditions axis that does not equal
    /// `factor_levels.n_conditions()`.
    fn f_mway_rm(
        &self,
        data: ArrayView3<'_, f64>,
        factor_levels: &FactorLevels,
        effects: &Effects,
        return_pvals: bool,
    ) -> Result<FTest>;

    /// F value matching `pvalue` for each selected effect, given the number
    /// of subjects (replications).
    fn f_threshold_mway_rm(
        &self,
        n_subjects: usize,
        factor_levels: &FactorLevels,
        effects: &Effects,
        pvalue: f64,
    ) -> Result<Vec<f64>>;
}

impl<T: RepeatedMeasuresAnova + ?Sized> RepeatedMeasuresAnova for &T {
    fn f_mway_rm(
        &self,
        data: ArrayView3<'_, f64>,
        factor_levels: &FactorLevels,
        effects: &Effects,
        return_pvals: bool,
    ) -> Result<FTest> {
        (**self).f_mway_rm(data, factor_levels, effects, return_pvals)
    }

    fn f_threshold_mway_rm(
        &self,
        n_subjects: usize,
        factor_levels: &FactorLevels,
        effects: &Effects,
        pvalue: f64,
    ) -> Result<Vec<f64>> {
        (**self).f_threshold_mway_rm(n_subjects, factor_levels, effects, pvalue)
    }
}
