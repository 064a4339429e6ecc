//! Statistic functions for permutation frameworks.
//!
//! A cluster permutation test calls its statistic once for the observed
//! labelling and once per permutation, passing one array per condition:
//!
//! ```text
//! stat_fun(&[cond_0, cond_1, …, cond_{C-1}])   each [R, *obs]
//!     └─▶ [*obs]  one statistic per observation
//! ```
//!
//! [`AnovaStatFun`] adapts a [`RepeatedMeasuresAnova`] backend, which wants a
//! single `[R, C, S]` tensor, to that convention.
use anyhow::Result;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use tracing::trace;

use crate::anova::RepeatedMeasuresAnova;
use crate::design::{Effects, FactorLevels};
use crate::error::ShapeError;
use crate::tensor::stack_conditions;

/// A statistic over a variable number of per-condition arrays.
pub trait StatFun {
    fn evaluate(&self, conditions: &[ArrayViewD<'_, f64>]) -> Result<ArrayD<f64>>;
}

impl<F> StatFun for F
where
    F: Fn(&[ArrayViewD<'_, f64>]) -> Result<ArrayD<f64>>,
{
    fn evaluate(&self, conditions: &[ArrayViewD<'_, f64>]) -> Result<ArrayD<f64>> {
        self(conditions)
    }
}

/// F statistic of a fixed effect selection, as a [`StatFun`].
///
/// Inputs are validated before the backend is called: at least one
/// condition, equal replication counts, equal observation shapes, and a
/// condition count equal to the product of the factor levels.
///
/// The output has the observation shape of the inputs when a single effect
/// is selected, and `[n_effects, *observation_shape]` otherwise.
pub struct AnovaStatFun<A> {
    anova:         A,
    factor_levels: FactorLevels,
    effects:       Effects,
}

impl<A: RepeatedMeasuresAnova> AnovaStatFun<A> {
    pub fn new(anova: A, factor_levels: FactorLevels, effects: Effects) -> Self {
        Self { anova, factor_levels, effects }
    }

    pub fn factor_levels(&self) -> &FactorLevels {
        &self.factor_levels
    }

    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    /// Stack, validate, delegate.
    pub fn compute(&self, conditions: &[ArrayViewD<'_, f64>]) -> Result<ArrayD<f64>> {
        let tensor = stack_conditions(conditions)?;
        let expected = self.factor_levels.n_conditions();
        if tensor.n_conditions() != expected {
            return Err(ShapeError::ConditionCount {
                levels: self.factor_levels.as_slice().to_vec(),
                expected,
                actual: tensor.n_conditions(),
            }
            .into());
        }
        trace!(
            n_rep = tensor.n_replications(),
            n_cond = tensor.n_conditions(),
            n_obs = tensor.n_observations(),
            effects = self.effects.spec(),
            "stat_fun"
        );

        let ftest = self
            .anova
            .f_mway_rm(tensor.view(), &self.factor_levels, &self.effects, false)?;

        let want = [self.effects.len(), tensor.n_observations()];
        if ftest.f_values.shape() != want {
            return Err(ShapeError::RoutineOutput {
                expected: want.to_vec(),
                actual:   ftest.f_values.shape().to_vec(),
            }
            .into());
        }

        if self.effects.len() == 1 {
            let row = ftest.f_values.index_axis(Axis(0), 0).to_owned();
            return Ok(tensor.unflatten(row)?);
        }

        let mut shape = vec![self.effects.len()];
        shape.extend_from_slice(tensor.observation_shape());
        let values: Vec<f64> = ftest.f_values.iter().copied().collect();
        ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|_| {
            anyhow::Error::from(ShapeError::Reshape { from: want.to_vec(), to: shape.clone() })
        })
    }
}

impl<A: RepeatedMeasuresAnova> StatFun for AnovaStatFun<A> {
    fn evaluate(&self, conditions: &[ArrayViewD<'_, f64>]) -> Result<ArrayD<f64>> {
        self.compute(conditions)
    }
}
