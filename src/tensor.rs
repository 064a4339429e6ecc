//! Observation tensor: `[replications, conditions, observations]`.
//!
//! Condition arrays arrive one per condition, each shaped
//! `[replications, *observation_shape]` (e.g. trials × freqs × times). They
//! are stacked on a new leading axis and the first two axes are swapped, the
//! equivalent of `np.swapaxes(np.asarray(conditions), 1, 0)`:
//!
//! ```text
//! C × [R, F, T]  ──stack──▶  [C, R, F·T]  ──swap(0,1)──▶  [R, C, F·T]
//! ```
//!
//! The observation axes are flattened row-major; the original shape is kept
//! so statistics can be reshaped back into freq × time images.
use ndarray::{stack, Array1, Array3, ArrayD, ArrayView2, ArrayView3, ArrayViewD, Axis, IxDyn, s};

use crate::error::ShapeError;

/// Dense `R × C × S` tensor of balanced repeated-measures observations.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationTensor {
    data:              Array3<f64>,
    observation_shape: Vec<usize>,
}

impl ObservationTensor {
    /// Wrap an existing `R × C × S` array whose observations are flat.
    pub fn from_array(data: Array3<f64>) -> Self {
        let observation_shape = vec![data.dim().2];
        Self { data, observation_shape }
    }

    pub fn n_replications(&self) -> usize {
        self.data.dim().0
    }

    pub fn n_conditions(&self) -> usize {
        self.data.dim().1
    }

    /// Number of flattened observations `S`.
    pub fn n_observations(&self) -> usize {
        self.data.dim().2
    }

    /// Shape of one replication of one condition, e.g. `[n_freqs, n_times]`.
    pub fn observation_shape(&self) -> &[usize] {
        &self.observation_shape
    }

    pub fn view(&self) -> ArrayView3<'_, f64> {
        self.data.view()
    }

    pub fn into_inner(self) -> Array3<f64> {
        self.data
    }

    /// `[R, S]` slice of one condition.
    pub fn condition(&self, c: usize) -> ArrayView2<'_, f64> {
        self.data.slice(s![.., c, ..])
    }

    /// Full tensor with the observation axes restored:
    /// `[R, C, *observation_shape]`.
    pub fn to_full_shape(&self) -> Result<ArrayD<f64>, ShapeError> {
        let mut shape = vec![self.n_replications(), self.n_conditions()];
        shape.extend_from_slice(&self.observation_shape);
        reshape(self.data.iter().copied().collect(), self.data.shape(), &shape)
    }

    /// Reshape a length-`S` statistic into the observation shape.
    pub fn unflatten(&self, stat: Array1<f64>) -> Result<ArrayD<f64>, ShapeError> {
        if stat.len() != self.n_observations() {
            return Err(ShapeError::RoutineOutput {
                expected: vec![self.n_observations()],
                actual:   vec![stat.len()],
            });
        }
        reshape(stat.to_vec(), &[stat.len()], &self.observation_shape)
    }
}

fn reshape(values: Vec<f64>, from: &[usize], to: &[usize]) -> Result<ArrayD<f64>, ShapeError> {
    ArrayD::from_shape_vec(IxDyn(to), values).map_err(|_| ShapeError::Reshape {
        from: from.to_vec(),
        to:   to.to_vec(),
    })
}

/// Stack per-condition arrays into an [`ObservationTensor`].
///
/// Every condition must have the same number of replications and the same
/// observation shape. A 1-d condition (`[R]`) is treated as one observation
/// per replication.
pub fn stack_conditions(conditions: &[ArrayViewD<'_, f64>]) -> Result<ObservationTensor, ShapeError> {
    let first = conditions.first().ok_or(ShapeError::NoConditions)?;
    if first.ndim() == 0 {
        return Err(ShapeError::ScalarCondition { index: 0 });
    }
    let n_rep = first.shape()[0];
    let observation_shape: Vec<usize> = first.shape()[1..].to_vec();

    for (index, cond) in conditions.iter().enumerate().skip(1) {
        if cond.ndim() == 0 {
            return Err(ShapeError::ScalarCondition { index });
        }
        if cond.shape()[0] != n_rep {
            return Err(ShapeError::ReplicationMismatch {
                index,
                expected: n_rep,
                actual:   cond.shape()[0],
            });
        }
        if cond.shape()[1..] != observation_shape[..] {
            return Err(ShapeError::ObservationMismatch {
                index,
                expected: observation_shape.clone(),
                actual:   cond.shape()[1..].to_vec(),
            });
        }
    }

    let n_obs: usize = observation_shape.iter().product();
    let flat = conditions
        .iter()
        .map(|cond| {
            cond.to_shape((n_rep, n_obs)).map_err(|_| ShapeError::Reshape {
                from: cond.shape().to_vec(),
                to:   vec![n_rep, n_obs],
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let views: Vec<ArrayView2<'_, f64>> = flat.iter().map(|f| f.view()).collect();
    // [R, S] per condition stacked on axis 1 is the swapped [R, C, S] layout.
    let data: Array3<f64> = stack(Axis(1), &views).map_err(|_| ShapeError::Reshape {
        from: vec![conditions.len(), n_rep, n_obs],
        to:   vec![n_rep, conditions.len(), n_obs],
    })?;

    let observation_shape = if observation_shape.is_empty() { vec![1] } else { observation_shape };
    Ok(ObservationTensor { data, observation_shape })
}
