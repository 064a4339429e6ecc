//! Typed validation errors.
//!
//! Everything else in the crate propagates `anyhow::Error`; these two enums
//! exist so callers can match on the failures they are likely to recover
//! from (a bad effect string typed by a user, an unbalanced design).
use thiserror::Error;

/// Shape problems found while assembling an observation tensor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("no condition arrays were given")]
    NoConditions,

    #[error("condition {index} is a 0-d array; expected [replications, ...]")]
    ScalarCondition { index: usize },

    #[error("condition {index} has {actual} replications, condition 0 has {expected}")]
    ReplicationMismatch { index: usize, expected: usize, actual: usize },

    #[error("condition {index} has observation shape {actual:?}, condition 0 has {expected:?}")]
    ObservationMismatch { index: usize, expected: Vec<usize>, actual: Vec<usize> },

    #[error("{actual} conditions given but factor levels {levels:?} require {expected}")]
    ConditionCount { levels: Vec<usize>, expected: usize, actual: usize },

    #[error("cannot reshape {from:?} into {to:?}")]
    Reshape { from: Vec<usize>, to: Vec<usize> },

    #[error("statistic routine returned shape {actual:?}, expected {expected:?}")]
    RoutineOutput { expected: Vec<usize>, actual: Vec<usize> },
}

/// Problems with a factor-level descriptor or an effect string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DesignError {
    #[error("factor levels must not be empty")]
    NoFactors,

    #[error("factor {index} has 0 levels")]
    ZeroLevels { index: usize },

    #[error("at most 26 factors are supported, got {0}")]
    TooManyFactors(usize),

    #[error("factor levels {0:?} give more conditions than fit in usize")]
    ConditionOverflow(Vec<usize>),

    #[error("effects {0:?} mixes '{1}' with ':'")]
    MixedOperators(String, char),

    #[error("{0:?} is not a valid effects specification")]
    InvalidEffects(String),

    #[error("unknown effect {name:?}; valid effects are {valid:?}")]
    UnknownEffect { name: String, valid: Vec<String> },
}
