//! Analysis configuration.
//!
//! [`AnalysisConfig`] holds every tunable parameter of the time-frequency
//! ANOVA analysis. All fields have defaults matching the 2 × 2
//! auditory/visual × left/right tutorial design.

use crate::baseline::{BaselineMode, BaselineWindow};
use crate::correction::ClusterTestConfig;
use crate::design::{Effects, FactorLevels};
use crate::error::DesignError;

/// Configuration for [`crate::analyse`] and the `tfprep` binary.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use tfanova::AnalysisConfig;
///
/// let cfg = AnalysisConfig {
///     effects:     "A".into(),   // main effect of the first factor only
///     p_threshold: 0.01,
///     ..AnalysisConfig::default()
/// };
/// assert_eq!(cfg.effects().unwrap().names(), ["A"]);
/// ```
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Number of levels of each factor.
    ///
    /// The product must equal the number of condition arrays.
    ///
    /// Default: `[2, 2]`.
    pub factor_levels: Vec<usize>,

    /// Effects reported in the uncorrected F maps, as an R-style formula
    /// (`"A*B"`, `"A:B"`, `"A+B"`, `"all"`).
    ///
    /// Default: `"A*B"` (both main effects and the interaction).
    pub effects: String,

    /// Effect tested with the cluster permutation test and FDR.
    ///
    /// Default: `"A:B"`.
    pub cluster_effects: String,

    /// P-value used to derive the cluster-forming F threshold.
    ///
    /// Default: `0.001`.
    pub p_threshold: f64,

    /// Significance level for clusters, FDR and the uncorrected p-masks.
    ///
    /// Default: `0.05`.
    pub alpha: f64,

    /// Forwarded to the cluster permutation backend. Its `threshold` is
    /// overwritten with the F threshold derived from `p_threshold`.
    pub cluster: ClusterTestConfig,

    /// Default: [`BaselineMode::Ratio`].
    pub baseline_mode: BaselineMode,

    /// Default: `(None, Some(0.0))`, everything before the event.
    pub baseline: BaselineWindow,

    /// Temporal decimation applied to power before the statistics.
    ///
    /// Default: `2`.
    pub decim: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            factor_levels:   vec![2, 2],
            effects:         "A*B".into(),
            cluster_effects: "A:B".into(),
            p_threshold:     0.001,
            alpha:           0.05,
            cluster:         ClusterTestConfig::default(),
            baseline_mode:   BaselineMode::Ratio,
            baseline:        (None, Some(0.0)),
            decim:           2,
        }
    }
}

impl AnalysisConfig {
    pub fn factor_levels(&self) -> Result<FactorLevels, DesignError> {
        FactorLevels::new(self.factor_levels.clone())
    }

    /// Parsed [`Self::effects`].
    pub fn effects(&self) -> Result<Effects, DesignError> {
        Effects::parse(&self.effects, self.factor_levels.len())
    }

    /// Parsed [`Self::cluster_effects`].
    pub fn cluster_effects(&self) -> Result<Effects, DesignError> {
        Effects::parse(&self.cluster_effects, self.factor_levels.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.factor_levels().unwrap().n_conditions(), 4);
        assert_eq!(cfg.effects().unwrap().names(), ["A", "B", "A:B"]);
        assert_eq!(cfg.cluster_effects().unwrap().names(), ["A:B"]);
        assert_eq!(cfg.cluster.n_permutations, 256);
    }

    #[test]
    fn bad_effect_string_surfaces() {
        let cfg = AnalysisConfig { cluster_effects: "A:C".into(), ..AnalysisConfig::default() };
        assert!(cfg.cluster_effects().is_err());
    }
}
