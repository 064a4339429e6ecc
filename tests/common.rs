/// Shared test doubles and fixtures.
use std::cell::RefCell;
use anyhow::{bail, Result};
use ndarray::{Array2, Array4, ArrayD, ArrayView3, ArrayViewD, Zip};
use tfanova::{
    ClusterPermutationTest, ClusterResult, ClusterTestConfig, Effects, FTest, FactorLevels,
    FdrCorrection, RepeatedMeasuresAnova, StatFun,
};

/// Level index of every factor for condition `c` (last factor fastest).
fn condition_levels(c: usize, levels: &[usize]) -> Vec<usize> {
    let mut rest = c;
    let mut out = vec![0; levels.len()];
    for (f, &l) in levels.iter().enumerate().rev() {
        out[f] = rest % l;
        rest /= l;
    }
    out
}

/// Exact repeated-measures F for designs whose factors all have two levels:
/// the squared paired t of the effect contrast. p is `1 / (1 + F)`.
pub struct ContrastAnova {
    pub threshold: f64,
}

impl RepeatedMeasuresAnova for ContrastAnova {
    fn f_mway_rm(
        &self,
        data: ArrayView3<'_, f64>,
        factor_levels: &FactorLevels,
        effects: &Effects,
        return_pvals: bool,
    ) -> Result<FTest> {
        let (n_rep, n_cond, n_obs) = data.dim();
        if n_cond != factor_levels.n_conditions() {
            bail!("{n_cond} conditions for levels {factor_levels}");
        }
        if factor_levels.as_slice().iter().any(|&l| l != 2) {
            bail!("contrast backend only handles two-level factors");
        }
        let mut f = Array2::<f64>::zeros((effects.len(), n_obs));
        for e in 0..effects.len() {
            let members = effects.factors(e);
            let signs: Vec<f64> = (0..n_cond)
                .map(|c| {
                    let lv = condition_levels(c, factor_levels.as_slice());
                    members.iter().map(|&m| if lv[m] == 0 { 1.0 } else { -1.0 }).product::<f64>()
                })
                .collect();
            for o in 0..n_obs {
                let d: Vec<f64> = (0..n_rep)
                    .map(|r| (0..n_cond).map(|c| signs[c] * data[[r, c, o]]).sum())
                    .collect();
                let n = n_rep as f64;
                let mean = d.iter().sum::<f64>() / n;
                let var = d.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                f[[e, o]] = n * mean * mean / (var + 1e-12);
            }
        }
        let p_values = return_pvals.then(|| f.mapv(|v| 1.0 / (1.0 + v)));
        Ok(FTest { f_values: f, p_values })
    }

    fn f_threshold_mway_rm(
        &self,
        _n_subjects: usize,
        _factor_levels: &FactorLevels,
        effects: &Effects,
        _pvalue: f64,
    ) -> Result<Vec<f64>> {
        Ok(vec![self.threshold; effects.len()])
    }
}

/// One cluster made of every supra-threshold entry, p = 0.01.
#[derive(Default)]
pub struct ThresholdClusters {
    pub seen: RefCell<Option<ClusterTestConfig>>,
}

impl ClusterPermutationTest for ThresholdClusters {
    fn permutation_cluster_test(
        &self,
        conditions: &[ArrayViewD<'_, f64>],
        stat_fun: &dyn StatFun,
        config: &ClusterTestConfig,
    ) -> Result<ClusterResult> {
        *self.seen.borrow_mut() = Some(config.clone());
        let stat_obs = stat_fun.evaluate(conditions)?;
        let thr = config.threshold.unwrap_or(0.0);
        let mask = stat_obs.mapv(|v| v > thr);
        let (clusters, cluster_p_values) = if mask.iter().any(|&m| m) {
            (vec![mask], vec![0.01])
        } else {
            (Vec::new(), Vec::new())
        };
        Ok(ClusterResult { stat_obs, clusters, cluster_p_values, h0: Vec::new() })
    }
}

/// Rejects `p < alpha`; corrected p is Bonferroni capped at 1.
pub struct BonferroniFdr;

impl FdrCorrection for BonferroniFdr {
    fn fdr_correction(&self, p_values: ArrayViewD<'_, f64>, alpha: f64) -> Result<(ArrayD<bool>, ArrayD<f64>)> {
        let n = p_values.len() as f64;
        let corrected = p_values.mapv(|p| (p * n).min(1.0));
        let mut reject = ArrayD::from_elem(p_values.raw_dim(), false);
        Zip::from(&mut reject).and(&p_values).for_each(|r, &p| *r = p < alpha);
        Ok((reject, corrected))
    }
}

#[allow(unused)]
/// 2 × 2 design, `n_rep` subjects, observation shape `[2, 3]`.
///
/// Each subject has an offset that cancels in every contrast; conditions 0
/// and 3 get `5 + r / 2` extra at `[1, 2]`, a pure A:B interaction.
pub fn planted_interaction(n_rep: usize) -> Vec<ArrayD<f64>> {
    let x = Array4::from_shape_fn((4, n_rep, 2, 3), |(c, r, f, t)| {
        let planted = if f == 1 && t == 2 && (c == 0 || c == 3) { 5.0 + 0.5 * r as f64 } else { 0.0 };
        r as f64 + planted
    });
    x.outer_iter().map(|c| c.to_owned().into_dyn()).collect()
}
