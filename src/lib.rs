//! # tfanova: repeated-measures ANOVA plumbing for time-frequency power
//!
//! `tfanova` carries single-trial EEG/MEG time-frequency power from event
//! files and per-condition arrays to F maps corrected for multiple
//! comparisons. The statistics themselves (ANOVA, FDR, cluster permutation
//! test) are supplied by a numerical backend through the traits in
//! [`anova`] and [`correction`]; this crate does everything around them the
//! way [MNE-Python](https://mne.tools) does.
//!
//! ## Pipeline overview
//!
//! ```text
//! sample_audvis-eve.fif
//!   │
//!   ├─ events::read_events()            FIFF or text event list
//!   ├─ epoch::epochs_from_events()      tmin..tmax, baseline, p2p reject
//!   ├─ Epochs::equalize_event_counts()  mintime / truncate
//!   │        ⋮  (time-frequency power, external)
//!   ├─ baseline::decimate()             every decim-th sample
//!   ├─ baseline::rescale_inplace()      ratio / logratio / zscore …
//!   ├─ tensor::stack_conditions()       C × [R, F, T] → [R, C, F·T]
//!   └─ analyse()
//!        ├─ f_mway_rm                   F / p maps per effect
//!        ├─ AnovaStatFun ─▶ cluster test ─▶ cluster-masked F
//!        └─ fdr_correction              FDR-masked F
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use tfanova::{AnovaStatFun, Effects, FactorLevels, StatFun};
//! # use tfanova::anova::{FTest, RepeatedMeasuresAnova};
//! # struct Backend;
//! # impl RepeatedMeasuresAnova for Backend {
//! #     fn f_mway_rm(&self, _: ndarray::ArrayView3<'_, f64>, _: &FactorLevels, _: &Effects, _: bool)
//! #         -> anyhow::Result<FTest> { unimplemented!() }
//! #     fn f_threshold_mway_rm(&self, _: usize, _: &FactorLevels, _: &Effects, _: f64)
//! #         -> anyhow::Result<Vec<f64>> { unimplemented!() }
//! # }
//! use ndarray::Array3;
//!
//! let levels  = FactorLevels::new(vec![2, 2]).unwrap();
//! let effects = Effects::parse("A:B", levels.n_factors()).unwrap();
//! let stat    = AnovaStatFun::new(Backend, levels, effects);
//!
//! // four conditions, 10 subjects × 8 freqs × 50 times each
//! let conds: Vec<_> = (0..4).map(|_| Array3::<f64>::zeros((10, 8, 50)).into_dyn()).collect();
//! let views: Vec<_> = conds.iter().map(|c| c.view()).collect();
//! let f = stat.evaluate(&views).unwrap();
//! assert_eq!(f.shape(), &[8, 50]);
//! ```

pub mod anova;
pub mod baseline;
pub mod config;
pub mod correction;
pub mod design;
pub mod epoch;
pub mod error;
pub mod events;
pub mod fiff;
pub mod io;
pub mod stat_fun;
pub mod tensor;

use anyhow::{bail, Context, Result};
use ndarray::{ArrayD, ArrayViewD, Axis};
use tracing::{debug, info};

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use anova::{FTest, RepeatedMeasuresAnova};
pub use baseline::{decimate, decimate_times, rescale_inplace, BaselineMode, BaselineWindow};
pub use config::AnalysisConfig;
pub use correction::{
    mask_by_pvalues, mask_where_not, ClusterPermutationTest, ClusterResult, ClusterTestConfig,
    FdrCorrection, Tail,
};
pub use design::{effect_names, Effects, FactorLevels};
pub use epoch::{epochs_from_events, ChannelKind, DropReason, EpochConfig, Epochs};
pub use error::{DesignError, ShapeError};
pub use events::{
    balance_indices, parse_events_text, pick_events, read_events, EqualizeMethod, Event, EventId,
};
pub use io::{load_conditions, TensorFile, TensorWriter};
pub use stat_fun::{AnovaStatFun, StatFun};
pub use tensor::{stack_conditions, ObservationTensor};

/// F and p maps of one effect, in observation shape.
#[derive(Debug, Clone)]
pub struct EffectMap {
    pub name:     String,
    pub f_values: ArrayD<f64>,
    pub p_values: ArrayD<f64>,
    /// `f_values` with entries where `p >= alpha` set to NaN.
    pub f_masked: ArrayD<f64>,
}

/// Everything [`analyse`] computes.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Uncorrected maps, one per effect of [`AnalysisConfig::effects`].
    pub effects: Vec<EffectMap>,
    /// Name of the effect tested with the cluster test and FDR.
    pub cluster_effect: String,
    /// Cluster-forming F threshold.
    pub f_threshold: f64,
    pub cluster: ClusterResult,
    /// Observed F with entries outside significant clusters set to NaN.
    pub cluster_masked: ArrayD<f64>,
    pub fdr_reject: ArrayD<bool>,
    pub fdr_p_values: ArrayD<f64>,
    /// Observed F with entries not surviving FDR set to NaN.
    pub fdr_masked: ArrayD<f64>,
}

impl AnalysisReport {
    pub fn effect(&self, name: &str) -> Option<&EffectMap> {
        self.effects.iter().find(|e| e.name == name)
    }
}

/// Run the **time-frequency repeated-measures ANOVA analysis**.
///
/// `conditions[c]` is the power of condition `c`, shaped
/// `[subjects, *observation_shape]` (typically `[R, n_freqs, n_times]`),
/// with conditions ordered as described on [`FactorLevels`].
///
/// # Steps
///
/// 1. Stack the conditions into an `[R, C, S]` tensor.
/// 2. `f_mway_rm` for [`AnalysisConfig::effects`] with p-values; each F map
///    is also masked at `p < alpha`.
/// 3. Derive the F threshold for [`AnalysisConfig::cluster_effects`] at
///    [`AnalysisConfig::p_threshold`] and run the cluster permutation test
///    with an [`AnovaStatFun`]; F is masked by the clusters with
///    `p < alpha`.
/// 4. FDR-correct the p-values of the cluster effect and mask F by the
///    rejections.
///
/// # Errors
///
/// Invalid factor levels or effect strings, unbalanced or mismatched
/// conditions, more than one cluster effect, and any backend error.
pub fn analyse<A, C, F>(
    conditions: &[ArrayViewD<'_, f64>],
    config: &AnalysisConfig,
    anova: &A,
    cluster_test: &C,
    fdr: &F,
) -> Result<AnalysisReport>
where
    A: RepeatedMeasuresAnova + ?Sized,
    C: ClusterPermutationTest + ?Sized,
    F: FdrCorrection + ?Sized,
{
    let levels = config.factor_levels()?;
    let effects = config.effects()?;
    let cluster_effects = config.cluster_effects()?;
    if cluster_effects.len() != 1 {
        bail!(
            "cluster test needs a single effect, {:?} selects {}",
            config.cluster_effects,
            cluster_effects.len()
        );
    }

    // ── 1. Stack ──────────────────────────────────────────────────────────
    let tensor = stack_conditions(conditions)?;
    if tensor.n_conditions() != levels.n_conditions() {
        return Err(ShapeError::ConditionCount {
            levels:   levels.as_slice().to_vec(),
            expected: levels.n_conditions(),
            actual:   tensor.n_conditions(),
        }
        .into());
    }
    let n_subjects = tensor.n_replications();
    info!(
        n_subjects,
        n_conditions = tensor.n_conditions(),
        observation_shape = ?tensor.observation_shape(),
        "stacked observation tensor"
    );

    // ── 2. Uncorrected F maps ─────────────────────────────────────────────
    let maps = effect_maps(&tensor, anova, &levels, &effects, config.alpha)
        .context("computing uncorrected F maps")?;
    for m in &maps {
        let n_sig = m.f_masked.iter().filter(|v| !v.is_nan()).count();
        debug!(effect = %m.name, n_sig, alpha = config.alpha, "uncorrected F map");
    }

    // ── 3. Cluster permutation test ───────────────────────────────────────
    let thresholds = anova
        .f_threshold_mway_rm(n_subjects, &levels, &cluster_effects, config.p_threshold)
        .context("computing F threshold")?;
    let Some(&f_threshold) = thresholds.first() else {
        bail!("F threshold routine returned no value");
    };
    info!(effect = %cluster_effects, f_threshold, p = config.p_threshold, "cluster-forming threshold");

    let stat_fun = AnovaStatFun::new(anova, levels.clone(), cluster_effects.clone());
    let cluster_cfg = ClusterTestConfig { threshold: Some(f_threshold), ..config.cluster.clone() };
    let cluster = cluster_test
        .permutation_cluster_test(conditions, &stat_fun, &cluster_cfg)
        .context("running cluster permutation test")?;
    let cluster_mask = cluster.significant_mask(config.alpha)?;
    let cluster_masked = mask_where_not(cluster.stat_obs.view(), cluster_mask.view())?;
    info!(
        n_clusters = cluster.clusters.len(),
        n_good = cluster.good_clusters(config.alpha).len(),
        n_permutations = cluster_cfg.n_permutations,
        "cluster permutation test"
    );

    // ── 4. FDR ────────────────────────────────────────────────────────────
    let Some(target) = effect_maps(&tensor, anova, &levels, &cluster_effects, config.alpha)?
        .into_iter()
        .next()
    else {
        bail!("no F map for cluster effect {cluster_effects}");
    };
    let (fdr_reject, fdr_p_values) = fdr
        .fdr_correction(target.p_values.view(), config.alpha)
        .context("running FDR correction")?;
    let fdr_masked = mask_where_not(target.f_values.view(), fdr_reject.view())?;
    info!(
        n_reject = fdr_reject.iter().filter(|&&r| r).count(),
        alpha = config.alpha,
        "FDR correction"
    );

    Ok(AnalysisReport {
        effects: maps,
        cluster_effect: target.name,
        f_threshold,
        cluster,
        cluster_masked,
        fdr_reject,
        fdr_p_values,
        fdr_masked,
    })
}

/// `f_mway_rm` with p-values, split per effect and reshaped to the
/// observation shape.
fn effect_maps<A: RepeatedMeasuresAnova + ?Sized>(
    tensor: &ObservationTensor,
    anova: &A,
    levels: &FactorLevels,
    effects: &Effects,
    alpha: f64,
) -> Result<Vec<EffectMap>> {
    let ftest = anova.f_mway_rm(tensor.view(), levels, effects, true)?;
    let want = [effects.len(), tensor.n_observations()];
    let Some(p_values) = ftest.p_values else {
        bail!("ANOVA backend returned no p-values");
    };
    for (what, arr) in [("F", &ftest.f_values), ("p", &p_values)] {
        if arr.shape() != want {
            return Err(anyhow::Error::from(ShapeError::RoutineOutput {
                expected: want.to_vec(),
                actual:   arr.shape().to_vec(),
            })
            .context(format!("{what} values")));
        }
    }

    effects
        .names()
        .iter()
        .enumerate()
        .map(|(i, name)| -> Result<EffectMap> {
            let f = tensor.unflatten(ftest.f_values.index_axis(Axis(0), i).to_owned())?;
            let p = tensor.unflatten(p_values.index_axis(Axis(0), i).to_owned())?;
            let f_masked = mask_by_pvalues(f.view(), p.view(), alpha)?;
            Ok(EffectMap { name: name.clone(), f_values: f, p_values: p, f_masked })
        })
        .collect()
}

/// Make per-condition power ready for [`stack_conditions`]: truncate every
/// condition to the smallest replication count, decimate along the last
/// (time) axis, then rescale against the baseline.
///
/// The baseline statistics are taken over the decimated samples, the way
/// power decimated at transform time is rescaled. Returns the prepared
/// arrays and the decimated time axis.
pub fn prepare_conditions(
    conditions: Vec<ArrayD<f64>>,
    times: &[f64],
    config: &AnalysisConfig,
) -> Result<(Vec<ArrayD<f64>>, Vec<f64>)> {
    let counts: Vec<Vec<i64>> = conditions
        .iter()
        .map(|c| (0..c.shape().first().copied().unwrap_or(0) as i64).collect())
        .collect();
    let keep = balance_indices(&counts, EqualizeMethod::Truncate);

    let dec_times = decimate_times(times, config.decim);
    let mut out = Vec::with_capacity(conditions.len());
    for (i, (cond, idx)) in conditions.into_iter().zip(&keep).enumerate() {
        if cond.ndim() < 2 {
            bail!("condition {i} has shape {:?}; expected [replications, ..., times]", cond.shape());
        }
        let c = if idx.len() < cond.len_of(Axis(0)) {
            debug!(condition = i, from = cond.len_of(Axis(0)), to = idx.len(), "truncated replications");
            cond.select(Axis(0), idx)
        } else {
            cond
        };
        let mut c = decimate(&c, config.decim)?;
        rescale_inplace(&mut c, &dec_times, config.baseline, config.baseline_mode)
            .with_context(|| format!("baseline rescaling of condition {i}"))?;
        out.push(c);
    }
    Ok((out, dec_times))
}
