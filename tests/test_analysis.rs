mod common;
use common::{planted_interaction, BonferroniFdr, ContrastAnova, ThresholdClusters};
use tfanova::{analyse, AnalysisConfig, ShapeError};

#[test]
fn planted_interaction_survives_both_corrections() {
    let conds = planted_interaction(6);
    let views: Vec<_> = conds.iter().map(|c| c.view()).collect();
    let cluster = ThresholdClusters::default();
    let report = analyse(
        &views,
        &AnalysisConfig::default(),
        &ContrastAnova { threshold: 3.0 },
        &cluster,
        &BonferroniFdr,
    )
    .unwrap();

    let names: Vec<_> = report.effects.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "A:B"]);
    assert_eq!(report.cluster_effect, "A:B");
    approx::assert_abs_diff_eq!(report.f_threshold, 3.0);

    let a = report.effect("A").unwrap();
    assert!(a.f_values.iter().all(|&f| f.abs() < 1e-9));
    assert!(a.f_masked.iter().all(|f| f.is_nan()));

    let ab = report.effect("A:B").unwrap();
    assert_eq!(ab.f_values.shape(), &[2, 3]);
    assert!(!ab.f_masked[[1, 2]].is_nan());
    assert!(ab.f_masked[[0, 0]].is_nan());

    // the cluster backend got the derived threshold and the default settings
    let seen = cluster.seen.borrow().clone().unwrap();
    assert_eq!(seen.threshold, Some(3.0));
    assert_eq!(seen.n_permutations, 256);

    assert_eq!(report.cluster.clusters.len(), 1);
    assert_eq!(report.cluster_masked.iter().filter(|f| !f.is_nan()).count(), 1);
    approx::assert_abs_diff_eq!(report.cluster_masked[[1, 2]], ab.f_values[[1, 2]]);

    assert_eq!(report.fdr_reject.iter().filter(|&&r| r).count(), 1);
    assert!(report.fdr_reject[[1, 2]]);
    assert!(!report.fdr_masked[[1, 2]].is_nan());
    approx::assert_abs_diff_eq!(report.fdr_p_values[[0, 0]], 1.0);
}

#[test]
fn no_effect_means_empty_corrected_maps() {
    let conds: Vec<_> = planted_interaction(6)
        .into_iter()
        .map(|c| c.mapv(|_| 1.0))
        .collect();
    let views: Vec<_> = conds.iter().map(|c| c.view()).collect();
    let report = analyse(
        &views,
        &AnalysisConfig::default(),
        &ContrastAnova { threshold: 3.0 },
        &ThresholdClusters::default(),
        &BonferroniFdr,
    )
    .unwrap();
    assert!(report.cluster.clusters.is_empty());
    assert!(report.cluster_masked.iter().all(|f| f.is_nan()));
    assert!(report.fdr_masked.iter().all(|f| f.is_nan()));
}

#[test]
fn wrong_condition_count_is_typed() {
    let conds = planted_interaction(6);
    let views: Vec<_> = conds.iter().take(3).map(|c| c.view()).collect();
    let err = analyse(
        &views,
        &AnalysisConfig::default(),
        &ContrastAnova { threshold: 3.0 },
        &ThresholdClusters::default(),
        &BonferroniFdr,
    )
    .unwrap_err();
    assert!(matches!(err.downcast_ref::<ShapeError>(), Some(ShapeError::ConditionCount { .. })));
}

#[test]
fn cluster_effect_must_be_single() {
    let conds = planted_interaction(6);
    let views: Vec<_> = conds.iter().map(|c| c.view()).collect();
    let cfg = AnalysisConfig { cluster_effects: "A*B".into(), ..AnalysisConfig::default() };
    let res = analyse(
        &views,
        &cfg,
        &ContrastAnova { threshold: 3.0 },
        &ThresholdClusters::default(),
        &BonferroniFdr,
    );
    assert!(res.is_err());
}
