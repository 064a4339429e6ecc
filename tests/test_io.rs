use ndarray::{Array3, ArrayD};
use tempfile::TempDir;
use tfanova::{
    load_conditions, prepare_conditions, stack_conditions, AnalysisConfig, BaselineMode,
    TensorFile, TensorWriter,
};

fn power(n_rep: usize, value: f64) -> ArrayD<f64> {
    // baseline (t < 0) at `value`, post-stimulus at `2 · value`
    Array3::from_shape_fn((n_rep, 2, 6), |(_, _, t)| if t < 3 { value } else { 2.0 * value }).into_dyn()
}

fn times() -> Vec<f64> {
    vec![-0.3, -0.2, -0.1, 0.1, 0.2, 0.3]
}

#[test]
fn conditions_follow_metadata_order() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("conds-meta.safetensors");
    let mut w = TensorWriter::new();
    w.add_array("vis_l", power(3, 2.0).view());
    w.add_array("aud_l", power(3, 1.0).view());
    w.add_metadata("conditions", "aud_l, vis_l");
    w.write(&path).unwrap();

    let (names, arrays) = load_conditions(&path).unwrap();
    assert_eq!(names, ["aud_l", "vis_l"]);
    assert_eq!(arrays[0][[0, 0, 0]], 1.0);
    assert_eq!(arrays[1][[0, 0, 0]], 2.0);
}

#[test]
fn conditions_fall_back_to_numbered_keys() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("conds-numbered.safetensors");
    let mut w = TensorWriter::new();
    for i in 0..4 {
        w.add_array(&format!("cond_{i}"), power(2, i as f64 + 1.0).view());
    }
    w.add_f64("times", &times(), &[6]);
    w.write(&path).unwrap();

    let mut file = TensorFile::load(&path).unwrap();
    let (names, arrays) = file.take_conditions().unwrap();
    assert_eq!(names.len(), 4);
    assert_eq!(arrays[3].shape(), &[2, 2, 6]);
    assert_eq!(file.get("times").unwrap().len(), 6);
}

#[test]
fn empty_file_has_no_conditions() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("conds-empty.safetensors");
    TensorWriter::new().write(&path).unwrap();
    assert!(load_conditions(&path).is_err());
}

#[test]
fn prepare_truncates_rescales_and_decimates() {
    let conds = vec![power(5, 1.0), power(3, 4.0), power(4, 2.0), power(3, 8.0)];
    let cfg = AnalysisConfig::default();
    assert_eq!(cfg.baseline_mode, BaselineMode::Ratio);

    let (prepared, t) = prepare_conditions(conds, &times(), &cfg).unwrap();
    assert_eq!(t, vec![-0.3, -0.1, 0.2]);
    for p in &prepared {
        assert_eq!(p.shape(), &[3, 2, 3]);
        // ratio to baseline: 1 before the event, 2 after
        approx::assert_abs_diff_eq!(p[[0, 0, 0]], 1.0);
        approx::assert_abs_diff_eq!(p[[2, 1, 2]], 2.0);
    }

    let views: Vec<_> = prepared.iter().map(|c| c.view()).collect();
    let tensor = stack_conditions(&views).unwrap();
    assert_eq!(tensor.view().dim(), (3, 4, 6));
    assert_eq!(tensor.to_full_shape().unwrap().shape(), &[3, 4, 2, 3]);
}

#[test]
fn prepare_rejects_bad_decimation() {
    let cfg = AnalysisConfig { decim: 0, ..AnalysisConfig::default() };
    assert!(prepare_conditions(vec![power(2, 1.0)], &times(), &cfg).is_err());
}

#[test]
fn baseline_is_taken_over_decimated_samples() {
    // baseline alternates 1 / 3, post-event power is 4; decim 2 keeps only
    // the 1s of the baseline, so the ratio is against 1, not against 2
    let t = vec![-0.6, -0.5, -0.4, -0.3, -0.2, -0.1, 0.1, 0.2];
    let vals = [1.0, 3.0, 1.0, 3.0, 1.0, 3.0, 4.0, 4.0];
    let cond = Array3::from_shape_fn((1, 1, 8), |(_, _, k)| vals[k]).into_dyn();
    let cfg = AnalysisConfig::default();
    assert_eq!(cfg.decim, 2);

    let (prepared, dt) = prepare_conditions(vec![cond], &t, &cfg).unwrap();
    assert_eq!(dt, vec![-0.6, -0.4, -0.2, 0.1]);
    let got: Vec<f64> = prepared[0].iter().copied().collect();
    for (g, want) in got.iter().zip([1.0, 1.0, 1.0, 4.0]) {
        approx::assert_abs_diff_eq!(*g, want, epsilon = 1e-12);
    }
}
