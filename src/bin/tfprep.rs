use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tfanova::{
    io::{TensorFile, TensorWriter},
    prepare_conditions, stack_conditions, AnalysisConfig, BaselineMode, ShapeError,
};

#[derive(Parser)]
#[command(name = "tfprep", about = "Build a repeated-measures observation tensor from per-condition TF power")]
struct Args {
    /// Per-condition power safetensors (`[R, n_freqs, n_times]` per condition)
    #[arg(long)]
    input: PathBuf,

    /// Observation tensor output path
    #[arg(long)]
    output: PathBuf,

    /// Levels of each factor, comma-separated
    #[arg(long, default_value = "2,2")]
    factor_levels: String,

    /// Effects to report, R formula notation
    #[arg(long, default_value = "A*B")]
    effects: String,

    /// mean, ratio, logratio, percent, zscore or zlogratio
    #[arg(long, default_value = "ratio")]
    baseline_mode: BaselineMode,

    /// Baseline start in seconds (default: start of the epoch)
    #[arg(long, allow_hyphen_values = true)]
    bmin: Option<f64>,

    /// Baseline end in seconds
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    bmax: f64,

    /// Name of the time-axis tensor in the input file
    #[arg(long, default_value = "times")]
    times: String,

    /// Keep every n-th time sample
    #[arg(long, default_value_t = 2)]
    decim: usize,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn parse_levels(s: &str) -> Result<Vec<usize>> {
    s.split(',')
        .map(|t| t.trim().parse::<usize>().with_context(|| format!("bad factor level {t:?}")))
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .init();

    let cfg = AnalysisConfig {
        factor_levels: parse_levels(&args.factor_levels)?,
        effects:       args.effects.clone(),
        baseline_mode: args.baseline_mode,
        baseline:      (args.bmin, Some(args.bmax)),
        decim:         args.decim,
        ..AnalysisConfig::default()
    };
    let levels = cfg.factor_levels()?;
    let effects = cfg.effects()?;

    let mut file = TensorFile::load(&args.input)?;
    let (names, conditions) = file
        .take_conditions()
        .with_context(|| format!("reading conditions from {}", args.input.display()))?;
    let times: Vec<f64> = file.get(&args.times)?.iter().copied().collect();
    info!(conditions = ?names, n_times = times.len(), "loaded {}", args.input.display());

    let (prepared, times) = prepare_conditions(conditions, &times, &cfg)?;
    let views: Vec<_> = prepared.iter().map(|c| c.view()).collect();
    let tensor = stack_conditions(&views)?;
    if tensor.n_conditions() != levels.n_conditions() {
        return Err(ShapeError::ConditionCount {
            levels:   levels.as_slice().to_vec(),
            expected: levels.n_conditions(),
            actual:   tensor.n_conditions(),
        }
        .into());
    }
    info!(
        n_subjects = tensor.n_replications(),
        levels = %levels,
        observation_shape = ?tensor.observation_shape(),
        effects = ?effects.names(),
        "observation tensor ready"
    );

    let full = tensor.to_full_shape()?;
    let lv: Vec<i32> = levels.as_slice().iter().map(|&l| l as i32).collect();
    let mut w = TensorWriter::new();
    w.add_array("data", full.view());
    w.add_i32("factor_levels", &lv, &[lv.len()]);
    w.add_f64("times", &times, &[times.len()]);
    w.add_metadata("conditions", &names.join(","));
    w.add_metadata("effects", &effects.names().join(","));
    w.add_metadata("baseline_mode", &cfg.baseline_mode.to_string());
    w.write(&args.output)?;
    info!("written → {}", args.output.display());

    Ok(())
}
