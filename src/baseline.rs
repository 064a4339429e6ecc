//! Baseline rescaling and temporal decimation.
//!
//! `rescale_inplace` matches `mne.baseline.rescale`: with `m` the mean and
//! `sd` the standard deviation (ddof = 0) of each lane inside the baseline
//! window,
//!
//! ```text
//! mean       x − m
//! ratio      x / m
//! logratio   log10(x / m)
//! percent    (x − m) / m
//! zscore     (x − m) / sd
//! zlogratio  log10(x / m) / sd(log10(x / m) in window)
//! ```
//!
//! Lanes run along the last axis, so the same call works for epochs
//! `[E, C, T]` and for power `[E, F, T]`.
use std::fmt;
use std::str::FromStr;
use anyhow::{bail, Result};
use ndarray::{Array, ArrayViewMut1, Axis, Dimension, Slice};

/// Baseline correction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaselineMode {
    #[default]
    Mean,
    Ratio,
    LogRatio,
    Percent,
    ZScore,
    ZLogRatio,
}

impl FromStr for BaselineMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "mean" => Self::Mean,
            "ratio" => Self::Ratio,
            "logratio" => Self::LogRatio,
            "percent" => Self::Percent,
            "zscore" => Self::ZScore,
            "zlogratio" => Self::ZLogRatio,
            _ => bail!("unknown baseline mode {s:?}"),
        })
    }
}

impl fmt::Display for BaselineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mean => "mean",
            Self::Ratio => "ratio",
            Self::LogRatio => "logratio",
            Self::Percent => "percent",
            Self::ZScore => "zscore",
            Self::ZLogRatio => "zlogratio",
        })
    }
}

/// `(bmin, bmax)` in seconds; `None` means the start / end of the data.
pub type BaselineWindow = (Option<f64>, Option<f64>);

/// Half-open sample range `[imin, imax)` of `window` on the `times` axis.
pub fn baseline_indices(times: &[f64], window: BaselineWindow) -> Result<(usize, usize)> {
    let imin = match window.0 {
        None => 0,
        Some(bmin) => match times.iter().position(|&t| t >= bmin) {
            Some(i) => i,
            None => bail!("baseline start {bmin} s is after the last time point"),
        },
    };
    let imax = match window.1 {
        None => times.len(),
        Some(bmax) => match times.iter().rposition(|&t| t <= bmax) {
            Some(i) => i + 1,
            None => bail!("baseline end {bmax} s is before the first time point"),
        },
    };
    if imin >= imax {
        bail!("bad rescaling slice ({imin}:{imax}) from time values {window:?}");
    }
    Ok((imin, imax))
}

fn mean_std(v: &[f64]) -> (f64, f64) {
    let n = v.len() as f64;
    let mean = v.iter().sum::<f64>() / n;
    let var = v.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn rescale_lane(mut lane: ArrayViewMut1<'_, f64>, imin: usize, imax: usize, mode: BaselineMode) {
    let window: Vec<f64> = lane.iter().skip(imin).take(imax - imin).copied().collect();
    let (m, sd) = mean_std(&window);
    match mode {
        BaselineMode::Mean => lane.mapv_inplace(|x| x - m),
        BaselineMode::Ratio => lane.mapv_inplace(|x| x / m),
        BaselineMode::LogRatio => lane.mapv_inplace(|x| (x / m).log10()),
        BaselineMode::Percent => lane.mapv_inplace(|x| (x - m) / m),
        BaselineMode::ZScore => lane.mapv_inplace(|x| (x - m) / sd),
        BaselineMode::ZLogRatio => {
            lane.mapv_inplace(|x| (x / m).log10());
            let logs: Vec<f64> = lane.iter().skip(imin).take(imax - imin).copied().collect();
            let (_, sd) = mean_std(&logs);
            lane.mapv_inplace(|x| x / sd);
        }
    }
}

/// Rescale every lane of `data` (along its last axis) relative to `window`.
///
/// `times` gives the time of each sample on the last axis, in seconds.
pub fn rescale_inplace<D: Dimension>(
    data: &mut Array<f64, D>,
    times: &[f64],
    window: BaselineWindow,
    mode: BaselineMode,
) -> Result<()> {
    let Some(last) = data.ndim().checked_sub(1) else {
        bail!("cannot rescale a 0-d array");
    };
    if data.len_of(Axis(last)) != times.len() {
        bail!(
            "last axis has {} samples but {} time points were given",
            data.len_of(Axis(last)),
            times.len()
        );
    }
    let (imin, imax) = baseline_indices(times, window)?;
    for lane in data.lanes_mut(Axis(last)) {
        rescale_lane(lane, imin, imax, mode);
    }
    Ok(())
}

/// Keep every `decim`-th sample along the last axis.
pub fn decimate<D: Dimension>(data: &Array<f64, D>, decim: usize) -> Result<Array<f64, D>> {
    if decim == 0 {
        bail!("decim must be >= 1");
    }
    let Some(last) = data.ndim().checked_sub(1) else {
        bail!("cannot decimate a 0-d array");
    };
    Ok(data
        .slice_axis(Axis(last), Slice::new(0, None, decim as isize))
        .to_owned())
}

/// `times[::decim]`
pub fn decimate_times(times: &[f64], decim: usize) -> Vec<f64> {
    times.iter().step_by(decim.max(1)).copied().collect()
}
