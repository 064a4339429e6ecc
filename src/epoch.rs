//! Event-locked epoching.
//!
//! Cuts `[C, T]` continuous data into `[E, C, n_times]` windows around each
//! event, applies a per-channel baseline and rejects epochs whose
//! peak-to-peak amplitude exceeds a per-channel-kind threshold.
//!
//! ```text
//!            tmin        0            tmax
//!   ───────────┼─────────┼─────────────┼──────────▶ samples
//!              ▲ event.sample + round(tmin·sfreq)
//! ```
use std::fmt;
use std::str::FromStr;
use anyhow::{bail, Context, Result};
use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use tracing::{debug, info};

use crate::baseline::{rescale_inplace, BaselineMode, BaselineWindow};
use crate::events::{balance_indices, EqualizeMethod, Event, EventId};

/// Channel type, used to key rejection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Grad,
    Mag,
    Eeg,
    Eog,
    Ecg,
    Emg,
    Stim,
    Misc,
}

impl FromStr for ChannelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "grad" => Self::Grad,
            "mag" => Self::Mag,
            "eeg" => Self::Eeg,
            "eog" => Self::Eog,
            "ecg" => Self::Ecg,
            "emg" => Self::Emg,
            "stim" => Self::Stim,
            "misc" => Self::Misc,
            other => bail!("unknown channel kind {other:?}"),
        })
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Grad => "grad",
            Self::Mag => "mag",
            Self::Eeg => "eeg",
            Self::Eog => "eog",
            Self::Ecg => "ecg",
            Self::Emg => "emg",
            Self::Stim => "stim",
            Self::Misc => "misc",
        })
    }
}

/// Epoching parameters. Defaults are the auditory/visual tutorial values.
#[derive(Debug, Clone)]
pub struct EpochConfig {
    /// Start of the window relative to the event, seconds.
    pub tmin: f64,
    pub tmax: f64,
    /// Mean-subtraction window, or `None` for no baseline.
    pub baseline: Option<BaselineWindow>,
    /// Peak-to-peak limits per channel kind.
    pub reject: Vec<(ChannelKind, f64)>,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            tmin: -0.2,
            tmax: 0.5,
            baseline: Some((None, Some(0.0))),
            reject: vec![(ChannelKind::Grad, 4000e-13), (ChannelKind::Eog, 150e-6)],
        }
    }
}

/// Why an event produced no epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// Window extends past the recording.
    NoData,
    /// Peak-to-peak threshold exceeded on these kinds.
    Rejected(Vec<ChannelKind>),
    /// Removed while equalizing condition counts.
    Equalized,
}

/// Epoched data.
#[derive(Debug, Clone)]
pub struct Epochs {
    /// `[n_epochs, n_channels, n_times]`
    pub data: Array3<f64>,
    /// Event of each kept epoch.
    pub events: Vec<Event>,
    pub event_id: EventId,
    /// Sample times relative to the event, seconds.
    pub times: Vec<f64>,
    pub sfreq: f64,
    pub drop_log: Vec<(Event, DropReason)>,
}

/// Cut epochs from `data` (`[C, T]`, first column at `first_samp`).
///
/// Only events whose id appears in `event_id` are used.
pub fn epochs_from_events(
    data: ArrayView2<'_, f64>,
    first_samp: i64,
    sfreq: f64,
    kinds: &[ChannelKind],
    events: &[Event],
    event_id: &EventId,
    cfg: &EpochConfig,
) -> Result<Epochs> {
    let (n_ch, n_t) = data.dim();
    if kinds.len() != n_ch {
        bail!("{} channel kinds given for {n_ch} channels", kinds.len());
    }
    if sfreq.is_nan() || sfreq <= 0.0 {
        bail!("sampling frequency must be positive, got {sfreq}");
    }
    let start = (cfg.tmin * sfreq).round() as i64;
    let stop = (cfg.tmax * sfreq).round() as i64;
    if stop < start {
        bail!("tmax ({}) must not precede tmin ({})", cfg.tmax, cfg.tmin);
    }
    let n_times = (stop - start + 1) as usize;
    let times: Vec<f64> = (start..=stop).map(|k| k as f64 / sfreq).collect();

    let codes: Vec<i32> = event_id.codes().collect();
    let mut kept = Vec::new();
    let mut windows = Vec::new();
    let mut drop_log = Vec::new();

    for ev in events.iter().filter(|e| codes.contains(&e.id)) {
        let first = ev.sample - first_samp + start;
        let last = ev.sample - first_samp + stop;
        if first < 0 || last >= n_t as i64 {
            drop_log.push((*ev, DropReason::NoData));
            continue;
        }
        let mut win = data.slice(s![.., first as usize..=last as usize]).to_owned();
        if let Some(bl) = cfg.baseline {
            rescale_inplace(&mut win, &times, bl, BaselineMode::Mean)
                .context("applying epoch baseline")?;
        }
        let bad = rejected_kinds(&win, kinds, &cfg.reject);
        if !bad.is_empty() {
            drop_log.push((*ev, DropReason::Rejected(bad)));
            continue;
        }
        kept.push(*ev);
        windows.push(win);
    }

    let mut out = Array3::<f64>::zeros((windows.len(), n_ch, n_times));
    for (mut slot, win) in out.outer_iter_mut().zip(&windows) {
        slot.assign(win);
    }
    info!(
        n_events = events.len(),
        n_kept = kept.len(),
        n_dropped = drop_log.len(),
        n_times,
        "epoched"
    );
    Ok(Epochs { data: out, events: kept, event_id: event_id.clone(), times, sfreq, drop_log })
}

fn rejected_kinds(win: &Array2<f64>, kinds: &[ChannelKind], reject: &[(ChannelKind, f64)]) -> Vec<ChannelKind> {
    let mut bad = Vec::new();
    for &(kind, limit) in reject {
        let exceeded = win
            .outer_iter()
            .zip(kinds)
            .filter(|(_, k)| **k == kind)
            .any(|(ch, _)| {
                let (lo, hi) = ch
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
                hi - lo > limit
            });
        if exceeded {
            bad.push(kind);
        }
    }
    bad
}

impl Epochs {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn n_channels(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    fn subset(&self, idx: &[usize], event_id: EventId) -> Self {
        Self {
            data: self.data.select(Axis(0), idx),
            events: idx.iter().map(|&i| self.events[i]).collect(),
            event_id,
            times: self.times.clone(),
            sfreq: self.sfreq,
            drop_log: self.drop_log.clone(),
        }
    }

    /// Indices of the epochs belonging to condition `name`.
    pub fn indices_of(&self, name: &str) -> Result<Vec<usize>> {
        let Some(code) = self.event_id.get(name) else {
            bail!("no condition named {name:?} (have: {})", self.event_id);
        };
        Ok((0..self.len()).filter(|&i| self.events[i].id == code).collect())
    }

    /// Epochs of a single condition.
    pub fn select(&self, name: &str) -> Result<Self> {
        let idx = self.indices_of(name)?;
        let code = self.event_id.get(name).unwrap_or_default();
        Ok(self.subset(&idx, EventId::new(vec![(name.to_string(), code)])))
    }

    /// Keep only channels at `picks`, in that order.
    pub fn pick_channels(&self, picks: &[usize]) -> Result<Self> {
        let n_ch = self.n_channels();
        if let Some(&bad) = picks.iter().find(|&&p| p >= n_ch) {
            bail!("channel index {bad} out of range for {n_ch} channels");
        }
        Ok(Self { data: self.data.select(Axis(1), picks), ..self.clone() })
    }

    /// Drop epochs so every condition in `event_id` has the same count.
    ///
    /// Returns, per condition, the epoch indices (before equalizing) that
    /// were dropped.
    pub fn equalize_event_counts(&mut self, method: EqualizeMethod) -> Result<Vec<Vec<usize>>> {
        let names: Vec<String> = self.event_id.names().map(str::to_string).collect();
        let per_cond: Vec<Vec<usize>> =
            names.iter().map(|n| self.indices_of(n)).collect::<Result<_>>()?;
        let samples: Vec<Vec<i64>> = per_cond
            .iter()
            .map(|idx| idx.iter().map(|&i| self.events[i].sample).collect())
            .collect();
        let keep_local = balance_indices(&samples, method);

        let mut keep = Vec::new();
        let mut dropped = Vec::with_capacity(per_cond.len());
        for (idx, kl) in per_cond.iter().zip(&keep_local) {
            let kept: Vec<usize> = kl.iter().map(|&k| idx[k]).collect();
            dropped.push(idx.iter().copied().filter(|i| !kept.contains(i)).collect::<Vec<_>>());
            keep.extend(kept);
        }
        keep.sort_unstable();

        for &i in dropped.iter().flatten() {
            self.drop_log.push((self.events[i], DropReason::Equalized));
        }
        *self = self.subset(&keep, self.event_id.clone());
        debug!(
            method = ?method,
            n_dropped = dropped.iter().map(Vec::len).sum::<usize>(),
            n_per_condition = keep_local.first().map_or(0, Vec::len),
            "equalized event counts"
        );
        Ok(dropped)
    }
}
