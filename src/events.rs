//! Events, event-id maps, and trial-count balancing.
//!
//! An event is MNE's `(sample, previous value, id)` row. Event files come in
//! two flavours: FIF (`*-eve.fif`, see [`crate::fiff::events`]) and text
//! (`*.eve`, `*.txt`, `*.lst`) with three or four whitespace-separated
//! columns.
use std::fmt;
use std::path::Path;
use anyhow::{bail, Context, Result};
use tracing::debug;

/// One `(sample, prev, id)` event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Event {
    /// Absolute sample index (includes `first_samp`).
    pub sample: i64,
    /// Value of the trigger channel before the transition.
    pub prev:   i32,
    pub id:     i32,
}

/// Ordered condition name → event code map, e.g.
/// `aud_l=1, aud_r=2, vis_l=3, vis_r=4`.
///
/// Order matters: it defines the order of conditions in the observation
/// tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventId(Vec<(String, i32)>);

impl EventId {
    pub fn new(pairs: Vec<(String, i32)>) -> Self {
        Self(pairs)
    }

    /// Parse `"name:id;name:id"` (the FIF `FIFF_DESCRIPTION` encoding) or
    /// `"name=id,name=id"`.
    pub fn parse_mapping(s: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for item in s.split([';', ',']).map(str::trim).filter(|t| !t.is_empty()) {
            let Some((name, code)) = item.rsplit_once([':', '=']) else {
                bail!("event mapping entry {item:?} is not name:id");
            };
            let code: i32 = code
                .trim()
                .parse()
                .with_context(|| format!("event id in {item:?} is not an integer"))?;
            pairs.push((name.trim().to_string(), code));
        }
        Ok(Self(pairs))
    }

    /// `"name:id;name:id"`
    pub fn to_mapping(&self) -> String {
        self.0
            .iter()
            .map(|(n, c)| format!("{n}:{c}"))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.0.iter().find(|(n, _)| n == name).map(|&(_, c)| c)
    }

    /// Name of the first condition with `code`.
    pub fn name_of(&self, code: i32) -> Option<&str> {
        self.0.iter().find(|&&(_, c)| c == code).map(|(n, _)| n.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn codes(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().map(|&(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.0.iter().map(|(n, c)| (n.as_str(), *c))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_mapping())
    }
}

/// Parse a text event list.
///
/// Lines have either `sample prev id` or `sample time prev id` columns.
/// Blank lines and `#` comments are skipped; every other row is kept, id-0
/// rows included. Float-valued integer columns are truncated toward zero.
pub fn parse_events_text(text: &str) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    let mut n_cols = None;
    for (lineno, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        match n_cols {
            None => n_cols = Some(cols.len()),
            Some(n) if n != cols.len() => {
                bail!("line {}: {} columns, previous lines had {n}", lineno + 1, cols.len())
            }
            _ => {}
        }
        let (s, p, i) = match cols.len() {
            3 => (cols[0], cols[1], cols[2]),
            4 => (cols[0], cols[2], cols[3]),
            n => bail!("line {}: unknown number of columns ({n}) in event text", lineno + 1),
        };
        // Integers may be written as floats ("27977.0").
        let int = |v: &str| -> Result<i64> {
            v.parse::<i64>()
                .or_else(|_| v.parse::<f64>().map(|f| f.trunc() as i64))
                .with_context(|| format!("line {}: {v:?} is not a number", lineno + 1))
        };
        events.push(Event { sample: int(s)?, prev: int(p)? as i32, id: int(i)? as i32 });
    }
    if events.is_empty() {
        bail!("no text lines found");
    }
    Ok(events)
}

/// Read events from a FIF or text file, chosen by extension.
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<Event>> {
    let path = path.as_ref();
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.ends_with(".fif") || name.ends_with(".fif.gz") {
        return Ok(crate::fiff::read_events_fif(path)?.0);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let events = parse_events_text(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    debug!(n_events = events.len(), path = %path.display(), "read text events");
    Ok(events)
}

/// Keep events whose id is in `ids`.
pub fn pick_events(events: &[Event], ids: &[i32]) -> Vec<Event> {
    events.iter().filter(|e| ids.contains(&e.id)).copied().collect()
}

// ── Trial-count balancing ────────────────────────────────────────────────

/// How to choose which trials survive when equalizing condition counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EqualizeMethod {
    /// Drop trials so the remaining ones are as close in time as possible to
    /// the trials of the smallest condition.
    #[default]
    MinTime,
    /// Keep the first `n_min` trials of each condition.
    Truncate,
}

impl std::str::FromStr for EqualizeMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mintime" => Ok(Self::MinTime),
            "truncate" => Ok(Self::Truncate),
            _ => bail!("unknown equalize method {s:?} (expected mintime or truncate)"),
        }
    }
}

/// Indices to keep in each condition so that all have the same count.
///
/// `samples[c]` holds the event sample of every trial of condition `c`, in
/// trial order. Returned indices are ascending.
pub fn balance_indices(samples: &[Vec<i64>], method: EqualizeMethod) -> Vec<Vec<usize>> {
    let Some(n_min) = samples.iter().map(Vec::len).min() else {
        return Vec::new();
    };
    match method {
        EqualizeMethod::Truncate => samples.iter().map(|_| (0..n_min).collect()).collect(),
        EqualizeMethod::MinTime => {
            let small = samples.iter().position(|s| s.len() == n_min).unwrap_or(0);
            let t_short: Vec<f64> = samples[small].iter().map(|&s| s as f64).collect();
            samples
                .iter()
                .enumerate()
                .map(|(c, s)| {
                    if c == small {
                        return (0..s.len()).collect();
                    }
                    let t_long: Vec<f64> = s.iter().map(|&v| v as f64).collect();
                    minimize_time_diff(&t_short, &t_long)
                        .iter()
                        .enumerate()
                        .filter(|(_, k)| **k)
                        .map(|(i, _)| i)
                        .collect()
                })
                .collect()
        }
    }
}

/// Greedy removal from `t_longer` until it has `t_shorter.len()` entries,
/// each step dropping the entry whose removal minimizes
/// `Σ|kept[j] − short[j]| + Σ|short[min(k, n−1)] − kept[k]|`.
fn minimize_time_diff(t_shorter: &[f64], t_longer: &[f64]) -> Vec<bool> {
    let mut keep = vec![true; t_longer.len()];
    if t_shorter.len() < 2 {
        keep.fill(false);
        if let Some(&t) = t_shorter.first() {
            let closest = t_longer
                .iter()
                .enumerate()
                .min_by(|a, b| (a.1 - t).abs().total_cmp(&(b.1 - t).abs()))
                .map(|(i, _)| i);
            if let Some(i) = closest {
                keep[i] = true;
            }
        }
        return keep;
    }

    let n_short = t_shorter.len();
    let short_at = |k: usize| t_shorter[k.min(n_short - 1)];
    let n_drop = t_longer.len().saturating_sub(n_short);

    for _ in 0..n_drop {
        let mut best: Option<(usize, f64)> = None;
        for cand in (0..t_longer.len()).filter(|&i| keep[i]) {
            let kept: Vec<f64> = (0..t_longer.len())
                .filter(|&i| keep[i] && i != cand)
                .map(|i| t_longer[i])
                .collect();
            let d1: f64 = (0..n_short).map(|j| (kept[j] - t_shorter[j]).abs()).sum();
            let d2: f64 = kept.iter().enumerate().map(|(k, &t)| (short_at(k) - t).abs()).sum();
            let score = d1 + d2;
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((cand, score));
            }
        }
        if let Some((i, _)) = best {
            keep[i] = false;
        }
    }
    keep
}
