//! Safetensors I/O for condition power arrays and analysis results.
//!
//! File layout:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┬────────────────────┐
//! │ n : u64 (LE) │ JSON header (n bytes, padded) │ tensor byte buffer │
//! └──────────────┴──────────────────────────────┴────────────────────┘
//! ```
//!
//! Every tensor is read into an `ArrayD<f64>` whatever its stored dtype.
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use anyhow::{bail, Context, Result};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde_json::Value;
use tracing::debug;

fn parse_header(bytes: &[u8]) -> Result<(serde_json::Map<String, Value>, usize)> {
    let Some(len_bytes) = bytes.get(..8) else {
        bail!("safetensors file too small ({} bytes)", bytes.len());
    };
    let mut len = [0u8; 8];
    len.copy_from_slice(len_bytes);
    let n = usize::try_from(u64::from_le_bytes(len)).context("header length overflows usize")?;
    let Some(raw) = n.checked_add(8).and_then(|end| bytes.get(8..end)) else {
        bail!("header length {n} exceeds file size {}", bytes.len());
    };
    let header: serde_json::Map<String, Value> =
        serde_json::from_slice(raw).context("failed to parse safetensors header")?;
    Ok((header, 8 + n))
}

fn shape_of(name: &str, entry: &Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .with_context(|| format!("tensor {name:?} has no shape"))?
        .iter()
        .map(|v| {
            v.as_u64()
                .map(|d| d as usize)
                .with_context(|| format!("tensor {name:?} has a non-integer dimension"))
        })
        .collect()
}

fn offsets_of(name: &str, entry: &Value) -> Result<(usize, usize)> {
    let pair = entry["data_offsets"]
        .as_array()
        .filter(|a| a.len() == 2)
        .with_context(|| format!("tensor {name:?} has no data_offsets pair"))?;
    match (pair[0].as_u64(), pair[1].as_u64()) {
        (Some(s), Some(e)) if s <= e => Ok((s as usize, e as usize)),
        _ => bail!("tensor {name:?} has invalid data_offsets"),
    }
}

fn decode(name: &str, dtype: &str, raw: &[u8]) -> Result<Vec<f64>> {
    Ok(match dtype {
        "F64" => raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect(),
        "F32" => raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
        "I64" => raw
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64)
            .collect(),
        "I32" => raw
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
        "U8" | "BOOL" => raw.iter().map(|&b| b as f64).collect(),
        other => bail!("tensor {name:?} has unsupported dtype {other}"),
    })
}

/// All tensors of a safetensors file, widened to `f64`.
#[derive(Debug, Clone, Default)]
pub struct TensorFile {
    pub tensors:  HashMap<String, ArrayD<f64>>,
    /// Contents of the `__metadata__` entry.
    pub metadata: HashMap<String, String>,
}

impl TensorFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_bytes(&bytes).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (header, data_start) = parse_header(bytes)?;
        let buffer = &bytes[data_start..];
        let mut out = Self::default();
        for (name, entry) in &header {
            if name == "__metadata__" {
                if let Some(m) = entry.as_object() {
                    for (k, v) in m {
                        if let Some(s) = v.as_str() {
                            out.metadata.insert(k.clone(), s.to_string());
                        }
                    }
                }
                continue;
            }
            let dtype = entry["dtype"]
                .as_str()
                .with_context(|| format!("tensor {name:?} has no dtype"))?;
            let shape = shape_of(name, entry)?;
            let (s, e) = offsets_of(name, entry)?;
            let Some(raw) = buffer.get(s..e) else {
                bail!("tensor {name:?} offsets {s}..{e} exceed buffer of {} bytes", buffer.len());
            };
            let values = decode(name, dtype, raw)?;
            let arr = ArrayD::from_shape_vec(IxDyn(&shape), values)
                .with_context(|| format!("tensor {name:?}: byte length does not match shape {shape:?}"))?;
            out.tensors.insert(name.clone(), arr);
        }
        debug!(n_tensors = out.tensors.len(), n_metadata = out.metadata.len(), "loaded safetensors");
        Ok(out)
    }

    pub fn get(&self, name: &str) -> Result<&ArrayD<f64>> {
        self.tensors.get(name).with_context(|| format!("missing tensor {name:?}"))
    }

    /// Remove and return tensor `name`.
    pub fn take(&mut self, name: &str) -> Result<ArrayD<f64>> {
        self.tensors.remove(name).with_context(|| format!("missing tensor {name:?}"))
    }
}

impl TensorFile {
    /// Remove and return the per-condition arrays, in condition order.
    ///
    /// The order is taken from metadata key `conditions` (comma-separated
    /// names) when present, otherwise tensors `cond_0, cond_1, …` are taken
    /// until one is missing. Other tensors stay in the file.
    pub fn take_conditions(&mut self) -> Result<(Vec<String>, Vec<ArrayD<f64>>)> {
        let names: Vec<String> = match self.metadata.get("conditions") {
            Some(list) => list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            None => (0..)
                .map(|i| format!("cond_{i}"))
                .take_while(|n| self.tensors.contains_key(n))
                .collect(),
        };
        if names.is_empty() {
            bail!("no condition tensors found");
        }
        let arrays = names.iter().map(|n| self.take(n)).collect::<Result<Vec<_>>>()?;
        debug!(conditions = ?names, "took condition arrays");
        Ok((names, arrays))
    }
}

/// Per-condition arrays of the file at `path`, see
/// [`TensorFile::take_conditions`].
pub fn load_conditions<P: AsRef<Path>>(path: P) -> Result<(Vec<String>, Vec<ArrayD<f64>>)> {
    let path = path.as_ref();
    TensorFile::load(path)?
        .take_conditions()
        .with_context(|| format!("reading conditions from {}", path.display()))
}

/// Safetensors writer for F64, F32, I32 and U8 tensors.
///
/// ```rust,no_run
/// use tfanova::io::TensorWriter;
/// let mut w = TensorWriter::new();
/// w.add_f64("f_values", &[1.0, 2.0, 3.0], &[1, 3]);
/// w.add_metadata("effects", "A:B");
/// w.write("/tmp/out.safetensors").unwrap();
/// ```
#[derive(Debug, Default)]
pub struct TensorWriter {
    entries:  Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: serde_json::Map<String, Value>,
}

impl TensorWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    /// Row-major copy of any-dimensional `arr`.
    pub fn add_array(&mut self, name: &str, arr: ArrayViewD<'_, f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, arr.shape());
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    /// Boolean mask stored as U8 0 / 1.
    pub fn add_mask(&mut self, name: &str, mask: ArrayViewD<'_, bool>) {
        let bytes: Vec<u8> = mask.iter().map(|&b| b as u8).collect();
        self.entries.push((name.to_string(), bytes, "U8", mask.shape().to_vec()));
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), Value::String(value.to_string()));
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert("__metadata__".into(), Value::Object(self.metadata.clone()));
        }
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let mut out = Vec::with_capacity(8 + hdr_bytes.len() + pad + offset);
        out.extend_from_slice(&((hdr_bytes.len() + pad) as u64).to_le_bytes());
        out.extend_from_slice(&hdr_bytes);
        out.extend(std::iter::repeat(b' ').take(pad));
        for (_, data, _, _) in &self.entries {
            out.extend_from_slice(data);
        }
        Ok(out)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let mut f = std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
        f.write_all(&bytes)?;
        debug!(path = %path.display(), n_tensors = self.entries.len(), "wrote safetensors");
        Ok(())
    }
}
