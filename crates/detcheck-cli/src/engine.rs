use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use detcheck_proto::record::TensorRecord;
use detcheck_vision::{InferenceEngine, InputBlob, RawPrediction};

/// `a.bin` -> `a.shape.json`
pub fn shape_sidecar(tensor: &Path) -> PathBuf {
    tensor.with_extension("shape.json")
}

/// Replays an output tensor dumped by an external runtime as flat
/// little-endian f32. The shape comes from the dump's `.shape.json`
/// sidecar, or from `fallback_shape` when there is none.
pub struct TensorFileEngine {
    path: PathBuf,
    fallback_shape: Option<Vec<usize>>,
    num_classes: usize,
}

impl TensorFileEngine {
    pub fn new(path: impl Into<PathBuf>, fallback_shape: Option<Vec<usize>>, num_classes: usize) -> Self {
        Self { path: path.into(), fallback_shape, num_classes }
    }

    fn shape(&self) -> Result<Vec<usize>> {
        let sidecar = shape_sidecar(&self.path);
        if sidecar.is_file() {
            let s = std::fs::read_to_string(&sidecar).with_context(|| format!("read {}", sidecar.display()))?;
            let rec: TensorRecord = serde_json::from_str(&s).with_context(|| format!("parse {}", sidecar.display()))?;
            return Ok(rec.shape);
        }
        self.fallback_shape.clone().with_context(|| {
            format!("no shape for {}: write {} or set tensor_shape", self.path.display(), sidecar.display())
        })
    }
}

impl InferenceEngine for TensorFileEngine {
    fn infer(&mut self, blob: &InputBlob) -> Result<RawPrediction> {
        let shape = self.shape()?;
        let bytes = std::fs::read(&self.path).with_context(|| format!("read tensor {}", self.path.display()))?;
        let raw = RawPrediction::from_le_bytes(&bytes, &shape, self.num_classes)
            .with_context(|| format!("parse tensor {} as {:?}", self.path.display(), shape))?;
        debug!(
            "engine: replayed {} anchors from {} for input {:?}",
            raw.num_anchors(),
            self.path.display(),
            blob.shape()
        );
        Ok(raw)
    }
}
