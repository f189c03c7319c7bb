use crate::{letterbox::InverseMap, Candidate, VisionError, VisionResult};

/// Columns ahead of the class logits: cx, cy, w, h, objectness.
pub const HEAD_COLUMNS: usize = 5;

/// Dense per-anchor output for one image, `[num_anchors, 5 + num_classes]`,
/// row-major. Box columns are letterboxed-input pixels, the rest raw logits.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    data: Vec<f32>,
    num_anchors: usize,
    num_classes: usize,
}

impl RawPrediction {
    /// Accepts `[1, N, C]` or `[N, C]`.
    pub fn from_shape(data: Vec<f32>, shape: &[usize], num_classes: usize) -> VisionResult<Self> {
        if num_classes == 0 {
            return Err(VisionError::NoClasses);
        }
        let (num_anchors, columns) = match shape {
            [1, n, c] | [n, c] => (*n, *c),
            other => return Err(VisionError::TensorShape { shape: other.to_vec(), len: data.len() }),
        };
        let expected = HEAD_COLUMNS + num_classes;
        if columns != expected {
            return Err(VisionError::ColumnMismatch { got: columns, expected, num_classes });
        }
        if num_anchors.checked_mul(columns) != Some(data.len()) {
            return Err(VisionError::TensorShape { shape: shape.to_vec(), len: data.len() });
        }
        Ok(Self { data, num_anchors, num_classes })
    }

    /// Rows already laid out as `5 + num_classes` columns; the anchor count
    /// follows from the length. Cannot tell a wrong column count apart from
    /// a different anchor count, so external dumps go through
    /// [`RawPrediction::from_le_bytes`] with their recorded shape.
    pub fn from_flat(data: Vec<f32>, num_classes: usize) -> VisionResult<Self> {
        if num_classes == 0 {
            return Err(VisionError::NoClasses);
        }
        let columns = HEAD_COLUMNS + num_classes;
        if data.len() % columns != 0 {
            return Err(VisionError::RowLength { len: data.len(), columns });
        }
        let n = data.len() / columns;
        Self::from_shape(data, &[1, n, columns], num_classes)
    }

    /// Little-endian f32 dump of a tensor with the given shape.
    pub fn from_le_bytes(bytes: &[u8], shape: &[usize], num_classes: usize) -> VisionResult<Self> {
        if bytes.len() % 4 != 0 {
            return Err(VisionError::ByteLength(bytes.len()));
        }
        let data = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Self::from_shape(data, shape, num_classes)
    }

    pub fn num_anchors(&self) -> usize { self.num_anchors }
    pub fn num_classes(&self) -> usize { self.num_classes }
    pub fn columns(&self) -> usize { HEAD_COLUMNS + self.num_classes }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.columns())
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Scores every anchor as `sigmoid(obj) * sigmoid(cls)`, keeps the best class
/// per anchor, drops anchors under `conf_threshold` and maps the surviving
/// boxes to original-image corners. Anchor order is preserved.
pub fn decode_candidates(raw: &RawPrediction, inv: &InverseMap, conf_threshold: f64) -> Vec<Candidate> {
    let mut out = Vec::new();

    for row in raw.rows() {
        let obj = sigmoid(row[4] as f64);

        let mut best_c = 0usize;
        let mut best_p = f64::NEG_INFINITY;
        for (c, &logit) in row[HEAD_COLUMNS..].iter().enumerate() {
            let p = obj * sigmoid(logit as f64);
            if p > best_p { best_p = p; best_c = c; }
        }
        if best_p < conf_threshold { continue; }

        let (cx, cy) = (row[0] as f64, row[1] as f64);
        let (hw, hh) = (row[2] as f64 / 2.0, row[3] as f64 / 2.0);

        out.push(Candidate {
            x1: inv.map_x(cx - hw),
            y1: inv.map_y(cy - hh),
            x2: inv.map_x(cx + hw),
            y2: inv.map_y(cy + hh),
            score: best_p,
            class_id: best_c as u32,
        });
    }
    out
}
