use anyhow::{Context, Result};
use tracing::debug;

use crate::{
    blob::InputBlob,
    decode::{decode_candidates, RawPrediction, HEAD_COLUMNS},
    letterbox::{letterbox, LetterboxGeometry},
    nms::nms_filter,
    Detection, SourceImage, VisionConfig, VisionError, VisionResult,
};

/// The runtime that turns an input blob into the raw prediction tensor.
/// Implementations own their model handle; one call per image.
pub trait InferenceEngine {
    fn infer(&mut self, blob: &InputBlob) -> Result<RawPrediction>;
}

/// Single-image detection: letterbox, infer, decode, suppress. Holds only
/// its configuration, so one instance may serve many images.
#[derive(Debug, Clone)]
pub struct Pipeline {
    cfg: VisionConfig,
}

impl Pipeline {
    pub fn new(cfg: VisionConfig) -> Self {
        Self { cfg }
    }

    pub fn prepare(&self, image: &SourceImage) -> VisionResult<(LetterboxGeometry, InputBlob)> {
        let lb = letterbox(image, self.cfg.input_size)?;
        let g = lb.geometry;
        debug!(
            "pipeline: letterbox {}x{} -> {} ratio={:.5} pad=({:.1},{:.1})",
            g.orig_width, g.orig_height, g.input_size, g.ratio, g.pad_x, g.pad_y
        );
        Ok((g, InputBlob::from_letterboxed(&lb)))
    }

    pub fn postprocess(&self, raw: &RawPrediction, geometry: &LetterboxGeometry) -> VisionResult<Vec<Detection>> {
        if raw.num_classes() != self.cfg.num_classes {
            return Err(VisionError::ColumnMismatch {
                got: raw.columns(),
                expected: HEAD_COLUMNS + self.cfg.num_classes,
                num_classes: self.cfg.num_classes,
            });
        }

        let mut cands = decode_candidates(raw, &geometry.inverse_map(), self.cfg.confidence_threshold);
        if self.cfg.clip_to_image {
            cands = cands
                .into_iter()
                .map(|d| d.clip_to(geometry.orig_width, geometry.orig_height))
                .collect();
        }
        let n_cands = cands.len();

        let dets = nms_filter(cands, self.cfg.nms_iou_threshold, self.cfg.nms_mode, self.cfg.max_detections);
        debug!(
            "pipeline: anchors={} candidates={} kept={}",
            raw.num_anchors(), n_cands, dets.len()
        );
        Ok(dets)
    }

    pub fn detect<E: InferenceEngine + ?Sized>(&self, image: &SourceImage, engine: &mut E) -> Result<Vec<Detection>> {
        let (geometry, blob) = self.prepare(image)?;
        let raw = engine.infer(&blob).context("inference")?;
        Ok(self.postprocess(&raw, &geometry)?)
    }
}
