//! Loose cross-runtime agreement check: how many reference detections have a
//! same-class candidate overlapping them by at least the match threshold.

use std::collections::{BTreeMap, HashMap};

use detcheck_proto::{
    record::{DetectionRecord, ImageRecord},
    report::{ComparisonReport, ImageSummary, OverallSummary},
};

use crate::nms::iou_xyxy;

pub const DEFAULT_MATCH_IOU: f64 = 0.5;

/// Number of reference detections with at least one matching candidate.
/// A candidate may satisfy several references.
pub fn match_detections(reference: &[DetectionRecord], candidate: &[DetectionRecord], iou_th: f64) -> usize {
    reference
        .iter()
        .filter(|r| {
            candidate
                .iter()
                .any(|c| c.class_id == r.class_id && iou_xyxy(r.bbox, c.bbox) >= iou_th)
        })
        .count()
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Summarizes every reference image; images the candidate run lacks count
/// as having no detections. Candidate-only images are ignored.
pub fn compare_runs(
    reference: &[ImageRecord],
    candidate: &[ImageRecord],
    iou_th: f64,
    generated_unix_ms: i64,
) -> ComparisonReport {
    let by_name: HashMap<&str, &ImageRecord> = candidate.iter().map(|c| (c.image.as_str(), c)).collect();

    let mut images = BTreeMap::new();
    let mut ref_total = 0;
    let mut matched_total = 0;

    for r in reference {
        let cand: &[DetectionRecord] = by_name.get(r.image.as_str()).map(|c| c.detections.as_slice()).unwrap_or(&[]);
        let matched = match_detections(&r.detections, cand, iou_th);
        let count = r.detections.len();
        ref_total += count;
        matched_total += matched;
        images.insert(
            r.image.clone(),
            ImageSummary {
                ref_detections: count,
                candidate_detections: cand.len(),
                matched,
                match_ratio: ratio(matched, count),
            },
        );
    }

    ComparisonReport {
        generated_unix_ms,
        match_iou_threshold: iou_th,
        images,
        overall: OverallSummary { ref_total, matched_total, match_ratio: ratio(matched_total, ref_total) },
    }
}
