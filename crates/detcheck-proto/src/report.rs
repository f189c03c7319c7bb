use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub ref_detections: usize,
    pub candidate_detections: usize,
    pub matched: usize,
    pub match_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallSummary {
    pub ref_total: usize,
    pub matched_total: usize,
    pub match_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub generated_unix_ms: i64,
    pub match_iou_threshold: f64,
    pub images: BTreeMap<String, ImageSummary>,
    pub overall: OverallSummary,
}
