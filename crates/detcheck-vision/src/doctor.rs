use anyhow::Result;

use crate::VisionConfig;

pub fn check_thresholds(cfg: &VisionConfig) -> Result<()> {
    anyhow::ensure!(
        cfg.confidence_threshold > 0.0 && cfg.confidence_threshold < 1.0,
        "confidence_threshold must be in (0, 1), got {}",
        cfg.confidence_threshold
    );
    anyhow::ensure!(
        cfg.nms_iou_threshold > 0.0 && cfg.nms_iou_threshold < 1.0,
        "nms_iou_threshold must be in (0, 1), got {}",
        cfg.nms_iou_threshold
    );
    anyhow::ensure!(cfg.max_detections != Some(0), "max_detections must be > 0 when set");
    Ok(())
}

pub fn check_input_size(input_size: u32) -> Result<()> {
    // detector strides go up to 32
    anyhow::ensure!(input_size > 0 && input_size % 32 == 0, "input_size must be a positive multiple of 32, got {}", input_size);
    Ok(())
}

pub fn check_classes(names: &[String]) -> Result<()> {
    anyhow::ensure!(!names.is_empty(), "classes must not be empty");
    if let Some(i) = names.iter().position(|n| n.trim().is_empty()) {
        anyhow::bail!("classes[{}] is blank", i);
    }
    Ok(())
}

pub fn check_match_threshold(iou: f64) -> Result<()> {
    anyhow::ensure!(iou > 0.0 && iou <= 1.0, "match_iou_threshold must be in (0, 1], got {}", iou);
    Ok(())
}
