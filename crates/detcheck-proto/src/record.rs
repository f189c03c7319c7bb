use serde::{Deserialize, Serialize};

/// One detection as persisted for downstream comparison.
/// `bbox` is `[x1, y1, x2, y2]` in original-image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub bbox: [f64; 4],
    pub score: f64,
    pub class_id: u32,
    // reference runs from the training framework also carry the label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image: String,
    #[serde(default)]
    pub detections: Vec<DetectionRecord>,
}

/// Letterbox parameters written next to a preprocessed input blob, so a
/// tensor produced elsewhere can be mapped back to the source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterboxRecord {
    pub image: String,
    pub input_size: u32,
    pub orig_width: u32,
    pub orig_height: u32,
    pub ratio: f64,
    pub pad_x: f64,
    pub pad_y: f64,
}

/// Shape of a raw output tensor dump, stored beside it as `<stem>.shape.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorRecord {
    pub shape: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_reference_without_class_name() {
        let s = r#"[{"image":"bus.jpg","detections":[{"bbox":[1.0,2.0,3.0,4.0],"score":0.5,"class_id":5}]}]"#;
        let recs: Vec<ImageRecord> = serde_json::from_str(s).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].detections[0].class_id, 5);
        assert!(recs[0].detections[0].class_name.is_none());
    }

    #[test]
    fn missing_detections_is_empty() {
        let rec: ImageRecord = serde_json::from_str(r#"{"image":"a.png"}"#).unwrap();
        assert!(rec.detections.is_empty());
    }

    #[test]
    fn omits_absent_class_name() {
        let rec = DetectionRecord { bbox: [0.0, 0.0, 1.0, 1.0], score: 0.9, class_id: 0, class_name: None };
        let s = serde_json::to_string(&rec).unwrap();
        assert!(!s.contains("class_name"));
    }
}
