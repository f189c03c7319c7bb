mod error;
mod nms;
pub mod blob;
pub mod compare;
pub mod decode;
pub mod doctor;
pub mod letterbox;
pub mod pipeline;

use detcheck_proto::record::DetectionRecord;
use image::RgbImage;

pub use blob::InputBlob;
pub use decode::{decode_candidates, RawPrediction};
pub use error::{VisionError, VisionResult};
pub use letterbox::{letterbox, InverseMap, LetterboxGeometry, Letterboxed};
pub use nms::{iou_xyxy, nms, nms_filter, NmsMode};
pub use pipeline::{InferenceEngine, Pipeline};

/// Channel order of an 8-bit, 3-channel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Reorders one pixel into the RGB order the network expects.
    pub fn to_rgb(self, px: [u8; 3]) -> [u8; 3] {
        match self {
            ChannelOrder::Rgb => px,
            ChannelOrder::Bgr => [px[2], px[1], px[0]],
        }
    }
}

/// Decoded image handed over by the codec. The pixel container is typed as
/// `Rgb<u8>` but holds channels in `order`.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: RgbImage,
    order: ChannelOrder,
}

impl SourceImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>, order: ChannelOrder) -> VisionResult<Self> {
        if width == 0 || height == 0 {
            return Err(VisionError::EmptyImage { width, height });
        }
        let expected = width as usize * height as usize * 3;
        let got = data.len();
        let pixels = RgbImage::from_raw(width, height, data)
            .filter(|_| got == expected)
            .ok_or(VisionError::BufferSize { expected, got })?;
        Ok(Self { pixels, order })
    }

    pub fn from_rgb(pixels: RgbImage) -> VisionResult<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(VisionError::EmptyImage { width: pixels.width(), height: pixels.height() });
        }
        Ok(Self { pixels, order: ChannelOrder::Rgb })
    }

    pub fn width(&self) -> u32 { self.pixels.width() }
    pub fn height(&self) -> u32 { self.pixels.height() }
    pub fn order(&self) -> ChannelOrder { self.order }
    pub fn pixels(&self) -> &RgbImage { &self.pixels }
}

/// Axis-aligned box in original-image pixels with its best class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub score: f64,
    pub class_id: u32,
}

/// Decoder output before suppression. Same shape as [`Detection`].
pub type Candidate = Detection;

impl Detection {
    pub fn bbox(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn area(&self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &Detection) -> f64 {
        iou_xyxy(self.bbox(), other.bbox())
    }

    /// Clamps corners into `[0, w-1] x [0, h-1]`.
    pub fn clip_to(self, width: u32, height: u32) -> Self {
        let max_x = (width.max(1) - 1) as f64;
        let max_y = (height.max(1) - 1) as f64;
        Self {
            x1: self.x1.clamp(0.0, max_x),
            y1: self.y1.clamp(0.0, max_y),
            x2: self.x2.clamp(0.0, max_x),
            y2: self.y2.clamp(0.0, max_y),
            ..self
        }
    }

    pub fn to_record(&self, class_names: &[String]) -> DetectionRecord {
        DetectionRecord {
            bbox: self.bbox(),
            score: self.score,
            class_id: self.class_id,
            class_name: class_names.get(self.class_id as usize).cloned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub input_size: u32,
    pub confidence_threshold: f64,
    pub nms_iou_threshold: f64,
    pub nms_mode: NmsMode,
    pub max_detections: Option<usize>,
    pub clip_to_image: bool,
    pub num_classes: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.25,
            nms_iou_threshold: 0.45,
            nms_mode: NmsMode::Agnostic,
            max_detections: None,
            clip_to_image: false,
            num_classes: 80,
        }
    }
}
