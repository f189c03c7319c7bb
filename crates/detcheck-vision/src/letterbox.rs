//! Aspect-preserving resize into a square network input, plus the inverse
//! mapping used to bring decoded boxes back to original-image pixels.

use image::{imageops, Rgb, RgbImage};

use crate::{ChannelOrder, SourceImage, VisionError, VisionResult};

/// Border fill, per channel.
pub const PAD_VALUE: u8 = 114;

/// `orig = (letterboxed - pad) / ratio`. These three scalars are all the
/// decoder needs to undo a letterbox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseMap {
    pub ratio: f64,
    pub pad_x: f64,
    pub pad_y: f64,
}

impl InverseMap {
    pub const IDENTITY: InverseMap = InverseMap { ratio: 1.0, pad_x: 0.0, pad_y: 0.0 };

    pub fn map_x(&self, x: f64) -> f64 { (x - self.pad_x) / self.ratio }
    pub fn map_y(&self, y: f64) -> f64 { (y - self.pad_y) / self.ratio }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxGeometry {
    pub input_size: u32,
    pub orig_width: u32,
    pub orig_height: u32,
    pub ratio: f64,
    pub new_width: u32,
    pub new_height: u32,
    /// Half of the total horizontal padding, possibly fractional.
    pub pad_x: f64,
    pub pad_y: f64,
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl LetterboxGeometry {
    pub fn compute(width: u32, height: u32, input_size: u32) -> VisionResult<Self> {
        if width == 0 || height == 0 {
            return Err(VisionError::EmptyImage { width, height });
        }
        if input_size == 0 {
            return Err(VisionError::ZeroInputSize);
        }

        let s = input_size as f64;
        let ratio = (s / height as f64).min(s / width as f64);

        // round-half-even matches the reference runtime; never collapse an axis
        let new_width = ((width as f64 * ratio).round_ties_even() as u32).clamp(1, input_size);
        let new_height = ((height as f64 * ratio).round_ties_even() as u32).clamp(1, input_size);

        let pad_x = (input_size - new_width) as f64 / 2.0;
        let pad_y = (input_size - new_height) as f64 / 2.0;

        // odd total padding: leading edge rounds down, trailing edge up
        let left = (pad_x - 0.1).round_ties_even() as u32;
        let right = (pad_x + 0.1).round_ties_even() as u32;
        let top = (pad_y - 0.1).round_ties_even() as u32;
        let bottom = (pad_y + 0.1).round_ties_even() as u32;

        Ok(Self {
            input_size,
            orig_width: width,
            orig_height: height,
            ratio,
            new_width,
            new_height,
            pad_x,
            pad_y,
            top,
            bottom,
            left,
            right,
        })
    }

    pub fn needs_resize(&self) -> bool {
        self.new_width != self.orig_width || self.new_height != self.orig_height
    }

    pub fn inverse_map(&self) -> InverseMap {
        InverseMap { ratio: self.ratio, pad_x: self.pad_x, pad_y: self.pad_y }
    }

    /// Original-image point to letterboxed-input point.
    pub fn forward(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.ratio + self.pad_x, y * self.ratio + self.pad_y)
    }

    /// Letterboxed-input point to original-image point.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let m = self.inverse_map();
        (m.map_x(x), m.map_y(y))
    }
}

/// Square padded image, still in the source channel order.
#[derive(Debug, Clone)]
pub struct Letterboxed {
    pub geometry: LetterboxGeometry,
    pub image: RgbImage,
    pub order: ChannelOrder,
}

/// Source index pair and blend weight for each destination coordinate.
/// Pixel centres sit at half-integers on both grids; samples left of the
/// first centre clamp to it.
fn bilinear_taps(src: u32, dst: u32) -> Vec<(u32, u32, f64)> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let s = ((d as f64 + 0.5) * scale - 0.5).max(0.0);
            let i0 = (s.floor() as u32).min(src - 1);
            let i1 = (i0 + 1).min(src - 1);
            (i0, i1, s - i0 as f64)
        })
        .collect()
}

/// 2x2 bilinear resize with half-pixel centres (`INTER_LINEAR` sampling).
/// The kernel stays 2x2 when shrinking.
fn resize_bilinear(src: &RgbImage, width: u32, height: u32) -> RgbImage {
    let xs = bilinear_taps(src.width(), width);
    let ys = bilinear_taps(src.height(), height);
    RgbImage::from_fn(width, height, |dx, dy| {
        let (x0, x1, fx) = xs[dx as usize];
        let (y0, y1, fy) = ys[dy as usize];
        let (a, b) = (src.get_pixel(x0, y0).0, src.get_pixel(x1, y0).0);
        let (c, d) = (src.get_pixel(x0, y1).0, src.get_pixel(x1, y1).0);
        Rgb(std::array::from_fn(|k| {
            let top = a[k] as f64 * (1.0 - fx) + b[k] as f64 * fx;
            let bottom = c[k] as f64 * (1.0 - fx) + d[k] as f64 * fx;
            (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
        }))
    })
}

pub fn letterbox(src: &SourceImage, input_size: u32) -> VisionResult<Letterboxed> {
    let geometry = LetterboxGeometry::compute(src.width(), src.height(), input_size)?;

    let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([PAD_VALUE; 3]));
    let (x, y) = (geometry.left as i64, geometry.top as i64);
    if geometry.needs_resize() {
        let resized = resize_bilinear(src.pixels(), geometry.new_width, geometry.new_height);
        imageops::replace(&mut canvas, &resized, x, y);
    } else {
        imageops::replace(&mut canvas, src.pixels(), x, y);
    }

    Ok(Letterboxed { geometry, image: canvas, order: src.order() })
}
