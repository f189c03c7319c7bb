use crate::letterbox::Letterboxed;

/// Network input: NCHW `[1, 3, S, S]`, RGB planes, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputBlob {
    pub size: u32,
    pub data: Vec<f32>,
}

impl InputBlob {
    pub fn from_letterboxed(lb: &Letterboxed) -> Self {
        let (w, h) = lb.image.dimensions();
        let plane = w as usize * h as usize;
        let mut data = vec![0.0f32; 3 * plane];

        for (i, px) in lb.image.pixels().enumerate() {
            let rgb = lb.order.to_rgb(px.0);
            for c in 0..3 {
                data[c * plane + i] = rgb[c] as f32 / 255.0;
            }
        }

        Self { size: w, data }
    }

    pub fn shape(&self) -> [usize; 4] {
        let s = self.size as usize;
        [1, 3, s, s]
    }

    /// Flat little-endian f32 dump, the layout external runtimes load directly.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}
