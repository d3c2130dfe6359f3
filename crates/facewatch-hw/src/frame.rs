//! Frame type and pixel conversions — YUYV/GREY/MJPG to BGR, downscale, BGR to RGB.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb, RgbImage};

/// A captured colour frame in the camera's native BGR byte order.
#[derive(Clone)]
pub struct Frame {
    /// Packed BGR pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    /// Wrap packed BGR data, checking its length against the dimensions.
    pub fn from_bgr(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence,
        })
    }

    /// Shrink both dimensions by `factor` (bilinear).
    pub fn downscale(&self, factor: u32) -> Frame {
        let factor = factor.max(1);
        let new_w = (self.width / factor).max(1);
        let new_h = (self.height / factor).max(1);

        // Resampling is per-channel, so the BGR bytes can ride in an Rgb buffer.
        let view = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(
            self.width,
            self.height,
            self.data.as_slice(),
        );
        let data = match view {
            Some(view) => imageops::resize(&view, new_w, new_h, FilterType::Triangle).into_raw(),
            None => vec![0; new_w as usize * new_h as usize * 3],
        };

        Frame {
            data,
            width: new_w,
            height: new_h,
            timestamp: self.timestamp,
            sequence: self.sequence,
        }
    }

    /// Copy into an RGB image by reversing each pixel's channel order.
    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let i = (y as usize * self.width as usize + x as usize) * 3;
            match self.data.get(i..i + 3) {
                Some(&[b, g, r]) => Rgb([r, g, b]),
                _ => Rgb([0, 0, 0]),
            }
        })
    }
}

/// Convert packed YUYV (4:2:2) to BGR using BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
pub fn yuyv_to_bgr(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = width as usize * height as usize;
    let expected = pixels * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut bgr = Vec::with_capacity(pixels * 3);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (u, v) = (chunk[1] as f32 - 128.0, chunk[3] as f32 - 128.0);
        for y in [chunk[0], chunk[2]] {
            let y = y as f32;
            let r = y + 1.402 * v;
            let g = y - 0.344_136 * u - 0.714_136 * v;
            let b = y + 1.772 * u;
            bgr.extend([b, g, r].map(|c| c.round().clamp(0.0, 255.0) as u8));
        }
    }
    Ok(bgr)
}

/// Replicate 8-bit grayscale into three BGR channels.
pub fn grey_to_bgr(grey: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = width as usize * height as usize;
    if grey.len() < pixels {
        return Err(FrameError::InvalidLength {
            expected: pixels,
            actual: grey.len(),
        });
    }
    Ok(grey[..pixels].iter().flat_map(|&p| [p, p, p]).collect())
}

/// Decode a motion-JPEG buffer into BGR, returning its own dimensions.
pub fn mjpeg_to_bgr(jpeg: &[u8]) -> Result<(Vec<u8>, u32, u32), FrameError> {
    let rgb = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)
        .map_err(|e| FrameError::Decode(e.to_string()))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    let bgr = rgb
        .pixels()
        .flat_map(|Rgb([r, g, b])| [*b, *g, *r])
        .collect();
    Ok((bgr, width, height))
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("frame decode failed: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_rgb_reverses_channels() {
        // 2x1: pure blue, pure red (BGR order)
        let frame = Frame::from_bgr(vec![255, 0, 0, 0, 0, 255], 2, 1, 0).unwrap();
        let rgb = frame.to_rgb();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_from_bgr_rejects_bad_length() {
        assert!(Frame::from_bgr(vec![0; 5], 2, 1, 0).is_err());
    }

    #[test]
    fn test_downscale_quarter() {
        let frame = Frame::from_bgr(vec![40; 640 * 480 * 3], 640, 480, 7).unwrap();
        let small = frame.downscale(4);
        assert_eq!((small.width, small.height), (160, 120));
        assert_eq!(small.data.len(), 160 * 120 * 3);
        assert_eq!(small.sequence, 7);
        assert!(small.data.iter().all(|&p| p == 40));
    }

    #[test]
    fn test_downscale_keeps_channel_layout() {
        let data: Vec<u8> = (0..8 * 8).flat_map(|_| [10u8, 20, 30]).collect();
        let small = Frame::from_bgr(data, 8, 8, 0).unwrap().downscale(4);
        assert_eq!(small.data, [10u8, 20, 30].repeat(4));
    }

    #[test]
    fn test_yuyv_grey_level() {
        // Neutral chroma → B = G = R = Y
        let yuyv = vec![100, 128, 200, 128];
        let bgr = yuyv_to_bgr(&yuyv, 2, 1).unwrap();
        assert_eq!(bgr, vec![100, 100, 100, 200, 200, 200]);
    }

    #[test]
    fn test_yuyv_chroma_shifts_channels() {
        // High V pushes red up and green down.
        let bgr = yuyv_to_bgr(&[128, 128, 128, 228], 2, 1).unwrap();
        let (b, g, r) = (bgr[0], bgr[1], bgr[2]);
        assert!(r > g && r > b, "bgr = {bgr:?}");
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(yuyv_to_bgr(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn test_grey_to_bgr() {
        assert_eq!(grey_to_bgr(&[5, 9], 2, 1).unwrap(), vec![5, 5, 5, 9, 9, 9]);
        assert!(grey_to_bgr(&[5], 2, 1).is_err());
    }

    #[test]
    fn test_mjpeg_roundtrip_dimensions() {
        let mut jpeg = Vec::new();
        RgbImage::from_pixel(16, 8, Rgb([0, 0, 200]))
            .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();
        let (bgr, w, h) = mjpeg_to_bgr(&jpeg).unwrap();
        assert_eq!((w, h), (16, 8));
        // Blue lands in the first BGR byte.
        assert!(bgr[0] > 150 && bgr[2] < 60, "bgr = {:?}", &bgr[..3]);
        assert!(mjpeg_to_bgr(b"garbage").is_err());
    }
}
