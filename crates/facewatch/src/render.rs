//! Draws identity boxes and labels onto full-resolution frames.

use ab_glyph::{FontVec, PxScale};
use facewatch_core::FaceLocation;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: i32 = 2;
const LABEL_HEIGHT: i32 = 30;
const LABEL_TEXT_SCALE: f32 = 22.0;
const LABEL_TEXT_INSET_X: i32 = 6;

/// Fonts tried, in order, when no font path is configured.
const FALLBACK_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
];

/// One face to draw: where it is (in analysis coordinates) and what to call it.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub location: FaceLocation,
    pub label: String,
}

pub struct Renderer {
    font: Option<FontVec>,
}

impl Renderer {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    /// Load the label font from `path`, or from the first system fallback that exists.
    ///
    /// Without a usable font, boxes are still drawn but labels are not.
    pub fn load(path: Option<&Path>) -> Self {
        let candidates: Vec<PathBuf> = match path {
            Some(p) => vec![p.to_path_buf()],
            None => FALLBACK_FONTS.iter().map(PathBuf::from).collect(),
        };

        for candidate in &candidates {
            let Ok(bytes) = std::fs::read(candidate) else {
                continue;
            };
            match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    tracing::debug!(path = %candidate.display(), "label font loaded");
                    return Self::new(Some(font));
                }
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e, "invalid font file");
                }
            }
        }

        tracing::warn!(?candidates, "no label font available; drawing boxes without names");
        Self::new(None)
    }

    /// Draw every annotation, mapping locations up by `scale` first.
    pub fn draw(&self, image: &mut RgbImage, annotations: &[Annotation], scale: i32) {
        for annotation in annotations {
            self.draw_one(image, &annotation.location.scaled(scale), &annotation.label);
        }
    }

    fn draw_one(&self, image: &mut RgbImage, loc: &FaceLocation, label: &str) {
        if loc.width() <= 0 || loc.height() <= 0 {
            return;
        }

        // Outline, BOX_THICKNESS pixels wide, growing inward.
        for inset in 0..BOX_THICKNESS {
            let (w, h) = (loc.width() - 2 * inset, loc.height() - 2 * inset);
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(loc.left + inset, loc.top + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(image, rect, BOX_COLOR);
        }

        // Filled label strip along the bottom edge of the box.
        let strip = Rect::at(loc.left, loc.bottom - LABEL_HEIGHT)
            .of_size(loc.width() as u32, LABEL_HEIGHT as u32);
        draw_filled_rect_mut(image, strip, BOX_COLOR);

        if let Some(font) = &self.font {
            draw_text_mut(
                image,
                TEXT_COLOR,
                loc.left + LABEL_TEXT_INSET_X,
                loc.bottom - LABEL_HEIGHT + 4,
                PxScale::from(LABEL_TEXT_SCALE),
                font,
                label,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn annotation(top: i32, right: i32, bottom: i32, left: i32) -> Annotation {
        Annotation {
            location: FaceLocation::new(top, right, bottom, left),
            label: "alice".into(),
        }
    }

    #[test]
    fn test_box_is_scaled_to_full_resolution() {
        let mut image = RgbImage::new(200, 200);
        Renderer::new(None).draw(&mut image, &[annotation(10, 20, 30, 5)], 4);

        // Scaled box spans (top=40, right=80, bottom=120, left=20).
        assert_eq!(image.get_pixel(20, 40), &BOX_COLOR);
        assert_eq!(image.get_pixel(79, 40), &BOX_COLOR);
        assert_eq!(image.get_pixel(21, 41), &BOX_COLOR);
        assert_eq!(image.get_pixel(50, 60), &BLACK);
        // Nothing outside the box.
        assert_eq!(image.get_pixel(19, 39), &BLACK);
        assert_eq!(image.get_pixel(81, 60), &BLACK);
        assert_eq!(image.get_pixel(50, 121), &BLACK);
    }

    #[test]
    fn test_label_strip_is_filled() {
        let mut image = RgbImage::new(200, 200);
        Renderer::new(None).draw(&mut image, &[annotation(10, 20, 30, 5)], 4);

        // Strip covers rows 90..120 across the box.
        assert_eq!(image.get_pixel(50, 95), &BOX_COLOR);
        assert_eq!(image.get_pixel(50, 119), &BOX_COLOR);
        assert_eq!(image.get_pixel(50, 85), &BLACK);
    }

    #[test]
    fn test_degenerate_box_is_ignored() {
        let mut image = RgbImage::new(50, 50);
        Renderer::new(None).draw(&mut image, &[annotation(10, 5, 10, 5)], 4);
        assert!(image.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_box_past_the_edge_is_clipped() {
        let mut image = RgbImage::new(64, 64);
        Renderer::new(None).draw(&mut image, &[annotation(10, 30, 30, 10)], 4);
        assert_eq!(image.get_pixel(40, 40), &BOX_COLOR);
    }

    #[test]
    fn test_missing_font_path_falls_back_to_boxes_only() {
        let renderer = Renderer::load(Some(Path::new("/nonexistent/facewatch-font.ttf")));
        assert!(renderer.font.is_none());
    }
}
