//! On-screen display of annotated frames.

use anyhow::{Context, Result};
use image::RgbImage;
use minifb::{Key, Window, WindowOptions};

/// Where annotated frames go.
pub trait Viewer {
    /// Display one frame and poll for the stop signal without blocking.
    ///
    /// Returns `false` once the user has asked to stop.
    fn show(&mut self, image: &RgbImage) -> Result<bool>;
}

/// A `minifb` window, opened on the first frame so it matches the capture size.
/// Closed when dropped.
pub struct MinifbViewer {
    title: String,
    quit_key: Key,
    window: Option<Window>,
    buffer: Vec<u32>,
}

impl MinifbViewer {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            quit_key: Key::Q,
            window: None,
            buffer: Vec::new(),
        }
    }

    fn window_for(&mut self, width: usize, height: usize) -> Result<&mut Window> {
        let stale = self
            .window
            .as_ref()
            .is_some_and(|w| w.get_size() != (width, height));
        if stale {
            self.window = None;
        }

        match &mut self.window {
            Some(window) => Ok(window),
            slot => {
                let window = Window::new(&self.title, width, height, WindowOptions::default())
                    .with_context(|| format!("failed to open {width}x{height} window"))?;
                tracing::debug!(width, height, "viewer window opened");
                Ok(slot.insert(window))
            }
        }
    }
}

impl Viewer for MinifbViewer {
    fn show(&mut self, image: &RgbImage) -> Result<bool> {
        let (width, height) = (image.width() as usize, image.height() as usize);

        let mut buffer = std::mem::take(&mut self.buffer);
        pack_0rgb(image, &mut buffer);

        let quit_key = self.quit_key;
        let window = self.window_for(width, height)?;
        window
            .update_with_buffer(&buffer, width, height)
            .context("failed to update viewer window")?;
        let keep_going = window.is_open() && !window.is_key_down(quit_key);

        self.buffer = buffer;
        Ok(keep_going)
    }
}

/// Pack RGB pixels into minifb's `0RGB` u32 layout.
fn pack_0rgb(image: &RgbImage, out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        image
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32),
    );
}
