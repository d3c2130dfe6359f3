//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const REQUESTED_WIDTH: u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("frame conversion failed: {0}")]
    Frame(#[from] frame::FrameError),
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: u32,
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Motion JPEG, one compressed image per buffer.
    Mjpg,
    /// 8-bit grayscale.
    Grey,
}

/// Anything that yields frames one at a time.
///
/// `Ok(None)` marks the end of the stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError>;
}

/// Device path for a capture index (`0` → `/dev/video0`).
pub fn device_path(index: u32) -> String {
    format!("/dev/video{index}")
}

/// V4L2 camera device handle. The device is released when this is dropped.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open the capture device with the given index.
    pub fn open(index: u32) -> Result<Self, CameraError> {
        let device_path = device_path(index);
        if !Path::new(&device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path));
        }

        let device = Device::with_path(&device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = %device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Ask for YUYV; drivers may answer with MJPG or GREY instead.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = REQUESTED_WIDTH;
        fmt.height = REQUESTED_HEIGHT;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = if fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if fourcc == FourCC::new(b"MJPG") {
            PixelFormat::Mjpg
        } else if fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, MJPG, or GREY)"
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path,
            fourcc,
            pixel_format,
        })
    }

    /// Start a memory-mapped capture stream.
    pub fn stream(&self) -> Result<CameraStream<'_>, CameraError> {
        let stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;
        Ok(CameraStream {
            camera: self,
            stream,
        })
    }

    /// Convert a raw buffer to BGR based on the negotiated format.
    fn buf_to_bgr(&self, buf: &[u8]) -> Result<(Vec<u8>, u32, u32), CameraError> {
        let (w, h) = (self.width, self.height);
        let converted = match self.pixel_format {
            PixelFormat::Yuyv => (frame::yuyv_to_bgr(buf, w, h)?, w, h),
            PixelFormat::Grey => (frame::grey_to_bgr(buf, w, h)?, w, h),
            PixelFormat::Mjpg => frame::mjpeg_to_bgr(buf)?,
        };
        Ok(converted)
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for index in 0..16 {
            let path = device_path(index);
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                index,
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

/// Live capture stream borrowing an open [`Camera`].
pub struct CameraStream<'a> {
    camera: &'a Camera,
    stream: MmapStream<'a>,
}

impl FrameSource for CameraStream<'_> {
    /// Block until the next decodable frame arrives.
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        let camera = self.camera;
        let stream = &mut self.stream;
        skip_corrupt_frames(|| {
            let (buf, meta) = stream.next().map_err(|e| {
                CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}"))
            })?;

            let used = (meta.bytesused as usize).min(buf.len());
            let payload = if used > 0 { &buf[..used] } else { buf };

            let (data, width, height) = camera.buf_to_bgr(payload)?;
            Ok(Frame::from_bgr(data, width, height, meta.sequence)?)
        })
        .map(Some)
    }
}

/// Consecutive undecodable buffers tolerated before capture is declared failed.
const MAX_CORRUPT_FRAMES: usize = 30;

/// Call `capture` until it yields a frame, dropping buffers that fail to decode.
///
/// Any other error, or more than [`MAX_CORRUPT_FRAMES`] corrupt buffers in a
/// row, is returned.
fn skip_corrupt_frames<F>(mut capture: F) -> Result<Frame, CameraError>
where
    F: FnMut() -> Result<Frame, CameraError>,
{
    let mut corrupt = 0;
    loop {
        match capture() {
            Err(CameraError::Frame(frame::FrameError::Decode(e)))
                if corrupt < MAX_CORRUPT_FRAMES =>
            {
                corrupt += 1;
                tracing::warn!(error = %e, corrupt, "dropping undecodable frame");
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameError;

    fn tiny_frame(sequence: u32) -> Frame {
        Frame::from_bgr(vec![0; 3], 1, 1, sequence).unwrap()
    }

    #[test]
    fn test_corrupt_buffer_is_skipped() {
        let mut calls = 0;
        let frame = skip_corrupt_frames(|| {
            calls += 1;
            if calls < 3 {
                Err(FrameError::Decode("truncated jpeg".into()).into())
            } else {
                Ok(tiny_frame(calls))
            }
        })
        .unwrap();
        assert_eq!(frame.sequence, 3);
    }

    #[test]
    fn test_dequeue_failure_is_not_retried() {
        let mut calls = 0;
        let result = skip_corrupt_frames(|| {
            calls += 1;
            Err(CameraError::CaptureFailed("device unplugged".into()))
        });
        assert!(matches!(result, Err(CameraError::CaptureFailed(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_endless_corruption_gives_up() {
        let mut calls = 0;
        let result = skip_corrupt_frames(|| {
            calls += 1;
            Err(FrameError::Decode("garbage".into()).into())
        });
        assert!(matches!(result, Err(CameraError::Frame(FrameError::Decode(_)))));
        assert_eq!(calls, MAX_CORRUPT_FRAMES + 1);
    }

    #[test]
    fn test_device_path() {
        assert_eq!(device_path(0), "/dev/video0");
        assert_eq!(device_path(3), "/dev/video3");
    }
}
