//! facewatch-hw — Camera capture and frame handling.
//!
//! Provides V4L2-based camera access producing BGR frames, plus the
//! downscale and channel-order conversions the recognition loop needs.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, FrameSource, PixelFormat};
pub use frame::{Frame, FrameError};
