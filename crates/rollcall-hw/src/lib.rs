//! rollcall-hw — Webcam capture.
//!
//! Provides V4L2-based camera access that yields RGB frames, plus the
//! `FrameSource` seam the recognition loop reads from.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError, FrameSource};
