//! Camera capture module: device access, buffer pool, and completion
//! hand-off.
//!
//! - Device enumeration via [`list_cameras`]
//! - Memory-mapped buffer lifecycle via [`MappedPlane`] and [`FramePool`]
//! - Producer/consumer hand-off via [`Handoff`]
//! - libcamera wiring via [`CaptureSession`]

mod device;
mod handoff;
mod mapping;
mod pool;
mod session;
mod types;

pub use device::list_cameras;
pub use handoff::{Handoff, Taken};
pub use mapping::MappedPlane;
pub use pool::{FramePool, MIN_BUFFERS};
pub use session::{CaptureSession, PIXEL_FORMAT_RGB888};
pub use types::{CameraError, CameraInfo, FrameLayout, Resolution, SlotState};
