//! Camera types and data structures.

use std::fmt;

/// Information about a camera known to libcamera.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// Camera index for selection
    pub index: usize,
    /// libcamera device id (e.g. a USB or I2C path)
    pub id: String,
    /// Human-readable camera model
    pub model: String,
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.index, self.model, self.id)
    }
}

/// Capture resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Low resolution (320x240)
    pub const LOW: Resolution = Resolution {
        width: 320,
        height: 240,
    };

    /// Medium resolution (640x480) - balanced, recommended
    pub const MEDIUM: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    /// High resolution (1280x720)
    pub const HIGH: Resolution = Resolution {
        width: 1280,
        height: 720,
    };
}

impl Default for Resolution {
    fn default() -> Self {
        Self::MEDIUM
    }
}

/// Pixel geometry of one captured frame: 3 interleaved 8-bit channels per
/// pixel, rows `stride` bytes apart (the stride may exceed `width * 3` when
/// the camera pads rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl FrameLayout {
    pub const BYTES_PER_PIXEL: usize = 3;

    /// Layout with no row padding.
    pub fn packed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stride: width * Self::BYTES_PER_PIXEL as u32,
        }
    }

    /// Total number of bytes covered by one frame.
    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }
}

/// State of one buffer slot in the pool.
///
/// Every slot is in exactly one of these states at any instant: either the
/// capture source is filling it, or the consumer may read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Submitted to the capture source, awaiting a fill.
    InFlight,
    /// Completed and owned by the consumer until resubmission.
    Held,
}

/// Errors that can occur during camera operations.
#[derive(Debug)]
pub enum CameraError {
    /// Failed to start the camera manager
    ManagerFailed(std::io::Error),
    /// No cameras found on the system
    NoCameras,
    /// Camera device not found at the requested index
    DeviceNotFound(usize),
    /// Failed to acquire exclusive access to the camera
    AcquireFailed(std::io::Error),
    /// The camera rejected or could not produce a configuration
    InvalidConfiguration,
    /// Failed to apply the validated configuration
    ConfigureFailed(std::io::Error),
    /// Buffer allocation failed outright
    AllocationFailed(std::io::Error),
    /// Fewer buffers than the double-buffering floor
    InsufficientBuffers { got: usize },
    /// mmap failed for a buffer plane
    MappingFailed(std::io::Error),
    /// A mapped buffer is smaller than one frame
    ShortBuffer { slot: usize },
    /// The camera refused to create a capture request
    RequestFailed,
    /// Failed to attach a buffer to its capture request
    BufferAttachFailed(std::io::Error),
    /// Failed to start streaming
    StartFailed(std::io::Error),
    /// Failed to stop streaming
    StopFailed(std::io::Error),
    /// Failed to queue a capture request
    QueueFailed(std::io::Error),
    /// Slot index outside the pool
    BadSlot(usize),
    /// A slot was not in the state the hand-off protocol requires
    SlotStateViolation { slot: usize, expected: SlotState },
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::ManagerFailed(e) => {
                write!(f, "Failed to start the camera manager: {}", e)
            }
            CameraError::NoCameras => write!(f, "No camera found"),
            CameraError::DeviceNotFound(index) => {
                write!(
                    f,
                    "Camera {} not found. Run 'facelens list-cameras' to see available devices",
                    index
                )
            }
            CameraError::AcquireFailed(e) => {
                write!(
                    f,
                    "Failed to acquire camera: {}. It may be in use by another application",
                    e
                )
            }
            CameraError::InvalidConfiguration => {
                write!(f, "The camera cannot produce the requested stream configuration")
            }
            CameraError::ConfigureFailed(e) => write!(f, "Failed to configure camera: {}", e),
            CameraError::AllocationFailed(e) => {
                write!(f, "Failed to allocate frame buffers: {}", e)
            }
            CameraError::InsufficientBuffers { got } => {
                write!(
                    f,
                    "At least two buffers are needed for double buffering, got {}",
                    got
                )
            }
            CameraError::MappingFailed(e) => {
                write!(f, "Failed to memory-map a frame buffer: {}", e)
            }
            CameraError::ShortBuffer { slot } => {
                write!(f, "Mapped buffer {} is smaller than one frame", slot)
            }
            CameraError::RequestFailed => {
                write!(f, "The camera refused to create a capture request")
            }
            CameraError::BufferAttachFailed(e) => {
                write!(f, "Failed to attach a buffer to its request: {}", e)
            }
            CameraError::StartFailed(e) => write!(f, "Failed to start the camera: {}", e),
            CameraError::StopFailed(e) => write!(f, "Failed to stop the camera: {}", e),
            CameraError::QueueFailed(e) => write!(f, "Failed to queue a capture request: {}", e),
            CameraError::BadSlot(slot) => write!(f, "Buffer slot {} is outside the pool", slot),
            CameraError::SlotStateViolation { slot, expected } => {
                let expected = match expected {
                    SlotState::InFlight => "in flight",
                    SlotState::Held => "held by the consumer",
                };
                write!(f, "Buffer slot {} was expected to be {}", slot, expected)
            }
        }
    }
}

impl std::error::Error for CameraError {}
