//! libcamera capture session: configuration, buffer wiring, and the
//! completion callback.
//!
//! The session owns the acquired camera and the reusable capture requests.
//! Each request carries a cookie equal to its pool slot index, which is how a
//! completion on the callback thread is later resolved back to a mapped
//! buffer by the consumer.

use std::sync::Arc;

use libcamera::{
    camera::{ActiveCamera, CameraConfigurationStatus},
    framebuffer::AsFrameBuffer,
    framebuffer_allocator::FrameBufferAllocator,
    geometry::Size,
    pixel_format::PixelFormat,
    request::{Request, ReuseFlag},
    stream::{Stream, StreamRole},
};

use super::handoff::Handoff;
use super::mapping::MappedPlane;
use super::pool::FramePool;
use super::types::{CameraError, FrameLayout, Resolution};
use crate::pipeline::FrameSource;

/// DRM fourcc "RG24": 24-bit RGB, stored B, G, R in memory.
pub const PIXEL_FORMAT_RGB888: PixelFormat =
    PixelFormat::new(u32::from_le_bytes([b'R', b'G', b'2', b'4']), 0);

/// A configured camera ready to stream into the pool.
pub struct CaptureSession<'d> {
    cam: ActiveCamera<'d>,
    stream: Stream,
    layout: FrameLayout,
    // The allocator owns the device-side buffer storage; it must live as
    // long as the requests that reference its buffers.
    _allocator: FrameBufferAllocator,
    pending: Vec<Request>,
    started: bool,
}

impl<'d> CaptureSession<'d> {
    /// Configure `cam` for an RGB888 viewfinder stream, allocate and map the
    /// buffer pool, create one reusable request per buffer, and register the
    /// completion callback.
    ///
    /// Returns the pool, the hand-off channel the callback publishes into,
    /// and the session. The tuple is ordered so that destructuring it into
    /// `let (pool, handoff, session)` drops the session (which stops the
    /// camera) before the pool releases its mappings.
    pub fn configure(
        mut cam: ActiveCamera<'d>,
        resolution: Resolution,
    ) -> Result<(FramePool, Arc<Handoff<Request>>, Self), CameraError> {
        let mut cfgs = cam
            .generate_configuration(&[StreamRole::ViewFinder])
            .ok_or(CameraError::InvalidConfiguration)?;
        {
            let mut cfg = cfgs
                .get_mut(0)
                .ok_or(CameraError::InvalidConfiguration)?;
            cfg.set_pixel_format(PIXEL_FORMAT_RGB888);
            cfg.set_size(Size {
                width: resolution.width,
                height: resolution.height,
            });
        }

        match cfgs.validate() {
            CameraConfigurationStatus::Valid => {}
            CameraConfigurationStatus::Adjusted => {
                log::warn!("camera adjusted the requested configuration: {:?}", cfgs);
            }
            CameraConfigurationStatus::Invalid => {
                return Err(CameraError::InvalidConfiguration);
            }
        }
        cam.configure(&mut cfgs)
            .map_err(CameraError::ConfigureFailed)?;

        // The camera may have adjusted geometry during validation; the pool
        // layout must describe what the device will actually write.
        let cfg = cfgs.get(0).ok_or(CameraError::InvalidConfiguration)?;
        let size = cfg.get_size();
        let layout = FrameLayout {
            width: size.width,
            height: size.height,
            stride: cfg.get_stride(),
        };
        let stream = cfg.stream().ok_or(CameraError::InvalidConfiguration)?;
        log::info!(
            "streaming {}x{} (stride {})",
            layout.width,
            layout.height,
            layout.stride
        );

        let mut allocator = FrameBufferAllocator::new(&cam);
        let buffers = allocator
            .alloc(&stream)
            .map_err(CameraError::AllocationFailed)?;
        log::info!("allocated {} frame buffers", buffers.len());

        // Map every plane before any buffer moves into its request; a single
        // mmap failure abandons the whole pool.
        let mut mappings = Vec::with_capacity(buffers.len());
        for buf in &buffers {
            let planes = buf.planes();
            let plane = planes.get(0).ok_or(CameraError::InvalidConfiguration)?;
            let offset = plane.offset().unwrap_or(0);
            let mapping = MappedPlane::map(plane.fd(), plane.len(), offset as i64)
                .map_err(CameraError::MappingFailed)?;
            mappings.push(mapping);
        }
        let pool = FramePool::new(mappings, layout)?;

        let pending = buffers
            .into_iter()
            .enumerate()
            .map(|(slot, buf)| {
                let mut req = cam
                    .create_request(Some(slot as u64))
                    .ok_or(CameraError::RequestFailed)?;
                req.add_buffer(&stream, buf)
                    .map_err(CameraError::BufferAttachFailed)?;
                Ok(req)
            })
            .collect::<Result<Vec<_>, CameraError>>()?;

        let handoff = Arc::new(Handoff::new());
        let publisher = Arc::clone(&handoff);
        cam.on_request_completed(move |req| {
            // Callback thread: publish and return, nothing else.
            publisher.publish(req);
        });

        Ok((
            pool,
            handoff,
            Self {
                cam,
                stream,
                layout,
                _allocator: allocator,
                pending,
                started: false,
            },
        ))
    }

    /// Negotiated frame geometry.
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Stream the session belongs to.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Start streaming and queue every request, marking its slot in flight.
    pub fn start(&mut self, pool: &mut FramePool) -> Result<(), CameraError> {
        self.cam.start(None).map_err(CameraError::StartFailed)?;
        self.started = true;

        for req in self.pending.drain(..) {
            if let Some(slot) = pool.slot_for_cookie(req.cookie()) {
                pool.mark_in_flight(slot)?;
            }
            self.cam
                .queue_request(req)
                .map_err(CameraError::QueueFailed)?;
        }
        Ok(())
    }

    /// Stop streaming. Idempotent; the first call wins.
    pub fn stop(&mut self) -> Result<(), CameraError> {
        if self.started {
            self.started = false;
            self.cam.stop().map_err(CameraError::StopFailed)?;
        }
        Ok(())
    }
}

impl FrameSource for CaptureSession<'_> {
    type Completed = Request;

    fn cookie(token: &Request) -> u64 {
        token.cookie()
    }

    fn resubmit(&mut self, mut token: Request) -> Result<(), CameraError> {
        token.reuse(ReuseFlag::REUSE_BUFFERS);
        self.cam
            .queue_request(token)
            .map_err(CameraError::QueueFailed)
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        if self.started {
            if let Err(e) = self.stop() {
                log::warn!("failed to stop camera during teardown: {}", e);
            }
        }
    }
}
