//! The capture-to-display processing loop.
//!
//! One iteration: wait on the hand-off, resolve the completed buffer to a
//! pool slot, detect faces over the mapped view, draw the boxes in place,
//! show the frame, check for the exit key, resubmit the buffer. Detection and
//! rendering happen on this thread, outside any lock; the capture callback
//! only ever publishes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use libcamera::camera_manager::CameraManager;
use libcamera::properties;

use crate::camera::{
    CameraError, CaptureSession, FramePool, Handoff, Resolution,
};
use crate::detect::{CascadeDetector, DetectorError, FaceFinder};
use crate::display::{DisplayError, FrameSink, PreviewWindow, KEY_ESCAPE};

/// Box color in the buffer's B,G,R byte order (green).
pub const BOX_COLOR: [u8; 3] = [0, 255, 0];
/// Box outline thickness in pixels.
pub const BOX_THICKNESS: u32 = 2;

/// Errors that end a preview session.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Camera(#[from] CameraError),

    #[error("{0}")]
    Detector(#[from] DetectorError),

    #[error("{0}")]
    Display(#[from] DisplayError),
}

/// Producer side of the hand-off, as seen by the processing loop.
///
/// The real implementation is [`CaptureSession`]; tests substitute a stub
/// that completes fake tokens.
pub trait FrameSource {
    /// Completion token carried from the capture callback to the consumer.
    type Completed: Send + 'static;

    /// Pool cookie carried by a completion token.
    fn cookie(token: &Self::Completed) -> u64;

    /// Hand the buffer behind `token` back to the source for refilling.
    fn resubmit(&mut self, token: Self::Completed) -> Result<(), CameraError>;
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopStats {
    /// Frames detected on and displayed.
    pub frames: u64,
    /// Completions recycled unprocessed because a newer frame displaced them.
    pub skipped: u64,
    /// Total face boxes drawn.
    pub faces: u64,
}

/// Settings for a preview session, after CLI/config merging.
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub device: usize,
    pub resolution: Resolution,
    pub model: PathBuf,
    pub window: String,
}

/// Drain completions until the exit key (or Ctrl+C) is seen.
///
/// Mid-loop detector and display failures are logged and the iteration
/// continues, so a transient failure cannot end the session or leak a
/// buffer. Queue failures are fatal: without resubmission the camera runs
/// out of buffers.
///
/// The wait on `completed` carries no timeout, so a Ctrl+C is only observed
/// once the next completion arrives.
pub fn run_loop<S, D, W>(
    source: &mut S,
    completed: &Handoff<S::Completed>,
    pool: &mut FramePool,
    detector: &mut D,
    sink: &mut W,
) -> Result<LoopStats, PipelineError>
where
    S: FrameSource,
    D: FaceFinder,
    W: FrameSink,
{
    let mut stats = LoopStats::default();
    let started_at = Instant::now();

    loop {
        if ctrlc_received() {
            log::info!("interrupt received, stopping");
            break;
        }

        let taken = completed.take();

        // Completions displaced while we were busy: the device filled them,
        // but only the newest frame is worth showing. Hand the buffers
        // straight back without processing.
        for token in taken.displaced {
            stats.skipped += 1;
            if pool.slot_for_cookie(S::cookie(&token)).is_some() {
                source.resubmit(token)?;
            } else {
                log::warn!("displaced completion for a buffer outside the pool, dropping");
            }
        }

        let token = taken.latest;
        let Some(slot) = pool.slot_for_cookie(S::cookie(&token)) else {
            // Closed buffer set: an unknown cookie is not ours to resubmit.
            log::warn!("completion for a buffer outside the pool, dropping");
            continue;
        };
        if let Err(e) = pool.mark_held(slot) {
            log::warn!("hand-off protocol violation: {}", e);
            continue;
        }

        {
            let mut view = pool.frame_mut(slot)?;
            match detector.find(&view) {
                Ok(faces) => {
                    stats.faces += faces.len() as u64;
                    for face in &faces {
                        view.draw_region(face, BOX_COLOR, BOX_THICKNESS);
                    }
                }
                Err(e) => log::warn!("face detection failed, showing raw frame: {}", e),
            }
            if let Err(e) = sink.show(&view) {
                log::warn!("display failed: {}", e);
            }
        }
        stats.frames += 1;
        if stats.frames % 30 == 0 {
            let elapsed = started_at.elapsed().as_secs_f64();
            log::debug!(
                "{} frames in {:.1}s ({:.1} fps, {} skipped)",
                stats.frames,
                elapsed,
                stats.frames as f64 / elapsed,
                stats.skipped
            );
        }

        match sink.poll_key(1) {
            Ok(Some(KEY_ESCAPE)) => break, // exit without resubmitting
            Ok(_) => {}
            Err(e) => log::warn!("key polling failed: {}", e),
        }

        pool.mark_in_flight(slot)?;
        source.resubmit(token)?;
    }

    Ok(stats)
}

/// Open the camera, wire the pipeline together, and run the preview loop.
///
/// Teardown is scoped: the session stops the camera before the pool releases
/// its mappings, on every exit path.
pub fn run_preview(opts: &PreviewOptions) -> Result<LoopStats, PipelineError> {
    // Validate the model before touching the camera; a bad path should not
    // leave the device acquired and released for nothing.
    let mut detector = CascadeDetector::load(&opts.model)?;

    let manager = CameraManager::new().map_err(CameraError::ManagerFailed)?;
    let cameras = manager.cameras();
    let cam = match cameras.get(opts.device) {
        Some(cam) => cam,
        None if opts.device == 0 => return Err(CameraError::NoCameras.into()),
        None => return Err(CameraError::DeviceNotFound(opts.device).into()),
    };
    match cam.properties().get::<properties::Model>() {
        Ok(model) => log::info!("using camera {} ({})", opts.device, *model),
        Err(_) => log::info!("using camera {}", opts.device),
    }

    let active = cam.acquire().map_err(CameraError::AcquireFailed)?;
    let (mut pool, handoff, mut session) =
        CaptureSession::configure(active, opts.resolution)?;
    let mut window = PreviewWindow::open(&opts.window)?;

    session.start(&mut pool)?;
    println!("Press ESC to exit...");

    let stats = run_loop(&mut session, &handoff, &mut pool, &mut detector, &mut window)?;

    session.stop()?;
    log::info!(
        "session ended: {} frames shown, {} skipped, {} faces",
        stats.frames,
        stats.skipped,
        stats.faces
    );
    Ok(stats)
}

/// Global flag for handling Ctrl+C across the application
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Check if Ctrl+C has been received.
pub fn ctrlc_received() -> bool {
    CTRLC_RECEIVED.load(Ordering::SeqCst)
}

/// Set up the Ctrl+C handler.
///
/// This should be called once at program startup.
pub fn setup_ctrlc_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        CTRLC_RECEIVED.store(true, Ordering::SeqCst);
        eprintln!("\nReceived Ctrl+C, shutting down...");
    })
}
