//! Preview window for annotated frames.

use opencv::{core, highgui, prelude::*};

use crate::frame::FrameView;

/// Key code the processing loop treats as the exit signal (ESC).
pub const KEY_ESCAPE: i32 = 27;

/// Errors from the window backend.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("window backend error: {0}")]
    Backend(#[from] opencv::Error),
}

/// Anything that can display frames and report keypresses.
pub trait FrameSink {
    fn show(&mut self, frame: &FrameView<'_>) -> Result<(), DisplayError>;

    /// Poll for a keypress for up to `timeout_ms`. `None` when no key was
    /// pressed within the timeout.
    fn poll_key(&mut self, timeout_ms: i32) -> Result<Option<i32>, DisplayError>;
}

/// highgui preview window.
pub struct PreviewWindow {
    name: String,
}

impl PreviewWindow {
    pub fn open(name: &str) -> Result<Self, DisplayError> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            name: name.to_string(),
        })
    }
}

impl FrameSink for PreviewWindow {
    fn show(&mut self, frame: &FrameView<'_>) -> Result<(), DisplayError> {
        // Zero-copy Mat over the mapped frame; imshow copies it into the
        // window's own backing store.
        let mat = unsafe {
            Mat::new_rows_cols_with_data_unsafe(
                frame.height() as i32,
                frame.width() as i32,
                core::CV_8UC3,
                frame.data().as_ptr() as *mut std::ffi::c_void,
                frame.stride() as usize,
            )
        }?;
        highgui::imshow(&self.name, &mat)?;
        Ok(())
    }

    fn poll_key(&mut self, timeout_ms: i32) -> Result<Option<i32>, DisplayError> {
        let key = highgui::wait_key(timeout_ms)?;
        Ok((key >= 0).then_some(key))
    }
}

impl Drop for PreviewWindow {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.name);
    }
}
