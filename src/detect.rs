//! Face detection over borrowed frame views.

use std::path::{Path, PathBuf};

use opencv::{core, imgproc, objdetect, prelude::*};

use crate::frame::{FrameView, Region};

/// Errors from loading or running the detector.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("cascade model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("cascade model is empty or unreadable: {0}")]
    ModelUnusable(PathBuf),

    #[error("detection failed: {0}")]
    Backend(#[from] opencv::Error),
}

/// Anything that can find face regions in a frame.
///
/// The processing loop only depends on this seam, so tests can drive it with
/// a stub instead of a trained classifier.
pub trait FaceFinder {
    fn find(&mut self, frame: &FrameView<'_>) -> Result<Vec<Region>, DetectorError>;
}

/// Haar cascade face detector.
pub struct CascadeDetector {
    classifier: objdetect::CascadeClassifier,
}

impl CascadeDetector {
    /// Load a trained cascade from `path`.
    ///
    /// # Errors
    /// * `ModelNotFound` - the file does not exist
    /// * `ModelUnusable` - the file parsed to an empty classifier
    pub fn load(path: &Path) -> Result<Self, DetectorError> {
        if !path.exists() {
            return Err(DetectorError::ModelNotFound(path.to_path_buf()));
        }
        let classifier = objdetect::CascadeClassifier::new(&path.to_string_lossy())?;
        if classifier.empty()? {
            return Err(DetectorError::ModelUnusable(path.to_path_buf()));
        }
        Ok(Self { classifier })
    }
}

impl FaceFinder for CascadeDetector {
    fn find(&mut self, frame: &FrameView<'_>) -> Result<Vec<Region>, DetectorError> {
        // Zero-copy Mat over the mapped frame; the classifier only reads it.
        let mat = unsafe {
            Mat::new_rows_cols_with_data_unsafe(
                frame.height() as i32,
                frame.width() as i32,
                core::CV_8UC3,
                frame.data().as_ptr() as *mut std::ffi::c_void,
                frame.stride() as usize,
            )
        }?;

        let mut gray = Mat::default();
        imgproc::cvt_color_def(&mat, &mut gray, imgproc::COLOR_BGR2GRAY)?;

        let mut faces = core::Vector::<core::Rect>::new();
        self.classifier.detect_multi_scale(
            &gray,
            &mut faces,
            1.1,
            3,
            0,
            core::Size::default(),
            core::Size::default(),
        )?;

        Ok(faces
            .iter()
            .map(|r| Region {
                x: r.x,
                y: r.y,
                width: r.width.max(0) as u32,
                height: r.height.max(0) as u32,
            })
            .collect())
    }
}
