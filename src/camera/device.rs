//! Camera device enumeration.

use libcamera::camera_manager::CameraManager;
use libcamera::properties;

use super::types::{CameraError, CameraInfo};

/// List all cameras known to libcamera.
///
/// Returns an empty vector (not an error) when no cameras are connected.
pub fn list_cameras() -> Result<Vec<CameraInfo>, CameraError> {
    let manager = CameraManager::new().map_err(CameraError::ManagerFailed)?;
    let cameras = manager.cameras();

    let mut out = Vec::new();
    let mut index = 0;
    while let Some(camera) = cameras.get(index) {
        let model = match camera.properties().get::<properties::Model>() {
            Ok(model) => format!("{}", *model),
            Err(_) => "unknown".to_string(),
        };
        out.push(CameraInfo {
            index,
            id: camera.id().to_string(),
            model,
        });
        index += 1;
    }
    Ok(out)
}
