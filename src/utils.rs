use std::time::Duration;

use tracing::{info, warn};

use crate::capture::validate_model;
use crate::error::{Error, Result};
use crate::hal::CaptureDriver;

/// Highest camera index probed during auto-detection.
const MAX_CAMERA_INDEX: u32 = 8;

/// Auto-detect the first usable camera index.
pub fn auto_detect_camera(driver: &dyn CaptureDriver) -> Result<u32> {
    info!("Auto-detecting cameras...");

    for index in 0..MAX_CAMERA_INDEX {
        match driver.open(index) {
            Ok(component) => {
                let model = component.model().to_string();
                if validate_model(&model).is_ok() {
                    info!(index, %model, "Found camera");
                    return Ok(index);
                }
                warn!(index, %model, "Skipping unsupported camera");
            }
            Err(Error::DeviceNotFound { .. }) => continue,
            Err(error) => return Err(error),
        }
    }

    Err(Error::DeviceNotFound { index: 0 })
}

/// Frame pacing for a capture rate, clamped to at least one millisecond.
/// A zero interval would put the simulated encoder into manual mode and
/// the driver loop would wait forever.
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_millis((1000 / u64::from(fps.max(1))).max(1))
}
