//! Camera component wrapper

use std::sync::Arc;

use tracing::info;

use crate::capture::format::raw_format;
use crate::error::{Error, Result};
use crate::hal::{CaptureComponent, CaptureDriver, PortFormat, PortId};
use crate::pipeline::notifier::EventNotifier;
use crate::CaptureConfig;

/// Sensor models the firmware enumerates but cannot actually stream from.
const KNOWN_BAD_MODELS: &[&str] = &["n/a", "unknown"];

/// Reject sensors whose reported model matches a known-bad pattern.
pub fn validate_model(model: &str) -> Result<()> {
    let lowered = model.to_ascii_lowercase();
    if model.is_empty() || KNOWN_BAD_MODELS.iter().any(|bad| lowered.contains(bad)) {
        return Err(Error::UnsupportedDevice {
            model: model.to_string(),
        });
    }
    Ok(())
}

/// Wraps the capture driver: one-time device validation plus format
/// negotiation on the preview, video and still-capture ports.
///
/// Construction is all-or-nothing; any failure unwinds before a
/// half-configured camera is left running.
pub struct CaptureSource {
    component: Box<dyn CaptureComponent>,
    format: PortFormat,
}

impl CaptureSource {
    pub fn new(driver: &dyn CaptureDriver, camera: u32, config: &CaptureConfig) -> Result<Self> {
        let component = driver.open(camera)?;
        validate_model(component.model())?;
        info!(camera, model = component.model(), "camera opened");

        let format = raw_format(config.width, config.height, config.fps);
        component.negotiate_format(component.preview_port(), &format)?;
        component.negotiate_format(component.video_port(), &format)?;
        component.negotiate_format(component.capture_port(), &format)?;
        info!(
            width = format.width,
            height = format.height,
            crop_width = format.crop_width,
            crop_height = format.crop_height,
            fps = format.frame_rate,
            "capture format negotiated"
        );

        Ok(Self { component, format })
    }

    /// The negotiated raw format, shared with the encoder's input side.
    pub fn format(&self) -> &PortFormat {
        &self.format
    }

    pub fn preview_port(&self) -> PortId {
        self.component.preview_port()
    }

    pub fn video_port(&self) -> PortId {
        self.component.video_port()
    }

    pub fn capture_port(&self) -> PortId {
        self.component.capture_port()
    }

    pub fn enable_control(&self, events: Arc<EventNotifier>) -> Result<()> {
        self.component.enable_control(events)
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.component.set_enabled(enabled)
    }

    /// Start streaming on the video port. Failure here is fatal: a sensor
    /// that never starts produces silence, not an error event.
    pub fn start_capture(&self) -> Result<()> {
        self.component.start_capture(self.component.video_port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_bad_models_are_rejected() {
        assert!(matches!(
            validate_model("N/A"),
            Err(Error::UnsupportedDevice { .. })
        ));
        assert!(matches!(
            validate_model("unknown-sensor"),
            Err(Error::UnsupportedDevice { .. })
        ));
        assert!(matches!(
            validate_model(""),
            Err(Error::UnsupportedDevice { .. })
        ));
    }

    #[test]
    fn real_sensor_models_pass() {
        assert!(validate_model("imx219").is_ok());
        assert!(validate_model("ov5647").is_ok());
    }
}
