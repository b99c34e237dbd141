//! Sensor format negotiation rules

use crate::hal::{Encoding, PortFormat};

/// The ISP writes frames in 32x16 macroblock-aligned strides.
pub const WIDTH_ALIGN: u32 = 32;
pub const HEIGHT_ALIGN: u32 = 16;

pub fn align_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Raw-frame format for the sensor's ports: dimensions rounded up to the
/// hardware alignment, crop kept at the exact requested size.
pub fn raw_format(width: u32, height: u32, frame_rate: u32) -> PortFormat {
    PortFormat {
        width: align_up(width, WIDTH_ALIGN),
        height: align_up(height, HEIGHT_ALIGN),
        crop_width: width,
        crop_height: height,
        frame_rate,
        encoding: Encoding::Raw,
        bitrate: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_law() {
        for (width, height) in [(1, 1), (31, 15), (32, 16), (33, 17), (1920, 1080)] {
            let format = raw_format(width, height, 30);
            assert_eq!(format.width, width.div_ceil(32) * 32);
            assert_eq!(format.height, height.div_ceil(16) * 16);
            assert_eq!(format.crop_width, width);
            assert_eq!(format.crop_height, height);
        }
    }

    #[test]
    fn spec_resolution_rounds_height_only() {
        // 1440 is already a multiple of 32; 1080 rounds up to 1088.
        let format = raw_format(1440, 1080, 25);
        assert_eq!((format.width, format.height), (1440, 1088));
        assert_eq!((format.crop_width, format.crop_height), (1440, 1080));
        assert_eq!(format.frame_rate, 25);
    }
}
