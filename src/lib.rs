pub mod capture;
pub mod encode;
pub mod error;
pub mod hal;
pub mod pipeline;
pub mod utils;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub use error::{Error, Result};

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub capture: CaptureConfig,
    pub encode: EncodeConfig,
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Physical camera index; `None` auto-detects.
    pub camera: Option<u32>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeConfig {
    /// Target bitrate in bits per second.
    pub bitrate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination for the encoded elementary stream.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Frames recorded before the session ends; 0 records until interrupted.
    pub frame_limit: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                camera: None,
                width: 1920,
                height: 1080,
                fps: 30,
            },
            encode: EncodeConfig {
                bitrate: 17_000_000, // H.264 high-quality default for 1080p30
            },
            output: OutputConfig {
                path: "capture.h264".into(),
            },
            pipeline: PipelineConfig { frame_limit: 300 }, // 10s at 30fps
        }
    }
}
