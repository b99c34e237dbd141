//! Capability interface to the board's camera/encoder stack
//!
//! Component creation, parameter negotiation and the zero-copy tunnel are
//! external collaborators; the pipeline core only sees these traits.

pub mod handle;
pub mod sim;

pub use handle::{HandleKind, HardwareHandle};

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::pipeline::notifier::EventNotifier;
use crate::pipeline::pool::Buffer;

/// Identifies one directional attachment point on a hardware component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Raw frames in the sensor's native layout; opaque to the core.
    Raw,
    /// Compressed H.264 elementary stream.
    H264,
}

/// Format descriptor negotiated on a port.
///
/// `width`/`height` carry the hardware-aligned dimensions; the crop fields
/// keep the exact values the application asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortFormat {
    pub width: u32,
    pub height: u32,
    pub crop_width: u32,
    pub crop_height: u32,
    pub frame_rate: u32,
    pub encoding: Encoding,
    pub bitrate: u32,
}

/// Flags selecting how a tunnel connection is established.
#[derive(Debug, Clone, Copy, Default)]
pub struct TunnelFlags {
    /// Zero-copy transport between the two ports.
    pub tunneled: bool,
    /// Buffers for the link are allocated on the input side.
    pub allocate_on_input: bool,
}

/// A submit that failed hands the buffer back so it can be repooled.
#[derive(Debug)]
pub struct SubmitError {
    pub buffer: Buffer,
    pub error: Error,
}

pub trait CaptureDriver: Send + Sync {
    /// Instantiate the sensor component for one physical camera index.
    fn open(&self, camera: u32) -> Result<Box<dyn CaptureComponent>>;
}

pub trait CaptureComponent: Send {
    /// Sensor model identifier as reported by the firmware.
    fn model(&self) -> &str;

    fn preview_port(&self) -> PortId;
    fn video_port(&self) -> PortId;
    fn capture_port(&self) -> PortId;

    fn negotiate_format(&self, port: PortId, format: &PortFormat) -> Result<()>;

    /// Enable the control path; parameter-change and error events land in
    /// the notifier from here on.
    fn enable_control(&self, events: Arc<EventNotifier>) -> Result<()>;

    fn set_enabled(&self, enabled: bool) -> Result<()>;

    /// Issue the capture-start command on the given port.
    fn start_capture(&self, port: PortId) -> Result<()>;
}

pub trait EncodeDriver: Send + Sync {
    fn open(&self) -> Result<Box<dyn EncodeComponent>>;
}

pub trait EncodeComponent: Send {
    fn input_port(&self) -> PortId;
    fn output_port(&self) -> PortId;

    fn negotiate_format(&self, port: PortId, format: &PortFormat) -> Result<()>;

    /// Request inline parameter sets (every output unit self-describing)
    /// and timestamp metadata on the output port.
    fn configure_metadata(&self, inline_headers: bool, timestamps: bool) -> Result<()>;

    /// Recommended `(count, size)` for the output buffer pool, derived
    /// from the negotiated format.
    fn recommended_buffers(&self) -> (usize, usize);

    fn enable_control(&self, events: Arc<EventNotifier>) -> Result<()>;

    /// Enable the output port; completed buffers arrive through the
    /// notifier's FIFO from here on.
    fn enable_output(&self, events: Arc<EventNotifier>) -> Result<()>;

    fn set_enabled(&self, enabled: bool) -> Result<()>;

    /// Hand an empty buffer to the encoder. Ownership transfers to the
    /// hardware until it comes back through a completion callback; on
    /// failure the buffer comes straight back in the error.
    fn submit(&self, port: PortId, buffer: Buffer) -> std::result::Result<(), SubmitError>;

    /// Recover buffers the hardware still holds after the output port is
    /// disabled. Part of the teardown ordering contract.
    fn reclaim(&self) -> Vec<Buffer>;
}

pub trait TunnelService: Send + Sync {
    /// Establish a connection between an output and an input port. The
    /// link's format/ownership events wake the notifier; they carry no
    /// payload.
    fn connect(
        &self,
        output: PortId,
        input: PortId,
        flags: TunnelFlags,
        events: Arc<EventNotifier>,
    ) -> Result<Box<dyn TunnelLink>>;
}

pub trait TunnelLink: Send {
    fn set_enabled(&self, enabled: bool) -> Result<()>;
}

/// Destination for encoded bytes. The core appends each completed payload
/// exactly once, in completion order.
pub trait OutputSink: Send {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// File-backed output sink.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path).map_err(Error::Io)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl OutputSink for FileSink {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
