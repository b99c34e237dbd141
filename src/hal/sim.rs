//! In-process stand-in for the board's camera/encoder stack
//!
//! The real drivers talk to firmware; this one talks to a thread. It keeps
//! the binary runnable without hardware and gives the integration tests a
//! deterministic device: synthetic encoded units at a configurable rate,
//! end-of-stream after a frame budget, and fault injection at every stage
//! the pipeline negotiates with.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::hal::{
    CaptureComponent, CaptureDriver, EncodeComponent, EncodeDriver, HandleKind, HardwareHandle,
    OutputSink, PortFormat, PortId, SubmitError, TunnelFlags, TunnelLink, TunnelService,
};
use crate::pipeline::notifier::EventNotifier;
use crate::pipeline::pool::Buffer;

pub const CAMERA_PREVIEW: PortId = PortId(0);
pub const CAMERA_VIDEO: PortId = PortId(1);
pub const CAMERA_CAPTURE: PortId = PortId(2);
pub const ENCODER_INPUT: PortId = PortId(10);
pub const ENCODER_OUTPUT: PortId = PortId(11);

/// Error code posted for injected hardware faults.
pub const SIM_FAULT_CODE: u32 = 0x8000_1001;
/// Error code for submitting to a disabled port.
const SIM_PORT_DISABLED: u32 = 0x8000_0002;

/// Behavior knobs for the simulated hardware.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Sensor model reported per camera index.
    pub cameras: Vec<String>,
    /// Frames emitted before end-of-stream; 0 keeps streaming forever.
    pub frame_limit: u64,
    /// Pacing between frames; zero disables the encoder thread entirely
    /// and frames are produced manually via [`SimHardware::complete_frame`].
    pub frame_interval: Duration,
    /// Post a hardware error event after this many frames.
    pub fail_after_frames: Option<u64>,
    /// Refuse every format negotiation.
    pub reject_formats: bool,
    /// Fail encoder component creation.
    pub fail_encoder_creation: bool,
    /// Fail the capture-start command.
    pub fail_capture_start: bool,
    /// Output pool recommendation `(count, size)`.
    pub recommended_buffers: (usize, usize),
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cameras: vec!["imx219".to_string()],
            frame_limit: 30,
            frame_interval: Duration::ZERO,
            fail_after_frames: None,
            reject_formats: false,
            fail_encoder_creation: false,
            fail_capture_start: false,
            recommended_buffers: (4, 64 * 1024),
        }
    }
}

#[derive(Default)]
struct SimState {
    live_handles: HashSet<u64>,
    negotiated: HashMap<PortId, PortFormat>,
    /// Empty buffers the encoder's output port currently holds.
    submitted: VecDeque<Buffer>,
    events: Option<Arc<EventNotifier>>,
    total_submitted: u64,
    tunnel_enabled: bool,
    encoder_enabled: bool,
    capture_running: bool,
}

struct SimInner {
    cfg: SimConfig,
    next_handle: AtomicU64,
    state: Mutex<SimState>,
    /// Wakes the encoder thread when buffers are submitted or capture stops.
    buffers_ready: Condvar,
}

impl SimInner {
    fn register_handle(&self) -> u64 {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.state.lock().unwrap().live_handles.insert(id);
        id
    }

    fn unregister_handle(&self, id: u64) {
        self.state.lock().unwrap().live_handles.remove(&id);
    }

    fn acquire_handle(self: &Arc<Self>, kind: HandleKind) -> Result<HardwareHandle> {
        let inner = Arc::clone(self);
        HardwareHandle::acquire(kind, || Ok(self.register_handle()), move |id| {
            inner.unregister_handle(id)
        })
    }

    fn events(&self) -> Option<Arc<EventNotifier>> {
        self.state.lock().unwrap().events.clone()
    }

    /// Hardware side of the pipeline: pull an empty buffer, fill it with a
    /// synthetic encoded unit, post the completion.
    fn run_encoder(self: Arc<Self>) {
        let mut seq: u64 = 0;
        loop {
            if self.cfg.frame_limit > 0 && seq == self.cfg.frame_limit {
                if let Some(events) = self.events() {
                    events.post_end_of_stream();
                }
                return;
            }
            if self.cfg.fail_after_frames == Some(seq) {
                if let Some(events) = self.events() {
                    events.post_error(Error::Hardware(SIM_FAULT_CODE));
                }
                return;
            }

            thread::sleep(self.cfg.frame_interval);

            let mut state = self.state.lock().unwrap();
            let mut buffer = loop {
                if !state.capture_running {
                    return;
                }
                match state.submitted.pop_front() {
                    Some(buffer) => break buffer,
                    None => state = self.buffers_ready.wait(state).unwrap(),
                }
            };
            let events = state.events.clone();
            drop(state);

            buffer.fill(&synthetic_unit(seq));
            if let Some(events) = events {
                events.post_completed(buffer);
            }
            seq += 1;
        }
    }
}

/// Deterministic payload for frame `seq`.
pub fn synthetic_unit(seq: u64) -> Vec<u8> {
    format!("UNIT{seq:08}\n").into_bytes()
}

/// Simulated device: implements all three driver capabilities.
pub struct SimHardware {
    inner: Arc<SimInner>,
}

impl SimHardware {
    pub fn new(cfg: SimConfig) -> Self {
        Self {
            inner: Arc::new(SimInner {
                cfg,
                next_handle: AtomicU64::new(1),
                state: Mutex::new(SimState::default()),
                buffers_ready: Condvar::new(),
            }),
        }
    }

    /// Handles currently alive; zero means nothing leaked.
    pub fn live_handles(&self) -> usize {
        self.inner.state.lock().unwrap().live_handles.len()
    }

    /// Empty buffers the encoder output port currently holds.
    pub fn queued_buffers(&self) -> usize {
        self.inner.state.lock().unwrap().submitted.len()
    }

    /// Total buffers ever submitted to the output port.
    pub fn total_submitted(&self) -> u64 {
        self.inner.state.lock().unwrap().total_submitted
    }

    pub fn tunnel_enabled(&self) -> bool {
        self.inner.state.lock().unwrap().tunnel_enabled
    }

    pub fn negotiated(&self, port: PortId) -> Option<PortFormat> {
        self.inner.state.lock().unwrap().negotiated.get(&port).copied()
    }

    /// Manually complete one frame: pop a submitted buffer, fill it with
    /// `payload`, post it. Returns false if the port has no buffer.
    pub fn complete_frame(&self, payload: &[u8]) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        let Some(mut buffer) = state.submitted.pop_front() else {
            return false;
        };
        let events = state.events.clone();
        drop(state);

        buffer.fill(payload);
        match events {
            Some(events) => {
                events.post_completed(buffer);
                true
            }
            None => false,
        }
    }

    /// Inject an asynchronous hardware error event.
    pub fn inject_error(&self, code: u32) {
        if let Some(events) = self.inner.events() {
            events.post_error(Error::Hardware(code));
        }
    }

    /// Signal end-of-stream, as the sensor does when a capture completes.
    pub fn end_stream(&self) {
        if let Some(events) = self.inner.events() {
            events.post_end_of_stream();
        }
    }
}

impl CaptureDriver for SimHardware {
    fn open(&self, camera: u32) -> Result<Box<dyn CaptureComponent>> {
        let model = self
            .inner
            .cfg
            .cameras
            .get(camera as usize)
            .cloned()
            .ok_or(Error::DeviceNotFound { index: camera })?;
        let handle = self.inner.acquire_handle(HandleKind::Component)?;
        debug!(camera, %model, "sim camera opened");
        Ok(Box::new(SimCamera {
            inner: Arc::clone(&self.inner),
            _handle: handle,
            model,
        }))
    }
}

struct SimCamera {
    inner: Arc<SimInner>,
    _handle: HardwareHandle,
    model: String,
}

impl CaptureComponent for SimCamera {
    fn model(&self) -> &str {
        &self.model
    }

    fn preview_port(&self) -> PortId {
        CAMERA_PREVIEW
    }

    fn video_port(&self) -> PortId {
        CAMERA_VIDEO
    }

    fn capture_port(&self) -> PortId {
        CAMERA_CAPTURE
    }

    fn negotiate_format(&self, port: PortId, format: &PortFormat) -> Result<()> {
        if self.inner.cfg.reject_formats {
            return Err(Error::FormatRejected { port });
        }
        self.inner
            .state
            .lock()
            .unwrap()
            .negotiated
            .insert(port, *format);
        Ok(())
    }

    fn enable_control(&self, events: Arc<EventNotifier>) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        state.events.get_or_insert(events);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        if !enabled {
            self.inner.state.lock().unwrap().capture_running = false;
        }
        // Wake the encoder thread so it can observe the stop.
        self.inner.buffers_ready.notify_all();
        Ok(())
    }

    fn start_capture(&self, _port: PortId) -> Result<()> {
        if self.inner.cfg.fail_capture_start {
            return Err(Error::Hardware(SIM_FAULT_CODE));
        }
        let mut state = self.inner.state.lock().unwrap();
        state.capture_running = true;
        drop(state);

        if self.inner.cfg.frame_interval > Duration::ZERO {
            let inner = Arc::clone(&self.inner);
            thread::spawn(move || inner.run_encoder());
        }
        Ok(())
    }
}

impl EncodeDriver for SimHardware {
    fn open(&self) -> Result<Box<dyn EncodeComponent>> {
        if self.inner.cfg.fail_encoder_creation {
            return Err(Error::CreationFailed {
                what: "video encoder",
            });
        }
        let handle = self.inner.acquire_handle(HandleKind::Component)?;
        Ok(Box::new(SimEncoder {
            inner: Arc::clone(&self.inner),
            _handle: handle,
        }))
    }
}

struct SimEncoder {
    inner: Arc<SimInner>,
    _handle: HardwareHandle,
}

impl EncodeComponent for SimEncoder {
    fn input_port(&self) -> PortId {
        ENCODER_INPUT
    }

    fn output_port(&self) -> PortId {
        ENCODER_OUTPUT
    }

    fn negotiate_format(&self, port: PortId, format: &PortFormat) -> Result<()> {
        if self.inner.cfg.reject_formats {
            return Err(Error::FormatRejected { port });
        }
        self.inner
            .state
            .lock()
            .unwrap()
            .negotiated
            .insert(port, *format);
        Ok(())
    }

    fn configure_metadata(&self, _inline_headers: bool, _timestamps: bool) -> Result<()> {
        Ok(())
    }

    fn recommended_buffers(&self) -> (usize, usize) {
        self.inner.cfg.recommended_buffers
    }

    fn enable_control(&self, events: Arc<EventNotifier>) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        state.events.get_or_insert(events);
        Ok(())
    }

    fn enable_output(&self, events: Arc<EventNotifier>) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        state.events = Some(events);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.inner.state.lock().unwrap().encoder_enabled = enabled;
        Ok(())
    }

    fn submit(&self, _port: PortId, buffer: Buffer) -> std::result::Result<(), SubmitError> {
        let mut state = self.inner.state.lock().unwrap();
        if !state.encoder_enabled {
            return Err(SubmitError {
                buffer,
                error: Error::Hardware(SIM_PORT_DISABLED),
            });
        }
        state.submitted.push_back(buffer);
        state.total_submitted += 1;
        drop(state);
        self.inner.buffers_ready.notify_all();
        Ok(())
    }

    fn reclaim(&self) -> Vec<Buffer> {
        self.inner
            .state
            .lock()
            .unwrap()
            .submitted
            .drain(..)
            .collect()
    }
}

impl TunnelService for SimHardware {
    fn connect(
        &self,
        output: PortId,
        input: PortId,
        _flags: TunnelFlags,
        events: Arc<EventNotifier>,
    ) -> Result<Box<dyn TunnelLink>> {
        debug!(?output, ?input, "sim tunnel connected");
        let handle = self.inner.acquire_handle(HandleKind::Connection)?;
        Ok(Box::new(SimTunnel {
            inner: Arc::clone(&self.inner),
            _handle: handle,
            events,
        }))
    }
}

struct SimTunnel {
    inner: Arc<SimInner>,
    _handle: HardwareHandle,
    events: Arc<EventNotifier>,
}

impl TunnelLink for SimTunnel {
    fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.inner.state.lock().unwrap().tunnel_enabled = enabled;
        // Format/ownership change events carry no payload; they only wake
        // the driver loop.
        self.events.wake();
        Ok(())
    }
}

/// Test sink collecting appended chunks in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with an IO error once `appends` chunks have been accepted.
    pub fn failing_after(appends: usize) -> Self {
        Self {
            chunks: Arc::new(Mutex::new(Vec::new())),
            fail_after: Some(appends),
        }
    }

    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.lock().unwrap().clone()
    }

    pub fn concat(&self) -> Vec<u8> {
        self.chunks.lock().unwrap().concat()
    }
}

impl OutputSink for MemorySink {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut chunks = self.chunks.lock().unwrap();
        if let Some(limit) = self.fail_after {
            if chunks.len() >= limit {
                return Err(io::Error::new(io::ErrorKind::Other, "sink full"));
            }
        }
        chunks.push(bytes.to_vec());
        Ok(())
    }
}
