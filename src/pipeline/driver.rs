//! Pipeline driver: startup ordering, steady-state loop, ordered teardown

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::capture::CaptureSource;
use crate::encode::EncodeSink;
use crate::error::{Error, ErrorKind, Result};
use crate::hal::{CaptureDriver, EncodeDriver, OutputSink, TunnelService};
use crate::pipeline::notifier::{EventNotifier, StopCause, Wake};
use crate::pipeline::pool::Buffer;
use crate::pipeline::tunnel::Tunnel;
use crate::{utils, Config};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Starting,
    Running,
    Draining,
    Stopped,
    Failed(ErrorKind),
}

/// Owns every pipeline stage and the single event loop thread.
///
/// Field order is teardown order: the tunnel handle goes before the
/// encoder, the encoder before the camera - the reverse of construction.
pub struct PipelineDriver {
    tunnel: Tunnel,
    encode: EncodeSink,
    capture: CaptureSource,
    events: Arc<EventNotifier>,
    sink: Box<dyn OutputSink>,
    state: PipelineState,
    torn_down: bool,
    drained: Option<usize>,
}

impl PipelineDriver {
    /// Build the whole pipeline: camera, encoder, tunnel, in that order.
    ///
    /// A negotiation failure anywhere unwinds immediately; wrappers already
    /// constructed release their hardware handles on the way out.
    pub fn new(
        capture_driver: &dyn CaptureDriver,
        encode_driver: &dyn EncodeDriver,
        tunnels: &dyn TunnelService,
        sink: Box<dyn OutputSink>,
        config: &Config,
    ) -> Result<Self> {
        let events = Arc::new(EventNotifier::new());

        let camera = match config.capture.camera {
            Some(index) => index,
            None => utils::auto_detect_camera(capture_driver)?,
        };

        let capture = CaptureSource::new(capture_driver, camera, &config.capture)?;
        let encode = EncodeSink::new(encode_driver, capture.format(), &config.encode)?;
        let tunnel = Tunnel::connect(
            tunnels,
            capture.video_port(),
            encode.input_port(),
            Arc::clone(&events),
        )?;

        Ok(Self {
            tunnel,
            encode,
            capture,
            events,
            sink,
            state: PipelineState::Idle,
            torn_down: false,
            drained: None,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Notifier shared with the hardware callbacks. External code may post
    /// end-of-stream here to request a graceful drain.
    pub fn events(&self) -> Arc<EventNotifier> {
        Arc::clone(&self.events)
    }

    /// Buffers recovered from the pool during teardown, once torn down.
    /// Anything short of pool capacity indicates a leak.
    pub fn drained_buffers(&self) -> Option<usize> {
        self.drained
    }

    /// Bring the pipeline up in strict order. On any failure the caller
    /// must still run the stop sequence; `run()` does this itself.
    pub fn start(&mut self) -> Result<()> {
        self.state = PipelineState::Starting;

        self.capture.enable_control(self.events())?;
        self.encode.enable_control(self.events())?;
        self.encode.enable_output(self.events())?;
        self.tunnel.enable()?;
        self.capture.set_enabled(true)?;
        // Enabling the encoder resupplies its output pool.
        self.encode.enable()?;
        self.capture.start_capture()?;

        self.state = PipelineState::Running;
        info!("pipeline running");
        Ok(())
    }

    /// Drive the pipeline until end-of-stream or a fatal error, then tear
    /// down. `Ok` means a graceful EOS.
    pub fn run(&mut self) -> Result<()> {
        if self.state == PipelineState::Idle {
            if let Err(error) = self.start() {
                error!(%error, "pipeline startup failed");
                self.state = PipelineState::Failed(error.kind());
                self.teardown();
                return Err(error);
            }
        }

        let cause = loop {
            match self.events.wait() {
                Wake::Stop(cause) => break cause,
                Wake::Completed(buffer) => {
                    if let Err(error) = self.forward(buffer) {
                        // Sink and resubmit failures drain the pipeline the
                        // same way an asynchronous hardware error does.
                        self.events.post_error(error);
                    }
                }
            }
        };

        self.state = PipelineState::Draining;
        self.flush_pending();
        self.teardown();

        match cause {
            StopCause::EndOfStream => {
                info!("end of stream, pipeline stopped");
                self.state = PipelineState::Stopped;
                Ok(())
            }
            StopCause::Failed(error) => {
                error!(%error, "pipeline stopped on error");
                self.state = PipelineState::Failed(error.kind());
                Err(error)
            }
        }
    }

    /// Write one completed buffer out, repool it and resubmit an empty one
    /// so the encoder's output port is never starved.
    fn forward(&mut self, buffer: Buffer) -> Result<()> {
        let written = self.sink.append(buffer.payload());
        self.encode.recycle(buffer);
        written?;

        match self.encode.send_buffer() {
            Err(Error::PoolExhausted) => {
                // Every buffer is in flight or queued; the next completion
                // resupplies the port.
                warn!("output pool exhausted, deferring resupply");
                Ok(())
            }
            other => other,
        }
    }

    /// Flush buffers already completed before the stop was observed; an
    /// already-captured frame is never silently dropped.
    fn flush_pending(&mut self) {
        for buffer in self.events.take_completed() {
            if let Err(error) = self.sink.append(buffer.payload()) {
                error!(%error, "failed to flush completed buffer while draining");
            }
            self.encode.recycle(buffer);
        }
    }

    /// Public stop sequence: flush, then ordered teardown. Calling it a
    /// second time is a no-op.
    pub fn stop(&mut self) {
        self.flush_pending();
        self.teardown();
        if !matches!(self.state, PipelineState::Failed(_)) {
            self.state = PipelineState::Stopped;
        }
    }

    /// Tear down in reverse acquisition order. Each step is best-effort:
    /// a failed disable is logged and teardown continues with the rest.
    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Err(error) = self.tunnel.disable() {
            error!(%error, "failed to disable tunnel");
        }
        if let Err(error) = self.encode.disable() {
            error!(%error, "failed to disable encoder");
        }
        if let Err(error) = self.capture.set_enabled(false) {
            error!(%error, "failed to disable camera");
        }

        let recovered = self.encode.drain_pool();
        self.drained = Some(recovered);
        debug!(recovered, "output pool drained");
        // Hardware handles are destroyed when self drops, connection
        // first, then encoder, then camera.
    }
}
