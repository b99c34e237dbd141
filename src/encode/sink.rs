//! Encoder component wrapper and its output buffer pool

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::hal::{EncodeComponent, EncodeDriver, Encoding, PortFormat, PortId};
use crate::pipeline::notifier::EventNotifier;
use crate::pipeline::pool::{Buffer, BufferPool};
use crate::EncodeConfig;

/// Wraps the encode driver: mirrors the negotiated capture format onto the
/// input port, switches the output port to the compressed encoding at the
/// requested bitrate, and owns the pool that keeps the output port supplied
/// with empty buffers.
pub struct EncodeSink {
    // Pool before component: buffers are destroyed before the handle.
    pool: BufferPool,
    component: Box<dyn EncodeComponent>,
}

impl EncodeSink {
    pub fn new(
        driver: &dyn EncodeDriver,
        capture_format: &PortFormat,
        config: &EncodeConfig,
    ) -> Result<Self> {
        let component = driver.open()?;

        component.negotiate_format(component.input_port(), capture_format)?;

        let mut output = *capture_format;
        output.encoding = Encoding::H264;
        output.bitrate = config.bitrate;
        component.negotiate_format(component.output_port(), &output)?;

        // Inline parameter sets make every output unit self-describing.
        component.configure_metadata(true, true)?;

        let (count, size) = component.recommended_buffers();
        info!(count, size, bitrate = config.bitrate, "encoder configured");

        Ok(Self {
            pool: BufferPool::new(count, size),
            component,
        })
    }

    pub fn input_port(&self) -> PortId {
        self.component.input_port()
    }

    pub fn output_port(&self) -> PortId {
        self.component.output_port()
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn enable_control(&self, events: Arc<EventNotifier>) -> Result<()> {
        self.component.enable_control(events)
    }

    pub fn enable_output(&self, events: Arc<EventNotifier>) -> Result<()> {
        self.component.enable_output(events)
    }

    /// Enable the component and immediately hand every pool buffer to the
    /// output port. An enabled encoder with an empty output port silently
    /// never emits data, so the resupply is part of enabling.
    pub fn enable(&self) -> Result<()> {
        self.component.set_enabled(true)?;
        let supplied = self.resupply()?;
        debug!(supplied, "encoder output port supplied");
        Ok(())
    }

    fn resupply(&self) -> Result<usize> {
        let mut supplied = 0;
        while let Some(buffer) = self.pool.try_acquire() {
            if let Err(submit) = self.component.submit(self.component.output_port(), buffer) {
                self.pool.release(submit.buffer);
                return Err(submit.error);
            }
            supplied += 1;
        }
        Ok(supplied)
    }

    /// Submit one empty buffer to the output port. `PoolExhausted` means
    /// every buffer is in flight or waiting to be written out; the caller
    /// treats it as backpressure.
    pub fn send_buffer(&self) -> Result<()> {
        let buffer = self.pool.try_acquire().ok_or(Error::PoolExhausted)?;
        if let Err(submit) = self.component.submit(self.component.output_port(), buffer) {
            self.pool.release(submit.buffer);
            return Err(submit.error);
        }
        Ok(())
    }

    /// Return an application-owned buffer to the pool.
    pub fn recycle(&self, buffer: Buffer) {
        self.pool.release(buffer);
    }

    /// Disable the component and repool whatever the hardware still held.
    /// Buffers are reclaimed even when the disable command itself fails;
    /// its error is reported after the pool is made whole.
    pub fn disable(&self) -> Result<()> {
        let disabled = self.component.set_enabled(false);
        for buffer in self.component.reclaim() {
            self.pool.release(buffer);
        }
        disabled
    }

    /// Synchronously recover all pooled buffers before the pool goes away.
    pub fn drain_pool(&self) -> usize {
        self.pool.drain().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::SubmitError;
    use std::sync::Mutex;

    /// Encoder that accepts buffers but errors on the disable command.
    struct StuckEncoder {
        held: Mutex<Vec<Buffer>>,
    }

    impl EncodeComponent for StuckEncoder {
        fn input_port(&self) -> PortId {
            PortId(0)
        }

        fn output_port(&self) -> PortId {
            PortId(1)
        }

        fn negotiate_format(&self, _port: PortId, _format: &PortFormat) -> Result<()> {
            Ok(())
        }

        fn configure_metadata(&self, _inline_headers: bool, _timestamps: bool) -> Result<()> {
            Ok(())
        }

        fn recommended_buffers(&self) -> (usize, usize) {
            (4, 16)
        }

        fn enable_control(&self, _events: Arc<EventNotifier>) -> Result<()> {
            Ok(())
        }

        fn enable_output(&self, _events: Arc<EventNotifier>) -> Result<()> {
            Ok(())
        }

        fn set_enabled(&self, enabled: bool) -> Result<()> {
            if enabled {
                Ok(())
            } else {
                Err(Error::Hardware(0xdead))
            }
        }

        fn submit(&self, _port: PortId, buffer: Buffer) -> std::result::Result<(), SubmitError> {
            self.held.lock().unwrap().push(buffer);
            Ok(())
        }

        fn reclaim(&self) -> Vec<Buffer> {
            self.held.lock().unwrap().drain(..).collect()
        }
    }

    #[test]
    fn failed_disable_still_reclaims_held_buffers() {
        let sink = EncodeSink {
            pool: BufferPool::new(4, 16),
            component: Box::new(StuckEncoder {
                held: Mutex::new(Vec::new()),
            }),
        };

        sink.enable().unwrap();
        assert_eq!(sink.pool.available(), 0);

        match sink.disable() {
            Err(Error::Hardware(code)) => assert_eq!(code, 0xdead),
            other => panic!("expected disable failure, got {other:?}"),
        }
        // The disable error must not leave hardware-held buffers stranded.
        assert_eq!(sink.pool.available(), 4);
        assert_eq!(sink.drain_pool(), 4);
    }
}
