//! Zero-copy link between the camera's video port and the encoder input

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::hal::{PortId, TunnelFlags, TunnelLink, TunnelService};
use crate::pipeline::notifier::EventNotifier;

/// Scoped enable/disable around the tunnel connection.
///
/// `disable()` is idempotent and also runs from `Drop`, so a driver loop
/// that exits through an error path can never leave the hardware
/// mid-transfer.
pub struct Tunnel {
    link: Box<dyn TunnelLink>,
    enabled: bool,
}

impl Tunnel {
    pub fn connect(
        service: &dyn TunnelService,
        output: PortId,
        input: PortId,
        events: Arc<EventNotifier>,
    ) -> Result<Self> {
        let flags = TunnelFlags {
            tunneled: true,
            allocate_on_input: true,
        };
        let link = service.connect(output, input, flags, events)?;
        debug!(?output, ?input, "tunnel connected");
        Ok(Self {
            link,
            enabled: false,
        })
    }

    pub fn enable(&mut self) -> Result<()> {
        self.link.set_enabled(true)?;
        self.enabled = true;
        Ok(())
    }

    pub fn disable(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.enabled = false;
        self.link.set_enabled(false)
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        let _ = self.disable();
    }
}
