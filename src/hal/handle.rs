//! Scoped ownership of opaque hardware handles

use tracing::debug;

use crate::error::Result;

/// What kind of hardware object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Component,
    Connection,
}

type ReleaseFn = Box<dyn FnOnce(u64) + Send>;

/// RAII owner of one hardware component or connection.
///
/// The release capability runs exactly once, on drop or on an explicit
/// `release()`, whichever comes first. A wrapper that fails construction
/// after acquiring its handle still releases it on the unwind path, so a
/// partially built pipeline never leaks hardware.
pub struct HardwareHandle {
    id: u64,
    kind: HandleKind,
    release: Option<ReleaseFn>,
}

impl HardwareHandle {
    /// Acquire the underlying resource via `create` and bind its release.
    ///
    /// A failed `create` surfaces as-is (typically `CreationFailed`) and no
    /// release is registered.
    pub fn acquire<C, R>(kind: HandleKind, create: C, release: R) -> Result<Self>
    where
        C: FnOnce() -> Result<u64>,
        R: FnOnce(u64) + Send + 'static,
    {
        let id = create()?;
        debug!(?kind, id, "hardware handle acquired");
        Ok(Self {
            id,
            kind,
            release: Some(Box::new(release)),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Release the resource now. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            debug!(kind = ?self.kind, id = self.id, "hardware handle released");
            release(self.id);
        }
    }
}

impl Drop for HardwareHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for HardwareHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("released", &self.release.is_none())
            .finish()
    }
}
