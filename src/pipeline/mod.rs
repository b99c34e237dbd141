pub mod driver;
pub mod notifier;
pub mod pool;
pub mod tunnel;

pub use driver::{PipelineDriver, PipelineState};
pub use notifier::{EventNotifier, StopCause, Wake};
pub use pool::{Buffer, BufferPool};
pub use tunnel::Tunnel;
