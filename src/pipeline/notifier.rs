//! Single coordination point for all hardware callbacks
//!
//! Every completion, control and connection callback - whatever thread the
//! hardware invokes it on - funnels through one mutex/condvar pair. The
//! driver loop is the sole waiter, so it never has to reason about
//! concurrent mutation of pipeline state.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::error::Error;
use crate::pipeline::pool::Buffer;

/// Why the driver loop must stop accepting new output.
#[derive(Debug)]
pub enum StopCause {
    EndOfStream,
    Failed(Error),
}

/// Outcome of one wait on the notifier.
#[derive(Debug)]
pub enum Wake {
    /// A filled buffer is ready to be written out.
    Completed(Buffer),
    /// Error or end-of-stream observed; stop takes precedence over any
    /// buffers still queued, which the driver flushes while draining.
    Stop(StopCause),
}

#[derive(Default)]
struct Shared {
    last_error: Option<Error>,
    end_of_stream: bool,
    completed: VecDeque<Buffer>,
}

/// One lock plus one condition variable shared by every callback.
pub struct EventNotifier {
    shared: Mutex<Shared>,
    ready: Condvar,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self {
            shared: Mutex::new(Shared::default()),
            ready: Condvar::new(),
        }
    }

    /// Output-port completion callback: enqueue and signal. Never blocks.
    pub fn post_completed(&self, buffer: Buffer) {
        self.shared.lock().unwrap().completed.push_back(buffer);
        self.ready.notify_all();
    }

    /// Control-path error callback. The first error wins; later ones are
    /// reported by the hardware after the pipeline is already draining.
    pub fn post_error(&self, error: Error) {
        let mut shared = self.shared.lock().unwrap();
        if shared.last_error.is_none() {
            shared.last_error = Some(error);
        }
        drop(shared);
        self.ready.notify_all();
    }

    pub fn post_end_of_stream(&self) {
        self.shared.lock().unwrap().end_of_stream = true;
        self.ready.notify_all();
    }

    /// Liveness-only wake, used by connection callbacks that carry no data.
    pub fn wake(&self) {
        self.ready.notify_all();
    }

    /// Block until there is something for the driver to act on.
    pub fn wait(&self) -> Wake {
        let mut shared = self.shared.lock().unwrap();
        loop {
            if let Some(error) = shared.last_error.take() {
                return Wake::Stop(StopCause::Failed(error));
            }
            if shared.end_of_stream {
                return Wake::Stop(StopCause::EndOfStream);
            }
            if let Some(buffer) = shared.completed.pop_front() {
                return Wake::Completed(buffer);
            }
            shared = self.ready.wait(shared).unwrap();
        }
    }

    /// Take every buffer still queued, without blocking. Used while
    /// draining so already-captured frames are not silently dropped.
    pub fn take_completed(&self) -> Vec<Buffer> {
        self.shared.lock().unwrap().completed.drain(..).collect()
    }

    /// Number of completed buffers currently queued.
    pub fn pending(&self) -> usize {
        self.shared.lock().unwrap().completed.len()
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new()
    }
}
