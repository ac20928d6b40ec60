//! Periodic callback capability

use std::time::Duration;

/// Returned by a tick callback to keep or drop its registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    /// Keep the callback scheduled (repeating timers only)
    Continue,
    /// Unregister the callback; it will not be invoked again
    Stop,
}

/// Opaque identifier for a scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(pub(crate) u64);

/// Boxed callback invoked by a tick source
pub type TickCallback = Box<dyn FnMut() -> TickControl>;

/// Anything that can invoke callbacks on a cadence from the owning context.
///
/// Callbacks run serially on the thread that drives the source, so they may
/// capture non-`Send` state.
pub trait TickSource {
    /// Register a callback to run after `interval`, repeatedly if `repeating`.
    fn schedule(&mut self, interval: Duration, repeating: bool, callback: TickCallback)
        -> TickHandle;

    /// Unregister a callback. Returns false if the handle was not scheduled.
    fn cancel(&mut self, handle: TickHandle) -> bool;

    /// Whether the handle is still registered
    fn is_scheduled(&self, handle: TickHandle) -> bool;
}
