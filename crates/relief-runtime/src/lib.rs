//! Relief Runtime - Frame loop infrastructure
//!
//! Provides the building blocks used to drive incremental work from a frame loop:
//! - `TickSource` - injectable periodic-callback capability
//! - `TimerManager` - a `TickSource` advanced by elapsed frame time
//! - `FrameClock` - per-frame delta measurement
//! - `EventBus` - typed event queue for notifications

mod clock;
mod event_bus;
mod tick;
mod timers;

pub use clock::FrameClock;
pub use event_bus::EventBus;
pub use tick::{TickCallback, TickControl, TickHandle, TickSource};
pub use timers::TimerManager;
