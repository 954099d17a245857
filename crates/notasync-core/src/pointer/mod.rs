//! Pointer interaction
//!
//! - [`PointerProxy`]: raw device events to machine events (hit test, throttle)
//! - [`PointerMachine`]: hover/drag state, announces drags on the bus

mod machine;
mod proxy;

pub use machine::{DragDestination, PointerEvent, PointerMachine, PointerPosition, PointerState, PointerTarget};
pub use proxy::{PointerProxy, RawPointerEvent, RawPointerKind};
