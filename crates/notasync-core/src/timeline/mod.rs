//! Timeline - the score linearized into time-addressable pointers
//!
//! - [`TimelineIndex`]: immutable pointer sequence built once per score load
//! - [`Locator`]: time → pointer lookup with a cheap adjacent-step cache

mod index;
mod locator;

pub use index::{Pointer, TimelineIndex};
pub use locator::{LocateCost, LocateResult, Locator};
