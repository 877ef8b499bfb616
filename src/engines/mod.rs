//! Media engine implementations

pub mod simulated;

pub use simulated::{SimulatedEngine, SimulatedFactory};

/// Frequency at which engines report `timeupdate` while playing.
///
/// Browsers fire the event roughly every 250ms; position streams normalise
/// their requested rate against this.
pub const TIMEUPDATE_HZ: f64 = 4.0;
