//! Stream combinators for position and event streams

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
