//! Core types shared across the playback core.
//!
//! ## Overview
//!
//! - [`Marker`] ties a playback position in a clip to a slide of a section
//! - [`SlideClipRange`] is the window during which a slide is current
//! - [`ViewMode`], [`VideoMode`] and [`Resolution`] are the user's layout and
//!   recording choices, carried in the route or in stored preferences
//! - [`UpdateRate`] controls how often position streams emit
//!
//! ## Usage Example
//!
//! ```rust
//! use alea_playback::types::{format_time, Marker, MarkerData, SlideClipRange};
//!
//! let marker = Marker::new(
//!     75.0,
//!     "Propositional Logic",
//!     MarkerData { section_id: "sec-1".into(), slide_uri: "slide-a".into(), ..Default::default() },
//! );
//! assert_eq!(format_time(marker.time), "1:15");
//!
//! let range = SlideClipRange::new(60.0, 120.0);
//! assert!(range.contains(marker.time));
//! ```

mod clip_range;
mod marker;
mod mode;
mod update_rate;

pub use clip_range::SlideClipRange;
pub use marker::{Marker, MarkerData};
pub use mode::{Resolution, VideoMode, ViewMode};
pub use update_rate::UpdateRate;

/// Format a playback position as `m:ss`, or `h:mm:ss` past the hour.
///
/// Negative and non-finite inputs format as `0:00`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds.floor() as u64 } else { 0 };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn format_time_examples() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(5.9), "0:05");
        assert_eq!(format_time(90.0), "1:30");
        assert_eq!(format_time(3725.0), "1:02:05");
        assert_eq!(format_time(-3.0), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }

    proptest! {
        #[test]
        fn prop_format_time_seconds_field_is_two_digits(seconds in 0.0f64..100_000.0) {
            let formatted = format_time(seconds);
            let last = formatted.rsplit(':').next().unwrap_or_default();
            prop_assert_eq!(last.len(), 2);
            prop_assert!(last.parse::<u32>().map(|s| s < 60).unwrap_or(false));
        }
    }
}
