//! Player adapters owning the media engines.
//!
//! - [`PrimaryPlayer`] owns the presenter engine (or a native audio element)
//!   and publishes a read-only handle to it.
//! - [`SecondaryPlayer`] owns the presentation engine, whose visibility and
//!   lifecycle follow [`SecondaryInputs`], and keeps it in step with the
//!   primary's handle.
//!
//! Engines are only ever mutated from inside their owning adapter or from the
//! tasks the adapter spawns; everything else reads through `watch` channels.

pub mod primary;
pub mod secondary;

pub use primary::{Configured, PrimaryPlayer};
pub use secondary::{SecondaryInputs, SecondaryPlayer, SecondaryState, SyncOutcome, sync_once};
