//! Media backlog data model.
//!
//! `MediaItem` is owned by the watchlist sync layer and only consumed here;
//! `AcquisitionRecord` is the engine's own record of a selected release.

mod types;

pub use types::*;
