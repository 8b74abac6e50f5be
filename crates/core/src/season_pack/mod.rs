//! Season-pack consumption tracking.
//!
//! Several episode items can be served from one pack transfer. The pack may
//! only be released upstream once no item will reference it again.

mod status;
mod tracker;

pub use status::SeasonPackStatus;
pub use tracker::{SeasonPackTracker, TrackerError};
