//! Remote fetching service integration.
//!
//! The [`RemoteCache`] trait is the service contract; [`AllDebridClient`]
//! implements it over HTTP. [`CacheVerifier`] runs the
//! submit → poll → link state machine on top of any implementation.

mod alldebrid;
mod files;
mod types;
mod verifier;

pub use alldebrid::{status_from_code, AllDebridClient, READY_STATUS_CODE};
pub use files::{episode_of, PlayableFilter};
pub use types::*;
pub use verifier::{
    CacheState, CacheVerifier, Compensation, LinkTarget, LinkedRelease, VerifyError,
    VerifyOutcome,
};
