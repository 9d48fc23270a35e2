//! Broadcast hub for live note collaboration.
//!
//! A single coordinating loop owns all subscriber state and fans
//! content-change notifications out to every live connection watching a
//! given note path. Delivery is non-blocking: slow consumers are evicted
//! instead of stalling the broadcast.

pub mod error;
pub mod hub;

pub use error::{HubError, HubResult};
pub use hub::{Hub, HubConfig, HubHandle, Subscription};
