//! HTTP and WebSocket surface for notewire.
//!
//! Thin plumbing around the core: routes note pages, raw downloads, saves,
//! version views, and live-update websockets onto the note store, the save
//! pipeline, and the broadcast hub.

pub mod config;
pub mod error;
pub mod handler;
pub mod limit;
pub mod page;
pub mod pipeline;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use limit::RateLimiter;
pub use pipeline::SavePipeline;
pub use server::{AppState, NoteServer};
