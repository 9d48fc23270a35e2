//! The save pipeline: the one place where storage and broadcast compose.
//!
//! A write request goes store-first; only a save that actually changed the
//! stored content produces a live notification. Dedup no-ops, deletions,
//! and failed saves publish nothing.

use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use notewire_hub::HubHandle;
use notewire_store::{normalize, NoteStore, SaveOutcome, StoreResult};

pub struct SavePipeline {
    store: Arc<NoteStore>,
    hub: HubHandle,
}

impl SavePipeline {
    pub fn new(store: Arc<NoteStore>, hub: HubHandle) -> Self {
        Self { store, hub }
    }

    /// Save a note and, on an accepted content change, notify every live
    /// subscriber of that path with the stored (normalized) content.
    pub async fn save(&self, path: &str, content: &str) -> StoreResult<SaveOutcome> {
        let outcome = self.store.save(path, content)?;
        if outcome == SaveOutcome::Saved {
            let stored = normalize(content);
            if let Err(err) = self
                .hub
                .publish(path, Bytes::copy_from_slice(stored.as_bytes()))
                .await
            {
                // The write is already durable; a dead hub only costs the
                // live notification.
                warn!(path, error = %err, "live update dropped");
            }
        }
        Ok(outcome)
    }
}
