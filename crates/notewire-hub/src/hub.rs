//! The broadcast hub: a single coordinating loop that tracks live
//! subscribers grouped by note path and fans out content updates.
//!
//! All registration, unregistration, and publish operations are submitted as
//! commands on one channel and processed one at a time, so the registry
//! needs no lock and events for a given path are observed in the global
//! order they were submitted.
//!
//! Delivery is non-blocking: a subscriber whose outbound queue is full (a
//! slow or stalled consumer) is evicted on the spot rather than stalling the
//! broadcast for anyone else. Eviction is invisible to the publisher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{HubError, HubResult};

/// Tuning knobs for a hub instance.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Capacity of the command channel feeding the loop. Submission awaits
    /// capacity but can never deadlock against the loop itself.
    pub command_capacity: usize,
    /// Capacity of each subscriber's outbound queue. A publish that finds
    /// this queue full evicts the subscriber.
    pub subscriber_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_capacity: 128,
            subscriber_capacity: 32,
        }
    }
}

enum Command {
    Register {
        id: u64,
        path: String,
        sender: mpsc::Sender<Bytes>,
    },
    Unregister {
        id: u64,
    },
    Publish {
        path: String,
        content: Bytes,
    },
    SubscriberCount {
        path: String,
        reply: oneshot::Sender<usize>,
    },
}

/// The broadcast hub. [`Hub::spawn`] starts the loop and hands back a
/// cloneable [`HubHandle`]; the loop exits when every handle is dropped.
pub struct Hub;

impl Hub {
    /// Start the hub loop on the current tokio runtime.
    pub fn spawn(config: HubConfig) -> HubHandle {
        let (tx, rx) = mpsc::channel(config.command_capacity);
        tokio::spawn(run(rx));
        HubHandle {
            commands: tx,
            next_id: Arc::new(AtomicU64::new(0)),
            subscriber_capacity: config.subscriber_capacity,
        }
    }
}

/// Cloneable handle for submitting commands to the hub loop.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<Command>,
    next_id: Arc<AtomicU64>,
    subscriber_capacity: usize,
}

impl HubHandle {
    /// Register a new subscriber for `path`.
    ///
    /// The returned [`Subscription`] receives every publish for that path
    /// (and only that path) until it is dropped or evicted.
    pub async fn subscribe(&self, path: &str) -> HubResult<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.subscriber_capacity);
        self.commands
            .send(Command::Register {
                id,
                path: path.to_string(),
                sender,
            })
            .await
            .map_err(|_| HubError::Closed)?;
        Ok(Subscription {
            id,
            receiver,
            commands: self.commands.clone(),
        })
    }

    /// Fan a content update out to every current subscriber of `path`.
    ///
    /// Never reports delivery errors: a slow subscriber's eviction is not
    /// the publisher's business.
    pub async fn publish(&self, path: &str, content: Bytes) -> HubResult<()> {
        self.commands
            .send(Command::Publish {
                path: path.to_string(),
                content,
            })
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Number of live subscribers for `path`, as seen by the loop.
    pub async fn subscriber_count(&self, path: &str) -> HubResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SubscriberCount {
                path: path.to_string(),
                reply,
            })
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

/// A live subscriber registered for exactly one note path.
///
/// Unregisters itself when dropped (connection-lifetime cancellation).
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<Bytes>,
    commands: mpsc::Sender<Command>,
}

impl Subscription {
    /// Wait for the next pushed content update. `None` means the hub evicted
    /// this subscriber or shut down.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Best effort: if the command channel is full the closed sender is
        // reaped on the next publish instead.
        let _ = self.commands.try_send(Command::Unregister { id: self.id });
    }
}

/// Registry owned exclusively by the loop.
#[derive(Default)]
struct Registry {
    /// Subscribers grouped by note path.
    paths: HashMap<String, HashMap<u64, mpsc::Sender<Bytes>>>,
    /// Which path each subscriber id belongs to.
    ids: HashMap<u64, String>,
}

impl Registry {
    fn register(&mut self, id: u64, path: String, sender: mpsc::Sender<Bytes>) {
        trace!(id, %path, "subscriber registered");
        self.paths.entry(path.clone()).or_default().insert(id, sender);
        self.ids.insert(id, path);
    }

    fn unregister(&mut self, id: u64) {
        let Some(path) = self.ids.remove(&id) else {
            return;
        };
        trace!(id, %path, "subscriber unregistered");
        if let Some(subs) = self.paths.get_mut(&path) {
            subs.remove(&id);
            if subs.is_empty() {
                self.paths.remove(&path);
            }
        }
    }

    fn publish(&mut self, path: &str, content: Bytes) {
        let Some(subs) = self.paths.get_mut(path) else {
            return;
        };
        let ids = &mut self.ids;
        subs.retain(|id, sender| match sender.try_send(content.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(id, path, "subscriber too slow, evicting");
                ids.remove(id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(id, path, "subscriber gone, evicting");
                ids.remove(id);
                false
            }
        });
        if subs.is_empty() {
            self.paths.remove(path);
        }
    }

    fn count(&self, path: &str) -> usize {
        self.paths.get(path).map_or(0, HashMap::len)
    }
}

async fn run(mut commands: mpsc::Receiver<Command>) {
    let mut registry = Registry::default();
    while let Some(command) = commands.recv().await {
        match command {
            Command::Register { id, path, sender } => registry.register(id, path, sender),
            Command::Unregister { id } => registry.unregister(id),
            Command::Publish { path, content } => registry.publish(&path, content),
            Command::SubscriberCount { path, reply } => {
                let _ = reply.send(registry.count(&path));
            }
        }
    }
    debug!("hub loop stopped");
}
