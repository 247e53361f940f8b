//! Per-pipeline map from channel name to channel.

use super::Channel;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    by_name: HashMap<String, Arc<Channel>>,
    // Names in first-reference order, for deterministic listings.
    order: Vec<String>,
}

/// Owns every channel of one pipeline instance.
///
/// A name resolves to the same [`Channel`] for the registry's whole
/// lifetime. All access goes through one mutex because facade calls may
/// race registration and running stages.
#[derive(Debug)]
pub struct ChannelRegistry {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl ChannelRegistry {
    /// Creates an empty registry whose channels hold `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Returns the capacity applied to new channels.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the channel bound to `name`, creating it if needed.
    pub fn get_or_create(&self, name: &str) -> Arc<Channel> {
        let mut inner = self.inner.lock();
        if let Some(channel) = inner.by_name.get(name) {
            return channel.clone();
        }

        debug!(channel = %name, capacity = self.capacity, "Creating channel");
        let channel = Arc::new(Channel::new(name, self.capacity));
        inner.by_name.insert(name.to_string(), channel.clone());
        inner.order.push(name.to_string());
        channel
    }

    /// Returns the channel bound to `name` without creating one.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<Channel>> {
        self.inner.lock().by_name.get(name).cloned()
    }

    /// Binds `alias` to the channel already bound to `existing`.
    ///
    /// Returns `false` if `existing` is unknown or `alias` is already bound
    /// to a different channel.
    pub fn alias(&self, alias: &str, existing: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(target) = inner.by_name.get(existing).cloned() else {
            return false;
        };
        match inner.by_name.get(alias) {
            Some(bound) => Arc::ptr_eq(bound, &target),
            None => {
                inner.by_name.insert(alias.to_string(), target);
                inner.order.push(alias.to_string());
                true
            }
        }
    }

    /// Returns all bound names in first-reference order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.inner.lock().order.clone()
    }

    /// Returns each distinct channel once, in first-reference order.
    ///
    /// Channels bound under several names appear under their first name.
    #[must_use]
    pub fn unique_channels(&self) -> Vec<Arc<Channel>> {
        let inner = self.inner.lock();
        let mut unique: Vec<Arc<Channel>> = Vec::with_capacity(inner.order.len());
        for name in &inner.order {
            if let Some(channel) = inner.by_name.get(name) {
                if !unique.iter().any(|seen| Arc::ptr_eq(seen, channel)) {
                    unique.push(channel.clone());
                }
            }
        }
        unique
    }

    /// Returns the number of bound names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    /// Returns true if no channel exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
