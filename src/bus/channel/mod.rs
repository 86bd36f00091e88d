//! In-memory channel-based event bus for standalone mode.
//!
//! Every subscription owns a bounded tokio mpsc channel. Publishing collects
//! the matching senders under the registry read lock, releases it, then
//! awaits each send, so a slow subscriber back-pressures the publisher
//! without blocking registration. Queue groups are served round-robin.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{BusError, EventBus, EventStream, Result};
use crate::config::DEFAULT_CHANNEL_CAPACITY;
use crate::events::{subject_matches, Event};

/// One live subscription.
struct Registration {
    id: u64,
    group: Option<String>,
    sender: mpsc::Sender<Event>,
    cancel: CancellationToken,
}

/// Subscriptions keyed by the subject or pattern they were made with.
#[derive(Default)]
struct Registry {
    subscriptions: HashMap<String, Vec<Registration>>,
    /// Round-robin cursor per pattern, then per group.
    cursors: HashMap<String, HashMap<String, AtomicUsize>>,
}

impl Registry {
    /// Delivery targets for one published subject.
    fn targets(&self, subject: &str) -> Vec<(mpsc::Sender<Event>, CancellationToken)> {
        let mut targets = Vec::new();

        for (pattern, registrations) in &self.subscriptions {
            if !subject_matches(pattern, subject) {
                continue;
            }

            let mut groups: BTreeMap<&str, Vec<&Registration>> = BTreeMap::new();
            for registration in registrations {
                match &registration.group {
                    None => targets.push(registration.target()),
                    Some(group) => groups.entry(group.as_str()).or_default().push(registration),
                }
            }

            for (group, members) in groups {
                let turn = self
                    .cursors
                    .get(pattern)
                    .and_then(|groups| groups.get(group))
                    .map(|cursor| cursor.fetch_add(1, Ordering::Relaxed))
                    .unwrap_or(0);
                targets.push(members[turn % members.len()].target());
            }
        }

        targets
    }

    fn remove(&mut self, pattern: &str, id: u64) {
        let Some(registrations) = self.subscriptions.get_mut(pattern) else {
            return;
        };
        let Some(index) = registrations.iter().position(|r| r.id == id) else {
            return;
        };
        let removed = registrations.swap_remove(index);

        if let Some(group) = removed.group {
            let group_empty = !registrations
                .iter()
                .any(|r| r.group.as_deref() == Some(group.as_str()));
            if group_empty {
                if let Some(groups) = self.cursors.get_mut(pattern) {
                    groups.remove(&group);
                    if groups.is_empty() {
                        self.cursors.remove(pattern);
                    }
                }
            }
        }

        if registrations.is_empty() {
            self.subscriptions.remove(pattern);
        }
    }
}

impl Registration {
    fn target(&self) -> (mpsc::Sender<Event>, CancellationToken) {
        (self.sender.clone(), self.cancel.clone())
    }
}

struct Inner {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
    capacity: usize,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

/// In-process event bus over bounded mpsc channels.
///
/// Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct ChannelEventBus {
    inner: Arc<Inner>,
}

impl ChannelEventBus {
    /// Create a bus with the default per-subscriber capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus buffering `capacity` events per subscriber (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(Registry::default()),
                next_id: AtomicU64::new(0),
                capacity: capacity.max(1),
                closed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Number of live subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.inner
            .registry
            .read()
            .await
            .subscriptions
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Number of live subscriptions whose subject or pattern matches
    /// `subject`.
    pub async fn subscriber_count_for(&self, subject: &str) -> usize {
        self.inner
            .registry
            .read()
            .await
            .subscriptions
            .iter()
            .filter(|(pattern, _)| subject_matches(pattern, subject))
            .map(|(_, registrations)| registrations.len())
            .sum()
    }

    /// Close the bus: every stream ends and later calls fail with `Closed`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.shutdown.cancel();
        info!("Channel event bus closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        Ok(())
    }

    async fn register(
        &self,
        pattern: &str,
        group: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<EventStream> {
        self.ensure_open()?;

        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut registry = self.inner.registry.write().await;
            if let Some(group) = group {
                registry
                    .cursors
                    .entry(pattern.to_string())
                    .or_default()
                    .entry(group.to_string())
                    .or_default();
            }
            registry
                .subscriptions
                .entry(pattern.to_string())
                .or_default()
                .push(Registration {
                    id,
                    group: group.map(str::to_string),
                    sender: sender.clone(),
                    cancel: cancel.clone(),
                });
        }

        debug!(pattern = %pattern, group = ?group, id, "Subscription registered");

        // Release the registration once the subscriber cancels, drops its
        // stream or the bus closes.
        let inner = Arc::clone(&self.inner);
        let watched = cancel.clone();
        let pattern_owned = pattern.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = watched.cancelled() => {}
                _ = sender.closed() => {}
                _ = inner.shutdown.cancelled() => {}
            }
            inner.registry.write().await.remove(&pattern_owned, id);
            debug!(pattern = %pattern_owned, id, "Subscription released");
        });

        let stream = ReceiverStream::new(receiver).take_until(cancel.cancelled_owned());
        Ok(Box::pin(stream))
    }
}

impl Default for ChannelEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for ChannelEventBus {
    #[tracing::instrument(name = "bus.publish", skip_all, fields(subject = %subject))]
    async fn publish(&self, subject: &str, event: &Event) -> Result<()> {
        self.ensure_open()?;

        // Lock is released before any send is awaited
        let targets = self.inner.registry.read().await.targets(subject);
        let receivers = targets.len();

        for (sender, cancel) in targets {
            tokio::select! {
                result = sender.send(event.clone()) => {
                    if result.is_err() {
                        debug!(subject = %subject, "Subscriber went away before delivery");
                    }
                }
                _ = cancel.cancelled() => {
                    debug!(subject = %subject, "Subscriber cancelled before delivery");
                }
            }
        }

        debug!(
            subject = %subject,
            event_id = %event.id,
            receivers,
            "Published event to channel"
        );

        Ok(())
    }

    async fn subscribe(&self, subject: &str, cancel: CancellationToken) -> Result<EventStream> {
        self.register(subject, None, cancel).await
    }

    async fn subscribe_group(
        &self,
        pattern: &str,
        group: &str,
        cancel: CancellationToken,
    ) -> Result<EventStream> {
        self.register(pattern, Some(group), cancel).await
    }
}
