//! User events distributor.
//!
//! Consumes the broad project event stream as one member of a queue group
//! and republishes every event to the personal subject of each affected
//! user. Running several distributors with the same group splits the stream
//! between them instead of duplicating work.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{BusError, EventBus};
use crate::events::{Event, SubjectScheme};

/// Errors that end a distributor run.
#[derive(Debug, thiserror::Error)]
pub enum DistributorError {
    #[error("Distributor already started (state: {0})")]
    AlreadyStarted(DistributorState),

    #[error("Distributor subscription failed: {0}")]
    Subscribe(#[source] BusError),
}

/// Lifecycle of a distributor. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributorState {
    Idle,
    Running,
    Stopped,
}

impl DistributorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DistributorState::Idle,
            1 => DistributorState::Running,
            _ => DistributorState::Stopped,
        }
    }
}

impl fmt::Display for DistributorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistributorState::Idle => "idle",
            DistributorState::Running => "running",
            DistributorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Fans project events out to per-user subjects.
pub struct UserEventsDistributor {
    group: String,
    pattern: String,
    subjects: SubjectScheme,
    bus: Arc<dyn EventBus>,
    state: AtomicU8,
}

impl UserEventsDistributor {
    /// Distributor consuming every project event of the scheme's service.
    pub fn new(group: impl Into<String>, subjects: SubjectScheme, bus: Arc<dyn EventBus>) -> Self {
        let pattern = subjects.project_pattern();
        Self {
            group: group.into(),
            pattern,
            subjects,
            bus,
            state: AtomicU8::new(DistributorState::Idle as u8),
        }
    }

    /// Narrow or widen the consumed pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn state(&self) -> DistributorState {
        DistributorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: DistributorState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Consume events until the stream ends or `cancel` fires.
    ///
    /// A distributor runs once; calling `run` again fails with
    /// `AlreadyStarted`.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), DistributorError> {
        if let Err(current) = self.state.compare_exchange(
            DistributorState::Idle as u8,
            DistributorState::Running as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            return Err(DistributorError::AlreadyStarted(DistributorState::from_u8(
                current,
            )));
        }

        let mut events = match self
            .bus
            .subscribe_group(&self.pattern, &self.group, cancel.child_token())
            .await
        {
            Ok(events) => events,
            Err(e) => {
                error!(pattern = %self.pattern, group = %self.group, error = %e, "Distributor subscribe failed");
                self.set_state(DistributorState::Stopped);
                return Err(DistributorError::Subscribe(e));
            }
        };

        info!(pattern = %self.pattern, group = %self.group, "User events distributor started");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                next = events.next() => match next {
                    Some(event) => event,
                    None => {
                        debug!("Project event stream ended");
                        break;
                    }
                },
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.distribute(&event) => {}
            }
        }

        self.set_state(DistributorState::Stopped);
        info!(group = %self.group, "User events distributor stopped");
        Ok(())
    }

    /// Publish one copy of `event` per affected user.
    ///
    /// Failures are isolated per user.
    pub async fn distribute(&self, event: &Event) {
        let users = event.project.affected_users();

        for user_id in &users {
            let subject = self.subjects.user_events_subject(event.event_type, user_id);
            if let Err(e) = self.bus.publish(&subject, event).await {
                warn!(
                    subject = %subject,
                    event_id = %event.id,
                    error = %e,
                    "Failed to publish user event"
                );
            }
        }

        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            project_id = %event.project.id,
            users = users.len(),
            "Distributed project event"
        );
    }
}
