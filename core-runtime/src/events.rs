//! # Event Bus System
//!
//! Broadcasts decoder lifecycle events using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **DecoderEvent**: typed lifecycle notifications, one per listener callback
//! - **EventBus**: central broadcast channel for publishing events
//! - **EventStream**: wrapper for consuming events with filtering
//!
//! Pipelines publish through an event-bus listener adapter; hosts subscribe
//! without implementing the listener protocol themselves.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     emit      ┌───────────┐
//! │ Pipeline A ├──────────────>│           │     subscribe    ┌────────────┐
//! └────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//! ┌────────────┐     emit      │ (broadcast│                  └────────────┘
//! │ Pipeline B ├──────────────>│  channel) │
//! └────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{DecoderEvent, EventBus, EventStream};
//!
//! let bus = EventBus::new(16);
//! let mut finished = EventStream::new(bus.subscribe())
//!     .filter(|event| matches!(event, DecoderEvent::Finished { .. }));
//!
//! bus.emit(DecoderEvent::Paused { pipeline_id: "p-1".into() }).ok();
//! bus.emit(DecoderEvent::Finished { pipeline_id: "p-1".into() }).ok();
//!
//! let event = finished.try_recv().unwrap().unwrap();
//! assert_eq!(event.pipeline_id(), "p-1");
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal.
//! - **`RecvError::Closed`**: all senders dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns `SendError`; publishers ignore it.
//!
//! ## Thread Safety
//!
//! `EventBus` is `Send + Sync` and cheap to clone; clones share one channel.
//! Pipeline workers emit from their own threads.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Decoder Events
// ============================================================================

/// Lifecycle notifications published by decode pipelines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DecoderEvent {
    /// Initialization completed and the worker entered its loop.
    Prepared { pipeline_id: String },
    /// Initialization failed; the pipeline never started.
    Error {
        pipeline_id: String,
        /// Error classification (e.g. `invalid_input`).
        kind: String,
        message: String,
    },
    /// Decoding resumed.
    Running { pipeline_id: String },
    /// The worker parked in the paused state.
    Paused { pipeline_id: String },
    /// End of stream reached.
    Finished { pipeline_id: String },
    /// Teardown completed.
    Destroyed {
        pipeline_id: String,
        frames_rendered: u64,
        /// Non-fatal teardown issues.
        issues: Vec<String>,
    },
    /// A state transition.
    StateChanged {
        pipeline_id: String,
        from: String,
        to: String,
    },
}

impl DecoderEvent {
    /// Id of the pipeline that published the event.
    pub fn pipeline_id(&self) -> &str {
        match self {
            DecoderEvent::Prepared { pipeline_id, .. }
            | DecoderEvent::Error { pipeline_id, .. }
            | DecoderEvent::Running { pipeline_id }
            | DecoderEvent::Paused { pipeline_id }
            | DecoderEvent::Finished { pipeline_id }
            | DecoderEvent::Destroyed { pipeline_id, .. }
            | DecoderEvent::StateChanged { pipeline_id, .. } => pipeline_id,
        }
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            DecoderEvent::Prepared { .. } => "Decoder prepared",
            DecoderEvent::Error { .. } => "Decoder initialization failed",
            DecoderEvent::Running { .. } => "Decoding resumed",
            DecoderEvent::Paused { .. } => "Decoding paused",
            DecoderEvent::Finished { .. } => "End of stream reached",
            DecoderEvent::Destroyed { .. } => "Decoder destroyed",
            DecoderEvent::StateChanged { .. } => "Decoder state changed",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            DecoderEvent::Error { .. } => EventSeverity::Error,
            DecoderEvent::Destroyed { issues, .. } if !issues.is_empty() => {
                EventSeverity::Warning
            }
            DecoderEvent::Prepared { .. }
            | DecoderEvent::Finished { .. }
            | DecoderEvent::Destroyed { .. } => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel for [`DecoderEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DecoderEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers falling behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: DecoderEvent) -> Result<usize, SendError<DecoderEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<DecoderEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&DecoderEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
pub struct EventStream {
    receiver: Receiver<DecoderEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<DecoderEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`/`try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&DecoderEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Keep only events published by `pipeline_id`.
    pub fn for_pipeline(self, pipeline_id: impl Into<String>) -> Self {
        let pipeline_id = pipeline_id.into();
        self.filter(move |event| event.pipeline_id() == pipeline_id)
    }

    fn matches(&self, event: &DecoderEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<DecoderEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Receives the next matching event, blocking the current thread.
    ///
    /// For hosts that consume events outside an async runtime. Must not be
    /// called from within one.
    pub fn blocking_recv(&mut self) -> Result<DecoderEvent, RecvError> {
        loop {
            let event = self.receiver.blocking_recv()?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<DecoderEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn paused(id: &str) -> DecoderEvent {
        DecoderEvent::Paused {
            pipeline_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.clone().subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::default();
        assert!(bus.emit(paused("p-1")).is_err());
    }

    #[tokio::test]
    async fn test_event_emission_with_subscribers() {
        let bus = EventBus::new(10);
        let mut sub = bus.subscribe();

        let event = DecoderEvent::Prepared {
            pipeline_id: "p-1".to_string(),
        };
        assert_eq!(bus.emit(event.clone()).unwrap(), 1);
        assert_eq!(sub.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, DecoderEvent::Finished { .. }));

        bus.emit(paused("p-1")).ok();
        let finished = DecoderEvent::Finished {
            pipeline_id: "p-1".to_string(),
        };
        bus.emit(finished.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), finished);
    }

    #[test]
    fn test_event_stream_for_pipeline() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).for_pipeline("p-2");

        bus.emit(paused("p-1")).ok();
        bus.emit(paused("p-2")).ok();

        assert_eq!(stream.try_recv().unwrap().unwrap(), paused("p-2"));
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for i in 0..5 {
            bus.emit(paused(&format!("p-{}", i))).ok();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(_)))));
    }

    #[test]
    fn test_event_severity() {
        let error = DecoderEvent::Error {
            pipeline_id: "p-1".to_string(),
            kind: "invalid_input".to_string(),
            message: "path is empty".to_string(),
        };
        assert_eq!(error.severity(), EventSeverity::Error);

        let clean = DecoderEvent::Destroyed {
            pipeline_id: "p-1".to_string(),
            frames_rendered: 3,
            issues: vec![],
        };
        assert_eq!(clean.severity(), EventSeverity::Info);

        let noisy = DecoderEvent::Destroyed {
            pipeline_id: "p-1".to_string(),
            frames_rendered: 3,
            issues: vec!["engine already stopped".to_string()],
        };
        assert_eq!(noisy.severity(), EventSeverity::Warning);
        assert_eq!(paused("p-1").severity(), EventSeverity::Debug);
        assert!(EventSeverity::Error > EventSeverity::Warning);
    }

    #[test]
    fn test_event_serialization() {
        let event = DecoderEvent::StateChanged {
            pipeline_id: "p-1".to_string(),
            from: "pause".to_string(),
            to: "decoding".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"StateChanged\""));

        let parsed: DecoderEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.description(), "Decoder state changed");
    }
}
