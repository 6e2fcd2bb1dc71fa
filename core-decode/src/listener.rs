//! # State Listener Protocol
//!
//! Hosts observe pipelines through [`StateListener`]. Callbacks run on the
//! thread that caused them (the worker for `on_prepare`, `on_pause`,
//! `on_finish` and `on_destroy`; the caller for `on_error` and for
//! `on_running` after a direct resume) and never while the state lock is held,
//! so a listener may call back into the pipeline handle.
//!
//! ## Delivery Guarantees
//!
//! - `on_prepare`: once, when the worker enters its loop
//! - `on_error`: once per failed initialization; no other callback follows
//! - `on_running`: each time decoding (re)starts from a non-running state
//! - `on_pause`: each time the worker parks in `Pause`
//! - `on_finish`: once per pipeline lifetime
//! - `on_destroy`: once, after teardown

use crate::config::PipelineId;
use crate::error::{InitError, ShutdownReport};
use crate::state::DecodeState;
use core_runtime::config::DecoderSettings;
use core_runtime::events::{DecoderEvent, EventBus};
use tracing::trace;

/// Observer of pipeline lifecycle events.
///
/// Every method has an empty default so implementors override only what they
/// need.
pub trait StateListener: Send + Sync {
    fn on_prepare(&self, _id: PipelineId) {}

    fn on_error(&self, _id: PipelineId, _error: &InitError) {}

    fn on_running(&self, _id: PipelineId) {}

    fn on_pause(&self, _id: PipelineId) {}

    fn on_finish(&self, _id: PipelineId) {}

    fn on_destroy(&self, _id: PipelineId, _report: &ShutdownReport) {}

    /// Every state change, in order.
    fn on_transition(&self, _id: PipelineId, _from: DecodeState, _to: DecodeState) {}
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl StateListener for NoopListener {}

/// Publishes listener callbacks as [`DecoderEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBusListener {
    bus: EventBus,
}

impl EventBusListener {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// A listener over a new bus sized by `settings.event_buffer_size`.
    pub fn from_settings(settings: &DecoderSettings) -> Self {
        Self::new(EventBus::new(settings.event_buffer_size))
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn publish(&self, event: DecoderEvent) {
        // No subscribers is not an error for the pipeline.
        if self.bus.emit(event).is_err() {
            trace!("No event subscribers");
        }
    }
}

impl StateListener for EventBusListener {
    fn on_prepare(&self, id: PipelineId) {
        self.publish(DecoderEvent::Prepared {
            pipeline_id: id.to_string(),
        });
    }

    fn on_error(&self, id: PipelineId, error: &InitError) {
        self.publish(DecoderEvent::Error {
            pipeline_id: id.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    fn on_running(&self, id: PipelineId) {
        self.publish(DecoderEvent::Running {
            pipeline_id: id.to_string(),
        });
    }

    fn on_pause(&self, id: PipelineId) {
        self.publish(DecoderEvent::Paused {
            pipeline_id: id.to_string(),
        });
    }

    fn on_finish(&self, id: PipelineId) {
        self.publish(DecoderEvent::Finished {
            pipeline_id: id.to_string(),
        });
    }

    fn on_destroy(&self, id: PipelineId, report: &ShutdownReport) {
        self.publish(DecoderEvent::Destroyed {
            pipeline_id: id.to_string(),
            frames_rendered: report.frames_rendered,
            issues: report.issues.iter().map(ToString::to_string).collect(),
        });
    }

    fn on_transition(&self, id: PipelineId, from: DecodeState, to: DecodeState) {
        self.publish(DecoderEvent::StateChanged {
            pipeline_id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShutdownIssue;

    #[test]
    fn test_bus_sized_from_settings() {
        let settings = DecoderSettings {
            event_buffer_size: 2,
            ..Default::default()
        };
        let listener = EventBusListener::from_settings(&settings);
        let mut receiver = listener.bus().subscribe();
        let id = PipelineId::new();

        listener.on_prepare(id);
        listener.on_pause(id);
        listener.on_running(id);

        // The oldest event fell out of the two-slot buffer.
        assert!(receiver.try_recv().is_err());
        assert_eq!(
            receiver.try_recv().unwrap(),
            DecoderEvent::Paused {
                pipeline_id: id.to_string()
            }
        );
    }

    #[test]
    fn test_event_bus_listener_publishes() {
        let bus = EventBus::new(16);
        let mut receiver = bus.subscribe();
        let listener = EventBusListener::new(bus);
        let id = PipelineId::new();

        listener.on_prepare(id);
        listener.on_transition(id, DecodeState::Start, DecodeState::Pause);
        listener.on_error(id, &InitError::InvalidInput("empty path".into()));
        listener.on_destroy(
            id,
            &ShutdownReport {
                issues: vec![ShutdownIssue::EngineAlreadyStopped("twice".into())],
                frames_rendered: 3,
                finished: true,
            },
        );

        assert_eq!(
            receiver.try_recv().unwrap(),
            DecoderEvent::Prepared {
                pipeline_id: id.to_string()
            }
        );
        assert_eq!(
            receiver.try_recv().unwrap(),
            DecoderEvent::StateChanged {
                pipeline_id: id.to_string(),
                from: "start".into(),
                to: "pause".into(),
            }
        );
        match receiver.try_recv().unwrap() {
            DecoderEvent::Error { kind, .. } => assert_eq!(kind, "invalid_input"),
            other => panic!("unexpected event: {other:?}"),
        }
        match receiver.try_recv().unwrap() {
            DecoderEvent::Destroyed {
                frames_rendered,
                issues,
                ..
            } => {
                assert_eq!(frames_rendered, 3);
                assert_eq!(issues, vec!["engine already stopped: twice".to_string()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_listener_without_subscribers() {
        let listener = EventBusListener::new(EventBus::new(4));
        listener.on_finish(PipelineId::new());
        NoopListener.on_finish(PipelineId::new());
    }
}
