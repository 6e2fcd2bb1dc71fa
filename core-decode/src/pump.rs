//! # Buffer Pump
//!
//! Moves samples from a [`SampleSource`] into engine input slots and decoded
//! units out of engine output slots. Every engine wait is bounded by the
//! configured dequeue timeouts, so one input step plus one output step never
//! blocks longer than their sum.
//!
//! The pump owns the end-of-stream flag it reports and its cached pool
//! handles. It is driven only from the pipeline worker.

use bridge_traits::{
    BufferFlags, BufferPool, DecodingEngine, EngineError, FrameBufferDescriptor, OutputStatus,
    SampleSource,
};
use std::time::Duration;
use tracing::{debug, trace};

/// Slot exchange between a sample source, an engine and a renderer.
#[derive(Debug)]
pub struct BufferPump {
    input_pool: BufferPool,
    output_pool: BufferPool,
    end_of_stream: bool,
    input_timeout: Duration,
    output_timeout: Duration,
}

impl BufferPump {
    pub fn new(input_timeout: Duration, output_timeout: Duration) -> Self {
        Self {
            input_pool: BufferPool::empty(),
            output_pool: BufferPool::empty(),
            end_of_stream: false,
            input_timeout,
            output_timeout,
        }
    }

    /// Capture the pools of a started engine.
    pub fn attach(&mut self, engine: &dyn DecodingEngine) {
        self.input_pool = engine.input_buffers();
        self.output_pool = engine.output_buffers();
        debug!(
            inputs = self.input_pool.len(),
            outputs = self.output_pool.len(),
            "Buffer pools captured"
        );
    }

    /// Whether pools have been captured.
    pub fn is_attached(&self) -> bool {
        !self.input_pool.is_empty()
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    pub fn clear_end_of_stream(&mut self) {
        self.end_of_stream = false;
    }

    /// Generation of the cached output pool.
    pub fn output_generation(&self) -> u64 {
        self.output_pool.generation()
    }

    /// Input step: feed one sample into the engine.
    ///
    /// Returns `true` once the source is exhausted and the end-of-stream
    /// buffer has been queued. No free slot within the timeout is a no-op.
    pub fn push_input(
        &mut self,
        engine: &mut dyn DecodingEngine,
        source: &mut dyn SampleSource,
    ) -> Result<bool, EngineError> {
        let Some(slot) = engine.dequeue_input_slot(self.input_timeout)? else {
            return Ok(false);
        };

        let read = {
            let mut buffer = self
                .input_pool
                .slot(slot)
                .ok_or(EngineError::InvalidSlot(slot))?;
            source.read_sample(&mut buffer)
        };

        match read {
            Some(size) => {
                let pts = source.current_timestamp();
                trace!(%slot, size, pts, "Sample queued");
                engine.queue_input(slot, size, pts, BufferFlags::NONE)?;
                Ok(false)
            }
            None => {
                debug!(%slot, "Source exhausted, queuing end of stream");
                engine.queue_input(slot, 0, 0, BufferFlags::END_OF_STREAM)?;
                self.end_of_stream = true;
                Ok(true)
            }
        }
    }

    /// Output step: poll the engine for one decoded unit.
    pub fn pull_output(
        &mut self,
        engine: &mut dyn DecodingEngine,
    ) -> Result<Option<FrameBufferDescriptor>, EngineError> {
        match engine.dequeue_output_slot(self.output_timeout)? {
            OutputStatus::Ready(info) => Ok(Some(info)),
            OutputStatus::TryAgainLater => Ok(None),
            OutputStatus::FormatChanged => {
                debug!("Engine output format changed");
                Ok(None)
            }
            OutputStatus::BuffersChanged => {
                self.output_pool = engine.output_buffers();
                debug!(
                    generation = self.output_pool.generation(),
                    "Output buffers refreshed"
                );
                Ok(None)
            }
            OutputStatus::Other(code) => {
                trace!(code, "Ignoring engine output status");
                Ok(None)
            }
        }
    }

    /// Run `f` over the valid bytes of the output slot described by `info`.
    ///
    /// A slot missing from the cached pool yields an empty slice.
    pub fn with_output<R>(
        &self,
        info: &FrameBufferDescriptor,
        f: impl FnOnce(&[u8]) -> R,
    ) -> R {
        match self.output_pool.slot(info.slot) {
            Some(slot) => {
                let range = info.range();
                let data = slot.get(range).unwrap_or(&[]);
                f(data)
            }
            None => f(&[]),
        }
    }

    /// Discard everything in flight and forget end of stream.
    pub fn flush(&mut self, engine: &mut dyn DecodingEngine) -> Result<(), EngineError> {
        self.end_of_stream = false;
        engine.flush()
    }
}
