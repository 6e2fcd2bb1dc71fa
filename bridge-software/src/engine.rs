//! Pass-through decoding engine.
//!
//! Implements the slot exchange protocol without decompressing anything: each
//! queued input sample is copied verbatim into a free output slot. Useful for
//! driving pipelines end to end where the payload content is irrelevant.

use bridge_traits::{
    engine::{
        BufferFlags, BufferPool, DecodingEngine, EngineError, EngineFactory,
        FrameBufferDescriptor, OutputStatus, SlotIndex,
    },
    media::FormatDescriptor,
};
use std::collections::{HashSet, VecDeque};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Pool sizing and signalling behaviour of a [`PassthroughEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassthroughConfig {
    pub input_slots: usize,
    pub output_slots: usize,
    pub slot_capacity: usize,
    /// Report `FormatChanged` once before the first decoded buffer.
    pub announce_format: bool,
    /// Reallocate the output pool (reporting `BuffersChanged`) after this many
    /// decoded buffers.
    pub reallocate_outputs_after: Option<u64>,
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            input_slots: 4,
            output_slots: 4,
            slot_capacity: 64 * 1024,
            announce_format: true,
            reallocate_outputs_after: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct QueuedInput {
    slot: SlotIndex,
    size: usize,
    presentation_time_us: i64,
    flags: BufferFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Configured,
    Started,
    Stopped,
    Released,
}

/// Engine copying input samples to output slots.
pub struct PassthroughEngine {
    mime: String,
    config: PassthroughConfig,
    lifecycle: Lifecycle,
    inputs: BufferPool,
    outputs: BufferPool,
    free_inputs: VecDeque<SlotIndex>,
    free_outputs: VecDeque<SlotIndex>,
    queued: VecDeque<QueuedInput>,
    format_pending: bool,
    decoded: u64,
    reallocated: bool,
}

impl PassthroughEngine {
    pub fn new(mime: impl Into<String>, config: PassthroughConfig) -> Self {
        Self {
            mime: mime.into(),
            config,
            lifecycle: Lifecycle::Created,
            inputs: BufferPool::empty(),
            outputs: BufferPool::empty(),
            free_inputs: VecDeque::new(),
            free_outputs: VecDeque::new(),
            queued: VecDeque::new(),
            format_pending: false,
            decoded: 0,
            reallocated: false,
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    fn require_started(&self, operation: &str) -> Result<(), EngineError> {
        if self.lifecycle == Lifecycle::Started {
            Ok(())
        } else {
            Err(EngineError::IllegalState(format!(
                "{operation} called in {:?} state",
                self.lifecycle
            )))
        }
    }

    fn all_slots(count: usize) -> VecDeque<SlotIndex> {
        (0..count).map(SlotIndex).collect()
    }

    fn reset_slots(&mut self) {
        self.free_inputs = Self::all_slots(self.inputs.len());
        self.free_outputs = Self::all_slots(self.outputs.len());
        self.queued.clear();
    }

    fn due_for_reallocation(&self) -> bool {
        !self.reallocated
            && self
                .config
                .reallocate_outputs_after
                .is_some_and(|after| self.decoded >= after)
    }

    fn copy_to_output(&mut self, input: QueuedInput, output: SlotIndex) -> Result<(), EngineError> {
        let source = self
            .inputs
            .slot(input.slot)
            .ok_or(EngineError::InvalidSlot(input.slot))?;
        let mut target = self
            .outputs
            .slot(output)
            .ok_or(EngineError::InvalidSlot(output))?;
        target.clear();
        target.extend_from_slice(&source[..input.size.min(source.len())]);
        Ok(())
    }
}

impl DecodingEngine for PassthroughEngine {
    fn configure(&mut self, format: &FormatDescriptor) -> Result<(), EngineError> {
        if self.lifecycle != Lifecycle::Created && self.lifecycle != Lifecycle::Configured {
            return Err(EngineError::IllegalState(format!(
                "configure called in {:?} state",
                self.lifecycle
            )));
        }
        if format.mime != self.mime {
            return Err(EngineError::Configuration(format!(
                "engine created for {} cannot decode {}",
                self.mime, format.mime
            )));
        }
        self.lifecycle = Lifecycle::Configured;
        debug!(mime = %self.mime, "Pass-through engine configured");
        Ok(())
    }

    fn start(&mut self) -> Result<(), EngineError> {
        if self.lifecycle != Lifecycle::Configured {
            return Err(EngineError::IllegalState(format!(
                "start called in {:?} state",
                self.lifecycle
            )));
        }
        self.inputs = BufferPool::new(1, self.config.input_slots, self.config.slot_capacity);
        self.outputs = BufferPool::new(1, self.config.output_slots, self.config.slot_capacity);
        self.reset_slots();
        self.format_pending = self.config.announce_format;
        self.lifecycle = Lifecycle::Started;
        debug!(
            inputs = self.inputs.len(),
            outputs = self.outputs.len(),
            "Pass-through engine started"
        );
        Ok(())
    }

    fn input_buffers(&self) -> BufferPool {
        self.inputs.clone()
    }

    fn output_buffers(&self) -> BufferPool {
        self.outputs.clone()
    }

    fn dequeue_input_slot(&mut self, timeout: Duration) -> Result<Option<SlotIndex>, EngineError> {
        self.require_started("dequeue_input_slot")?;
        match self.free_inputs.pop_front() {
            Some(slot) => Ok(Some(slot)),
            None => {
                thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn queue_input(
        &mut self,
        slot: SlotIndex,
        size: usize,
        presentation_time_us: i64,
        flags: BufferFlags,
    ) -> Result<(), EngineError> {
        self.require_started("queue_input")?;
        if slot.get() >= self.inputs.len() {
            return Err(EngineError::InvalidSlot(slot));
        }
        trace!(%slot, size, presentation_time_us, "Input queued");
        self.queued.push_back(QueuedInput {
            slot,
            size,
            presentation_time_us,
            flags,
        });
        Ok(())
    }

    fn dequeue_output_slot(&mut self, timeout: Duration) -> Result<OutputStatus, EngineError> {
        self.require_started("dequeue_output_slot")?;

        if self.format_pending {
            self.format_pending = false;
            return Ok(OutputStatus::FormatChanged);
        }

        if self.due_for_reallocation() && self.free_outputs.len() == self.outputs.len() {
            self.reallocated = true;
            self.outputs = BufferPool::new(
                self.outputs.generation() + 1,
                self.config.output_slots,
                self.config.slot_capacity,
            );
            self.free_outputs = Self::all_slots(self.outputs.len());
            debug!(generation = self.outputs.generation(), "Output pool reallocated");
            return Ok(OutputStatus::BuffersChanged);
        }

        if self.queued.is_empty() || self.free_outputs.is_empty() {
            thread::sleep(timeout);
            return Ok(OutputStatus::TryAgainLater);
        }

        let (Some(input), Some(output)) = (self.queued.pop_front(), self.free_outputs.pop_front())
        else {
            return Ok(OutputStatus::TryAgainLater);
        };
        self.copy_to_output(input, output)?;
        self.free_inputs.push_back(input.slot);
        self.decoded += 1;

        let info = FrameBufferDescriptor::new(output, input.size, input.presentation_time_us)
            .with_flags(input.flags);
        Ok(OutputStatus::Ready(info))
    }

    fn release_output(&mut self, slot: SlotIndex, render: bool) -> Result<(), EngineError> {
        self.require_started("release_output")?;
        if slot.get() >= self.outputs.len() {
            return Err(EngineError::InvalidSlot(slot));
        }
        trace!(%slot, render, "Output released");
        if !self.free_outputs.contains(&slot) {
            self.free_outputs.push_back(slot);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        self.require_started("flush")?;
        self.reset_slots();
        debug!("Pass-through engine flushed");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        match self.lifecycle {
            Lifecycle::Started | Lifecycle::Configured => {
                self.lifecycle = Lifecycle::Stopped;
                self.queued.clear();
                debug!("Pass-through engine stopped");
                Ok(())
            }
            state => Err(EngineError::IllegalState(format!(
                "stop called in {state:?} state"
            ))),
        }
    }

    fn release(&mut self) {
        self.lifecycle = Lifecycle::Released;
        self.inputs = BufferPool::empty();
        self.outputs = BufferPool::empty();
        self.reset_slots();
    }
}

/// Creates [`PassthroughEngine`]s for any `audio/` or `video/` codec id.
#[derive(Debug, Clone, Default)]
pub struct PassthroughEngineFactory {
    config: PassthroughConfig,
    unsupported: HashSet<String>,
}

impl PassthroughEngineFactory {
    pub fn new(config: PassthroughConfig) -> Self {
        Self {
            config,
            unsupported: HashSet::new(),
        }
    }

    /// Refuse to create engines for `mime`.
    pub fn with_unsupported(mut self, mime: impl Into<String>) -> Self {
        self.unsupported.insert(mime.into());
        self
    }
}

impl EngineFactory for PassthroughEngineFactory {
    fn create_decoder(&self, mime: &str) -> Result<Box<dyn DecodingEngine>, EngineError> {
        if mime.trim().is_empty() {
            return Err(EngineError::InvalidCodec(mime.to_string()));
        }
        if !(mime.starts_with("audio/") || mime.starts_with("video/"))
            || self.unsupported.contains(mime)
        {
            return Err(EngineError::UnsupportedCodec(mime.to_string()));
        }
        Ok(Box::new(PassthroughEngine::new(mime, self.config.clone())))
    }
}
