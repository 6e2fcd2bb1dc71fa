//! Decoding engine bridge traits.
//!
//! A [`DecodingEngine`] is an opaque buffer-exchange device in the style of
//! platform codec APIs: callers dequeue an input slot, fill it and queue it back;
//! decoded data shows up in output slots which are dequeued, consumed and
//! released. All dequeue calls are bounded by a caller-supplied timeout.
//!
//! ## Slot ownership
//!
//! ```text
//!   engine ──dequeue_input_slot──▶ caller ──queue_input──▶ engine
//!   engine ──dequeue_output_slot─▶ caller ──release_output─▶ engine
//! ```
//!
//! Between dequeue and queue/release the caller may access the slot memory
//! through the matching [`BufferPool`]. Outside that window the slot belongs to
//! the engine.

use crate::media::FormatDescriptor;
use bytes::BytesMut;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::{BitOr, BitOrAssign, Range};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Index of one buffer in an engine's input or output pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(pub usize);

impl SlotIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Flag set attached to queued input and dequeued output buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferFlags(u32);

impl BufferFlags {
    pub const NONE: BufferFlags = BufferFlags(0);
    /// The buffer contains a sync (key) frame.
    pub const KEY_FRAME: BufferFlags = BufferFlags(1);
    /// The buffer carries codec configuration data rather than media data.
    pub const CODEC_CONFIG: BufferFlags = BufferFlags(1 << 1);
    /// No further buffers follow this one.
    pub const END_OF_STREAM: BufferFlags = BufferFlags(1 << 2);

    pub const fn from_bits(bits: u32) -> Self {
        BufferFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: BufferFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_end_of_stream(self) -> bool {
        self.contains(Self::END_OF_STREAM)
    }
}

impl BitOr for BufferFlags {
    type Output = BufferFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        BufferFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for BufferFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Describes one decoded output unit.
///
/// Produced by the engine per successful output dequeue, consumed once by the
/// renderer and then released back with [`DecodingEngine::release_output`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBufferDescriptor {
    pub slot: SlotIndex,
    pub offset: usize,
    pub size: usize,
    pub presentation_time_us: i64,
    pub flags: BufferFlags,
}

impl FrameBufferDescriptor {
    pub fn new(slot: SlotIndex, size: usize, presentation_time_us: i64) -> Self {
        Self {
            slot,
            offset: 0,
            size,
            presentation_time_us,
            flags: BufferFlags::NONE,
        }
    }

    pub fn with_flags(mut self, flags: BufferFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Byte range of valid data within the slot.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.size
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.flags.is_end_of_stream()
    }
}

/// Result of polling an engine for decoded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStatus {
    /// A decoded buffer is ready.
    Ready(FrameBufferDescriptor),
    /// Nothing available within the timeout.
    TryAgainLater,
    /// The output format changed; subsequent buffers use the new format.
    FormatChanged,
    /// The output pool was reallocated; cached pool handles are stale.
    BuffersChanged,
    /// An engine-specific status code with no defined meaning.
    Other(i32),
}

/// Shared handle to an engine's buffer pool.
///
/// Cloning is cheap. The `generation` changes every time the engine reallocates
/// the pool, letting callers detect stale handles.
#[derive(Clone)]
pub struct BufferPool {
    generation: u64,
    slots: Arc<[Mutex<BytesMut>]>,
}

impl BufferPool {
    /// Allocate `count` slots of `slot_capacity` bytes each.
    pub fn new(generation: u64, count: usize, slot_capacity: usize) -> Self {
        let slots: Vec<Mutex<BytesMut>> = (0..count)
            .map(|_| Mutex::new(BytesMut::with_capacity(slot_capacity)))
            .collect();
        Self {
            generation,
            slots: slots.into(),
        }
    }

    /// A pool with no slots, used before an engine is started.
    pub fn empty() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Lock the memory of `index`. Returns `None` for an out-of-range index.
    pub fn slot(&self, index: SlotIndex) -> Option<MutexGuard<'_, BytesMut>> {
        self.slots.get(index.0).map(|slot| slot.lock())
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("generation", &self.generation)
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Invalid codec identifier: {0:?}")]
    InvalidCodec(String),

    #[error("Engine configuration failed: {0}")]
    Configuration(String),

    /// Configuration cannot complete yet (e.g. the output target is not ready).
    #[error("Engine configuration deferred: {0}")]
    ConfigurationDeferred(String),

    #[error("Illegal engine state: {0}")]
    IllegalState(String),

    #[error("Invalid slot {0}")]
    InvalidSlot(SlotIndex),

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Returns `true` when the operation may succeed once more input or
    /// host state becomes available.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::ConfigurationDeferred(_))
    }
}

/// Slot-based decoding device.
///
/// Implementations are driven from a single worker thread. Timeouts bound each
/// dequeue; none of the calls block indefinitely.
pub trait DecodingEngine: Send {
    /// Apply the track format. Must be called before [`start`](Self::start).
    fn configure(&mut self, format: &FormatDescriptor) -> Result<(), EngineError>;

    /// Start accepting input. Buffer pools are valid after this returns.
    fn start(&mut self) -> Result<(), EngineError>;

    /// Current input pool handle.
    fn input_buffers(&self) -> BufferPool;

    /// Current output pool handle. Re-query after [`OutputStatus::BuffersChanged`].
    fn output_buffers(&self) -> BufferPool;

    /// Take ownership of a free input slot, waiting at most `timeout`.
    fn dequeue_input_slot(&mut self, timeout: Duration) -> Result<Option<SlotIndex>, EngineError>;

    /// Return a filled input slot to the engine.
    fn queue_input(
        &mut self,
        slot: SlotIndex,
        size: usize,
        presentation_time_us: i64,
        flags: BufferFlags,
    ) -> Result<(), EngineError>;

    /// Poll for decoded output, waiting at most `timeout`.
    fn dequeue_output_slot(&mut self, timeout: Duration) -> Result<OutputStatus, EngineError>;

    /// Give an output slot back. `render` marks it for immediate presentation
    /// on engine-managed outputs.
    fn release_output(&mut self, slot: SlotIndex, render: bool) -> Result<(), EngineError>;

    /// Drop all queued input and pending output.
    fn flush(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Stop decoding. A second call reports [`EngineError::IllegalState`].
    fn stop(&mut self) -> Result<(), EngineError>;

    /// Free all engine resources. The engine is unusable afterwards.
    fn release(&mut self);
}

/// Creates decoding engines by codec identifier.
pub trait EngineFactory: Send + Sync {
    fn create_decoder(&self, mime: &str) -> Result<Box<dyn DecodingEngine>, EngineError>;
}
