mod common;

use bridge_software::MemorySampleSource;
use bridge_traits::{
    BufferFlags, BufferPool, EngineError, FormatDescriptor, FrameBufferDescriptor, OutputStatus,
    SampleSource, SlotIndex,
};
use bytes::BytesMut;
use common::*;
use core_decode::BufferPump;
use mockall::mock;
use mockall::predicate::eq;
use std::time::Duration;

mock! {
    pub Source {}

    impl SampleSource for Source {
        fn format(&self) -> Option<&'static FormatDescriptor>;
        fn read_sample(&mut self, buffer: &mut BytesMut) -> Option<usize>;
        fn current_timestamp(&self) -> i64;
        fn seek(&mut self, position_us: i64) -> i64;
        fn set_start_position(&mut self, position_us: i64);
        fn stop(&mut self);
    }
}

const INPUT_TIMEOUT: Duration = Duration::from_micros(2_000);
const OUTPUT_TIMEOUT: Duration = Duration::from_micros(1_000);

/// An engine reporting pools of two 64-byte slots; output generations count
/// up from 1 on every query.
fn engine_with_pools() -> MockEngine {
    let mut engine = MockEngine::new();
    engine
        .expect_input_buffers()
        .returning(|| BufferPool::new(1, 2, 64));
    let mut generation = 0;
    engine.expect_output_buffers().returning(move || {
        generation += 1;
        BufferPool::new(generation, 2, 64)
    });
    engine
}

fn attached_pump(engine: &MockEngine) -> BufferPump {
    let mut pump = BufferPump::new(INPUT_TIMEOUT, OUTPUT_TIMEOUT);
    pump.attach(engine);
    pump
}

fn clip(count: usize) -> MemorySampleSource {
    MemorySampleSource::uniform(video_format(5_000), count, 1_000, 16)
}

// ============================================================================
// Input Step
// ============================================================================

#[test]
fn test_no_free_slot_is_noop() {
    let mut engine = engine_with_pools();
    engine
        .expect_dequeue_input_slot()
        .with(eq(INPUT_TIMEOUT))
        .times(1)
        .returning(|_| Ok(None));
    engine.expect_queue_input().never();

    let mut pump = attached_pump(&engine);
    let mut source = clip(1);

    assert!(!pump.push_input(&mut engine, &mut source).unwrap());
    assert!(!pump.is_end_of_stream());
}

#[test]
fn test_sample_queued_with_timestamp() {
    let mut engine = engine_with_pools();
    engine
        .expect_dequeue_input_slot()
        .returning(|_| Ok(Some(SlotIndex(1))));
    engine
        .expect_queue_input()
        .with(eq(SlotIndex(1)), eq(16), eq(0), eq(BufferFlags::NONE))
        .times(1)
        .returning(|_, _, _, _| Ok(()));
    engine
        .expect_queue_input()
        .with(eq(SlotIndex(1)), eq(16), eq(1_000), eq(BufferFlags::NONE))
        .times(1)
        .returning(|_, _, _, _| Ok(()));

    let mut pump = attached_pump(&engine);
    let mut source = clip(2);

    assert!(!pump.push_input(&mut engine, &mut source).unwrap());
    assert!(!pump.push_input(&mut engine, &mut source).unwrap());
}

#[test]
fn test_sample_written_into_dequeued_slot() {
    let mut engine = engine_with_pools();
    engine
        .expect_dequeue_input_slot()
        .returning(|_| Ok(Some(SlotIndex(0))));
    engine
        .expect_queue_input()
        .with(eq(SlotIndex(0)), eq(4), eq(42_000), eq(BufferFlags::NONE))
        .times(1)
        .returning(|_, _, _, _| Ok(()));

    let mut source = MockSource::new();
    source.expect_read_sample().times(1).returning(|buffer| {
        buffer.clear();
        buffer.extend_from_slice(&[7, 7, 7, 7]);
        Some(4)
    });
    source.expect_current_timestamp().return_const(42_000i64);

    let mut pump = attached_pump(&engine);

    assert!(!pump.push_input(&mut engine, &mut source).unwrap());
}

#[test]
fn test_exhausted_source_queues_end_of_stream() {
    let mut engine = engine_with_pools();
    engine
        .expect_dequeue_input_slot()
        .returning(|_| Ok(Some(SlotIndex(0))));
    engine
        .expect_queue_input()
        .with(eq(SlotIndex(0)), eq(0), eq(0), eq(BufferFlags::END_OF_STREAM))
        .times(1)
        .returning(|_, _, _, _| Ok(()));

    let mut pump = attached_pump(&engine);
    let mut source = clip(0);

    assert!(pump.push_input(&mut engine, &mut source).unwrap());
    assert!(pump.is_end_of_stream());

    pump.clear_end_of_stream();
    assert!(!pump.is_end_of_stream());
}

#[test]
fn test_slot_outside_pool_is_rejected() {
    let mut engine = engine_with_pools();
    engine
        .expect_dequeue_input_slot()
        .returning(|_| Ok(Some(SlotIndex(7))));
    engine.expect_queue_input().never();

    let mut pump = attached_pump(&engine);
    let mut source = clip(1);

    let err = pump.push_input(&mut engine, &mut source).unwrap_err();
    assert!(matches!(err, EngineError::InvalidSlot(SlotIndex(7))));
}

#[test]
fn test_input_errors_propagate() {
    let mut engine = engine_with_pools();
    engine
        .expect_dequeue_input_slot()
        .returning(|_| Err(EngineError::IllegalState("not started".into())));

    let mut pump = attached_pump(&engine);
    let mut source = clip(1);

    let err = pump.push_input(&mut engine, &mut source).unwrap_err();
    assert!(matches!(err, EngineError::IllegalState(_)));
}

// ============================================================================
// Output Step
// ============================================================================

#[test]
fn test_ready_output_is_returned() {
    let mut engine = engine_with_pools();
    let info = FrameBufferDescriptor::new(SlotIndex(1), 8, 2_000);
    engine
        .expect_dequeue_output_slot()
        .with(eq(OUTPUT_TIMEOUT))
        .times(1)
        .returning(move |_| Ok(OutputStatus::Ready(info)));

    let mut pump = attached_pump(&engine);

    assert_eq!(pump.pull_output(&mut engine).unwrap(), Some(info));
}

#[test]
fn test_informational_statuses_yield_nothing() {
    let mut engine = engine_with_pools();
    let mut statuses = vec![
        OutputStatus::TryAgainLater,
        OutputStatus::FormatChanged,
        OutputStatus::Other(-1010),
    ]
    .into_iter();
    engine
        .expect_dequeue_output_slot()
        .times(3)
        .returning(move |_| Ok(statuses.next().unwrap_or(OutputStatus::TryAgainLater)));

    let mut pump = attached_pump(&engine);
    let generation = pump.output_generation();

    for _ in 0..3 {
        assert_eq!(pump.pull_output(&mut engine).unwrap(), None);
    }
    assert_eq!(pump.output_generation(), generation);
}

#[test]
fn test_buffers_changed_refreshes_output_pool() {
    let mut engine = engine_with_pools();
    engine
        .expect_dequeue_output_slot()
        .times(1)
        .returning(|_| Ok(OutputStatus::BuffersChanged));

    let mut pump = attached_pump(&engine);
    assert_eq!(pump.output_generation(), 1);

    assert_eq!(pump.pull_output(&mut engine).unwrap(), None);
    assert_eq!(pump.output_generation(), 2);
}

#[test]
fn test_output_errors_propagate() {
    let mut engine = engine_with_pools();
    engine
        .expect_dequeue_output_slot()
        .returning(|_| Err(EngineError::IllegalState("released".into())));

    let mut pump = attached_pump(&engine);

    assert!(pump.pull_output(&mut engine).is_err());
}

#[test]
fn test_missing_output_slot_reads_empty() {
    let engine = engine_with_pools();
    let pump = attached_pump(&engine);

    let info = FrameBufferDescriptor::new(SlotIndex(9), 8, 0);
    let len = pump.with_output(&info, |data| data.len());
    assert_eq!(len, 0);
}

// ============================================================================
// Flush
// ============================================================================

#[test]
fn test_flush_clears_end_of_stream() {
    let mut engine = engine_with_pools();
    engine
        .expect_dequeue_input_slot()
        .returning(|_| Ok(Some(SlotIndex(0))));
    engine
        .expect_queue_input()
        .returning(|_, _, _, _| Ok(()));
    engine.expect_flush().times(1).returning(|| Ok(()));

    let mut pump = attached_pump(&engine);
    let mut source = clip(0);
    assert!(pump.push_input(&mut engine, &mut source).unwrap());

    pump.flush(&mut engine).unwrap();
    assert!(!pump.is_end_of_stream());
}
