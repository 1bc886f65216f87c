// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the event buffers
//!
//! Covers the documented capacity-4 walkthrough and a real producer/consumer
//! pair running on separate threads.

use feagi_npu_event_buffer::*;

#[test]
fn test_capacity_four_walkthrough() {
    let mut buffer = SpikeBuffer::initialize(4).unwrap();

    assert!(buffer.push(Spike::new(10)));
    assert!(buffer.push(Spike::new(20)));
    assert!(buffer.push(Spike::new(30)));
    assert!(!buffer.push(Spike::new(40)));
    assert_eq!(buffer.overflow_count(), 1);

    assert_eq!(buffer.pop(), Some(Spike::new(10)));
    assert!(buffer.push(Spike::new(40)));
    assert_eq!(buffer.len(), 3);

    assert_eq!(buffer.pop(), Some(Spike::new(20)));
    assert_eq!(buffer.pop(), Some(Spike::new(30)));
    assert_eq!(buffer.pop(), Some(Spike::new(40)));
    assert_eq!(buffer.pop(), None);
    assert_eq!(buffer.underflow_count(), 1);
    assert_eq!(buffer.overflow_count(), 1);
}

#[test]
fn test_split_handles_share_state() {
    let mut buffer = GradientPotentialBuffer::initialize(8).unwrap();
    {
        let (mut producer, mut consumer) = buffer.split();
        assert!(producer.push(GradientPotential::from_accum(1, Accum::ONE)));
        assert!(producer.push(GradientPotential::new(2, 0)));
        assert_eq!(producer.free_capacity(), 5);
        assert_eq!(consumer.len(), 2);

        assert!(!consumer.peek_and_consume_if_key_equals(2));
        let first = consumer.pop().unwrap();
        assert_eq!(first.key(), 1);
        assert_eq!(first.accum(), Accum::ONE);
        assert!(consumer.peek_and_consume_if_key_equals(2));
        assert!(consumer.is_empty());
    }
    assert_eq!(buffer.stats().allocated, 0);
    assert_eq!(buffer.stats().underflows, 0);
}

#[test]
fn test_producer_and_consumer_on_separate_threads() {
    const EVENTS: u32 = 50_000;

    let mut buffer = SpikeBuffer::initialize(64).unwrap();
    let (mut producer, mut consumer) = buffer.split();

    let received = std::thread::scope(|scope| {
        scope.spawn(move || {
            for key in 0..EVENTS {
                // Spin until the consumer frees a slot; rejected pushes are counted
                while !producer.push(Spike::new(key)) {
                    std::hint::spin_loop();
                }
            }
        });

        let consumer_thread = scope.spawn(move || {
            let mut received = Vec::with_capacity(EVENTS as usize);
            while received.len() < EVENTS as usize {
                if consumer.is_empty() {
                    std::hint::spin_loop();
                    continue;
                }
                if let Some(spike) = consumer.pop() {
                    received.push(spike.0);
                }
            }
            received
        });

        consumer_thread.join().unwrap()
    });

    let expected: Vec<u32> = (0..EVENTS).collect();
    assert_eq!(received, expected);
    assert_eq!(buffer.underflow_count(), 0);
    assert!(buffer.is_empty());
}
