use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sable_exec::prelude::*;

fn row(v: i32) -> DataArray {
    DataArray::from_values(vec![Value::from(v)])
}

#[test]
fn one_producer_one_consumer_in_order() {
    let queue = Arc::new(SafeQueue::new(Some(4)));
    queue.shared_initialize();
    queue.shared_initialize();

    let producer_queue = queue.clone();
    let producer = thread::spawn(move || {
        for i in 0..100 {
            producer_queue.shared_put(&row(i)).expect("put failed");
        }
        producer_queue.shared_put_finish();
    });

    let mut seen = Vec::new();
    while let Some(front) = queue.shared_get().expect("get failed") {
        assert!(queue.len() <= 4, "bound exceeded");
        seen.push(front.element(0).unwrap().to_i32().unwrap());
    }
    producer.join().expect("producer panicked");

    let expected: Vec<i32> = (0..100).collect();
    assert_eq!(seen, expected);
}

#[test]
fn back_pressure_throttles_the_producer() {
    let queue = Arc::new(SafeQueue::new(Some(4)));
    queue.shared_initialize();
    queue.shared_initialize();

    let producer_queue = queue.clone();
    let producer = thread::spawn(move || {
        let started = Instant::now();
        for i in 0..10 {
            producer_queue.shared_put(&row(i)).expect("put failed");
        }
        producer_queue.shared_put_finish();
        started.elapsed()
    });

    let mut seen = Vec::new();
    loop {
        match queue.shared_get().expect("get failed") {
            Some(front) => {
                assert!(queue.len() <= 4, "bound exceeded");
                seen.push(front.element(0).unwrap().to_i32().unwrap());
                thread::sleep(Duration::from_millis(50));
            }
            None => break,
        }
    }
    let produce_time = producer.join().expect("producer panicked");

    let expected: Vec<i32> = (0..10).collect();
    assert_eq!(seen, expected);
    // Six of the ten puts found the queue full and had to wait out the
    // consumer's 50 ms cadence.
    assert!(
        produce_time >= Duration::from_millis(200),
        "producer was never throttled: {produce_time:?}"
    );
}

#[test]
fn cancellation_reaches_a_blocked_producer_within_one_poll() {
    let queue = Arc::new(SafeQueue::new(Some(1)));
    queue.shared_initialize();
    queue.shared_initialize();

    queue.shared_put(&row(0)).expect("put failed");

    let producer_queue = queue.clone();
    let producer = thread::spawn(move || {
        // The queue is full: this put blocks until cancellation.
        let started = Instant::now();
        let result = producer_queue.shared_put(&row(1));
        (result, started.elapsed())
    });

    thread::sleep(Duration::from_millis(30));
    queue.shared_get_finish();
    let (result, waited) = producer.join().expect("producer panicked");
    assert_eq!(result, Err(ExecError::Cancelled));
    assert!(
        waited < Duration::from_millis(500),
        "cancellation took {waited:?}"
    );
}

#[test]
fn consumer_sees_end_after_every_producer_finishes() {
    let queue = Arc::new(SafeQueue::new(Some(8)));
    // Two producers and one consumer.
    queue.shared_initialize();
    queue.shared_initialize();
    queue.shared_initialize();

    let mut producers = Vec::new();
    for p in 0..2 {
        let producer_queue = queue.clone();
        producers.push(thread::spawn(move || {
            for i in 0..20 {
                producer_queue.shared_put(&row(p * 100 + i)).expect("put failed");
            }
            producer_queue.shared_put_finish();
        }));
    }

    let mut per_producer: Vec<Vec<i32>> = vec![Vec::new(), Vec::new()];
    while let Some(front) = queue.shared_get().expect("get failed") {
        let v = front.element(0).unwrap().to_i32().unwrap();
        per_producer[(v / 100) as usize].push(v % 100);
    }
    for producer in producers {
        producer.join().expect("producer panicked");
    }

    // Per-producer FIFO holds even though the interleaving is arbitrary.
    let expected: Vec<i32> = (0..20).collect();
    assert_eq!(per_producer[0], expected);
    assert_eq!(per_producer[1], expected);
}
