//! Pool and dispatcher shared across threads

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
};

use daq_payload::{
    buffers::{BufferPool, BufferPoolConfigBuilder},
    payloads::{Dispatcher, Payload, PayloadBody, PayloadType, SimpleHit, TypeRegistry},
};

#[cfg(test)]
mod concurrent_pool_tests {
    use super::*;

    /// Test: mixed-size churn from many threads leaves the pool balanced
    #[test]
    fn stress_pool_churn_balances() {
        let pool = Arc::new(
            BufferPool::new(
                BufferPoolConfigBuilder::new("churn")
                    .granularity(64)
                    .max_cached_bytes(16 * 1024)
                    .build()
                    .unwrap(),
            )
            .unwrap(),
        );

        let thread_count = 8;
        let rounds = 500;
        let barrier = Arc::new(Barrier::new(thread_count));
        let mut handles = Vec::new();

        for thread_id in 0..thread_count {
            let pool = pool.clone();
            let barrier = barrier.clone();

            handles.push(thread::spawn(move || {
                barrier.wait();
                let mut held = Vec::new();
                for i in 0..rounds {
                    let size = (thread_id * 97 + i * 31) % 1500;
                    let mut buffer = pool.acquire(size).unwrap();
                    assert!(buffer.capacity() >= size);
                    buffer.extend_from_slice(&[thread_id as u8; 8]).unwrap();
                    held.push(buffer);

                    if held.len() > 4 {
                        let _ = pool.release(held.remove(0));
                    }
                }
                for buffer in held {
                    let _ = pool.release(buffer);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = pool.stats();
        assert!(pool.is_balanced(), "{}", stats.summary());
        assert_eq!(stats.total_acquired, (thread_count * rounds) as u64);
        assert!(stats.total_cached_bytes <= 16 * 1024);
        assert!(stats.total_created < stats.total_acquired);
    }

    /// Test: the acquire bound holds under contention
    #[test]
    fn stress_acquire_bound_under_contention() {
        let limit = 4096;
        let pool = Arc::new(
            BufferPool::new(
                BufferPoolConfigBuilder::new("bounded")
                    .granularity(128)
                    .max_acquired_bytes(limit)
                    .denial_logging(1, 100)
                    .build()
                    .unwrap(),
            )
            .unwrap(),
        );

        let thread_count = 6;
        let barrier = Arc::new(Barrier::new(thread_count));
        let denials = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..thread_count {
            let pool = pool.clone();
            let barrier = barrier.clone();
            let denials = denials.clone();

            handles.push(thread::spawn(move || {
                barrier.wait();
                for _ in 0..200 {
                    match pool.acquire(1000) {
                        Ok(buffer) => {
                            assert!(pool.current_acquired_bytes() <= limit);
                            thread::yield_now();
                            let _ = pool.release(buffer);
                        }
                        Err(_) => {
                            denials.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = pool.stats();
        assert!(stats.peak_acquired_bytes <= limit);
        assert_eq!(stats.total_denied as usize, denials.load(Ordering::Relaxed));
        assert!(pool.is_balanced());
    }

    /// Test: one dispatcher decodes concurrently with pooled private copies
    #[test]
    fn stress_shared_dispatcher() {
        let pool = Arc::new(
            BufferPool::new(BufferPoolConfigBuilder::new("dispatch").build().unwrap()).unwrap(),
        );
        let dispatcher =
            Arc::new(Dispatcher::new(Arc::new(TypeRegistry::standard())).with_pool(pool.clone()));

        let record = {
            let payload = Payload::from_body(
                PayloadType::SimpleHit.code(),
                123,
                PayloadBody::SimpleHit(SimpleHit {
                    source_id: 4000,
                    ..Default::default()
                }),
            );
            let buffer = dispatcher.encode_to_buffer(&payload).unwrap();
            let bytes = buffer.as_slice().to_vec();
            let _ = pool.release(buffer);
            Arc::new(bytes)
        };

        let thread_count = 4;
        let barrier = Arc::new(Barrier::new(thread_count));
        let mut handles = Vec::new();

        for _ in 0..thread_count {
            let dispatcher = dispatcher.clone();
            let record = record.clone();
            let barrier = barrier.clone();
            let pool = pool.clone();

            handles.push(thread::spawn(move || {
                barrier.wait();
                for _ in 0..250 {
                    let payload = dispatcher.decode(&record, 0, true).unwrap().unwrap();
                    assert_eq!(payload.timestamp(), 123);
                    assert!(payload.recycle(&pool).is_some());
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(pool.is_balanced());
        assert!(pool.total_created() <= thread_count as u64 + 1);
    }
}
