//! Basic usage of the granular buffer pool and the payload dispatcher

use daq_payload::{
    buffers::{BufferPool, BufferPoolConfigBuilder},
    payloads::{Composite, Dispatcher, Payload, PayloadBody, PayloadType, SimpleHit, TypeRegistry},
    Result,
};
use std::sync::Arc;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    println!("DAQ Payload Pool Example");
    println!("========================");

    let config = BufferPoolConfigBuilder::new("example_pool")
        .granularity(128)
        .max_cached_bytes(256)
        .max_acquired_bytes(64 * 1024)
        .build()?;
    let pool = Arc::new(BufferPool::new(config)?);

    // Requests are rounded up to the granularity
    let small = pool.acquire(100)?;
    let large = pool.acquire(130)?;
    println!("acquire(100) -> {} bytes", small.capacity());
    println!("acquire(130) -> {} bytes", large.capacity());

    println!("release small: {:?}", pool.release(small));
    println!("release large: {:?}", pool.release(large));
    println!("Cached bytes: {} (bound 256)", pool.total_cached_bytes());

    // Encode a trigger-style composite and decode it back
    let dispatcher = Dispatcher::new(Arc::new(TypeRegistry::standard())).with_pool(pool.clone());
    let hits = (0..3)
        .map(|i| {
            Payload::from_body(
                PayloadType::SimpleHit.code(),
                1_000 + i,
                PayloadBody::SimpleHit(SimpleHit {
                    source_id: 4000,
                    dom_id: 0x7f00 + i as i64,
                    ..Default::default()
                }),
            )
        })
        .collect();
    let composite = Payload::from_body(
        PayloadType::Composite.code(),
        1_000,
        PayloadBody::Composite(Composite::new(0, hits)),
    );

    let encoded = dispatcher.encode_to_buffer(&composite)?;
    println!("\nEncoded composite: {} bytes in a {} byte buffer", encoded.len(), encoded.capacity());

    let decoded = dispatcher
        .decode(encoded.as_slice(), 0, true)?
        .expect("record is not a stop marker");
    let elements = decoded.body().composite().map_or(0, |c| c.elements.len());
    println!("Decoded {} with {} elements", decoded.body().kind_name(), elements);

    let _ = pool.release(encoded);
    let _ = decoded.recycle(&pool);

    println!("\n{}", pool.stats().summary());
    println!("{}", pool.histogram_report());
    println!("Balanced: {}", pool.is_balanced());

    Ok(())
}
