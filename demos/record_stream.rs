//! Write a record file, then read it back through a pooled reader

use daq_payload::{
    buffers::{BufferPool, BufferPoolConfig},
    payloads::{Dispatcher, Payload, PayloadBody, PayloadType, SimpleHit, TypeRegistry},
    stream::{RecordReader, RecordWriter},
    Result,
};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    sync::Arc,
};

fn main() -> Result<()> {
    env_logger::init();

    let path = std::env::temp_dir().join("daq_payload_demo.dat");
    let pool = Arc::new(BufferPool::new(BufferPoolConfig::new("stream_demo"))?);
    let dispatcher = Dispatcher::new(Arc::new(TypeRegistry::standard())).with_pool(pool.clone());

    let mut writer = RecordWriter::new(BufWriter::new(File::create(&path)?));
    for i in 0..1000u64 {
        let hit = Payload::from_body(
            PayloadType::SimpleHit.code(),
            i * 25,
            PayloadBody::SimpleHit(SimpleHit {
                source_id: 4000 + (i % 4) as i32,
                dom_id: i as i64,
                ..Default::default()
            }),
        );
        writer.write_payload(&dispatcher, &hit)?;
    }
    println!("Wrote {} records to {}", writer.records_written(), path.display());
    writer.finish()?;

    let mut reader = RecordReader::new(BufReader::new(File::open(&path)?)).with_pool(pool.clone());
    let mut per_source = [0usize; 4];
    while let Some(payload) = reader.next_payload(&dispatcher)? {
        if let PayloadBody::SimpleHit(hit) = payload.body() {
            per_source[(hit.source_id - 4000) as usize] += 1;
        }
        let _ = payload.recycle(&pool);
    }

    println!("Read {} records ({} bytes)", reader.records_read(), reader.bytes_read());
    println!("Hits per source: {:?}", per_source);
    println!("{}", pool.stats().summary());

    std::fs::remove_file(&path)?;
    Ok(())
}
