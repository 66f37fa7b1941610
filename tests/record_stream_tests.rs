//! Record files written and read back through the stream adapters

use std::{
    fs::File,
    io::{BufReader, BufWriter, Cursor},
    sync::Arc,
};

use daq_payload::{
    buffers::{BufferPool, BufferPoolConfig},
    error::PayloadError,
    payloads::{Composite, Dispatcher, Payload, PayloadBody, PayloadType, SimpleHit, TypeRegistry},
    stream::{RecordReader, RecordWriter},
};
use tempfile::TempDir;

fn hit_payload(timestamp: u64, source_id: i32) -> Payload {
    Payload::from_body(
        PayloadType::SimpleHit.code(),
        timestamp,
        PayloadBody::SimpleHit(SimpleHit {
            source_id,
            dom_id: 0x1000 + source_id as i64,
            ..Default::default()
        }),
    )
}

fn setup() -> (Arc<BufferPool>, Dispatcher) {
    let pool = Arc::new(BufferPool::new(BufferPoolConfig::new("stream")).unwrap());
    let dispatcher = Dispatcher::new(Arc::new(TypeRegistry::standard())).with_pool(pool.clone());
    (pool, dispatcher)
}

#[cfg(test)]
mod record_stream_tests {
    use super::*;

    #[test]
    fn test_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run_0001.dat");
        let (pool, dispatcher) = setup();

        let file = File::create(&path).unwrap();
        let mut writer = RecordWriter::new(BufWriter::new(file));
        for i in 0..20 {
            writer.write_payload(&dispatcher, &hit_payload(i * 10, i as i32)).unwrap();
        }
        let composite = Payload::from_body(
            PayloadType::Composite.code(),
            500,
            PayloadBody::Composite(Composite::new(2, vec![hit_payload(501, 1), hit_payload(502, 2)])),
        );
        writer.write_payload(&dispatcher, &composite).unwrap();
        assert_eq!(writer.records_written(), 21);
        let written = writer.bytes_written();
        drop(writer.finish().unwrap());

        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            written + 4,
            "stream ends with the stop marker"
        );

        let file = File::open(&path).unwrap();
        let mut reader = RecordReader::new(BufReader::new(file)).with_pool(pool.clone());
        let mut timestamps = Vec::new();
        while let Some(payload) = reader.next_payload(&dispatcher).unwrap() {
            timestamps.push(payload.timestamp());
            assert!(payload.record_bytes().is_some());
            let _ = payload.recycle(&pool);
        }

        assert_eq!(timestamps.len(), 21);
        assert_eq!(timestamps[3], 30);
        assert_eq!(*timestamps.last().unwrap(), 500);
        assert_eq!(reader.records_read(), 21);
        assert_eq!(reader.bytes_read(), written);
        assert!(pool.is_balanced(), "{}", pool.stats().summary());
    }

    #[test]
    fn test_stream_without_stop_marker_ends_at_eof() {
        let (pool, dispatcher) = setup();
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_payload(&dispatcher, &hit_payload(1, 1)).unwrap();
        writer.write_payload(&dispatcher, &hit_payload(2, 2)).unwrap();
        let mut bytes = writer.finish().unwrap();
        bytes.truncate(bytes.len() - 4);

        let reader = RecordReader::new(Cursor::new(bytes)).with_pool(pool.clone());
        let records: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2);
        for record in records {
            assert_eq!(record.len(), 38);
            let _ = pool.release(record);
        }
        assert!(pool.is_balanced());
    }

    #[test]
    fn test_records_after_stop_marker_are_ignored() {
        let (_, dispatcher) = setup();
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_payload(&dispatcher, &hit_payload(1, 1)).unwrap();
        let mut bytes = writer.finish().unwrap();
        let tail = dispatcher.encode_to_buffer(&hit_payload(2, 2)).unwrap();
        bytes.extend_from_slice(tail.as_slice());

        let mut reader = RecordReader::new(Cursor::new(bytes));
        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_none());
        assert!(reader.is_finished());
        assert_eq!(reader.records_read(), 1);
    }

    #[test]
    fn test_truncated_record_returns_buffer() {
        let (pool, dispatcher) = setup();
        let buffer = dispatcher.encode_to_buffer(&hit_payload(7, 7)).unwrap();
        let mut bytes = buffer.as_slice().to_vec();
        let _ = pool.release(buffer);
        bytes.truncate(25);

        let mut reader = RecordReader::new(Cursor::new(bytes)).with_pool(pool.clone());
        assert!(matches!(
            reader.next_record(),
            Err(PayloadError::Format { .. })
        ));
        assert!(reader.next_record().unwrap().is_none());
        assert!(pool.is_balanced());
    }

    #[test]
    fn test_unknown_record_in_stream() {
        let (pool, dispatcher) = setup();
        let mut writer = RecordWriter::new(Vec::new());
        let mut custom = vec![0u8; 20];
        custom[..4].copy_from_slice(&20u32.to_be_bytes());
        custom[4..8].copy_from_slice(&404i32.to_be_bytes());
        writer.write_record(&custom).unwrap();
        writer.write_payload(&dispatcher, &hit_payload(9, 9)).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = RecordReader::new(Cursor::new(bytes)).with_pool(pool.clone());
        assert!(matches!(
            reader.next_payload(&dispatcher),
            Err(PayloadError::UnknownType { type_code: 404 })
        ));
        let payload = reader.next_payload(&dispatcher).unwrap().unwrap();
        assert_eq!(payload.timestamp(), 9);
        let _ = payload.recycle(&pool);
        assert!(reader.next_payload(&dispatcher).unwrap().is_none());
        assert!(pool.is_balanced());
    }
}
