use clap::{App, Arg, ArgMatches, SubCommand};
use daq_payload::{
    error::PayloadError, stream::DEFAULT_MAX_RECORD_LEN, BufferPool, BufferPoolConfig, Dispatcher,
    Envelope, Payload, PayloadBody, RecordReader, Result, TypeRegistry,
};
use log::info;
use std::{fs::File, io::BufReader, path::Path, sync::Arc};

fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("payload-dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect files of framed DAQ payload records")
        .subcommand(
            SubCommand::with_name("dump")
                .about("Print the envelope of every record in a file")
                .arg(
                    Arg::with_name("file")
                        .value_name("FILE")
                        .help("Record file to read")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("hex")
                        .long("hex")
                        .help("Hex dump each record"),
                )
                .arg(
                    Arg::with_name("decode")
                        .short("d")
                        .long("decode")
                        .help("Decode each record and summarise the body"),
                )
                .arg(
                    Arg::with_name("checksum")
                        .short("c")
                        .long("checksum")
                        .help("Print a CRC32 of each record"),
                )
                .arg(
                    Arg::with_name("pool_config")
                        .short("p")
                        .long("pool-config")
                        .value_name("FILE")
                        .help("TOML buffer pool configuration")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("stats")
                        .short("s")
                        .long("stats")
                        .help("Print buffer pool statistics when done"),
                )
                .arg(
                    Arg::with_name("limit")
                        .short("n")
                        .long("limit")
                        .value_name("N")
                        .help("Stop after N records")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("max_record_len")
                        .long("max-record-len")
                        .value_name("BYTES")
                        .help("Refuse records longer than BYTES (default 64 MiB)")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("types")
                .about("List the registered payload types"),
        )
        .subcommand(
            SubCommand::with_name("info")
                .about("Show version and build information"),
        )
        .get_matches();

    match matches.subcommand() {
        ("dump", Some(dump_matches)) => handle_dump(dump_matches),
        ("types", Some(_)) => show_types(),
        ("info", Some(_)) => show_info(),
        _ => {
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

fn load_pool_config(path: Option<&str>) -> Result<BufferPoolConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| PayloadError::from_io(e, &format!("reading {}", path)))?;
            let config = BufferPoolConfig::from_toml_str(&text)?;
            info!("loaded pool configuration '{}' from {}", config.name, path);
            Ok(config)
        }
        None => Ok(BufferPoolConfig::new("payload-dump")),
    }
}

fn handle_dump(matches: &ArgMatches) -> Result<()> {
    let path = matches
        .value_of("file")
        .ok_or_else(|| PayloadError::invalid_parameter("file", "No record file given"))?;
    let limit: Option<u64> = matches
        .value_of("limit")
        .map(|value| {
            value
                .parse()
                .map_err(|_| PayloadError::invalid_parameter("limit", "Invalid record count"))
        })
        .transpose()?;
    let max_record_len: usize = matches
        .value_of("max_record_len")
        .map(|value| {
            value.parse().map_err(|_| {
                PayloadError::invalid_parameter("max-record-len", "Invalid byte count")
            })
        })
        .transpose()?
        .unwrap_or(DEFAULT_MAX_RECORD_LEN);

    let pool = Arc::new(BufferPool::new(load_pool_config(matches.value_of("pool_config"))?)?);
    let dispatcher = Dispatcher::new(Arc::new(TypeRegistry::standard())).with_pool(pool.clone());

    let file = File::open(Path::new(path))
        .map_err(|e| PayloadError::from_io(e, &format!("opening {}", path)))?;
    let mut reader = RecordReader::new(BufReader::new(file))
        .with_pool(pool.clone())
        .with_max_record_len(max_record_len);

    let mut failures = 0u64;
    while limit.map_or(true, |limit| reader.records_read() < limit) {
        let offset = reader.bytes_read();
        let Some(buffer) = reader.next_record()? else {
            break;
        };

        let record = buffer.as_slice();
        let envelope = Envelope::read(record, 0)?;
        let name = dispatcher
            .registry()
            .name_of(envelope.type_code)
            .unwrap_or("unknown");
        print!(
            "{:>10}  len {:>8}  type {:>4} ({})  ts {}",
            offset, envelope.length, envelope.type_code, name, envelope.timestamp
        );
        if matches.is_present("checksum") {
            print!("  crc32 {:08x}", crc32fast::hash(record));
        }
        println!();

        if matches.is_present("hex") {
            print!("{}", hex_dump(record));
        }

        if matches.is_present("decode") {
            match dispatcher.decode_buffer(buffer) {
                Ok(Some(payload)) => {
                    println!("            {}", describe(&payload));
                    let _ = payload.recycle(&pool);
                }
                Ok(None) => {}
                Err(e) => {
                    failures += 1;
                    println!("            decode failed: {}", e);
                }
            }
        } else {
            let _ = pool.release(buffer);
        }
    }

    println!(
        "\n{} records, {} bytes{}",
        reader.records_read(),
        reader.bytes_read(),
        if failures > 0 {
            format!(", {} failed to decode", failures)
        } else {
            String::new()
        }
    );

    if matches.is_present("stats") {
        println!("\n{}", pool.stats().summary());
        println!("  Hit rate: {:.2}%", pool.stats().hit_rate() * 100.0);
        println!("  Balanced: {}", pool.is_balanced());
        println!("\n{}", pool.histogram_report());
    }
    Ok(())
}

fn describe(payload: &Payload) -> String {
    let body = payload.body();
    let detail = match body {
        PayloadBody::SimpleHit(hit) => format!(
            "source {} dom {:#x} trigger {}/{}",
            hit.source_id, hit.dom_id, hit.trigger_type, hit.trigger_mode
        ),
        PayloadBody::TriggerRequest(request) => format!(
            "uid {} source {} window {}..{}",
            request.uid, request.source_id, request.first_time, request.last_time
        ),
        PayloadBody::Event(event) => format!(
            "run {}.{} uid {} window {}..{}",
            event.run_number, event.subrun_number, event.uid, event.first_time, event.last_time
        ),
        PayloadBody::Composite(composite) => format!("kind {}", composite.kind),
        PayloadBody::Opaque(bytes) => format!("{} opaque bytes", bytes.len()),
    };

    match body.composite() {
        Some(composite) => format!(
            "{}: {}, {}/{} elements, {} failures",
            body.kind_name(),
            detail,
            composite.elements.len(),
            composite.declared_count,
            body.failure_count()
        ),
        None => format!("{}: {}", body.kind_name(), detail),
    }
}

fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        out.push_str(&format!("    {:06x}  {:<47}  {}\n", row * 16, hex.join(" "), ascii));
    }
    out
}

fn show_types() -> Result<()> {
    let registry = TypeRegistry::standard();
    println!("Registered payload types:");
    for code in registry.type_codes() {
        println!("  {:>4}  {}", code, registry.name_of(code).unwrap_or("?"));
    }
    Ok(())
}

fn show_info() -> Result<()> {
    println!("payload-dump {}", daq_payload::VERSION);
    println!("Build information:");
    println!("  Target: {}", std::env::consts::ARCH);
    println!("  OS: {}", std::env::consts::OS);
    println!("  Default granularity: {} bytes", daq_payload::buffers::DEFAULT_GRANULARITY);
    println!("  Envelope: {} bytes", daq_payload::payloads::ENVELOPE_LEN);
    Ok(())
}
