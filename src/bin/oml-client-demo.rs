//! A thin demonstration client binary wiring `BufferedWriter` to an
//! `OutStream` built from a collection URI (spec §6). The measurement
//! encoder that would produce the binary tuples pushed through
//! `BufferedWriter::push` is an external collaborator; this binary
//! pushes a hand-written metadata prologue and a handful of
//! measurement blobs to demonstrate the queue and sink wiring end to
//! end.

use clap::Parser;
use oml_collector::client::{BufferedWriter, FileStream, OutStream, TcpStream, ZlibStream};
use oml_collector::uri::parse_uri;

/// Connection target and tuning knobs for the demo writer.
#[derive(Parser)]
#[command(author, version, about = "oml-collector buffered writer demo")]
struct Args {
    /// A collection URI, e.g. `tcp:localhost:3003` or `file:/tmp/out.log`.
    #[arg(long, default_value = "file:/tmp/oml-client-demo.log")]
    uri: String,

    /// Wrap the sink in gzip/zlib framing (spec §6 "Zlib framing").
    #[arg(long)]
    zlib: bool,

    #[arg(long, default_value_t = 1 << 20)]
    queue_capacity_bytes: usize,

    #[arg(long, default_value_t = 8)]
    chain_chunk_count: usize,
}

fn build_stream(args: &Args) -> Box<dyn OutStream + Send> {
    let parsed = parse_uri(&args.uri);
    let base: Box<dyn OutStream + Send> = match parsed.protocol.as_deref() {
        Some("tcp") => {
            let port: u16 = parsed
                .port
                .as_deref()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3003);
            Box::new(TcpStream::new(parsed.path, port))
        }
        Some("flush") => Box::new(FileStream::new(parsed.path, true)),
        _ => Box::new(FileStream::new(parsed.path, false)),
    };
    if args.zlib {
        Box::new(ZlibStream::new(base))
    } else {
        base
    }
}

fn main() {
    let args = Args::parse();
    let stream = build_stream(&args);
    let writer = BufferedWriter::create(stream, args.queue_capacity_bytes, args.chain_chunk_count);

    writer
        .push_meta(b"protocol: 4\nschema: 0 power volts:double label:string\n\n")
        .expect("metadata is never dropped by back-pressure");

    for seq in 0..10u32 {
        let row = format!("1.{seq} 0 power 3.3 demo\n");
        writer.push(row.as_bytes(), true).expect("blocking push never fails");
    }

    writer.close();
}
