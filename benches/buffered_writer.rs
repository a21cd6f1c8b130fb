use oml_collector::client::{BufferedWriter, OutStream, WriteError};
use std::sync::{Arc, Mutex};

criterion::criterion_main!(benches);
criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default()
        .without_plots()
        .noise_threshold(3.0)
        .significance_level(0.01)
        .sample_size(20)
        .measurement_time(std::time::Duration::from_secs(1));
    targets =
        pushing_small_measurements,
        pushing_under_sustained_backpressure,
        draining_through_a_sink,
}

/// A sink that always succeeds and discards its bytes, isolating the
/// queue/eviction machinery from any real I/O cost.
struct NullSink;

impl OutStream for NullSink {
    fn write(&mut self, body: &[u8], _header: Option<&[u8]>) -> Result<usize, WriteError> {
        Ok(body.len())
    }

    fn close(&mut self) {}
}

fn pushing_small_measurements(c: &mut criterion::Criterion) {
    let writer = BufferedWriter::create(Box::new(NullSink), 1 << 20, 8);
    c.bench_function("push a 64-byte measurement", |b| {
        b.iter(|| writer.push(&[0u8; 64], true).unwrap())
    });
    writer.close();
}

fn pushing_under_sustained_backpressure(c: &mut criterion::Criterion) {
    // A sink that never drains, forcing every push into the
    // non-blocking eviction path once the chain fills.
    let stalled: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    struct StalledSink(Arc<Mutex<Vec<u8>>>);
    impl OutStream for StalledSink {
        fn write(&mut self, _body: &[u8], _header: Option<&[u8]>) -> Result<usize, WriteError> {
            std::thread::sleep(std::time::Duration::from_secs(60));
            Ok(0)
        }
        fn close(&mut self) {}
    }
    let writer = BufferedWriter::create(Box::new(StalledSink(Arc::clone(&stalled))), 4096, 4);
    c.bench_function("push a 256-byte measurement under backpressure", |b| {
        b.iter(|| writer.push(&[0u8; 256], false).unwrap())
    });
    writer.close();
}

fn draining_through_a_sink(c: &mut criterion::Criterion) {
    c.bench_function("push+drain 1000 64-byte measurements", |b| {
        b.iter(|| {
            let writer = BufferedWriter::create(Box::new(NullSink), 1 << 20, 8);
            for _ in 0..1000 {
                writer.push(&[0u8; 64], true).unwrap();
            }
            writer.close();
        })
    });
}
