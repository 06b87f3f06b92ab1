//! Throughput benchmarks for the XCodec encode/decode path.
//!
//! ## What is measured
//! - `encode_throughput`: bytes/sec through [`xcodec_core::Encoder::encode`]
//!   across payload shapes ranging from pure-literal (no repeated segments,
//!   the worst case for the rolling hash scan) to heavily-repeating (mostly
//!   BACKREF/REF hits, the case the codec exists for).
//! - `decode_throughput`: bytes/sec through [`xcodec_core::Decoder::decode`]
//!   fed the corresponding encoded wire stream.
//!
//! ## Run
//! ```bash
//! cargo bench --bench bench_codec
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use xcodec_core::{DictionaryCache, Decoder, Encoder, Role, SEGMENT_LEN};

/// Builds a payload of `total_len` bytes built from `distinct_segments`
/// different `SEGMENT_LEN`-byte patterns repeated in round-robin order, so
/// the repetition ratio (and therefore the REF/BACKREF hit rate) is
/// controlled precisely by `distinct_segments`.
fn payload(total_len: usize, distinct_segments: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(total_len);
    let mut which = 0usize;
    while out.len() + SEGMENT_LEN <= total_len {
        let byte = (which % distinct_segments.max(1)) as u8;
        out.extend(std::iter::repeat(byte).take(SEGMENT_LEN));
        which += 1;
    }
    out.resize(total_len, 0xab);
    out
}

fn encode_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_throughput");
    let len = 1 << 20;
    group.throughput(Throughput::Bytes(len as u64));

    for (label, distinct) in [("all_literal", len / SEGMENT_LEN), ("highly_repetitive", 4)] {
        let data = payload(len, distinct);
        group.bench_with_input(BenchmarkId::new("shape", label), &data, |b, data| {
            b.iter(|| {
                let cache = DictionaryCache::new();
                let mut encoder = Encoder::new(cache, 256, Role::Client);
                let mut out = Vec::with_capacity(data.len());
                encoder.encode(data, &mut out);
                encoder.finish(&mut out);
                out
            });
        });
    }
    group.finish();
}

fn decode_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_throughput");
    let len = 1 << 20;

    for (label, distinct) in [("all_literal", len / SEGMENT_LEN), ("highly_repetitive", 4)] {
        let data = payload(len, distinct);
        let cache = DictionaryCache::new();
        let mut encoder = Encoder::new(cache, 256, Role::Client);
        let mut wire = Vec::with_capacity(data.len());
        encoder.encode(&data, &mut wire);
        encoder.finish(&mut wire);

        // Validate round-trip correctness once, outside the timed loop below —
        // `highly_repetitive` drives consecutive BACKREFs, the one path that
        // silently produces wrong (but well-formed, non-erroring) output if
        // the decoder's window ever drifts from the encoder's.
        {
            let cache = DictionaryCache::new();
            let mut decoder = Decoder::new(cache, 256, false, Role::Server);
            let mut output = Vec::with_capacity(wire.len());
            let mut events = Vec::new();
            decoder.decode(&wire, &mut output, &mut events).unwrap();
            assert_eq!(output, data, "decode round-trip mismatch for {label} payload");
        }

        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_with_input(BenchmarkId::new("shape", label), &wire, |b, wire| {
            b.iter(|| {
                let cache = DictionaryCache::new();
                let mut decoder = Decoder::new(cache, 256, false, Role::Server);
                let mut output = Vec::with_capacity(wire.len());
                let mut events = Vec::new();
                decoder.decode(wire, &mut output, &mut events).unwrap();
                output
            });
        });
    }
    group.finish();
}

criterion_group!(codec_benches, encode_throughput, decode_throughput);
criterion_main!(codec_benches);
