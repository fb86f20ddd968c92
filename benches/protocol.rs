use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use guardia::protocol::{MessageHeader, RingBuffer};

fn header_bytes(message_length: i32, op_code: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    buf.extend_from_slice(&message_length.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&op_code.to_le_bytes());
    buf
}

fn bench_header_parse(c: &mut Criterion) {
    let insert_header = header_bytes(48, 2002);
    let short_packet = header_bytes(48, 2002)[0..15].to_vec();

    let mut group = c.benchmark_group("header_parse");

    group.bench_function("parse_insert_header", |b| {
        b.iter(|| black_box(MessageHeader::parse(black_box(&insert_header))));
    });

    group.bench_function("parse_short_packet", |b| {
        b.iter(|| black_box(MessageHeader::parse(black_box(&short_packet))));
    });

    group.finish();
}

fn bench_ring_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");

    for chunk_size in [16usize, 4096, 65536].iter() {
        group.bench_with_input(
            BenchmarkId::new("fill_and_reset", chunk_size),
            chunk_size,
            |b, &chunk_size| {
                let mut buffer = RingBuffer::new(1024 * 1024);
                let chunk = vec![0xABu8; chunk_size];

                b.iter(|| {
                    buffer.reset_cursor();
                    while buffer.remain_space() >= chunk.len() {
                        buffer.limited_cursor(chunk.len()).copy_from_slice(&chunk);
                        buffer.forward_cursor(chunk.len());
                    }
                    black_box(buffer.data().len());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_header_parse, bench_ring_buffer);
criterion_main!(benches);
