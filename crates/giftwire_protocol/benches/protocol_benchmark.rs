//! Benchmark for response decoding.
//!
//! TARGET: a 5,000-item inventory response decoded well under one read
//! attempt's timeout.
//!
//! Run with: cargo bench --package giftwire_protocol --bench protocol_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use giftwire_protocol::{elements_named, Command, ITEM_TAG};

fn inventory_response(items: usize) -> String {
    let mut text = String::from("<MYPARAM login=\"bench\">");
    for i in 0..items {
        text.push_str(&format!(
            "<O id=\"{i}\" txt=\"Item {}\" section=\"{}\" max_count=\"99\" count=\"{}\"/>",
            i % 37,
            i % 6,
            i % 9 + 1
        ));
    }
    text.push_str("</MYPARAM>");
    text
}

fn benchmark_inventory_decode(c: &mut Criterion) {
    let text = inventory_response(5_000);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("inventory_5000_items", |b| {
        b.iter(|| {
            let items = elements_named(black_box(&text), ITEM_TAG);
            black_box(items.len())
        });
    });
    group.finish();
}

fn benchmark_frame_encode(c: &mut Criterion) {
    let command = Command::Delete {
        id: "1234567".to_string(),
        count: 12,
    };

    c.bench_function("encode_delete_frame", |b| {
        b.iter(|| black_box(command.encode()));
    });
}

criterion_group!(benches, benchmark_inventory_decode, benchmark_frame_encode);
criterion_main!(benches);
