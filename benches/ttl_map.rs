use criterion::{black_box, criterion_group, criterion_main, Criterion};
use forwardcache::TtlMap;
use tokio::runtime::Runtime;

fn put_get_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let map = TtlMap::new(256).unwrap();

    c.bench_function("ttl_map_put_get_roundtrip", |b| {
        b.iter(|| {
            rt.block_on(async {
                map.put("example.com", "93.184.216.34").await;
                black_box(map.get("example.com").await);
            })
        })
    });
}

fn put_under_collision(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    // A single bucket forces every insert through the same chain, matching
    // the worst-case behavior the original's hashmap degrades to under a
    // poor bucket count choice.
    let map = TtlMap::new(1).unwrap();
    for i in 0..256 {
        rt.block_on(map.put(&format!("host{i}.example"), "10.0.0.1"));
    }

    c.bench_function("ttl_map_get_under_collision", |b| {
        b.iter(|| {
            rt.block_on(async { black_box(map.get("host128.example").await) })
        })
    });
}

criterion_group!(benches, put_get_roundtrip, put_under_collision);
criterion_main!(benches);
