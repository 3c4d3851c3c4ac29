use criterion::{black_box, criterion_group, criterion_main, Criterion};
use widetrie::{HashTrieMap, MapBuilder};

pub fn insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    group.bench_function("persistent insert 10000", |b| {
        b.iter(|| {
            let mut m: HashTrieMap<u32, u32> = HashTrieMap::new();
            for i in 0..10000 {
                m = m.insert(i, i);
            }
            black_box(m)
        })
    });

    group.bench_function("builder insert 10000", |b| {
        b.iter(|| {
            let mut builder: MapBuilder<u32, u32> = MapBuilder::new();
            for i in 0..10000 {
                builder.insert(i, i);
            }
            black_box(builder.freeze())
        })
    });

    group.bench_function("rpds insert 10000", |b| {
        b.iter(|| {
            let mut m = rpds::HashTrieMap::new();
            for i in 0..10000u32 {
                m = m.insert(i, i);
            }
            black_box(m)
        })
    });

    group.bench_function("rpds insert_mut 10000", |b| {
        b.iter(|| {
            let mut m = rpds::HashTrieMap::new();
            for i in 0..10000u32 {
                m.insert_mut(i, i);
            }
            black_box(m)
        })
    });
}

pub fn lookup(c: &mut Criterion) {
    let ours: HashTrieMap<u32, u32> = (0..10000).map(|i| (i, i)).collect();
    let rpds: rpds::HashTrieMap<u32, u32> = (0..10000).map(|i| (i, i)).collect();
    let mut group = c.benchmark_group("get");

    group.bench_function("ours 10000", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for i in 0..10000 {
                acc = acc.wrapping_add(*ours.get(&i).unwrap());
            }
            black_box(acc)
        })
    });

    group.bench_function("rpds 10000", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for i in 0..10000 {
                acc = acc.wrapping_add(*rpds.get(&i).unwrap());
            }
            black_box(acc)
        })
    });
}

pub fn remove(c: &mut Criterion) {
    let full: HashTrieMap<u32, u32> = (0..10000).map(|i| (i, i)).collect();
    let mut group = c.benchmark_group("remove");

    group.bench_function("persistent remove 10000", |b| {
        b.iter(|| {
            let mut m = full.clone();
            for i in 0..10000 {
                m = m.remove(&i);
            }
            black_box(m)
        })
    });

    group.bench_function("builder remove 10000", |b| {
        b.iter(|| {
            let mut builder = full.builder();
            for i in 0..10000 {
                builder.remove(&i);
            }
            black_box(builder.freeze())
        })
    });
}

pub fn iterate(c: &mut Criterion) {
    let ours: HashTrieMap<u32, u32> = (0..10000).map(|i| (i, i)).collect();
    let rpds: rpds::HashTrieMap<u32, u32> = (0..10000).map(|i| (i, i)).collect();
    let mut group = c.benchmark_group("iter");

    group.bench_function("ours 10000", |b| b.iter(|| black_box(ours.iter().count())));
    group.bench_function("rpds 10000", |b| b.iter(|| black_box(rpds.iter().count())));
}

criterion_group!(benches, insert, lookup, remove, iterate);
criterion_main!(benches);
