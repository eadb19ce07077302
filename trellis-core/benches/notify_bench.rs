use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use trellis_core::{observe, Array, Subscriber, Value};

fn wide_object(fields: usize) -> Value {
    let value = Value::object((0..fields).map(|i| (format!("f{i}"), i)));
    observe(&value);
    value
}

fn bench_field_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify/field_write");

    for &subscribers in &[1, 10, 100] {
        let state = wide_object(1);
        let subs: Vec<Subscriber> = (0..subscribers)
            .map(|_| {
                let reader = state.clone();
                Subscriber::new(move || reader.get("f0"), |_, _| {}).unwrap()
            })
            .collect();

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &subscribers, |b, _| {
            let mut n = 0u32;
            b.iter(|| {
                n = n.wrapping_add(1);
                state.set("f0", black_box(n)).unwrap();
            });
        });

        drop(subs);
    }

    group.finish();
}

fn bench_wide_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify/wide_read");

    for &fields in &[10, 100, 1_000] {
        let state = wide_object(fields);
        let keys: Vec<String> = (0..fields).map(|i| format!("f{i}")).collect();

        let reader = state.clone();
        let sub = Subscriber::new(
            move || {
                let mut total = 0.0;
                for key in &keys {
                    total += reader.get(key)?.as_f64().unwrap_or(0.0);
                }
                Ok(total)
            },
            |_, _| {},
        )
        .unwrap();

        group.throughput(Throughput::Elements(fields as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fields), &fields, |b, _| {
            b.iter(|| sub.update().unwrap());
        });
    }

    group.finish();
}

fn bench_array_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify/array_push");

    for &size in &[100, 1_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter(|| {
                let list = Value::Array(Array::new());
                observe(&list);
                let array = list.expect_array().unwrap();
                for i in 0..n {
                    array.push([Value::object([("i", i)])]).unwrap();
                }
                black_box(array.len());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_field_write, bench_wide_read, bench_array_push);
criterion_main!(benches);
