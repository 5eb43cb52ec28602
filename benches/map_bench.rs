use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use fxhash::FxBuildHasher;
use hashgroup::HashMap;

const ITER: u64 = 32 * 1024;

fn task_create_and_insert(values: &[u64]) -> HashMap<u64, u64, FxBuildHasher> {
    let mut map: HashMap<u64, u64, FxBuildHasher> =
        HashMap::with_capacity_and_hasher(ITER as usize, FxBuildHasher::default());
    for &v in values {
        map.insert(v, v.wrapping_mul(31));
    }
    map
}

fn create_and_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("map/create_and_insert");
    group.throughput(Throughput::Elements(ITER));
    let values: Vec<u64> = (0..ITER).collect();
    group.bench_function("1", |bencher| bencher.iter(|| task_create_and_insert(&values)));
    group.finish();
}

fn task_get_values(map: &HashMap<u64, u64, FxBuildHasher>, values: &[u64]) {
    for &v in values {
        assert_eq!(map.get(&v), Some(&v.wrapping_mul(31)));
    }
}

fn get_already_present(c: &mut Criterion) {
    let mut group = c.benchmark_group("map/get_already_present");
    group.throughput(Throughput::Elements(ITER));
    let values: Vec<u64> = (0..ITER).collect();
    let map = task_create_and_insert(&values);
    group.bench_function("1", |bencher| bencher.iter(|| task_get_values(&map, &values)));
    group.finish();
}

fn task_iterate(map: &HashMap<u64, u64, FxBuildHasher>) -> u64 {
    map.iter().map(|(_, v)| *v).fold(0u64, u64::wrapping_add)
}

fn iterate_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("map/iterate_entries");
    group.throughput(Throughput::Elements(ITER));
    let values: Vec<u64> = (0..ITER).collect();
    let map = task_create_and_insert(&values);
    group.bench_function("1", |bencher| bencher.iter(|| task_iterate(&map)));
    group.finish();
}

fn task_remove_all(values: &[u64]) {
    let mut map = task_create_and_insert(values);
    for &v in values {
        map.remove(&v);
    }
}

fn remove_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("map/remove_all");
    group.throughput(Throughput::Elements(ITER));
    let values: Vec<u64> = (0..ITER).collect();
    group.bench_function("1", |bencher| bencher.iter(|| task_remove_all(&values)));
    group.finish();
}

criterion_group!(benches, create_and_insert, get_already_present, iterate_entries, remove_all);
criterion_main!(benches);
