use std::hint::black_box;
use bencher::{SEARCH, SearchUsers, TestCase, UPDATE, UPLOAD, UpdateProfile, UploadAvatar};
use criterion::measurement::WallTime;
use criterion::{BatchSize, BenchmarkGroup, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures::executor::block_on;
use micro_bind::{Binder, Record};

fn bench_case<R: Record>(group: &mut BenchmarkGroup<'_, WallTime>, binder: &Binder, case: &TestCase) {
    let metadata = binder.metadata::<R>();
    let path_params = case.fixture().path_params();

    group.throughput(Throughput::Bytes(case.fixture().len() as u64));
    group.bench_with_input(BenchmarkId::from_parameter(case.name()), case, |b, case| {
        b.iter_batched(
            || case.fixture().request(),
            |request| {
                let bound = block_on(binder.bind_with(&metadata, request, &path_params)).expect("fixture should bind");
                black_box(bound);
            },
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_bind(criterion: &mut Criterion) {
    let binder = Binder::default();
    binder.prewarm::<(SearchUsers, UpdateProfile, UploadAvatar)>();

    let mut group = criterion.benchmark_group("bind");
    bench_case::<SearchUsers>(&mut group, &binder, &TestCase::small("query_header_cookie", SEARCH));
    bench_case::<UpdateProfile>(&mut group, &binder, &TestCase::normal("json_body", UPDATE));
    bench_case::<UploadAvatar>(&mut group, &binder, &TestCase::normal("multipart", UPLOAD));
    group.finish();
}

fn benchmark_pool(criterion: &mut Criterion) {
    let binder = Binder::default();
    let metadata = binder.metadata::<UpdateProfile>();

    let mut group = criterion.benchmark_group("pool");
    group.bench_function("acquire_release", |b| {
        b.iter(|| black_box(metadata.acquire()));
    });
    group.bench_function("allocate", |b| {
        b.iter(|| black_box(Box::new(UpdateProfile::default())));
    });
    group.bench_function("metadata_lookup", |b| {
        b.iter(|| black_box(binder.metadata::<UpdateProfile>()));
    });
    group.finish();
}

criterion_group!(bind, benchmark_bind, benchmark_pool);
criterion_main!(bind);
