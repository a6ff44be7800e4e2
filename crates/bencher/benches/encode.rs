use std::hint::black_box;
use bencher::{search_users, update_profile, upload_avatar};
use criterion::{Criterion, criterion_group, criterion_main};
use http::Method;
use micro_bind::{Binder, Get, Post};

fn benchmark_encode(criterion: &mut Criterion) {
    let binder = Binder::default();
    let search = search_users();
    let update = update_profile();
    let upload = upload_avatar();

    let mut group = criterion.benchmark_group("encode");
    group.bench_function("query_header_cookie", |b| {
        b.iter(|| black_box(binder.request_for::<Get, _>("/users", &search).expect("search should encode")));
    });
    group.bench_function("json_body", |b| {
        b.iter(|| black_box(binder.encode(Method::PUT, "/users/:id", &update).expect("update should encode")));
    });
    group.bench_function("multipart", |b| {
        b.iter(|| {
            black_box(binder.request_for::<Post, _>("/users/{id}/avatar", &upload).expect("upload should encode"))
        });
    });
    group.finish();
}

criterion_group!(encode, benchmark_encode);
criterion_main!(encode);
