use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use tempfile::TempDir;
use votebox::ElectionService;
use votebox::config::Config;
use votebox::election::UploadChunk;
use votebox::types::Transition;

const ADMIN: &str = "admin123";

fn open_service(voters: usize) -> (TempDir, ElectionService) {
    let dir = TempDir::new().unwrap();
    let config = Config::for_testing(dir.path());
    std::fs::write(&config.admin.credential_file, ADMIN).unwrap();
    std::fs::write(
        config.storage.candidates_path(),
        "1,Alice,Blue,uploads/1.jpg\n2,Bob,Green,uploads/2.jpg\n",
    )
    .unwrap();
    let roll: String = (0..voters).map(|i| format!("{i:012},Voter {i}\n")).collect();
    std::fs::write(config.storage.voters_path(), roll).unwrap();

    let service = ElectionService::open(&config).unwrap();
    service.change_state(ADMIN, Transition::Start).unwrap();
    (dir, service)
}

/// One round of voting through the request-facing service
fn bench_voting_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("voting_round");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(100));

    for voters in [10usize, 100] {
        group.bench_with_input(BenchmarkId::new("voters", voters), &voters, |b, &voters| {
            b.iter_batched(
                || open_service(voters),
                |(_dir, service)| {
                    for i in 0..voters {
                        let choice = if i % 2 == 0 { "1" } else { "2" };
                        service
                            .cast_vote(&format!("{i:012}"), &format!("Voter {i}"), Some(choice))
                            .unwrap();
                    }
                    black_box(service.results(ADMIN).unwrap())
                },
                criterion::BatchSize::PerIteration,
            )
        });
    }

    group.finish();
}

fn bench_rejected_repeat_vote(c: &mut Criterion) {
    let (_dir, service) = open_service(1);
    service
        .cast_vote("000000000000", "Voter 0", Some("1"))
        .unwrap();

    c.bench_function("repeat_vote_rejection", |b| {
        b.iter(|| {
            black_box(
                service
                    .cast_vote(black_box("000000000000"), "Voter 0", Some("2"))
                    .is_err(),
            )
        })
    });
}

fn bench_portrait_upload(c: &mut Criterion) {
    let mut group = c.benchmark_group("portrait_upload");
    let (_dir, service) = open_service(0);

    for size in [64 * 1024usize, 1024 * 1024] {
        let image = vec![0xA5u8; size];
        group.bench_with_input(BenchmarkId::new("bytes", size), &image, |b, image| {
            b.iter(|| {
                let mut upload = service.begin_upload();
                let mut offset = 0u64;
                for (i, piece) in image.chunks(16 * 1024).enumerate() {
                    let mut chunk = UploadChunk::new(offset, piece);
                    if i == 0 {
                        chunk = chunk.with_content_type("image/jpeg").with_filename("p.jpg");
                    }
                    upload.push(chunk).unwrap();
                    offset += piece.len() as u64;
                }
                upload.push(UploadChunk::end_of_field(offset)).unwrap();
                black_box(upload.bytes_received());
                upload.abort();
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_voting_round,
    bench_rejected_repeat_vote,
    bench_portrait_upload
);
criterion_main!(benches);
