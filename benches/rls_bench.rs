use chrono::{Duration, NaiveDate, NaiveDateTime};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use study_advisor::{
    AdvisorConfig, FeatureBuilder, MemoryStore, OnlineRls, QuizHistory, QuizRecord,
    SessionHistory, StudySession,
};

const TYPES: [&str; 3] = ["Top Down", "Bottom Up", "Questions"];

fn origin() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(7, 0, 0))
        .unwrap()
}

/// Roughly chronological sessions, a few per day, over `days` days.
fn synthetic_sessions(rng: &mut ChaCha8Rng, days: i64) -> Vec<StudySession> {
    let mut sessions = Vec::new();
    for day in 0..days {
        for _ in 0..rng.gen_range(1..5) {
            let offset = Duration::minutes(rng.gen_range(0..13 * 60));
            let start = origin() + Duration::days(day) + offset;
            let kind = TYPES[rng.gen_range(0..TYPES.len())];
            sessions.push(StudySession::new("bench", kind, start, rng.gen_range(300.0..5400.0)));
        }
    }
    sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    sessions
}

fn bench_rls_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("rls_update");
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    for dimension in [50, 150, 300] {
        let x: Vec<f64> = (0..dimension).map(|_| rng.gen_range(0.0..3600.0)).collect();
        let base = OnlineRls::new(dimension, 0.99, 1e5);

        group.bench_with_input(BenchmarkId::from_parameter(dimension), &dimension, |b, _| {
            b.iter(|| {
                let mut rls = base.clone();
                black_box(rls.update(black_box(&x), 75.0).ok())
            })
        });
    }
    group.finish();
}

fn bench_feature_grid(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let sessions = synthetic_sessions(&mut rng, 120);
    let config = AdvisorConfig {
        future_tolerance: None,
        ..Default::default()
    };
    let builder = match FeatureBuilder::from_config(&config) {
        Ok(builder) => builder,
        Err(err) => panic!("default config rejected: {err}"),
    };
    let types: Vec<String> = TYPES.iter().map(|s| s.to_string()).collect();
    let target = origin() + Duration::days(90);

    c.bench_function("feature_grid_120_days", |b| {
        b.iter(|| black_box(builder.build(target, black_box(&sessions), &types)))
    });
}

fn bench_full_retrain(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(1234);
    let store = MemoryStore::new();
    for session in synthetic_sessions(&mut rng, 90) {
        let _ = store.append_session(session);
    }
    for week in 1..12 {
        let date = origin().date() + Duration::days(week * 7);
        let _ = store.add_quiz("bench", QuizRecord::new(date, rng.gen_range(40.0..100.0)));
    }
    let config = AdvisorConfig::default();

    c.bench_function("retrain_11_quizzes", |b| {
        b.iter(|| black_box(study_advisor::retrain_course(&config, &store, "bench").is_ok()))
    });
}

criterion_group!(
    benches,
    bench_rls_update,
    bench_feature_grid,
    bench_full_retrain
);
criterion_main!(benches);
