// Criterion benchmarks for Roommate Match

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use roommate_match::core::{compatibility_score, rank_candidates, Matcher, ScoredCandidate};
use roommate_match::models::{
    BasicPreference, Cleanliness, CriteriaWeights, Gender, GenderPreference, GuestPolicy,
    LifestylePreference, Profile, ScoreOutcome, SleepSchedule, UserSnapshot,
};
use roommate_match::services::{MemoryStore, UserRepository};

const SLEEP: [SleepSchedule; 4] = [
    SleepSchedule::EarlyBird,
    SleepSchedule::Normal,
    SleepSchedule::NightOwl,
    SleepSchedule::Flexible,
];
const GUESTS: [GuestPolicy; 4] = [
    GuestPolicy::Never,
    GuestPolicy::Rarely,
    GuestPolicy::Sometimes,
    GuestPolicy::Often,
];

fn create_profile(id: usize) -> Profile {
    Profile {
        user_id: format!("user-{:05}", id),
        age: 18 + (id % 12) as u8,
        gender: if id % 2 == 0 { Gender::Female } else { Gender::Male },
        bio: None,
        updated_at: None,
    }
}

fn create_user(id: usize) -> UserSnapshot {
    let user_id = format!("user-{:05}", id);
    UserSnapshot {
        profile: Some(create_profile(id)),
        basic: Some(BasicPreference {
            user_id: user_id.clone(),
            gender_preference: GenderPreference::Any,
            age_min: 18,
            age_max: 24 + (id % 6) as u8,
            budget_min: Some(300 + (id % 5) as u32 * 50),
            budget_max: Some(700 + (id % 7) as u32 * 50),
            location_preference: None,
        }),
        lifestyle: Some(LifestylePreference {
            user_id,
            sleep_schedule: SLEEP[id % 4],
            cleanliness: if id % 3 == 0 { Cleanliness::VeryClean } else { Cleanliness::Moderate },
            guest_policy: GUESTS[id % 4],
            smoking: id % 5 == 0,
            pets: id % 4 == 0,
        }),
    }
}

fn bench_compatibility_score(c: &mut Criterion) {
    let weights = CriteriaWeights::default();
    let a = create_user(0);
    let b = create_user(7);

    c.bench_function("compatibility_score", |bench| {
        bench.iter(|| compatibility_score(black_box(&a), black_box(&b), black_box(&weights)));
    });
}

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking");

    for candidate_count in [10, 50, 100, 500, 1000].iter() {
        let scored: Vec<ScoredCandidate> = (0..*candidate_count)
            .map(|i| {
                ScoredCandidate {
                    snapshot: create_user(i),
                    profile: create_profile(i),
                    outcome: ScoreOutcome::Computed((i * 37 % 101) as u8),
                }
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(candidate_count),
            candidate_count,
            |bench, _| {
                bench.iter(|| rank_candidates(black_box("requester"), scored.clone(), black_box(10)));
            },
        );
    }

    group.finish();
}

fn bench_find_matches(c: &mut Criterion) {
    let matcher = Matcher::with_default_weights();
    let mut group = c.benchmark_group("find_matches");

    for candidate_count in [10, 50, 200].iter() {
        let store = MemoryStore::new();
        tokio_test::block_on(async {
            for i in 0..=*candidate_count {
                let user = create_user(i);
                if let (Some(p), Some(b), Some(l)) = (&user.profile, &user.basic, &user.lifestyle) {
                    store.upsert_profile(p).await.expect("seed");
                    store.upsert_basic_preference(b).await.expect("seed");
                    store.upsert_lifestyle_preference(l).await.expect("seed");
                }
            }
        });

        group.bench_with_input(
            BenchmarkId::from_parameter(candidate_count),
            candidate_count,
            |bench, _| {
                bench.iter(|| {
                    tokio_test::block_on(matcher.find_matches(&store, black_box("user-00000"), 10))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_compatibility_score, bench_ranking, bench_find_matches);
criterion_main!(benches);
