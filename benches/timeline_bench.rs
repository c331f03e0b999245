//! Timeline throughput: sorting a round and playing it back.
//!
//! Run with: `cargo bench --bench timeline`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use serde_json::Value;
use turnforge::events::EventBus;
use turnforge::planning::{PlannedAction, Side};
use turnforge::timeline::{EntryExecutor, PlayOptions, RoundRules, TieBreak, TimelineEntry, TimelineManager};

fn actions(count: usize, source: Side) -> Vec<PlannedAction> {
    (0..count)
        .map(|i| PlannedAction {
            action_id: format!("a_{i}"),
            source,
            source_id: "bench".into(),
            skill_id: format!("skill_{}", i % 7),
            target_id: "dummy".into(),
            body_part: "torso".into(),
            cost: 1,
            // Few distinct speeds, so most entries tie on time.
            speed: (i % 5) as f64,
            priority: (i % 3) as i32,
            time: None,
            slot_key: None,
        })
        .collect()
}

struct Noop;

impl EntryExecutor for Noop {
    async fn execute_entry(&mut self, _entry: &TimelineEntry) -> Result<Value, String> {
        Ok(Value::Null)
    }

    fn can_continue(&self) -> bool {
        true
    }
}

fn bench_sort(c: &mut Criterion) {
    let rules = RoundRules::tie_break(TieBreak::Alternate);
    let mut group = c.benchmark_group("timeline_sort");

    for size in [8usize, 64, 512] {
        let selfs = actions(size / 2, Side::Player);
        let enemies = actions(size / 2, Side::Enemy);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter_batched(
                || TimelineManager::new(EventBus::new()),
                |mut timeline| {
                    let loaded = timeline.load_round_actions(2, &selfs, &enemies, &rules);
                    black_box(loaded.map(|_| timeline.entries().len()))
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_playback(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let selfs = actions(32, Side::Player);
    let enemies = actions(32, Side::Enemy);

    let mut group = c.benchmark_group("timeline_playback");
    group.throughput(Throughput::Elements(64));
    group.bench_function("64_entries", |b| {
        b.iter_batched(
            || {
                let mut timeline = TimelineManager::new(EventBus::new());
                timeline
                    .load_round_actions(1, &selfs, &enemies, &RoundRules::default())
                    .expect("round loads");
                timeline
            },
            |mut timeline| {
                let outcome = runtime.block_on(timeline.start(&mut Noop, PlayOptions::default()));
                black_box(outcome.is_ok())
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_sort, bench_playback);
criterion_main!(benches);
