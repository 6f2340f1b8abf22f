use std::borrow::Cow;
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use prebot::bus::{BusEvent, EventBus, Owner};

// Dispatch cost of the event bus on its own, with a minimal event type so
// nothing but queueing, lookup and handler invocation is measured.

struct Tick(&'static str);

impl BusEvent for Tick {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.0)
    }
}

fn bus_with_handlers(handlers: usize) -> (EventBus<Tick>, Arc<AtomicU64>) {
    let bus = EventBus::new();
    let hits = Arc::new(AtomicU64::new(0));
    for i in 0..handlers {
        let hits = Arc::clone(&hits);
        bus.on("tick", Owner::new(format!("h{i}")), move |_, _: &Tick| {
            hits.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
    }
    (bus, hits)
}

fn dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus");
    const BATCH: u64 = 1000;
    group.throughput(Throughput::Elements(BATCH));

    for handlers in [1usize, 8] {
        let (bus, hits) = bus_with_handlers(handlers);
        group.bench_function(format!("trigger_poll_{handlers}_handlers"), |b| {
            b.iter(|| {
                for _ in 0..BATCH {
                    bus.trigger(Tick("tick"));
                }
                black_box(bus.poll())
            })
        });
        black_box(hits.load(Ordering::Relaxed));
    }

    let (bus, _) = bus_with_handlers(1);
    group.bench_function("unhandled_events", |b| {
        b.iter(|| {
            for _ in 0..BATCH {
                bus.trigger(Tick("nobody-listens"));
            }
            black_box(bus.poll())
        })
    });

    group.finish();
}

fn registration_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    group.throughput(Throughput::Elements(1));

    group.bench_function("register_unregister_all", |b| {
        let bus: EventBus<Tick> = EventBus::new();
        let owner = Owner::new("bench");
        b.iter(|| {
            for event in ["a", "b", "c", "d"] {
                bus.on(event, owner.clone(), |_, _: &Tick| Ok(()));
            }
            black_box(bus.unregister_all(&owner))
        })
    });

    group.finish();
}

criterion_group!(benches, dispatch_benchmark, registration_benchmark);
criterion_main!(benches);
