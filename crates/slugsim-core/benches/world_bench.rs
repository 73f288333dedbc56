use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use slugsim_core::{SlugSimConfig, World};

fn bench_world_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    // Steps per bench iteration (override via SLUGSIM_BENCH_STEPS).
    let steps: usize = std::env::var("SLUGSIM_BENCH_STEPS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1024);

    for &(width, height) in &[(80_u32, 24_u32), (200, 60)] {
        group.bench_function(format!("steps{steps}_grid{width}x{height}"), |b| {
            b.iter_batched(
                || {
                    let config = SlugSimConfig {
                        rng_seed: 0xBEEF,
                        ..SlugSimConfig::default()
                    };
                    let mut world = World::new(config).expect("world");
                    world.resize(width, height);
                    world
                },
                |mut world| {
                    for _ in 0..steps {
                        world.step();
                    }
                    world
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_world_steps);
criterion_main!(benches);
