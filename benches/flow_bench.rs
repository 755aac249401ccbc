//! Benchmarks for the CPU-side work of a frame.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use particle_flow::attraction::{ActivePoint, AttractionRegistry, MAX_ATTRACTION_POINTS};
use particle_flow::color::{Argb, GradientRamp, HueDirection};
use particle_flow::config::{Capabilities, FrameConfig, Settings};
use particle_flow::physics::{advance, advance_stored, pack_velocity, seed_position, SimParams};
use particle_flow::shader::compute_shader;
use particle_flow::Vec2;
use rand::{Rng, SeedableRng};

fn ring(count: usize) -> Vec<ActivePoint> {
    particle_flow::attraction::default_layout(1920, 1080, count)
        .into_iter()
        .enumerate()
        .map(|(index, position)| ActivePoint {
            index: index as u32,
            position,
        })
        .collect()
}

fn bench_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("gradient_ramp");

    for direction in [HueDirection::Increasing, HueDirection::Decreasing] {
        group.bench_with_input(
            BenchmarkId::new("build", format!("{:?}", direction)),
            &direction,
            |b, &direction| {
                b.iter(|| {
                    black_box(GradientRamp::build(
                        Argb(0xFF00_00FF),
                        Argb(0xFFFF_0000),
                        direction,
                    ))
                })
            },
        );
    }

    group.finish();
}

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("attraction_registry");

    let registry = AttractionRegistry::new();
    for i in (0..MAX_ATTRACTION_POINTS).step_by(2) {
        registry.set(i, Some(Vec2::new(i as f32, i as f32)));
    }

    group.bench_function("active_list", |b| b.iter(|| black_box(registry.active_list())));
    group.bench_function("set", |b| {
        b.iter(|| registry.set(black_box(3), Some(Vec2::new(10.0, 20.0))))
    });

    group.finish();
}

fn bench_physics(c: &mut Criterion) {
    let mut group = c.benchmark_group("physics");
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);

    for count in [1_000u32, 10_000, 100_000] {
        let positions: Vec<Vec2> = (0..count)
            .map(|_| Vec2::new(rng.gen_range(0.0..1920.0), rng.gen_range(0.0..1080.0)))
            .collect();

        for points in [1, 5, MAX_ATTRACTION_POINTS] {
            let active = ring(points);
            group.bench_with_input(
                BenchmarkId::new(format!("advance_{}pts", points), count),
                &positions,
                |b, positions| {
                    b.iter(|| {
                        for (i, &p) in positions.iter().enumerate() {
                            black_box(advance(i as u32, p, Vec2::ZERO, &active, 100.0, 0.96));
                        }
                    })
                },
            );
        }

        let active = ring(5);
        let stored = pack_velocity(Vec2::new(1.5, -0.5));
        group.bench_with_input(BenchmarkId::new("advance_stored", count), &positions, |b, positions| {
            b.iter(|| {
                for (i, &p) in positions.iter().enumerate() {
                    black_box(advance_stored(i as u32, p, stored, &active, 100.0, 0.96));
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("seed_position", count), &count, |b, &count| {
            let center = Vec2::new(960.0, 540.0);
            b.iter(|| {
                for i in 0..count {
                    black_box(seed_position(i, 7, center, 1101.0));
                }
            })
        });
    }

    group.finish();
}

fn bench_frame_setup(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_setup");

    let settings = Settings::default();
    let caps = Capabilities::default();
    group.bench_function("frame_config", |b| {
        b.iter(|| black_box(FrameConfig::from_settings(black_box(&settings), &caps)))
    });

    let points = ring(5);
    group.bench_function("sim_params", |b| {
        b.iter(|| black_box(SimParams::step(1_000_000, black_box(&points), 100.0, 0.96)))
    });

    for workgroup_size in [64, 256] {
        group.bench_with_input(
            BenchmarkId::new("compute_shader", workgroup_size),
            &workgroup_size,
            |b, &workgroup_size| b.iter(|| black_box(compute_shader(workgroup_size, false))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_gradient, bench_registry, bench_physics, bench_frame_setup);
criterion_main!(benches);
