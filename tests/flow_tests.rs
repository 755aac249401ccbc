//! Integration tests for the CPU side of the particle flow.
//!
//! These exercise the pieces a frame is assembled from (settings, the
//! attraction registry, the physics reference, the color ramp and the
//! buffer bookkeeping) through the public API only. GPU resources are not
//! created here; the kernels are checked with naga instead.

use particle_flow::attraction::{default_layout, ActivePoint, AttractionRegistry};
use particle_flow::color::{Argb, GradientRamp, HueDirection, RAMP_WIDTH};
use particle_flow::config::{Capabilities, FrameConfig, Settings, SettingsStore};
use particle_flow::gpu::particles::{BufferPlanner, BufferRotation, BufferSpec, Plan};
use particle_flow::physics::{
    acceleration, advance, advance_stored, pack_velocity, seed_position, seed_radius, unpack_velocity,
    SimParams,
};
use particle_flow::shader::{compute_shader, BLIT_SHADER, RENDER_SHADER};
use particle_flow::visuals::{BlendPolicy, RenderMode};
use particle_flow::Vec2;
use rand::{Rng, SeedableRng};

fn approx(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

fn point(index: u32, x: f32, y: f32) -> ActivePoint {
    ActivePoint {
        index,
        position: Vec2::new(x, y),
    }
}

fn validate_wgsl(code: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(code).map_err(|e| format!("WGSL parse error: {:?}", e))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("WGSL validation error: {:?}", e))?;

    Ok(module)
}

// ============================================================================
// Reseed
// ============================================================================

#[test]
fn test_reseed_positions_stay_inside_disk() {
    let (width, height) = (1920, 1080);
    let center = Vec2::new(960.0, 540.0);
    let radius = seed_radius(width, height);

    for seed in [1, 2, 77] {
        for index in 0..10_000 {
            let p = seed_position(index, seed, center, radius);
            assert!(
                p.distance(center) <= radius + 1e-2,
                "particle {} (seed {}) landed outside the disk: {:?}",
                index,
                seed,
                p
            );
        }
    }
}

#[test]
fn test_reseed_differs_between_seeds() {
    let center = Vec2::new(100.0, 100.0);
    let moved = (0..100)
        .filter(|&i| seed_position(i, 1, center, 50.0) != seed_position(i, 2, center, 50.0))
        .count();
    assert!(moved > 90, "only {} of 100 particles moved between seeds", moved);
}

#[test]
fn test_reseed_params_cover_surface() {
    let params = SimParams::reseed(1_000, 3, 800, 600);
    assert_eq!(params.pair_count, 500);
    assert_eq!(params.reset, 1);
    assert_eq!(params.center, [400.0, 300.0]);
    assert!(approx(params.radius, 500.0, 1e-3));
}

#[test]
fn test_reseeded_velocity_is_zero() {
    assert_eq!(pack_velocity(Vec2::ZERO), 0);
    assert_eq!(unpack_velocity(0), Vec2::ZERO);
}

// ============================================================================
// Physics
// ============================================================================

#[test]
fn test_no_points_only_drag() {
    let position = Vec2::new(10.0, 20.0);
    let velocity = Vec2::new(4.0, -2.0);
    let (p, v) = advance(7, position, velocity, &[], 100.0, 0.5);

    assert_eq!(v, Vec2::new(2.0, -1.0));
    assert_eq!(p, Vec2::new(12.0, 19.0));
}

#[test]
fn test_no_points_only_drag_stored() {
    let position = Vec2::new(10.0, 20.0);
    let stored = pack_velocity(Vec2::new(4.0, -2.0));
    let (p, v) = advance_stored(7, position, stored, &[], 100.0, 0.5);

    // Small powers of two survive half precision exactly.
    assert_eq!(unpack_velocity(v), Vec2::new(2.0, -1.0));
    assert_eq!(p, Vec2::new(12.0, 19.0));
}

#[test]
fn test_particle_on_point_gets_unit_pull() {
    let position = Vec2::new(50.0, 50.0);
    let points = [point(3, 50.0, 50.0)];

    for index in 0..64 {
        let acc = acceleration(index, position, &points, 5.0);
        assert!(acc.is_finite());
        assert!(approx(acc.length(), 5.0, 1e-4), "index {}: |acc| = {}", index, acc.length());
    }
}

#[test]
fn test_inverse_distance_pull() {
    // attraction / |d|² · d: at distance 10 along x the pull is 1/10 · attraction.
    let acc = acceleration(0, Vec2::ZERO, &[point(0, 10.0, 0.0)], 100.0);
    assert!(approx(acc.x, 10.0, 1e-4));
    assert!(approx(acc.y, 0.0, 1e-6));
}

#[test]
fn test_full_drag_stops_particle() {
    let (p, v) = advance(0, Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0), &[point(0, 9.0, 9.0)], 1000.0, 0.0);
    assert_eq!(v, Vec2::ZERO);
    assert_eq!(p, Vec2::new(1.0, 1.0));
}

#[test]
fn test_random_particles_stay_finite() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    let points: Vec<ActivePoint> = (0..5)
        .map(|i| point(i, rng.gen_range(0.0..1920.0), rng.gen_range(0.0..1080.0)))
        .collect();

    for index in 0..2_000 {
        let mut position = Vec2::new(rng.gen_range(0.0..1920.0), rng.gen_range(0.0..1080.0));
        let mut velocity = Vec2::ZERO;
        for _ in 0..50 {
            (position, velocity) = advance(index, position, velocity, &points, 100.0, 0.96);
        }
        assert!(position.is_finite(), "particle {} diverged", index);
        assert!(velocity.is_finite(), "particle {} diverged", index);
    }
}

#[test]
fn test_step_params_carry_slots() {
    let points = [point(2, 1.0, 2.0), point(9, 3.0, 4.0)];
    let params = SimParams::step(10, &points, 50.0, 0.9);

    assert_eq!(params.pair_count, 5);
    assert_eq!(params.point_count, 2);
    assert_eq!(params.reset, 0);
    assert_eq!(params.points[0], [1.0, 2.0, 2.0, 0.0]);
    assert_eq!(params.points[1], [3.0, 4.0, 9.0, 0.0]);
    assert_eq!(std::mem::size_of::<SimParams>(), 304);
}

// ============================================================================
// Attraction Registry
// ============================================================================

#[test]
fn test_active_list_is_compacted_in_slot_order() {
    let registry = AttractionRegistry::new();
    registry.set(9, Some(Vec2::new(9.0, 9.0)));
    registry.set(2, Some(Vec2::new(2.0, 2.0)));
    registry.set(5, Some(Vec2::new(5.0, 5.0)));

    let indices: Vec<u32> = registry.active_list().iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![2, 5, 9]);
}

#[test]
fn test_registry_clones_share_slots() {
    let registry = AttractionRegistry::new();
    let input_side = registry.clone();
    input_side.set(0, Some(Vec2::ONE));

    assert_eq!(registry.active_count(), 1);
    input_side.set(0, None);
    assert_eq!(registry.active_count(), 0);
}

#[test]
fn test_default_ring_fills_registry() {
    let registry = AttractionRegistry::new();
    registry.set(15, Some(Vec2::ZERO));
    registry.reset_to_default(900, 600, 5);

    let active = registry.active_list();
    assert_eq!(active.len(), 5);
    assert_eq!(active[0].position, default_layout(900, 600, 5)[0]);
    assert!(active.iter().all(|p| p.index < 5));
}

// ============================================================================
// Color Ramp
// ============================================================================

#[test]
fn test_ramp_endpoints_match_colors() {
    let ramp = GradientRamp::build(Argb(0xFF00_00FF), Argb(0xFFFF_0000), HueDirection::Increasing);
    assert_eq!(ramp.first(), [0, 0, 255, 255]);
    assert_eq!(ramp.last(), [255, 0, 0, 255]);
    assert_eq!(ramp.as_bytes().len(), RAMP_WIDTH * 4);
}

#[test]
fn test_ramp_wraps_through_red_when_increasing() {
    // ~350° to ~10°
    let slow = Argb(0xFFFF_002B);
    let fast = Argb(0xFFFF_2B00);

    for index in 0..RAMP_WIDTH {
        let hue = GradientRamp::sample_hsv(slow, fast, HueDirection::Increasing, index).hue;
        assert!(hue >= 345.0 || hue <= 15.0, "sample {} left the red arc: {}", index, hue);
    }

    let middle = GradientRamp::sample_hsv(slow, fast, HueDirection::Decreasing, RAMP_WIDTH / 2).hue;
    assert!((90.0..=270.0).contains(&middle), "long way round should pass cyan, got {}", middle);
}

#[test]
fn test_hue_flag_mapping() {
    assert_eq!(HueDirection::from_flag(0), HueDirection::Increasing);
    assert_eq!(HueDirection::from_flag(1), HueDirection::Decreasing);
    assert_eq!(HueDirection::from_flag(42), HueDirection::Increasing);
}

#[test]
fn test_signed_color_ints() {
    assert_eq!(Argb::from_int(-16_777_216), Argb::BLACK);
    assert_eq!(Argb::from_int(4_278_190_080), Argb::BLACK);
}

// ============================================================================
// Buffer Bookkeeping
// ============================================================================

#[test]
fn test_rotation_parity() {
    let mut rotation = BufferRotation::new(true);
    for n in 0..9 {
        assert_eq!(rotation.read(), n % 2);
        assert_ne!(rotation.read(), rotation.write());
        rotation.advance();
    }

    let mut single = BufferRotation::new(false);
    for _ in 0..9 {
        assert_eq!(single.read(), 0);
        assert_eq!(single.write(), 0);
        single.advance();
    }
}

#[test]
fn test_resize_does_not_reseed() {
    let spec = BufferSpec {
        count: 1_000,
        double_buffer: true,
    };
    let mut planner = BufferPlanner::default();
    assert_eq!(planner.plan(spec), Plan::Allocate);
    planner.allocated(spec);
    assert!(planner.pending_reseed().is_some());
    planner.reseeded();

    // A surface resize leaves the spec untouched.
    assert_eq!(planner.plan(spec), Plan::Keep);
    assert_eq!(planner.pending_reseed(), None);
}

#[test]
fn test_count_change_reallocates_and_reseeds() {
    let small = BufferSpec {
        count: 1_000,
        double_buffer: false,
    };
    let large = BufferSpec { count: 2_000, ..small };
    let mut planner = BufferPlanner::default();
    planner.allocated(small);
    let first = planner.pending_reseed();
    planner.reseeded();

    assert_eq!(planner.plan(large), Plan::Allocate);
    planner.allocated(large);
    let second = planner.pending_reseed();
    assert!(second.is_some());
    assert_ne!(first, second);
    assert_eq!(planner.generation(), 2);
}

#[test]
fn test_failed_spec_is_not_retried() {
    let spec = BufferSpec {
        count: 400_000_000,
        double_buffer: true,
    };
    let mut planner = BufferPlanner::default();
    planner.failed(spec);
    assert_eq!(planner.plan(spec), Plan::Skip);
    assert_eq!(planner.current(), None);

    let smaller = BufferSpec { count: 1_000, ..spec };
    assert_eq!(planner.plan(smaller), Plan::Allocate);
}

#[test]
fn test_buffer_sizes() {
    let spec = BufferSpec {
        count: 1_000,
        double_buffer: true,
    };
    assert_eq!(spec.sets(), 2);
    assert_eq!(spec.position_bytes(), 8_000);
    assert_eq!(spec.velocity_bytes(), 4_000);
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn test_settings_file_to_frame_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{
            "NumParticles": 1001,
            "F01Drag": 250,
            "WorkgroupSize": 100,
            "SlowColor": -16776961,
            "motion_blur": true,
            "unknown_key": "ignored"
        }"#,
    )
    .unwrap();

    let store = SettingsStore::load(&path).unwrap();
    let config = FrameConfig::from_settings(&store.snapshot(), &Capabilities::default());

    assert_eq!(config.particle_count, 1002);
    assert_eq!(config.drag, 0.0);
    assert_eq!(config.workgroup_size, 96);
    assert_eq!(config.slow_color, Argb(0xFF00_00FF));
    assert_eq!(config.render_mode(), RenderMode::BlurTriangles);
    assert_eq!(config.blend_policy(), BlendPolicy::select(false, false, true));
    // Untouched keys keep their defaults.
    assert_eq!(config.default_points, 5);
}

#[test]
fn test_reload_bumps_generation_only_on_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{ "NumParticles": 5000 }"#).unwrap();

    let store = SettingsStore::load(&path).unwrap();
    let start = store.generation();

    store.reload(&path).unwrap();
    assert_eq!(store.generation(), start);

    std::fs::write(&path, r#"{ "NumParticles": 6000 }"#).unwrap();
    store.reload(&path).unwrap();
    assert_eq!(store.generation(), start + 1);
    assert_eq!(store.snapshot().num_particles, 6000);
}

#[test]
fn test_broken_settings_file_keeps_old_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{ "ParticleSize": 3 }"#).unwrap();
    let store = SettingsStore::load(&path).unwrap();

    std::fs::write(&path, "{ not json").unwrap();
    assert!(store.reload(&path).is_err());
    assert_eq!(store.snapshot().particle_size, 3);
}

#[test]
fn test_particle_count_respects_capacity() {
    let caps = Capabilities {
        max_particles: 10_000,
        max_workgroup_size: 256,
    };
    let mut settings = Settings::default();
    settings.num_particles = 50_000_000;
    assert_eq!(FrameConfig::from_settings(&settings, &caps).particle_count, 10_000);

    settings.num_particles = -3;
    assert_eq!(FrameConfig::from_settings(&settings, &caps).particle_count, 2);
}

#[test]
fn test_settings_json_round_trip_keeps_key_names() {
    let json = Settings::default().to_json().unwrap();
    assert!(json.contains("\"NumParticles\""));
    assert!(json.contains("\"use_double_buffer\""));
    assert_eq!(Settings::from_json(&json).unwrap(), Settings::default());
}

// ============================================================================
// Shaders
// ============================================================================

#[test]
fn test_kernels_validate_across_workgroup_sizes() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    for _ in 0..8 {
        let workgroup_size = rng.gen_range(1..=32) * 32;
        for in_place in [true, false] {
            let source = compute_shader(workgroup_size, in_place);
            if let Err(e) = validate_wgsl(&source) {
                panic!("kernel wg={} in_place={} failed:\n{}", workgroup_size, in_place, e);
            }
        }
    }
}

#[test]
fn test_render_and_blit_shaders_validate() {
    let render = validate_wgsl(RENDER_SHADER).unwrap();
    for entry in ["vs_point", "vs_sprite", "vs_trail", "vs_streak"] {
        assert!(
            render.entry_points.iter().any(|e| e.name == entry),
            "render shader lacks {}",
            entry
        );
    }
    validate_wgsl(BLIT_SHADER).unwrap();
}
