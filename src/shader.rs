//! WGSL sources.
//!
//! The compute kernel is generated per workgroup size and buffer mode. The
//! render and upscale shaders are fixed.

use bytemuck::{Pod, Zeroable};

use crate::attraction::MAX_ATTRACTION_POINTS;
use crate::physics::MAX_VELOCITY;

/// `ln 2 / 4.5`: maps `log2(speed² + 1)` onto the ramp.
pub const RAMP_SPEED_K: f32 = std::f32::consts::LN_2 / 4.5;

/// Uniform block of the render shader (48 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct RenderParams {
    /// Pixels to NDC: `(2 / width, 2 / height)`.
    pub scale: [f32; 2],
    pub offset: [f32; 2],
    /// Particle size in target pixels.
    pub point_size: f32,
    /// Trail length as a multiple of the velocity.
    pub blur: f32,
    /// Multiplier on the ramp color.
    pub color_scale: f32,
    /// Multiplier on `|v|²` before the ramp lookup.
    pub speed_norm: f32,
    /// Alpha of the particle body.
    pub alpha: f32,
    pub _pad: [f32; 3],
}

const SIM_PARAMS_WGSL: &str = r#"
struct SimParams {
    pair_count: u32,
    point_count: u32,
    reset: u32,
    seed: u32,
    attraction: f32,
    drag: f32,
    center: vec2<f32>,
    radius: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
    points: array<vec4<f32>, MAX_POINTS>,
};
"#;

/// Compute kernel source.
///
/// Each invocation owns two consecutive particles: one `vec4` of positions
/// and one `vec2<u32>` of half-float velocities. In-place kernels read and
/// write bindings 0 and 1. Ping-pong kernels write bindings 0 and 1 and read
/// bindings 3 and 4. Binding 2 is always [`crate::physics::SimParams`].
///
/// The dispatch may span two dimensions when the lane count exceeds one
/// dimension's workgroup limit.
pub fn compute_shader(workgroup_size: u32, in_place: bool) -> String {
    let (inputs, pos_in, vel_in) = if in_place {
        ("", "pos_out", "vel_out")
    } else {
        (
            r#"
@group(0) @binding(3)
var<storage, read> pos_in: array<vec4<f32>>;
@group(0) @binding(4)
var<storage, read> vel_in: array<vec2<u32>>;
"#,
            "pos_in",
            "vel_in",
        )
    };
    let sim_params = SIM_PARAMS_WGSL.replace("MAX_POINTS", &MAX_ATTRACTION_POINTS.to_string());
    let max_velocity = MAX_VELOCITY;

    format!(
        r#"{sim_params}
@group(0) @binding(0)
var<storage, read_write> pos_out: array<vec4<f32>>;
@group(0) @binding(1)
var<storage, read_write> vel_out: array<vec2<u32>>;
@group(0) @binding(2)
var<uniform> params: SimParams;
{inputs}
const TAU: f32 = 6.283185307179586;
const HASH_TO_UNIT: f32 = 2.3283064365386963e-10;
const SINGULARITY_RADIUS_SQ: f32 = 0.1;
const MAX_VELOCITY: f32 = {max_velocity:?};

fn hash(value: u32) -> u32 {{
    var x = value;
    x = ((x >> 16u) ^ x) * 0x45d9f3bu;
    x = ((x >> 16u) ^ x) * 0x45d9f3bu;
    return (x >> 16u) ^ x;
}}

fn seed_position(index: u32) -> vec2<f32> {{
    let base = index * 2u + hash(params.seed);
    let r = params.radius * sqrt(f32(hash(base)) * HASH_TO_UNIT);
    let theta = f32(hash(base + 1u)) * HASH_TO_UNIT * TAU;
    return params.center + r * vec2<f32>(cos(theta), sin(theta));
}}

fn acceleration(index: u32, p: vec2<f32>) -> vec2<f32> {{
    var acc = vec2<f32>(0.0, 0.0);
    for (var j = 0u; j < params.point_count; j++) {{
        let point = params.points[j];
        var diff = point.xy - p;
        var d2 = dot(diff, diff);
        if (d2 < SINGULARITY_RADIUS_SQ) {{
            let salt = u32(point.z);
            let theta = f32(hash(index + hash(salt + params.point_count))) * HASH_TO_UNIT * TAU;
            diff = vec2<f32>(cos(theta), sin(theta));
            d2 = 1.0;
        }}
        acc += (params.attraction / d2) * diff;
    }}
    return acc;
}}

// xy = new position, zw = new velocity
fn advance(index: u32, p: vec2<f32>, v: vec2<f32>) -> vec4<f32> {{
    let nv = clamp(
        (v + acceleration(index, p)) * params.drag,
        vec2<f32>(-MAX_VELOCITY),
        vec2<f32>(MAX_VELOCITY),
    );
    return vec4<f32>(p + nv, nv);
}}

@compute @workgroup_size({workgroup_size})
fn main(
    @builtin(global_invocation_id) global_id: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {{
    let lane = global_id.x + global_id.y * groups.x * {workgroup_size}u;
    if (lane >= params.pair_count) {{
        return;
    }}
    let first = lane * 2u;

    if (params.reset != 0u) {{
        pos_out[lane] = vec4<f32>(seed_position(first), seed_position(first + 1u));
        vel_out[lane] = vec2<u32>(0u, 0u);
        return;
    }}

    let pos = {pos_in}[lane];
    let vel = {vel_in}[lane];
    let a = advance(first, pos.xy, unpack2x16float(vel.x));
    let b = advance(first + 1u, pos.zw, unpack2x16float(vel.y));
    pos_out[lane] = vec4<f32>(a.xy, b.xy);
    vel_out[lane] = vec2<u32>(pack2x16float(a.zw), pack2x16float(b.zw));
}}
"#
    )
}

/// Particle render shader.
///
/// Positions (`Float32x2`) and velocities (`Float16x2`) arrive as
/// instance-rate vertex attributes 0 and 1. There is one vertex entry point
/// per [`crate::visuals::Primitive`] and a shared fragment entry point.
pub const RENDER_SHADER: &str = r#"
struct RenderParams {
    scale: vec2<f32>,
    offset: vec2<f32>,
    point_size: f32,
    blur: f32,
    color_scale: f32,
    speed_norm: f32,
    alpha: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> render: RenderParams;
@group(0) @binding(1)
var ramp: texture_2d<f32>;
@group(0) @binding(2)
var ramp_sampler: sampler;

const RAMP_SPEED_K: f32 = 0.15403270679;
const RAMP_WIDTH: f32 = 256.0;

fn to_clip(p: vec2<f32>) -> vec4<f32> {
    return vec4<f32>(p * render.scale + render.offset, 0.0, 1.0);
}

fn speed_color(velocity: vec2<f32>, alpha: f32) -> vec4<f32> {
    let speed_sq = dot(velocity, velocity) * render.speed_norm;
    let t = clamp(log2(speed_sq + 1.0) * RAMP_SPEED_K, 0.0, 1.0);
    // Land on texel centers so t = 0 and t = 1 hit the end samples exactly.
    let u = (t * (RAMP_WIDTH - 1.0) + 0.5) / RAMP_WIDTH;
    let rgb = textureSampleLevel(ramp, ramp_sampler, vec2<f32>(u, 0.5), 0.0).rgb;
    return vec4<f32>(rgb * render.color_scale, alpha);
}

fn trail_direction(velocity: vec2<f32>) -> vec2<f32> {
    let len = length(velocity);
    if (len < 1e-6) {
        return vec2<f32>(1.0, 0.0);
    }
    return velocity / len;
}

@vertex
fn vs_point(
    @location(0) position: vec2<f32>,
    @location(1) velocity: vec2<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = to_clip(position);
    out.color = speed_color(velocity, render.alpha);
    return out;
}

@vertex
fn vs_sprite(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) position: vec2<f32>,
    @location(1) velocity: vec2<f32>,
) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-0.5, -0.5),
        vec2<f32>(0.5, -0.5),
        vec2<f32>(0.5, 0.5),
        vec2<f32>(-0.5, -0.5),
        vec2<f32>(0.5, 0.5),
        vec2<f32>(-0.5, 0.5),
    );
    var out: VertexOutput;
    out.clip_position = to_clip(position + corners[vertex_index] * render.point_size);
    out.color = speed_color(velocity, render.alpha);
    return out;
}

@vertex
fn vs_trail(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) position: vec2<f32>,
    @location(1) velocity: vec2<f32>,
) -> VertexOutput {
    let dir = trail_direction(velocity);
    let side = vec2<f32>(-dir.y, dir.x) * (render.point_size * 0.5);

    var out: VertexOutput;
    if (vertex_index == 0u) {
        out.clip_position = to_clip(position + side);
        out.color = speed_color(velocity, render.alpha);
    } else if (vertex_index == 1u) {
        out.clip_position = to_clip(position - side);
        out.color = speed_color(velocity, render.alpha);
    } else {
        out.clip_position = to_clip(position - velocity * render.blur);
        out.color = speed_color(velocity, 0.0);
    }
    return out;
}

@vertex
fn vs_streak(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) position: vec2<f32>,
    @location(1) velocity: vec2<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    if (vertex_index == 0u) {
        out.clip_position = to_clip(position);
        out.color = speed_color(velocity, render.alpha);
    } else {
        out.clip_position = to_clip(position - velocity * render.blur);
        out.color = speed_color(velocity, 0.0);
    }
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Fullscreen upscale from the reduced-resolution target to the surface.
pub const BLIT_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(0)
var scene: texture_2d<f32>;
@group(0) @binding(1)
var scene_sampler: sampler;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    var uvs = array<vec2<f32>, 3>(
        vec2<f32>(0.0, 1.0),
        vec2<f32>(2.0, 1.0),
        vec2<f32>(0.0, -1.0),
    );

    var out: VertexOutput;
    out.clip_position = vec4<f32>(positions[vertex_index], 0.0, 1.0);
    out.uv = uvs[vertex_index];
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(scene, scene_sampler, in.uv);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_wgsl(code: &str) -> Result<naga::Module, String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {:?}", e))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(module)
    }

    fn has_entry(module: &naga::Module, name: &str) -> bool {
        module.entry_points.iter().any(|e| e.name == name)
    }

    #[test]
    fn test_compute_shader_variants_validate() {
        for workgroup_size in [32, 64, 256, 1024] {
            for in_place in [true, false] {
                let source = compute_shader(workgroup_size, in_place);
                let module = validate_wgsl(&source)
                    .unwrap_or_else(|e| panic!("wg {workgroup_size} in_place {in_place}: {e}"));
                let main = module
                    .entry_points
                    .iter()
                    .find(|e| e.name == "main")
                    .expect("compute entry point");
                assert_eq!(main.workgroup_size, [workgroup_size, 1, 1]);
            }
        }
    }

    #[test]
    fn test_in_place_kernel_has_no_input_bindings() {
        let in_place = compute_shader(256, true);
        assert!(!in_place.contains("pos_in"));
        assert!(!in_place.contains("@binding(3)"));

        let ping_pong = compute_shader(256, false);
        assert!(ping_pong.contains("var<storage, read> pos_in"));
        assert!(ping_pong.contains("var<storage, read> vel_in"));
    }

    #[test]
    fn test_kernel_hash_matches_host() {
        let source = compute_shader(64, false);
        let rounds = source.matches("x = ((x >> 16u) ^ x) * 0x45d9f3bu;").count();
        assert_eq!(rounds, 2);
        assert!(source.contains("return (x >> 16u) ^ x;"));

        // Reference values of the two-round 0x45d9f3b hash.
        assert_eq!(crate::physics::hash(0), 0);
        assert_eq!(crate::physics::hash(1), 0x3125_1ba7);
        assert_eq!(crate::physics::hash(2), 0x66a7_9298);
        assert_eq!(crate::physics::hash(12345), 0x6829_6f19);
        assert_eq!(crate::physics::hash(u32::MAX), 0x2028_884f);
    }

    #[test]
    fn test_kernel_angles_match_host_order() {
        // Host computes `unit_float(h) * TAU`; the kernel must round the same way.
        let source = compute_shader(64, true);
        assert!(source.contains("let theta = f32(hash(base + 1u)) * HASH_TO_UNIT * TAU;"));
        assert!(source.contains(
            "let theta = f32(hash(index + hash(salt + params.point_count))) * HASH_TO_UNIT * TAU;"
        ));
    }

    #[test]
    fn test_kernel_clamps_velocity() {
        let source = compute_shader(64, false);
        assert!(source.contains("const MAX_VELOCITY: f32 = 65504.0;"));
        assert!(source.contains("vec2<f32>(-MAX_VELOCITY)"));
    }

    #[test]
    fn test_render_shader_validates() {
        let module = validate_wgsl(RENDER_SHADER).expect("render shader should be valid");
        for entry in ["vs_point", "vs_sprite", "vs_trail", "vs_streak", "fs_main"] {
            assert!(has_entry(&module, entry), "missing {entry}");
        }
    }

    #[test]
    fn test_blit_shader_validates() {
        let module = validate_wgsl(BLIT_SHADER).expect("blit shader should be valid");
        assert!(has_entry(&module, "vs_main"));
        assert!(has_entry(&module, "fs_main"));
    }

    #[test]
    fn test_ramp_constant_matches_shader() {
        assert!(RENDER_SHADER.contains("RAMP_SPEED_K: f32 = 0.15403270679;"));
        assert!((RAMP_SPEED_K - 0.154_032_7).abs() < 1e-6);
    }

    #[test]
    fn test_render_params_layout() {
        assert_eq!(std::mem::size_of::<RenderParams>(), 48);
    }
}
