//! Visual modes for particle rendering.
//!
//! Every mode draws from the same two vertex buffers (positions and packed
//! velocities, one entry per particle, instance rate). A mode is only a
//! choice of which primitives to emit per particle, so switching modes never
//! touches the buffers.
//!
//! | Mode | Size 1 | Size > 1 |
//! |------|--------|----------|
//! | [`RenderMode::Points`] | point | sprite |
//! | [`RenderMode::BlurLines`] | streak line | - |
//! | [`RenderMode::BlurTriangles`] | - | trail triangle, then sprite |

/// How particles are drawn this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    /// One point (or sprite) per particle.
    #[default]
    Points,
    /// Motion blur for large particles: a tapered trail triangle behind each
    /// particle, then the particle itself.
    BlurTriangles,
    /// Motion blur for one-pixel particles: a line fading out behind each one.
    BlurLines,
}

impl RenderMode {
    /// Pick the mode for the current visual settings.
    pub fn select(motion_blur: bool, particle_size: u32) -> Self {
        match (motion_blur, particle_size > 1) {
            (false, _) => RenderMode::Points,
            (true, true) => RenderMode::BlurTriangles,
            (true, false) => RenderMode::BlurLines,
        }
    }

    /// Draw passes for this mode, in submission order.
    pub fn passes(self, particle_size: u32) -> &'static [Primitive] {
        let sized = particle_size > 1;
        match self {
            RenderMode::Points if sized => &[Primitive::Sprite],
            RenderMode::Points => &[Primitive::Point],
            RenderMode::BlurTriangles if sized => &[Primitive::Trail, Primitive::Sprite],
            RenderMode::BlurTriangles => &[Primitive::Trail, Primitive::Point],
            RenderMode::BlurLines => &[Primitive::Streak],
        }
    }
}

/// A primitive emitted once per particle.
///
/// Hardware points are a single pixel in wgpu, so particles wider than one
/// pixel are drawn as sprites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// A one-pixel point.
    Point,
    /// A screen-aligned square, `particle_size` pixels wide.
    Sprite,
    /// A triangle trailing the particle, its tip fading to transparent.
    Trail,
    /// A line trailing the particle, fading to transparent.
    Streak,
}

impl Primitive {
    /// Vertices emitted per particle.
    pub fn vertices_per_particle(self) -> u32 {
        match self {
            Primitive::Point => 1,
            Primitive::Streak => 2,
            Primitive::Trail => 3,
            Primitive::Sprite => 6,
        }
    }

    /// Vertex shader entry point in the render shader.
    pub fn entry_point(self) -> &'static str {
        match self {
            Primitive::Point => "vs_point",
            Primitive::Sprite => "vs_sprite",
            Primitive::Trail => "vs_trail",
            Primitive::Streak => "vs_streak",
        }
    }

    pub fn topology(self) -> wgpu::PrimitiveTopology {
        match self {
            Primitive::Point => wgpu::PrimitiveTopology::PointList,
            Primitive::Streak => wgpu::PrimitiveTopology::LineList,
            Primitive::Trail | Primitive::Sprite => wgpu::PrimitiveTopology::TriangleList,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Primitive::Point => "Point",
            Primitive::Sprite => "Sprite",
            Primitive::Trail => "Trail",
            Primitive::Streak => "Streak",
        }
    }
}

/// Blending applied when drawing particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendPolicy {
    /// No blending; later particles overwrite earlier ones.
    #[default]
    Opaque,
    /// `(srcAlpha, 1 - srcAlpha)`.
    Alpha,
    /// `(srcAlpha, one)`. Overlapping particles add up and glow.
    Additive,
}

impl BlendPolicy {
    /// Pick the policy for the current visual settings.
    ///
    /// Glow wins over plain alpha blending. Motion blur needs alpha so its
    /// trails can fade, and turns it on when nothing else did.
    pub fn select(alpha_blending: bool, glow: bool, motion_blur: bool) -> Self {
        if glow {
            BlendPolicy::Additive
        } else if alpha_blending || motion_blur {
            BlendPolicy::Alpha
        } else {
            BlendPolicy::Opaque
        }
    }

    /// The wgpu blend state, `None` for opaque.
    pub fn blend_state(self) -> Option<wgpu::BlendState> {
        match self {
            BlendPolicy::Opaque => None,
            BlendPolicy::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
            BlendPolicy::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_selection() {
        assert_eq!(RenderMode::select(false, 1), RenderMode::Points);
        assert_eq!(RenderMode::select(false, 4), RenderMode::Points);
        assert_eq!(RenderMode::select(true, 1), RenderMode::BlurLines);
        assert_eq!(RenderMode::select(true, 3), RenderMode::BlurTriangles);
    }

    #[test]
    fn test_passes() {
        assert_eq!(RenderMode::Points.passes(1), &[Primitive::Point]);
        assert_eq!(RenderMode::Points.passes(2), &[Primitive::Sprite]);
        assert_eq!(
            RenderMode::BlurTriangles.passes(3),
            &[Primitive::Trail, Primitive::Sprite]
        );
        assert_eq!(RenderMode::BlurLines.passes(1), &[Primitive::Streak]);
    }

    #[test]
    fn test_topologies_match_vertex_counts() {
        for primitive in [Primitive::Point, Primitive::Sprite, Primitive::Trail, Primitive::Streak] {
            let per = match primitive.topology() {
                wgpu::PrimitiveTopology::PointList => 1,
                wgpu::PrimitiveTopology::LineList => 2,
                wgpu::PrimitiveTopology::TriangleList => 3,
                _ => unreachable!(),
            };
            assert_eq!(primitive.vertices_per_particle() % per, 0);
        }
    }

    #[test]
    fn test_blend_selection() {
        assert_eq!(BlendPolicy::select(false, false, false), BlendPolicy::Opaque);
        assert_eq!(BlendPolicy::select(true, false, false), BlendPolicy::Alpha);
        assert_eq!(BlendPolicy::select(true, true, false), BlendPolicy::Additive);
        assert_eq!(BlendPolicy::select(false, false, true), BlendPolicy::Alpha);
        assert!(BlendPolicy::Opaque.blend_state().is_none());

        let additive = BlendPolicy::Additive.blend_state().unwrap();
        assert_eq!(additive.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(additive.color.dst_factor, wgpu::BlendFactor::One);
    }
}
