//! Colors and the speed gradient.
//!
//! Particles are colored by speed through a 256-entry ramp built from two
//! endpoint colors (the "slow" and the "fast" color). The ramp interpolates in
//! HSV space, so the hue travels around the color wheel instead of cutting
//! through gray.
//!
//! # Example
//!
//! ```
//! use particle_flow::color::{Argb, GradientRamp, HueDirection};
//!
//! let ramp = GradientRamp::build(
//!     Argb(0xFF0000FF),
//!     Argb(0xFFFF0000),
//!     HueDirection::Increasing,
//! );
//! assert_eq!(ramp.first(), [0, 0, 255, 255]);
//! assert_eq!(ramp.last(), [255, 0, 0, 255]);
//! ```

use glam::Vec3;

/// Number of samples in a gradient ramp.
pub const RAMP_WIDTH: usize = 256;

/// A packed `0xAARRGGBB` color, as stored by the settings collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Argb(pub u32);

impl Argb {
    /// Opaque black.
    pub const BLACK: Argb = Argb(0xFF00_0000);

    /// Build from a settings integer.
    ///
    /// Settings written by JVM hosts store colors as signed 32-bit ints, so
    /// `-16777216` and `4278190080` both mean opaque black. Only the low 32 bits
    /// are kept.
    pub fn from_int(value: i64) -> Self {
        Argb(value as u32)
    }

    #[inline]
    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline]
    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub fn blue(self) -> u8 {
        self.0 as u8
    }

    /// RGB channels in `0.0..=1.0`.
    pub fn rgb(self) -> Vec3 {
        Vec3::new(
            self.red() as f32 / 255.0,
            self.green() as f32 / 255.0,
            self.blue() as f32 / 255.0,
        )
    }

    /// Convert to HSV (hue in degrees).
    pub fn to_hsv(self) -> Hsv {
        let rgb = self.rgb();
        let max = rgb.max_element();
        let min = rgb.min_element();
        let delta = max - min;

        let hue = if delta <= 0.0 {
            0.0
        } else if max == rgb.x {
            60.0 * ((rgb.y - rgb.z) / delta).rem_euclid(6.0)
        } else if max == rgb.y {
            60.0 * ((rgb.z - rgb.x) / delta + 2.0)
        } else {
            60.0 * ((rgb.x - rgb.y) / delta + 4.0)
        };

        Hsv {
            hue,
            saturation: if max <= 0.0 { 0.0 } else { delta / max },
            value: max,
        }
    }
}

/// A color in HSV space.
///
/// `hue` is in degrees `[0, 360)`, `saturation` and `value` in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub hue: f32,
    pub saturation: f32,
    pub value: f32,
}

impl Hsv {
    /// Convert to RGB in `0.0..=1.0`.
    pub fn to_rgb(self) -> Vec3 {
        let h = self.hue.rem_euclid(360.0) / 360.0;
        let s = self.saturation.clamp(0.0, 1.0);
        let v = self.value.clamp(0.0, 1.0);

        let c = v * s;
        let x = c * (1.0 - ((h * 6.0) % 2.0 - 1.0).abs());
        let m = v - c;

        let (r, g, b) = match (h * 6.0) as u32 % 6 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        Vec3::new(r + m, g + m, b + m)
    }

    /// Convert to an opaque RGBA byte quadruple, rounding each channel.
    pub fn to_rgba8(self) -> [u8; 4] {
        let rgb = self.to_rgb();
        let byte = |c: f32| (c * 255.0).round().clamp(0.0, 255.0) as u8;
        [byte(rgb.x), byte(rgb.y), byte(rgb.z), 255]
    }
}

/// Which way the hue travels around the color wheel from the slow color to
/// the fast color.
///
/// The direction is always explicit. The shorter arc is never picked
/// automatically, so a 350° → 10° ramp can be a short red sweep or a full
/// trip through green and blue depending on this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HueDirection {
    /// Hue increases, wrapping through 360°/0° when needed (settings value `0`).
    #[default]
    Increasing,
    /// Hue decreases, wrapping through 0°/360° when needed (settings value `1`).
    Decreasing,
}

impl HueDirection {
    /// Map the settings flag. Unknown values fall back to `Increasing`.
    pub fn from_flag(flag: i64) -> Self {
        match flag {
            1 => HueDirection::Decreasing,
            _ => HueDirection::Increasing,
        }
    }

    /// Settings flag for this direction.
    pub fn flag(self) -> i64 {
        match self {
            HueDirection::Increasing => 0,
            HueDirection::Decreasing => 1,
        }
    }
}

/// A 256-sample RGBA color ramp, indexed by normalized speed.
#[derive(Clone, PartialEq, Eq)]
pub struct GradientRamp {
    samples: Box<[[u8; 4]; RAMP_WIDTH]>,
}

impl std::fmt::Debug for GradientRamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradientRamp")
            .field("first", &self.first())
            .field("last", &self.last())
            .finish()
    }
}

/// Hue endpoints (in turns) after applying the direction policy.
fn hue_span(slow: Hsv, fast: Hsv, direction: HueDirection) -> (f32, f32) {
    let mut sh = slow.hue / 360.0;
    let mut fh = fast.hue / 360.0;
    match direction {
        HueDirection::Increasing if fh < sh => fh += 1.0,
        HueDirection::Decreasing if sh < fh => sh += 1.0,
        _ => {}
    }
    (sh, fh)
}

impl GradientRamp {
    /// Build a ramp from the slow color (index 0) to the fast color (index 255).
    pub fn build(slow: Argb, fast: Argb, direction: HueDirection) -> Self {
        let mut samples = Box::new([[0u8; 4]; RAMP_WIDTH]);
        for (i, sample) in samples.iter_mut().enumerate() {
            *sample = Self::sample_hsv(slow, fast, direction, i).to_rgba8();
        }
        Self { samples }
    }

    /// The HSV color of sample `index` before quantization to bytes.
    pub fn sample_hsv(slow: Argb, fast: Argb, direction: HueDirection, index: usize) -> Hsv {
        let slow = slow.to_hsv();
        let fast = fast.to_hsv();
        let (sh, fh) = hue_span(slow, fast, direction);

        let t = index.min(RAMP_WIDTH - 1) as f32 / (RAMP_WIDTH - 1) as f32;
        let hue = ((1.0 - t) * sh + t * fh).rem_euclid(1.0) * 360.0;
        Hsv {
            hue,
            saturation: (1.0 - t) * slow.saturation + t * fast.saturation,
            value: (1.0 - t) * slow.value + t * fast.value,
        }
    }

    /// Sample nearest to normalized coordinate `t`, clamped to the ramp edges.
    pub fn sample(&self, t: f32) -> [u8; 4] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let index = (t * (RAMP_WIDTH - 1) as f32).round() as usize;
        self.samples[index]
    }

    pub fn first(&self) -> [u8; 4] {
        self.samples[0]
    }

    pub fn last(&self) -> [u8; 4] {
        self.samples[RAMP_WIDTH - 1]
    }

    /// Raw RGBA bytes, 4 per sample, ready for a 256×1 texture upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.samples[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUE: Argb = Argb(0xFF0000FF);
    const RED: Argb = Argb(0xFFFF0000);

    fn hue_color(degrees: f32) -> Argb {
        let [r, g, b, _] = Hsv {
            hue: degrees,
            saturation: 1.0,
            value: 1.0,
        }
        .to_rgba8();
        Argb(0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    #[test]
    fn test_argb_from_signed_int() {
        assert_eq!(Argb::from_int(-16777216), Argb::BLACK);
        assert_eq!(Argb::from_int(0xFF00_0000), Argb::BLACK);
        let c = Argb::from_int(0xFF12_3456);
        assert_eq!((c.alpha(), c.red(), c.green(), c.blue()), (0xFF, 0x12, 0x34, 0x56));
    }

    #[test]
    fn test_hsv_primaries() {
        let red = RED.to_hsv();
        assert!(red.hue.abs() < 0.001);
        assert!((red.saturation - 1.0).abs() < 0.001);

        let blue = BLUE.to_hsv();
        assert!((blue.hue - 240.0).abs() < 0.001);

        let gray = Argb(0xFF808080).to_hsv();
        assert_eq!(gray.saturation, 0.0);
    }

    #[test]
    fn test_ramp_endpoints_match_colors() {
        let slow = Argb(0xFF20A0E0);
        let fast = Argb(0xFFF0C010);
        for direction in [HueDirection::Increasing, HueDirection::Decreasing] {
            let ramp = GradientRamp::build(slow, fast, direction);
            let [r, g, b, a] = ramp.first();
            assert!((r as i32 - slow.red() as i32).abs() <= 1);
            assert!((g as i32 - slow.green() as i32).abs() <= 1);
            assert!((b as i32 - slow.blue() as i32).abs() <= 1);
            assert_eq!(a, 255);

            let [r, g, b, _] = ramp.last();
            assert!((r as i32 - fast.red() as i32).abs() <= 1);
            assert!((g as i32 - fast.green() as i32).abs() <= 1);
            assert!((b as i32 - fast.blue() as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_hue_wraps_upward_through_zero() {
        let slow = hue_color(350.0);
        let fast = hue_color(10.0);

        let mut unwrapped = Vec::new();
        let mut offset = 0.0;
        let mut prev: Option<f32> = None;
        for i in 0..RAMP_WIDTH {
            let hue = GradientRamp::sample_hsv(slow, fast, HueDirection::Increasing, i).hue;
            if let Some(p) = prev {
                if hue + 180.0 < p {
                    offset += 360.0;
                }
            }
            prev = Some(hue);
            unwrapped.push(hue + offset);
        }

        // Never drifts toward cyan.
        for hue in GradientRamp::build(slow, fast, HueDirection::Increasing)
            .samples
            .iter()
            .map(|&[r, g, b, _]| Argb(0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32).to_hsv().hue)
        {
            assert!(hue >= 340.0 || hue <= 20.0, "hue {hue} left the red arc");
        }
        assert!(unwrapped.windows(2).all(|w| w[1] >= w[0] - 1e-3));
        assert!((unwrapped[RAMP_WIDTH - 1] - unwrapped[0] - 20.0).abs() < 0.5);
    }

    #[test]
    fn test_hue_decreasing_takes_long_way() {
        let slow = hue_color(350.0);
        let fast = hue_color(10.0);
        let mid = GradientRamp::sample_hsv(slow, fast, HueDirection::Decreasing, 128);
        assert!((mid.hue - 180.0).abs() < 3.0);
    }

    #[test]
    fn test_direction_flag() {
        assert_eq!(HueDirection::from_flag(0), HueDirection::Increasing);
        assert_eq!(HueDirection::from_flag(1), HueDirection::Decreasing);
        assert_eq!(HueDirection::from_flag(7), HueDirection::Increasing);
        assert_eq!(HueDirection::Decreasing.flag(), 1);
    }

    #[test]
    fn test_sample_clamps() {
        let ramp = GradientRamp::build(BLUE, RED, HueDirection::Increasing);
        assert_eq!(ramp.sample(-3.0), ramp.first());
        assert_eq!(ramp.sample(9.0), ramp.last());
        assert_eq!(ramp.sample(f32::NAN), ramp.first());
        assert_eq!(ramp.as_bytes().len(), RAMP_WIDTH * 4);
    }
}
