//! Base colour resolution and the three derived dye tones.

use bevy::math::Vec3;
use bevy::prelude::Resource;

/// Fallback tone used when neither an override nor a background colour is usable.
pub const DEFAULT_BASE_COLOR: Vec3 = Vec3::new(0.67, 0.72, 0.97);

/// Global opacity when no override is given.
pub const DEFAULT_OPACITY: f32 = 0.5;

/// An sRGB colour with alpha, every channel in [0,1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub rgb: Vec3,
    pub alpha: f32,
}

/// Parse `#rgb`, `#rrggbb`, `rgb(r, g, b)` or `rgba(r, g, b, a)`.
///
/// Functional channels are 0..255, alpha is 0..1. Returns `None` on anything
/// else, including out-of-range hex digits.
pub fn parse_color(input: &str) -> Option<Rgba> {
    let s = input.trim().to_ascii_lowercase();

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }

    let (body, expect_alpha) = if let Some(body) = s.strip_prefix("rgba(") {
        (body, true)
    } else if let Some(body) = s.strip_prefix("rgb(") {
        (body, false)
    } else {
        return None;
    };
    let body = body.strip_suffix(')')?;
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();

    let channels = match (parts.len(), expect_alpha) {
        (3, false) | (4, true) => &parts[..3],
        _ => return None,
    };
    let mut rgb = [0.0f32; 3];
    for (out, part) in rgb.iter_mut().zip(channels) {
        let v: f32 = part.parse().ok()?;
        *out = (v / 255.0).clamp(0.0, 1.0);
    }
    let alpha = if expect_alpha {
        parts[3].parse::<f32>().ok()?.clamp(0.0, 1.0)
    } else {
        1.0
    };

    Some(Rgba {
        rgb: Vec3::from_array(rgb),
        alpha,
    })
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let digit = |c: char| c.to_digit(16).map(|d| d as f32);
    let chars: Vec<char> = hex.chars().collect();
    let rgb = match chars.len() {
        3 => {
            let mut rgb = [0.0f32; 3];
            for (out, c) in rgb.iter_mut().zip(&chars) {
                // #abc expands to #aabbcc
                *out = digit(*c)? * 17.0 / 255.0;
            }
            rgb
        }
        6 => {
            let mut rgb = [0.0f32; 3];
            for (out, pair) in rgb.iter_mut().zip(chars.chunks(2)) {
                *out = (digit(pair[0])? * 16.0 + digit(pair[1])?) / 255.0;
            }
            rgb
        }
        _ => return None,
    };
    Some(Rgba {
        rgb: Vec3::from_array(rgb),
        alpha: 1.0,
    })
}

/// Pick the base colour: explicit override, then the host background (unless
/// fully transparent), then [`DEFAULT_BASE_COLOR`].
pub fn resolve_base_color(color_override: Option<&str>, background: Option<&str>) -> Vec3 {
    if let Some(c) = color_override.and_then(parse_color) {
        return c.rgb;
    }
    match background.and_then(parse_color) {
        Some(c) if c.alpha > 0.0 => c.rgb,
        _ => DEFAULT_BASE_COLOR,
    }
}

/// Parse an opacity override, clamped to [0,1]; default 0.5.
pub fn resolve_opacity(opacity_override: Option<&str>) -> f32 {
    opacity_override
        .and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_OPACITY)
}

pub fn tint(c: Vec3, t: f32) -> Vec3 {
    c.lerp(Vec3::ONE, t)
}

pub fn shade(c: Vec3, t: f32) -> Vec3 {
    c.lerp(Vec3::ZERO, t)
}

/// Base colour plus the deep/mid/high tones injected dye is mixed from.
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    pub base: Vec3,
    pub deep: Vec3,
    pub mid: Vec3,
    pub hi: Vec3,
}

impl Palette {
    pub fn new(base: Vec3) -> Self {
        Self {
            base,
            deep: shade(base, 0.35),
            mid: tint(base, 0.10),
            hi: tint(base, 0.28),
        }
    }

    /// Recompute the derived tones. Returns true when the base actually changed.
    pub fn refresh(&mut self, base: Vec3) -> bool {
        if self.base == base {
            return false;
        }
        *self = Self::new(base);
        true
    }

    /// Dye colour at `t` seconds. Each channel leans on one tone with the
    /// other two as small accents, so the result never collapses to black.
    pub fn dye_color(&self, t: f32) -> Vec3 {
        let a = 0.5 + 0.5 * (t * 1.2).sin();
        let b = 0.5 + 0.5 * (t * 0.9 + 2.0).sin();
        let c = 0.5 + 0.5 * (t * 0.7 + 4.0).sin();

        let r = self.deep.x * (0.55 + 0.45 * a) + self.hi.x * (0.10 * b) + self.mid.x * (0.08 * c);
        let g = self.mid.y * (0.55 + 0.45 * b) + self.hi.y * (0.10 * c) + self.deep.y * (0.06 * a);
        let bl = self.mid.z * (0.55 + 0.45 * c) + self.hi.z * (0.10 * a) + self.deep.z * (0.06 * b);

        Vec3::new(r, g, bl).clamp(Vec3::ZERO, Vec3::ONE)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_COLOR)
    }
}
