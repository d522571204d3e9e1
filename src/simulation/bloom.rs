//! Bloom Compositor: bright pass, separable blur and the final display composite.

use bevy::math::{Vec2, Vec3, Vec4, Vec4Swizzles};

use super::field::{smoothstep, GridSize};
use super::stages::{FramePlan, Program};
use super::store::{FieldLayout, SimulationFields};
use crate::resources::PassUniforms;

/// Rec. 601 luma weights.
pub const LUMA: Vec3 = Vec3::new(0.299, 0.587, 0.114);

/// Centre tap first; taps 1..=4 are applied on both sides.
pub const BLUR_WEIGHTS: [f32; 5] = [0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BloomSettings {
    /// Luminance at the middle of the soft knee
    pub threshold: f32,
    /// Half-width of the knee
    pub knee: f32,
    /// Weight of the blurred bloom in the composite
    pub intensity: f32,
    /// Horizontal+vertical blur pairs
    pub iterations: u32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            knee: 0.25,
            intensity: 0.6,
            iterations: 2,
        }
    }
}

// ==================== Recording ====================

/// Record the bright pass and blur passes. Leaves the result in `bloom.pair.read()`.
/// Does nothing when the fields carry no bloom buffers.
pub fn record_bloom(
    plan: &mut FramePlan,
    fields: &mut SimulationFields,
    layout: &FieldLayout,
    settings: &BloomSettings,
) {
    let (Some(bloom), Some(size)) = (fields.bloom.as_mut(), layout.bloom) else {
        return;
    };
    let dye = fields.dye.read();
    let base = PassUniforms::with_texel(size.texel());

    bloom.pair.render(|_, write| {
        plan.push(
            Program::BloomPrefilter,
            &[dye],
            write,
            size,
            PassUniforms {
                threshold: settings.threshold,
                knee: settings.knee,
                ..base
            },
        );
    });

    let temp = bloom.temp;
    for _ in 0..settings.iterations {
        plan.push(
            Program::BloomBlur,
            &[bloom.pair.read()],
            temp,
            size,
            PassUniforms {
                direction: [1.0, 0.0],
                ..base
            },
        );
        bloom.pair.render(|_, write| {
            plan.push(
                Program::BloomBlur,
                &[temp],
                write,
                size,
                PassUniforms {
                    direction: [0.0, 1.0],
                    ..base
                },
            );
        });
    }
}

/// Record the composite of dye (plus bloom, when present) into the display image.
pub fn record_display(
    plan: &mut FramePlan,
    fields: &SimulationFields,
    display: GridSize,
    settings: &BloomSettings,
    opacity: f32,
) {
    let dye = fields.dye.read();
    let (bloom, bloom_intensity) = match fields.bloom {
        Some(bloom) => (bloom.pair.read(), settings.intensity),
        None => (dye, 0.0),
    };
    plan.push(
        Program::Display,
        &[dye, bloom],
        fields.display,
        display,
        PassUniforms {
            bloom_intensity,
            opacity,
            ..PassUniforms::with_texel(display.texel())
        },
    );
}

// ==================== Texel Math ====================

/// Bright pass: luminance weighted by dye alpha, through a soft knee.
pub fn prefilter(dye: Vec4, threshold: f32, knee: f32) -> Vec4 {
    let lum = dye.xyz().dot(LUMA) * dye.w;
    let contribution = smoothstep(threshold - knee, threshold + knee, lum);
    (dye.xyz() * contribution).extend(contribution)
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Final colour at presentation uv (row 0 at the top).
pub fn composite(dye: Vec4, bloom: Vec4, uv: Vec2, bloom_intensity: f32, opacity: f32) -> Vec4 {
    let glow_on = if bloom_intensity > 0.0 { 1.0 } else { 0.0 };
    let color = dye.xyz() + bloom.xyz() * bloom_intensity * glow_on;
    let lum = dye.xyz().dot(LUMA);

    let edge = uv.x.min(1.0 - uv.x).min(uv.y).min(1.0 - uv.y);
    let edge_fade = smoothstep(0.0, 0.15, edge);
    let base_alpha = smoothstep(0.01, 0.85, dye.w);
    let glow_alpha = smoothstep(0.05, 0.4, bloom.w) * 0.4 * glow_on;
    let boost = smoothstep(0.1, 0.6, lum) * 0.25;
    let alpha = (base_alpha + glow_alpha + boost) * opacity * edge_fade;

    let c = color.clamp(Vec3::ZERO, Vec3::ONE);
    Vec4::new(
        srgb_to_linear(c.x),
        srgb_to_linear(c.y),
        srgb_to_linear(c.z),
        alpha.clamp(0.0, 1.0),
    )
}
