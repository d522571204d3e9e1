//! GPU-compatible data structures shared by every solver pass.
//!
//! All structs use `#[repr(C)]` and implement `Pod`/`Zeroable` for GPU buffer compatibility.

use bytemuck::{Pod, Zeroable};

/// Uniform block bound at `@binding(3)` of every pass.
///
/// One layout serves all ten programs; each program reads only the fields it
/// needs and the rest stay zeroed. Field order matches `PassUniforms` in
/// `liquid_solver.wgsl` and `liquid_display.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct PassUniforms {
    /// Size of one simulation texel in uv units (1/w, 1/h)
    pub texel: [f32; 2],
    /// Advection time step, already scaled to "frames at 60 Hz"
    pub dt: f32,
    /// Advection dissipation factor (1.0 = lossless)
    pub dissipation: f32,
    /// Splat centre in normalized [0,1]² coordinates
    pub point: [f32; 2],
    /// Splat radius in normalized units
    pub radius: f32,
    /// Splat intensity multiplier
    pub intensity: f32,
    /// Splat colour (dye) or force (velocity) in rgb; alpha gain in w
    pub color: [f32; 4],
    /// Base colour for dye dissipation; w > 0.5 selects dissipate-to-base
    pub base: [f32; 4],
    /// Vorticity confinement strength
    pub vorticity: f32,
    /// Grid aspect ratio (w/h) used to keep splats round
    pub aspect: f32,
    /// Bloom prefilter threshold
    pub threshold: f32,
    /// Bloom prefilter soft-knee half-width
    pub knee: f32,
    /// Blur direction in texels of the blurred field
    pub direction: [f32; 2],
    /// Bloom contribution in the display composite (0 = bloom disabled)
    pub bloom_intensity: f32,
    /// Global output opacity
    pub opacity: f32,
}

impl PassUniforms {
    /// Uniforms carrying only the simulation texel size.
    pub fn with_texel(texel: [f32; 2]) -> Self {
        Self {
            texel,
            ..Self::zeroed()
        }
    }
}
