//! CPU reference executor.
//!
//! Runs a [`FramePlan`] over in-memory fields with the same texel rules as the
//! WGSL entry points: integer texel centres, clamp-to-edge loads, bilinear
//! interpolation in texel space. Used by tests and diagnostics.

use bevy::math::{IVec2, Vec2, Vec3, Vec4, Vec4Swizzles};

use super::bloom::{composite, prefilter, BLUR_WEIGHTS};
use super::field::{Field, GridSize, TextureSlot};
use super::stages::{FramePlan, PassInvocation, Program};
use super::store::FieldBackend;
use crate::error::LiquidError;
use crate::resources::PassUniforms;

/// Mirrors `max_texture_dimension_2d` of a typical desktop adapter.
pub const DEFAULT_MAX_DIMENSION: u32 = 16384;

#[derive(Clone, Debug)]
pub struct CpuFields {
    fields: [Option<Field>; TextureSlot::COUNT],
    max_dimension: u32,
}

impl Default for CpuFields {
    fn default() -> Self {
        Self::with_max_dimension(DEFAULT_MAX_DIMENSION)
    }
}

impl CpuFields {
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            fields: Default::default(),
            max_dimension,
        }
    }

    pub fn field(&self, slot: TextureSlot) -> Option<&Field> {
        self.fields[slot.index()].as_ref()
    }

    pub fn field_mut(&mut self, slot: TextureSlot) -> Option<&mut Field> {
        self.fields[slot.index()].as_mut()
    }

    pub fn allocated_count(&self) -> usize {
        self.fields.iter().flatten().count()
    }

    /// Execute every pass of `plan` in order.
    pub fn execute(&mut self, plan: &FramePlan) -> Result<(), LiquidError> {
        for pass in &plan.passes {
            self.run_pass(pass)?;
        }
        Ok(())
    }

    pub fn run_pass(&mut self, pass: &PassInvocation) -> Result<(), LiquidError> {
        let missing = |slot| LiquidError::FieldMissing { slot };
        let mut out = self.fields[pass.output.index()]
            .take()
            .ok_or_else(|| missing(pass.output))?;

        let result = (|| -> Result<(), LiquidError> {
            let mut inputs = Vec::with_capacity(pass.inputs.len());
            for &slot in &pass.inputs {
                inputs.push(self.field(slot).ok_or_else(|| missing(slot))?);
            }
            let size = out.size();
            for y in 0..size.height.min(pass.size.height) {
                for x in 0..size.width.min(pass.size.width) {
                    let value = shade(pass.program, &inputs, &pass.uniforms, pass.size, x, y);
                    out.set(x, y, value);
                }
            }
            Ok(())
        })();

        self.fields[pass.output.index()] = Some(out);
        result
    }
}

impl FieldBackend for CpuFields {
    fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    fn release_all(&mut self) {
        self.fields = Default::default();
    }

    fn create(&mut self, slot: TextureSlot, size: GridSize, clear: Vec4) -> Result<(), LiquidError> {
        self.fields[slot.index()] = Some(Field::new(size, clear));
        Ok(())
    }
}

// ==================== Kernels ====================

const RIGHT: IVec2 = IVec2::new(1, 0);
const UP: IVec2 = IVec2::new(0, 1);

/// Value of one output texel.
fn shade(
    program: Program,
    inputs: &[&Field],
    u: &PassUniforms,
    size: GridSize,
    x: u32,
    y: u32,
) -> Vec4 {
    let p = IVec2::new(x as i32, y as i32);
    let uv = Vec2::new(
        (x as f32 + 0.5) / size.width as f32,
        (y as f32 + 0.5) / size.height as f32,
    );

    match program {
        Program::Splat => {
            let cur = inputs[0].load(p);
            let mut d = uv - Vec2::from(u.point);
            d.x *= u.aspect;
            let influence = (-d.dot(d) / (u.radius * u.radius).max(1e-6)).exp() * u.intensity;
            let color = Vec4::from(u.color);
            let rgb = cur.xyz() + color.xyz() * influence;
            let alpha = (cur.w + influence * color.w).clamp(0.0, 1.0);
            rgb.extend(alpha)
        }
        Program::Advect => {
            let v = inputs[0].load(p).xy();
            let src = inputs[1].sample_linear(p.as_vec2() - u.dt * v);
            let d = u.dissipation;
            if u.base[3] > 0.5 {
                let base = Vec3::new(u.base[0], u.base[1], u.base[2]);
                (base * (1.0 - d) + src.xyz() * d).extend(src.w * d)
            } else {
                src * d
            }
        }
        Program::Curl => {
            let vel = inputs[0];
            let l = vel.load(p - RIGHT).y;
            let r = vel.load(p + RIGHT).y;
            let b = vel.load(p - UP).x;
            let t = vel.load(p + UP).x;
            Vec4::new(0.5 * (r - l - t + b), 0.0, 0.0, 1.0)
        }
        Program::Vorticity => {
            let curl = inputs[1];
            let l = curl.load(p - RIGHT).x;
            let r = curl.load(p + RIGHT).x;
            let b = curl.load(p - UP).x;
            let t = curl.load(p + UP).x;
            let c = curl.load(p).x;
            let mut force = Vec2::new(t.abs() - b.abs(), l.abs() - r.abs()) * 0.5;
            force /= force.length() + 1e-5;
            force *= u.vorticity * c * Vec2::from(u.texel);
            let v = inputs[0].load(p).xy() + force;
            Vec4::new(v.x, v.y, 0.0, 1.0)
        }
        Program::Divergence => {
            let vel = inputs[0];
            let l = vel.load(p - RIGHT).x;
            let r = vel.load(p + RIGHT).x;
            let b = vel.load(p - UP).y;
            let t = vel.load(p + UP).y;
            Vec4::new(0.5 * (r - l + t - b), 0.0, 0.0, 1.0)
        }
        Program::Pressure => {
            let pressure = inputs[0];
            let l = pressure.load(p - RIGHT).x;
            let r = pressure.load(p + RIGHT).x;
            let b = pressure.load(p - UP).x;
            let t = pressure.load(p + UP).x;
            let div = inputs[1].load(p).x;
            Vec4::new((l + r + b + t - div) * 0.25, 0.0, 0.0, 1.0)
        }
        Program::GradientSubtract => {
            let pressure = inputs[0];
            let l = pressure.load(p - RIGHT).x;
            let r = pressure.load(p + RIGHT).x;
            let b = pressure.load(p - UP).x;
            let t = pressure.load(p + UP).x;
            let v = inputs[1].load(p).xy() - Vec2::new(r - l, t - b) * 0.5;
            Vec4::new(v.x, v.y, 0.0, 1.0)
        }
        Program::BloomPrefilter => {
            prefilter(inputs[0].sample_linear_uv(uv), u.threshold, u.knee)
        }
        Program::BloomBlur => {
            let src = inputs[0];
            let dir = IVec2::new(u.direction[0] as i32, u.direction[1] as i32);
            let mut sum = src.load(p) * BLUR_WEIGHTS[0];
            for (i, w) in BLUR_WEIGHTS.iter().enumerate().skip(1) {
                let offset = dir * i as i32;
                sum += (src.load(p + offset) + src.load(p - offset)) * *w;
            }
            sum
        }
        Program::Display => {
            // presentation rows run top-down, simulation rows bottom-up
            let sim_uv = Vec2::new(uv.x, 1.0 - uv.y);
            let dye = inputs[0].sample_linear_uv(sim_uv);
            let bloom = inputs[1].sample_linear_uv(sim_uv);
            composite(dye, bloom, uv, u.bloom_intensity, u.opacity)
        }
    }
}
