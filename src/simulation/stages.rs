//! Shader Program Set and the frame plan the programs are dispatched from.
//!
//! Every program is a compute entry point with the same binding shape:
//! up to two field inputs, one output, one [`PassUniforms`] block.

use std::sync::{Arc, Mutex};

use bevy::{
    prelude::*,
    render::{extract_resource::ExtractResource, render_resource::TextureFormat},
};

use super::field::{GridSize, TextureSlot};
use crate::error::LiquidError;
use crate::resources::PassUniforms;

pub const SOLVER_SHADER_PATH: &str = "shaders/liquid_solver.wgsl";
pub const DISPLAY_SHADER_PATH: &str = "shaders/liquid_display.wgsl";

/// Workgroup edge used by every entry point (8x8 is safe on Apple Silicon).
pub const WORKGROUP_SIZE: u32 = 8;

/// Maximum number of field inputs a program binds.
pub const MAX_INPUTS: usize = 2;

/// Storage format of every solver field.
pub const FIELD_FORMAT: TextureFormat = TextureFormat::Rgba32Float;

/// Storage format of the presentation image.
pub const DISPLAY_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

// ==================== Programs ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    /// Gaussian injection: `[target]`
    Splat,
    /// Semi-Lagrangian transport: `[velocity, source]`
    Advect,
    /// Scalar curl: `[velocity]`
    Curl,
    /// Vorticity confinement: `[velocity, curl]`
    Vorticity,
    /// Central-difference divergence: `[velocity]`
    Divergence,
    /// One Jacobi iteration: `[pressure, divergence]`
    Pressure,
    /// Projection: `[pressure, velocity]`
    GradientSubtract,
    /// Soft-knee bright pass: `[dye]`
    BloomPrefilter,
    /// 9-tap separable Gaussian: `[source]`
    BloomBlur,
    /// Final composite: `[dye, bloom]`
    Display,
}

impl Program {
    pub const COUNT: usize = 10;

    pub const ALL: [Program; Self::COUNT] = [
        Program::Splat,
        Program::Advect,
        Program::Curl,
        Program::Vorticity,
        Program::Divergence,
        Program::Pressure,
        Program::GradientSubtract,
        Program::BloomPrefilter,
        Program::BloomBlur,
        Program::Display,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn entry_point(self) -> &'static str {
        match self {
            Program::Splat => "splat",
            Program::Advect => "advect",
            Program::Curl => "curl",
            Program::Vorticity => "vorticity",
            Program::Divergence => "divergence",
            Program::Pressure => "pressure",
            Program::GradientSubtract => "gradient_subtract",
            Program::BloomPrefilter => "bloom_prefilter",
            Program::BloomBlur => "bloom_blur",
            Program::Display => "display",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Program::Splat => "liquid_splat",
            Program::Advect => "liquid_advect",
            Program::Curl => "liquid_curl",
            Program::Vorticity => "liquid_vorticity",
            Program::Divergence => "liquid_divergence",
            Program::Pressure => "liquid_pressure",
            Program::GradientSubtract => "liquid_gradient_subtract",
            Program::BloomPrefilter => "liquid_bloom_prefilter",
            Program::BloomBlur => "liquid_bloom_blur",
            Program::Display => "liquid_display",
        }
    }

    pub fn input_count(self) -> usize {
        match self {
            Program::Splat
            | Program::Curl
            | Program::Divergence
            | Program::BloomPrefilter
            | Program::BloomBlur => 1,
            Program::Advect
            | Program::Vorticity
            | Program::Pressure
            | Program::GradientSubtract
            | Program::Display => 2,
        }
    }

    /// Display writes the 8-bit presentation image; everything else writes float fields.
    pub fn writes_display(self) -> bool {
        self == Program::Display
    }

    pub fn output_format(self) -> TextureFormat {
        if self.writes_display() {
            DISPLAY_FORMAT
        } else {
            FIELD_FORMAT
        }
    }

    pub fn shader_path(self) -> &'static str {
        if self.writes_display() {
            DISPLAY_SHADER_PATH
        } else {
            SOLVER_SHADER_PATH
        }
    }
}

/// Build status of the program set, shared by the main and render worlds.
///
/// The render world reports the first program that fails to compile; the main
/// world polls it and tears the effect down.
#[derive(Resource, Clone, Debug, Default)]
pub struct ProgramSetHealth(Arc<Mutex<Option<LiquidError>>>);

impl ProgramSetHealth {
    /// Record a failure. Only the first one is kept.
    pub fn report(&self, error: LiquidError) {
        let mut slot = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub fn failure(&self) -> Option<LiquidError> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

// ==================== Frame Plan ====================

/// One dispatch: a program bound to concrete slots.
#[derive(Clone, Debug, PartialEq)]
pub struct PassInvocation {
    pub program: Program,
    pub inputs: Vec<TextureSlot>,
    pub output: TextureSlot,
    /// Output grid; the dispatch covers exactly this many texels
    pub size: GridSize,
    pub uniforms: PassUniforms,
}

impl PassInvocation {
    pub fn workgroups(&self) -> (u32, u32) {
        self.size.workgroups(WORKGROUP_SIZE)
    }

    /// Input slots padded to [`MAX_INPUTS`] by repeating the first input, so
    /// every program can share one bind group layout.
    pub fn bound_inputs(&self) -> [TextureSlot; MAX_INPUTS] {
        let first = self.inputs[0];
        std::array::from_fn(|i| self.inputs.get(i).copied().unwrap_or(first))
    }
}

/// Ordered passes for one tick, recorded in the main world and executed
/// verbatim by the render node (or the CPU executor).
///
/// Replaced every frame: an idle frame publishes an empty plan, so the render
/// world never replays a previous tick.
#[derive(Resource, Clone, Debug, Default, PartialEq, ExtractResource)]
pub struct FramePlan {
    /// Field store generation the slots refer to
    pub generation: u64,
    pub passes: Vec<PassInvocation>,
}

impl FramePlan {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            passes: Vec::new(),
        }
    }

    pub fn idle(generation: u64) -> Self {
        Self::new(generation)
    }

    pub fn is_idle(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn push(
        &mut self,
        program: Program,
        inputs: &[TextureSlot],
        output: TextureSlot,
        size: GridSize,
        uniforms: PassUniforms,
    ) {
        debug_assert_eq!(inputs.len(), program.input_count(), "{program:?} inputs");
        debug_assert!(!inputs.contains(&output), "{program:?} reads its own output");
        self.passes.push(PassInvocation {
            program,
            inputs: inputs.to_vec(),
            output,
            size,
            uniforms,
        });
    }

    /// Programs in dispatch order.
    pub fn programs(&self) -> impl DoubleEndedIterator<Item = Program> + '_ {
        self.passes.iter().map(|p| p.program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_points_are_unique() {
        let mut names: Vec<_> = Program::ALL.iter().map(|p| p.entry_point()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Program::COUNT);
        for program in Program::ALL {
            assert!(program.input_count() <= MAX_INPUTS);
        }
    }

    #[test]
    fn single_input_passes_repeat_first_binding() {
        let mut plan = FramePlan::new(1);
        plan.push(
            Program::Curl,
            &[TextureSlot::VelocityA],
            TextureSlot::Curl,
            GridSize::new(20, 9),
            PassUniforms::with_texel([0.05, 1.0 / 9.0]),
        );
        let pass = &plan.passes[0];
        assert_eq!(pass.bound_inputs(), [TextureSlot::VelocityA; 2]);
        assert_eq!(pass.workgroups(), (3, 2));
    }

    #[test]
    fn health_keeps_the_first_failure() {
        let health = ProgramSetHealth::default();
        let shared = health.clone();
        assert_eq!(health.failure(), None);
        shared.report(LiquidError::ProgramBuild {
            program: Program::Advect.label(),
            diagnostic: "bad".into(),
        });
        shared.report(LiquidError::GpuUnavailable("later".into()));
        assert!(matches!(
            health.failure(),
            Some(LiquidError::ProgramBuild { program: "liquid_advect", .. })
        ));
    }

    #[test]
    fn only_display_writes_eight_bit() {
        for program in Program::ALL {
            let expected = if program == Program::Display {
                DISPLAY_FORMAT
            } else {
                FIELD_FORMAT
            };
            assert_eq!(program.output_format(), expected);
        }
    }
}
