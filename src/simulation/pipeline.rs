//! Solver Pipeline: records one stable-fluids step as an ordered pass list.
//!
//! Stage order:
//! 1. Splat (only when something is injected)
//! 2. Velocity advection
//! 3. Curl
//! 4. Vorticity confinement
//! 5. Divergence
//! 6. Pressure (Jacobi iterations, warm-started from the previous step)
//! 7. Gradient subtraction
//! 8. Dye advection
//!
//! followed by the bloom passes (when the tier has them) and the display composite.

use bevy::math::Vec3;
use bevy::prelude::Resource;

use super::bloom::{record_bloom, record_display, BloomSettings};
use super::field::GridSize;
use super::injection::Splat;
use super::stages::{FramePlan, Program};
use super::store::{FieldStore, SimulationFields};
use crate::quality::QualityTier;
use crate::resources::PassUniforms;

/// Longest step the solver integrates, in seconds.
pub const MAX_DT: f32 = 0.033;

/// Advection works in "frames at 60 Hz".
const DT_FRAME_SCALE: f32 = 60.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolverStage {
    Splat,
    AdvectVelocity,
    Curl,
    Vorticity,
    Divergence,
    PressureSolve,
    GradientSubtract,
    AdvectDye,
}

impl SolverStage {
    pub const ORDER: [SolverStage; 8] = [
        SolverStage::Splat,
        SolverStage::AdvectVelocity,
        SolverStage::Curl,
        SolverStage::Vorticity,
        SolverStage::Divergence,
        SolverStage::PressureSolve,
        SolverStage::GradientSubtract,
        SolverStage::AdvectDye,
    ];

    pub fn program(self) -> Program {
        match self {
            SolverStage::Splat => Program::Splat,
            SolverStage::AdvectVelocity | SolverStage::AdvectDye => Program::Advect,
            SolverStage::Curl => Program::Curl,
            SolverStage::Vorticity => Program::Vorticity,
            SolverStage::Divergence => Program::Divergence,
            SolverStage::PressureSolve => Program::Pressure,
            SolverStage::GradientSubtract => Program::GradientSubtract,
        }
    }
}

/// Per-step inputs from the scheduler and the injection translator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInputs {
    /// Elapsed seconds; clamped to [`MAX_DT`]
    pub dt: f32,
    pub splat: Option<Splat>,
    /// Colour idle dye fades back to
    pub base: Vec3,
    pub opacity: f32,
}

/// Solver parameters, fixed for the session once the tier is known.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct SolverPipeline {
    pub pressure_iterations: u32,
    pub vorticity: f32,
    pub velocity_dissipation: f32,
    pub dye_dissipation: f32,
    pub bloom: BloomSettings,
}

impl SolverPipeline {
    pub fn new(tier: &QualityTier) -> Self {
        Self {
            pressure_iterations: tier.pressure_iterations,
            vorticity: tier.vorticity,
            velocity_dissipation: tier.velocity_dissipation,
            dye_dissipation: tier.dye_dissipation,
            bloom: BloomSettings::default(),
        }
    }

    /// Record a full step plus presentation. Returns an idle plan when the
    /// store holds nothing.
    pub fn plan_frame(&self, store: &mut FieldStore, inputs: &FrameInputs) -> FramePlan {
        let generation = store.generation();
        let Some(layout) = store.layout().copied() else {
            return FramePlan::idle(generation);
        };
        let Some(fields) = store.fields_mut() else {
            return FramePlan::idle(generation);
        };

        let mut plan = FramePlan::new(generation);
        for stage in SolverStage::ORDER {
            self.record_stage(stage, &mut plan, fields, layout.simulation, inputs);
        }
        record_bloom(&mut plan, fields, &layout, &self.bloom);
        record_display(&mut plan, fields, layout.display, &self.bloom, inputs.opacity);
        plan
    }

    /// Append the passes of one stage and swap the buffers it wrote.
    pub fn record_stage(
        &self,
        stage: SolverStage,
        plan: &mut FramePlan,
        fields: &mut SimulationFields,
        grid: GridSize,
        inputs: &FrameInputs,
    ) {
        let base = PassUniforms {
            aspect: grid.aspect(),
            ..PassUniforms::with_texel(grid.texel())
        };
        let dt = inputs.dt.clamp(0.0, MAX_DT) * DT_FRAME_SCALE;
        let curl = fields.curl;
        let divergence = fields.divergence;

        match stage {
            SolverStage::Splat => {
                let Some(splat) = inputs.splat else {
                    return;
                };
                fields.velocity.render(|read, write| {
                    plan.push(
                        Program::Splat,
                        &[read],
                        write,
                        grid,
                        PassUniforms {
                            point: splat.point.to_array(),
                            radius: splat.velocity_radius,
                            intensity: splat.velocity_intensity,
                            color: [splat.force.x, splat.force.y, 0.0, 0.0],
                            ..base
                        },
                    );
                });
                fields.dye.render(|read, write| {
                    plan.push(
                        Program::Splat,
                        &[read],
                        write,
                        grid,
                        PassUniforms {
                            point: splat.point.to_array(),
                            radius: splat.dye_radius,
                            intensity: splat.dye_intensity,
                            color: splat.color.extend(splat.alpha_gain).to_array(),
                            ..base
                        },
                    );
                });
            }
            SolverStage::AdvectVelocity => {
                fields.velocity.render(|read, write| {
                    plan.push(
                        Program::Advect,
                        &[read, read],
                        write,
                        grid,
                        PassUniforms {
                            dt,
                            dissipation: self.velocity_dissipation,
                            ..base
                        },
                    );
                });
            }
            SolverStage::Curl => {
                plan.push(Program::Curl, &[fields.velocity.read()], curl, grid, base);
            }
            SolverStage::Vorticity => {
                fields.velocity.render(|read, write| {
                    plan.push(
                        Program::Vorticity,
                        &[read, curl],
                        write,
                        grid,
                        PassUniforms {
                            vorticity: self.vorticity,
                            ..base
                        },
                    );
                });
            }
            SolverStage::Divergence => {
                plan.push(Program::Divergence, &[fields.velocity.read()], divergence, grid, base);
            }
            SolverStage::PressureSolve => {
                for _ in 0..self.pressure_iterations {
                    fields.pressure.render(|read, write| {
                        plan.push(Program::Pressure, &[read, divergence], write, grid, base);
                    });
                }
            }
            SolverStage::GradientSubtract => {
                let pressure = fields.pressure.read();
                fields.velocity.render(|read, write| {
                    plan.push(Program::GradientSubtract, &[pressure, read], write, grid, base);
                });
            }
            SolverStage::AdvectDye => {
                let velocity = fields.velocity.read();
                fields.dye.render(|read, write| {
                    plan.push(
                        Program::Advect,
                        &[velocity, read],
                        write,
                        grid,
                        PassUniforms {
                            dt,
                            dissipation: self.dye_dissipation,
                            base: inputs.base.extend(1.0).to_array(),
                            ..base
                        },
                    );
                });
            }
        }
    }
}
