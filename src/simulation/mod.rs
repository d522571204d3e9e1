//! Simulation module - stable-fluids solver on GPU field textures.
//!
//! The main world records one [`FramePlan`] per tick; the render world binds
//! the field images and dispatches it. [`CpuFields`] runs the same plan in
//! memory.

mod bloom;
mod cpu;
mod field;
mod injection;
mod input;
mod pipeline;
mod scenarios;
mod scheduler;
mod setup;
mod stages;
mod store;
mod systems;

use bevy::{
    prelude::*,
    render::{
        extract_resource::ExtractResourcePlugin,
        render_graph::{RenderGraph, RenderLabel},
        Render, RenderApp, RenderSet,
    },
};

use crate::config::LiquidConfig;

pub use bloom::{composite, prefilter, BloomSettings, BLUR_WEIGHTS, LUMA};
pub use cpu::{CpuFields, DEFAULT_MAX_DIMENSION};
pub use field::{mix, mix4, smoothstep, DoubleBuffer, Field, FieldGrid, GridSize, TextureSlot};
pub use injection::{
    InjectionProfile, InjectionTranslator, PointerMode, PointerState, ScrollState, Splat,
    SCROLL_DECAY, SCROLL_SCALE, SCROLL_THRESHOLD,
};
pub use input::{HostVisibility, LINE_HEIGHT_PX};
pub use pipeline::{FrameInputs, SolverPipeline, SolverStage, MAX_DT};
pub use scenarios::{forced_splat, Scenario};
pub use scheduler::{FrameScheduler, ResizeDebouncer, TickDecision, RESIZE_QUIET_MS};
pub use setup::{
    effect_running, window_viewport, ActiveEffect, GpuFieldBackend, GpuFieldImages, LiquidStatus,
};
pub use stages::{
    FramePlan, PassInvocation, Program, ProgramSetHealth, DISPLAY_FORMAT, FIELD_FORMAT, MAX_INPUTS,
    WORKGROUP_SIZE,
};
pub use store::{clear_value, FieldBackend, FieldLayout, FieldStore, SimulationFields, Viewport};
pub use systems::uniform_stride;

/// Plugin that owns the effect's lifecycle and its GPU compute node.
pub struct LiquidPlugin;

impl Plugin for LiquidPlugin {
    fn build(&self, app: &mut App) {
        let health = ProgramSetHealth::default();

        app.init_resource::<LiquidConfig>()
            .init_resource::<LiquidStatus>()
            .init_resource::<HostVisibility>()
            .init_resource::<FramePlan>()
            .init_resource::<GpuFieldImages>()
            .insert_resource(health.clone())
            .add_plugins((
                ExtractResourcePlugin::<FramePlan>::default(),
                ExtractResourcePlugin::<GpuFieldImages>::default(),
            ))
            .add_systems(Startup, setup::start_effect)
            .add_systems(
                Update,
                (
                    (input::track_pointer, input::track_scroll, input::track_window_state),
                    setup::watch_program_health,
                    setup::apply_style_changes.run_if(resource_changed::<LiquidConfig>),
                    setup::apply_resize,
                    setup::step_frame,
                )
                    .chain()
                    .in_set(LiquidSet)
                    .run_if(effect_running),
            );

        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            warn!("liquid: no render app, the effect stays inactive");
            return;
        };
        render_app.insert_resource(health).add_systems(
            Render,
            systems::prepare_pass_bind_groups.in_set(RenderSet::PrepareBindGroups),
        );

        // Add solver compute node to render graph
        let mut render_graph = render_app.world_mut().resource_mut::<RenderGraph>();
        render_graph.add_node(LiquidSolverLabel, systems::LiquidSolverNode::default());
        render_graph.add_node_edge(LiquidSolverLabel, bevy::render::graph::CameraDriverLabel);
    }

    fn finish(&self, app: &mut App) {
        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            return;
        };
        render_app.init_resource::<systems::LiquidPipelines>();
        render_app.init_resource::<systems::LiquidPassBindGroups>();
    }
}

/// Main-world systems of the effect, in frame order.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub struct LiquidSet;

/// Label for the solver compute node in the render graph.
#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct LiquidSolverLabel;
