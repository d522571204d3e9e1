//! Render-world side of the solver: pipelines, per-pass bind groups and the
//! compute node that dispatches the extracted [`FramePlan`].
//!
//! Every program shares one binding shape:
//! 0-1. field inputs (sampled, non-filterable float)
//! 2. output storage texture
//! 3. `PassUniforms`

use std::num::NonZeroU64;

use bevy::{
    prelude::*,
    render::{
        render_asset::RenderAssets,
        render_graph::{self, NodeRunError, RenderGraphContext},
        render_resource::*,
        renderer::{RenderContext, RenderDevice},
        texture::GpuImage,
    },
};

use super::field::TextureSlot;
use super::setup::GpuFieldImages;
use super::stages::{
    FramePlan, Program, ProgramSetHealth, DISPLAY_FORMAT, DISPLAY_SHADER_PATH, FIELD_FORMAT,
    SOLVER_SHADER_PATH,
};
use crate::error::LiquidError;
use crate::resources::PassUniforms;

// ==================== Pipeline Resources ====================

#[derive(Resource)]
pub struct LiquidPipelines {
    /// Layout of every pass writing a float field
    pub field_layout: BindGroupLayout,
    /// Layout of the display pass (8-bit output)
    pub display_layout: BindGroupLayout,
    /// Indexed by [`Program::index`]
    pub programs: [CachedComputePipelineId; Program::COUNT],
}

impl LiquidPipelines {
    pub fn layout_for(&self, program: Program) -> &BindGroupLayout {
        if program.writes_display() {
            &self.display_layout
        } else {
            &self.field_layout
        }
    }
}

impl FromWorld for LiquidPipelines {
    fn from_world(world: &mut World) -> Self {
        let render_device = world.resource::<RenderDevice>();
        let asset_server = world.resource::<AssetServer>();
        let pipeline_cache = world.resource::<PipelineCache>();

        let field_layout = render_device.create_bind_group_layout(
            Some("Liquid Field Pass Layout"),
            &pass_layout_entries(FIELD_FORMAT),
        );
        let display_layout = render_device.create_bind_group_layout(
            Some("Liquid Display Pass Layout"),
            &pass_layout_entries(DISPLAY_FORMAT),
        );

        let solver_shader: Handle<Shader> = asset_server.load(SOLVER_SHADER_PATH);
        let display_shader: Handle<Shader> = asset_server.load(DISPLAY_SHADER_PATH);

        let programs = Program::ALL.map(|program| {
            let (layout, shader) = if program.writes_display() {
                (&display_layout, &display_shader)
            } else {
                (&field_layout, &solver_shader)
            };
            pipeline_cache.queue_compute_pipeline(ComputePipelineDescriptor {
                label: Some(program.label().into()),
                layout: vec![layout.clone()],
                shader: shader.clone(),
                shader_defs: vec![],
                entry_point: program.entry_point().into(),
                push_constant_ranges: vec![],
                zero_initialize_workgroup_memory: true,
            })
        });

        Self {
            field_layout,
            display_layout,
            programs,
        }
    }
}

fn pass_layout_entries(output: TextureFormat) -> [BindGroupLayoutEntry; 4] {
    [
        texture_input_entry(0),
        texture_input_entry(1),
        storage_output_entry(2, output),
        uniform_buffer_entry(3),
    ]
}

// Helper functions for bind group layout entries
fn texture_input_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: false },
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn storage_output_entry(binding: u32, format: TextureFormat) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::StorageTexture {
            access: StorageTextureAccess::WriteOnly,
            format,
            view_dimension: TextureViewDimension::D2,
        },
        count: None,
    }
}

fn uniform_buffer_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(UNIFORM_SIZE),
        },
        count: None,
    }
}

// ==================== Bind Groups ====================

const UNIFORM_SIZE: u64 = std::mem::size_of::<PassUniforms>() as u64;

/// One bind group per pass of the current plan, in plan order.
#[derive(Resource, Default)]
pub struct LiquidPassBindGroups {
    pub generation: u64,
    pub groups: Vec<BindGroup>,
}

/// Distance between consecutive uniform blocks in the shared buffer.
pub fn uniform_stride(min_offset_alignment: u32) -> u64 {
    let align = u64::from(min_offset_alignment.max(1));
    UNIFORM_SIZE.div_ceil(align) * align
}

/// Build the bind groups for this frame's plan. Leaves the set empty when the
/// plan is idle, stale, or refers to an image that has not been uploaded yet.
pub fn prepare_pass_bind_groups(
    render_device: Res<RenderDevice>,
    pipelines: Res<LiquidPipelines>,
    plan: Option<Res<FramePlan>>,
    field_images: Option<Res<GpuFieldImages>>,
    gpu_images: Res<RenderAssets<GpuImage>>,
    mut bind_groups: ResMut<LiquidPassBindGroups>,
) {
    bind_groups.groups.clear();
    let (Some(plan), Some(field_images)) = (plan, field_images) else {
        return;
    };
    if plan.is_idle() || plan.generation != field_images.generation {
        return;
    }

    let stride = uniform_stride(render_device.limits().min_uniform_buffer_offset_alignment);
    let mut contents = vec![0u8; stride as usize * plan.passes.len()];
    for (i, pass) in plan.passes.iter().enumerate() {
        let start = i * stride as usize;
        contents[start..start + UNIFORM_SIZE as usize]
            .copy_from_slice(bytemuck::bytes_of(&pass.uniforms));
    }
    let uniforms = render_device.create_buffer_with_data(&BufferInitDescriptor {
        label: Some("Liquid Pass Uniforms"),
        contents: &contents,
        usage: BufferUsages::UNIFORM,
    });

    let view = |slot: TextureSlot| {
        field_images
            .handle(slot)
            .and_then(|handle| gpu_images.get(handle))
            .map(|image| &image.texture_view)
    };

    let mut groups = Vec::with_capacity(plan.passes.len());
    for (i, pass) in plan.passes.iter().enumerate() {
        let [a, b] = pass.bound_inputs();
        let (Some(a), Some(b), Some(output)) = (view(a), view(b), view(pass.output)) else {
            return;
        };
        let block = BufferBinding {
            buffer: &uniforms,
            offset: i as u64 * stride,
            size: NonZeroU64::new(UNIFORM_SIZE),
        };
        groups.push(render_device.create_bind_group(
            Some(pass.program.label()),
            pipelines.layout_for(pass.program),
            &BindGroupEntries::sequential((a, b, output, block)),
        ));
    }

    bind_groups.generation = plan.generation;
    bind_groups.groups = groups;
}

// ==================== Render Graph Node ====================

/// Dispatches the frame plan, one compute pass per invocation.
#[derive(Default)]
pub struct LiquidSolverNode {
    failed: bool,
}

impl render_graph::Node for LiquidSolverNode {
    fn update(&mut self, world: &mut World) {
        if self.failed {
            return;
        }
        let (Some(pipelines), Some(health)) = (
            world.get_resource::<LiquidPipelines>(),
            world.get_resource::<ProgramSetHealth>(),
        ) else {
            return;
        };
        let pipeline_cache = world.resource::<PipelineCache>();

        for program in Program::ALL {
            let state = pipeline_cache.get_compute_pipeline_state(pipelines.programs[program.index()]);
            let CachedPipelineState::Err(err) = state else {
                continue;
            };
            // still loading, not a build failure
            if matches!(
                err,
                PipelineCacheError::ShaderNotLoaded(_) | PipelineCacheError::ShaderImportNotYetAvailable
            ) {
                continue;
            }
            let error = LiquidError::ProgramBuild {
                program: program.label(),
                diagnostic: err.to_string(),
            };
            error!("liquid: {error}");
            health.report(error);
            self.failed = true;
            return;
        }
    }

    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
        world: &World,
    ) -> Result<(), NodeRunError> {
        if self.failed {
            return Ok(());
        }
        let (Some(plan), Some(bind_groups), Some(pipelines)) = (
            world.get_resource::<FramePlan>(),
            world.get_resource::<LiquidPassBindGroups>(),
            world.get_resource::<LiquidPipelines>(),
        ) else {
            return Ok(());
        };
        if plan.is_idle()
            || bind_groups.generation != plan.generation
            || bind_groups.groups.len() != plan.passes.len()
        {
            return Ok(());
        }

        // All programs must be ready; a partial step would desync the pairs
        let pipeline_cache = world.resource::<PipelineCache>();
        let mut compiled = Vec::with_capacity(plan.passes.len());
        for pass in &plan.passes {
            let Some(pipeline) =
                pipeline_cache.get_compute_pipeline(pipelines.programs[pass.program.index()])
            else {
                return Ok(());
            };
            compiled.push(pipeline);
        }

        let encoder = render_context.command_encoder();
        for ((pass, pipeline), bind_group) in plan.passes.iter().zip(compiled).zip(&bind_groups.groups) {
            let mut compute = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some(pass.program.label()),
                timestamp_writes: None,
            });
            compute.set_pipeline(pipeline);
            compute.set_bind_group(0, bind_group, &[]);
            let (x, y) = pass.workgroups();
            compute.dispatch_workgroups(x, y, 1);
        }

        Ok(())
    }
}
