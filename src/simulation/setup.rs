//! Main-world lifecycle: gate, classify, allocate, step, resize, teardown.
//!
//! Field textures are `Image` assets created here and handed to the render
//! world through [`GpuFieldImages`]; the main world never touches them again
//! until the next reallocation.

use bevy::{
    prelude::*,
    render::{
        extract_resource::ExtractResource,
        render_asset::RenderAssetUsages,
        render_resource::{Extent3d, TextureDimension, TextureUsages},
        renderer::{RenderAdapterInfo, RenderDevice},
    },
    window::PrimaryWindow,
};

use super::field::{GridSize, TextureSlot};
use super::injection::{InjectionTranslator, PointerState, ScrollState};
use super::input::HostVisibility;
use super::pipeline::{FrameInputs, SolverPipeline};
use super::scheduler::{FrameScheduler, ResizeDebouncer, TickDecision};
use super::stages::{FramePlan, ProgramSetHealth, DISPLAY_FORMAT, FIELD_FORMAT};
use super::store::{FieldBackend, FieldStore, Viewport};
use crate::config::LiquidConfig;
use crate::error::LiquidError;
use crate::palette::Palette;
use crate::quality::{select_tier, GpuProfile, QualityTier};

// ==================== Status ====================

/// Where the effect is in its lifecycle. Frame systems only run while `Running`.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub enum LiquidStatus {
    /// Startup has not run yet
    #[default]
    Pending,
    Running,
    /// The host gate failed; nothing was created
    Skipped(String),
    /// Initialization or a later reallocation failed; everything was released
    Failed(LiquidError),
}

pub fn effect_running(status: Res<LiquidStatus>) -> bool {
    *status == LiquidStatus::Running
}

/// Tier and resolved styling for the session.
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct ActiveEffect {
    pub tier: QualityTier,
    pub opacity: f32,
}

// ==================== GPU Fields ====================

/// Image handles backing each texture slot, mirrored into the render world.
#[derive(Resource, Clone, Debug, Default, ExtractResource)]
pub struct GpuFieldImages {
    pub handles: [Option<Handle<Image>>; TextureSlot::COUNT],
    /// Field store generation these handles belong to
    pub generation: u64,
}

impl GpuFieldImages {
    pub fn handle(&self, slot: TextureSlot) -> Option<&Handle<Image>> {
        self.handles[slot.index()].as_ref()
    }
}

/// Creates field textures as storage-capable `Image` assets.
pub struct GpuFieldBackend<'a> {
    images: &'a mut Assets<Image>,
    handles: &'a mut [Option<Handle<Image>>; TextureSlot::COUNT],
    max_dimension: u32,
}

impl<'a> GpuFieldBackend<'a> {
    pub fn new(
        images: &'a mut Assets<Image>,
        field_images: &'a mut GpuFieldImages,
        render_device: &RenderDevice,
    ) -> Self {
        Self {
            images,
            handles: &mut field_images.handles,
            max_dimension: render_device.limits().max_texture_dimension_2d,
        }
    }
}

impl FieldBackend for GpuFieldBackend<'_> {
    fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    fn release_all(&mut self) {
        for handle in self.handles.iter_mut() {
            if let Some(handle) = handle.take() {
                self.images.remove(&handle);
            }
        }
    }

    fn create(&mut self, slot: TextureSlot, size: GridSize, clear: Vec4) -> Result<(), LiquidError> {
        let extent = Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        };
        let mut image = if slot == TextureSlot::Display {
            let texel = (clear.clamp(Vec4::ZERO, Vec4::ONE) * 255.0)
                .round()
                .to_array()
                .map(|c| c as u8);
            Image::new_fill(
                extent,
                TextureDimension::D2,
                &texel,
                DISPLAY_FORMAT,
                RenderAssetUsages::RENDER_WORLD,
            )
        } else {
            Image::new_fill(
                extent,
                TextureDimension::D2,
                bytemuck::cast_slice(&clear.to_array()),
                FIELD_FORMAT,
                RenderAssetUsages::RENDER_WORLD,
            )
        };
        image.texture_descriptor.label = Some(slot.label());
        image.texture_descriptor.usage =
            TextureUsages::COPY_DST | TextureUsages::STORAGE_BINDING | TextureUsages::TEXTURE_BINDING;

        self.handles[slot.index()] = Some(self.images.add(image));
        Ok(())
    }
}

pub fn window_viewport(window: &Window) -> Viewport {
    Viewport::new(window.width(), window.height(), window.scale_factor())
}

// ==================== Startup ====================

/// Gate on the host, classify it, allocate fields and insert the frame state.
#[allow(clippy::too_many_arguments)]
pub fn start_effect(
    mut commands: Commands,
    config: Res<LiquidConfig>,
    windows: Query<&Window, With<PrimaryWindow>>,
    render_device: Option<Res<RenderDevice>>,
    adapter_info: Option<Res<RenderAdapterInfo>>,
    mut images: ResMut<Assets<Image>>,
    mut field_images: ResMut<GpuFieldImages>,
    mut status: ResMut<LiquidStatus>,
) {
    let Ok(window) = windows.get_single() else {
        *status = skipped("no primary window");
        return;
    };
    if window.width() < config.min_viewport_width {
        *status = skipped(&format!(
            "viewport {} px is narrower than {} px",
            window.width(),
            config.min_viewport_width
        ));
        return;
    }
    let Some(render_device) = render_device else {
        *status = failed(LiquidError::GpuUnavailable("no render device".into()));
        return;
    };
    if render_device.limits().max_storage_textures_per_shader_stage == 0 {
        *status = skipped("device exposes no storage textures");
        return;
    }

    let profile = GpuProfile {
        renderer: adapter_info
            .map(|info| format!("{} {:?}", info.name, info.device_type).to_lowercase()),
        device_memory_gb: None,
        cpu_cores: std::thread::available_parallelism().ok().map(|n| n.get()),
    };
    let tier = select_tier(config.adaptive, config.pinned_tier, &profile);
    let palette = Palette::new(config.style.base_color());
    let viewport = window_viewport(window);

    let mut store = FieldStore::default();
    let mut backend = GpuFieldBackend::new(&mut images, &mut field_images, &render_device);
    if let Err(err) = store.allocate(&mut backend, viewport, &tier, palette.base) {
        *status = failed(err);
        return;
    }
    field_images.generation = store.generation();

    if let Some(layout) = store.layout() {
        info!(
            "liquid: {} tier, grid {}x{}, {} pressure iterations, bloom {}",
            tier.level,
            layout.simulation.width,
            layout.simulation.height,
            tier.pressure_iterations,
            if layout.bloom.is_some() { "on" } else { "off" },
        );
    }

    commands.insert_resource(ActiveEffect {
        tier,
        opacity: config.style.opacity(),
    });
    commands.insert_resource(SolverPipeline::new(&tier));
    commands.insert_resource(FrameScheduler::for_tier(&tier));
    commands.insert_resource(InjectionTranslator::new(tier.injection));
    commands.insert_resource(palette);
    commands.insert_resource(store);
    commands.insert_resource(PointerState::default());
    commands.insert_resource(ScrollState::default());
    commands.insert_resource(ResizeDebouncer::default());
    *status = LiquidStatus::Running;
}

fn skipped(reason: &str) -> LiquidStatus {
    info!("liquid: skipped, {reason}");
    LiquidStatus::Skipped(reason.to_string())
}

fn failed(error: LiquidError) -> LiquidStatus {
    error!("liquid: {error}");
    LiquidStatus::Failed(error)
}

// ==================== Per Frame ====================

/// Tick the scheduler and publish this frame's plan (idle when not stepping).
#[allow(clippy::too_many_arguments)]
pub fn step_frame(
    time: Res<Time<Real>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    visibility: Res<HostVisibility>,
    config: Res<LiquidConfig>,
    effect: Res<ActiveEffect>,
    palette: Res<Palette>,
    translator: Res<InjectionTranslator>,
    solver: Res<SolverPipeline>,
    mut scheduler: ResMut<FrameScheduler>,
    mut store: ResMut<FieldStore>,
    mut pointer: ResMut<PointerState>,
    mut scroll: ResMut<ScrollState>,
    mut plan: ResMut<FramePlan>,
) {
    let visible = windows
        .get_single()
        .map(|window| window.visible)
        .unwrap_or(false)
        && !visibility.occluded;
    let now_ms = time.elapsed_secs_f64() * 1000.0;

    match scheduler.tick(now_ms, visible) {
        TickDecision::Step { dt } => {
            let t = time.elapsed_secs();
            let sv = scroll.step();
            let splat = config
                .scenario
                .injection(&translator, &pointer, sv, &palette, t);
            let inputs = FrameInputs {
                dt,
                splat,
                base: palette.base,
                opacity: effect.opacity,
            };
            plan.set_if_neq(solver.plan_frame(&mut store, &inputs));
            pointer.advance();
        }
        TickDecision::Skip | TickDecision::Paused => {
            plan.set_if_neq(FramePlan::idle(store.generation()));
        }
    }
}

/// Re-resolve styling when the configuration changes. Fields are kept.
pub fn apply_style_changes(
    config: Res<LiquidConfig>,
    mut palette: ResMut<Palette>,
    mut effect: ResMut<ActiveEffect>,
) {
    if palette.refresh(config.style.base_color()) {
        info!("liquid: base colour is now {:?}", palette.base);
    }
    let opacity = config.style.opacity();
    if effect.opacity != opacity {
        effect.opacity = opacity;
    }
}

/// Reallocate once a burst of resizes has settled.
#[allow(clippy::too_many_arguments)]
pub fn apply_resize(
    time: Res<Time<Real>>,
    config: Res<LiquidConfig>,
    effect: Res<ActiveEffect>,
    render_device: Res<RenderDevice>,
    mut debouncer: ResMut<ResizeDebouncer>,
    mut palette: ResMut<Palette>,
    mut store: ResMut<FieldStore>,
    mut images: ResMut<Assets<Image>>,
    mut field_images: ResMut<GpuFieldImages>,
    mut plan: ResMut<FramePlan>,
    mut status: ResMut<LiquidStatus>,
) {
    let Some(viewport) = debouncer.poll(time.elapsed_secs_f64() * 1000.0) else {
        return;
    };

    let mut backend = GpuFieldBackend::new(&mut images, &mut field_images, &render_device);
    match reallocate(&mut store, &mut backend, viewport, &effect.tier, &config, &mut palette) {
        Ok(_) => {
            field_images.generation = store.generation();
            plan.set_if_neq(FramePlan::idle(store.generation()));
            debug!(
                "liquid: reallocated for {}x{} @ {}",
                viewport.width, viewport.height, viewport.device_pixel_ratio
            );
        }
        Err(err) => {
            plan.set_if_neq(FramePlan::idle(store.generation()));
            *status = failed(err);
        }
    }
}

/// Reallocate for `viewport`, seeding dye with the base colour the current
/// styling resolves to.
pub fn reallocate(
    store: &mut FieldStore,
    backend: &mut impl FieldBackend,
    viewport: Viewport,
    tier: &QualityTier,
    config: &LiquidConfig,
    palette: &mut Palette,
) -> Result<(), LiquidError> {
    palette.refresh(config.style.base_color());
    store.allocate(backend, viewport, tier, palette.base)?;
    Ok(())
}

/// Tear down when the render world reports a program that failed to build.
pub fn watch_program_health(
    health: Res<ProgramSetHealth>,
    render_device: Res<RenderDevice>,
    mut store: ResMut<FieldStore>,
    mut images: ResMut<Assets<Image>>,
    mut field_images: ResMut<GpuFieldImages>,
    mut plan: ResMut<FramePlan>,
    mut status: ResMut<LiquidStatus>,
) {
    let Some(error) = health.failure() else {
        return;
    };
    let mut backend = GpuFieldBackend::new(&mut images, &mut field_images, &render_device);
    store.release(&mut backend);
    plan.set_if_neq(FramePlan::idle(store.generation()));
    *status = failed(error);
}
