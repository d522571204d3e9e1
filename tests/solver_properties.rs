//! Solver Property Tests
//!
//! Runs the solver on the CPU executor and checks the physical guarantees the
//! GPU passes rely on: bounded dye mass, divergence reduction by projection,
//! local splats, repeatable allocation and lossless transport at rest.
//!
//! # Running tests
//! ```bash
//! cargo test --test solver_properties
//! ```

use bevy::math::{Vec2, Vec3, Vec4};
use liquid::palette::DEFAULT_BASE_COLOR;
use liquid::quality::{QualityTier, TierLevel};
use liquid::resources::PassUniforms;
use liquid::simulation::{
    CpuFields, FieldBackend, FieldStore, FrameInputs, FramePlan, GridSize, Program, SolverPipeline,
    SolverStage, Splat, TextureSlot, Viewport,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

// ==================== HELPER FUNCTIONS ====================

fn allocated(level: TierLevel, viewport: Viewport) -> (QualityTier, CpuFields, FieldStore) {
    let tier = QualityTier::for_level(level);
    let mut cpu = CpuFields::default();
    let mut store = FieldStore::default();
    store
        .allocate(&mut cpu, viewport, &tier, DEFAULT_BASE_COLOR)
        .expect("allocation");
    (tier, cpu, store)
}

fn dye_alpha_total(cpu: &CpuFields, store: &FieldStore) -> f64 {
    let slot = store.fields().unwrap().dye.read();
    cpu.field(slot).unwrap().channel_sum(3)
}

/// Sum of |rgb - base| + alpha over the dye field.
fn dye_excess(cpu: &CpuFields, store: &FieldStore, base: Vec3) -> f64 {
    let slot = store.fields().unwrap().dye.read();
    cpu.field(slot)
        .unwrap()
        .texels()
        .iter()
        .map(|t| ((t.truncate() - base).abs().element_sum() + t.w) as f64)
        .sum()
}

fn inputs(splat: Option<Splat>) -> FrameInputs {
    FrameInputs {
        dt: 1.0 / 60.0,
        splat,
        base: DEFAULT_BASE_COLOR,
        opacity: 0.5,
    }
}

/// Analytic Gaussian influence of a splat summed over every texel of `grid`.
fn injected_alpha(splat: &Splat, grid: GridSize) -> f64 {
    let aspect = grid.aspect();
    let mut total = 0.0;
    for y in 0..grid.height {
        for x in 0..grid.width {
            let uv = Vec2::new(
                (x as f32 + 0.5) / grid.width as f32,
                (y as f32 + 0.5) / grid.height as f32,
            );
            let mut d = uv - splat.point;
            d.x *= aspect;
            let influence = (-d.length_squared() / (splat.dye_radius * splat.dye_radius)).exp()
                * splat.dye_intensity;
            total += (influence * splat.alpha_gain) as f64;
        }
    }
    total
}

fn mean_abs_divergence(cpu: &mut CpuFields, velocity: TextureSlot, size: GridSize) -> f64 {
    let mut plan = FramePlan::new(1);
    plan.push(
        Program::Divergence,
        &[velocity],
        TextureSlot::Divergence,
        size,
        PassUniforms::with_texel(size.texel()),
    );
    cpu.execute(&plan).unwrap();
    let field = cpu.field(TextureSlot::Divergence).unwrap();
    field.texels().iter().map(|t| t.x.abs() as f64).sum::<f64>() / size.texel_count() as f64
}

// ==================== TESTS ====================

#[test]
fn dye_mass_is_bounded_by_injection() {
    let (tier, mut cpu, mut store) = allocated(TierLevel::Low, Viewport::new(320.0, 200.0, 1.0));
    let pipeline = SolverPipeline::new(&tier);
    let grid = store.layout().unwrap().simulation;
    let splat = Splat::dye_only(Vec2::new(0.4, 0.6), Vec3::new(0.2, 0.4, 0.9), 0.05, 1.0, 0.8);

    let mut previous = dye_alpha_total(&cpu, &store);
    for _ in 0..5 {
        let plan = pipeline.plan_frame(&mut store, &inputs(Some(splat)));
        cpu.execute(&plan).unwrap();
        let total = dye_alpha_total(&cpu, &store);
        assert!(
            total <= previous + injected_alpha(&splat, grid) + 1e-3,
            "alpha grew from {previous} to {total}"
        );
        previous = total;
    }
}

#[test]
fn idle_dye_decays_at_the_dissipation_rate() {
    let (tier, mut cpu, mut store) = allocated(TierLevel::Low, Viewport::new(320.0, 200.0, 1.0));
    let pipeline = SolverPipeline::new(&tier);
    let splat = Splat::dye_only(Vec2::splat(0.5), Vec3::new(1.0, 0.2, 0.1), 0.08, 1.0, 1.0);
    let plan = pipeline.plan_frame(&mut store, &inputs(Some(splat)));
    cpu.execute(&plan).unwrap();

    let start = dye_excess(&cpu, &store, DEFAULT_BASE_COLOR);
    assert!(start > 1.0);

    let steps = 30;
    for _ in 0..steps {
        let plan = pipeline.plan_frame(&mut store, &inputs(None));
        cpu.execute(&plan).unwrap();
    }
    let expected = start * (tier.dye_dissipation as f64).powi(steps);
    let actual = dye_excess(&cpu, &store, DEFAULT_BASE_COLOR);
    assert!(
        (actual - expected).abs() <= expected * 1e-3,
        "excess {actual}, expected {expected}"
    );
}

#[test]
fn projection_reduces_divergence() {
    let size = GridSize::new(32, 32);
    let mut rng = StdRng::seed_from_u64(7);
    let mut cpu = CpuFields::default();
    for slot in [
        TextureSlot::VelocityA,
        TextureSlot::VelocityB,
        TextureSlot::PressureA,
        TextureSlot::PressureB,
        TextureSlot::Divergence,
    ] {
        cpu.create(slot, size, Vec4::ZERO).unwrap();
    }
    let velocity = cpu.field_mut(TextureSlot::VelocityA).unwrap();
    for y in 0..size.height {
        for x in 0..size.width {
            let v = Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            velocity.set(x, y, v.extend(0.0).extend(1.0));
        }
    }

    let before = mean_abs_divergence(&mut cpu, TextureSlot::VelocityA, size);
    assert!(before > 0.1);

    // divergence is already in place from the measurement above
    let mut plan = FramePlan::new(1);
    let uniforms = PassUniforms::with_texel(size.texel());
    let mut pressure = [TextureSlot::PressureA, TextureSlot::PressureB];
    for _ in 0..20 {
        plan.push(
            Program::Pressure,
            &[pressure[0], TextureSlot::Divergence],
            pressure[1],
            size,
            uniforms,
        );
        pressure.swap(0, 1);
    }
    plan.push(
        Program::GradientSubtract,
        &[pressure[0], TextureSlot::VelocityA],
        TextureSlot::VelocityB,
        size,
        uniforms,
    );
    cpu.execute(&plan).unwrap();

    let after = mean_abs_divergence(&mut cpu, TextureSlot::VelocityB, size);
    assert!(after < before, "divergence went from {before} to {after}");
}

#[test]
fn splat_influence_is_local() {
    let size = GridSize::new(64, 64);
    let mut cpu = CpuFields::default();
    cpu.create(TextureSlot::DyeA, size, Vec4::ZERO).unwrap();
    cpu.create(TextureSlot::DyeB, size, Vec4::ZERO).unwrap();

    let radius = 0.05;
    let point = Vec2::new(0.3, 0.7);
    let mut plan = FramePlan::new(1);
    plan.push(
        Program::Splat,
        &[TextureSlot::DyeA],
        TextureSlot::DyeB,
        size,
        PassUniforms {
            point: point.to_array(),
            radius,
            intensity: 1.0,
            color: [1.0, 0.0, 0.0, 0.0],
            aspect: size.aspect(),
            ..PassUniforms::with_texel(size.texel())
        },
    );
    cpu.execute(&plan).unwrap();

    let field = cpu.field(TextureSlot::DyeB).unwrap();
    let peak = field.texels().iter().map(|t| t.x).fold(0.0, f32::max);
    assert!(peak > 0.5);
    for y in 0..size.height {
        for x in 0..size.width {
            let uv = Vec2::new((x as f32 + 0.5) / 64.0, (y as f32 + 0.5) / 64.0);
            if uv.distance(point) > 3.0 * radius {
                assert!(field.get(x, y).x < 0.01 * peak, "texel ({x}, {y}) too bright");
            }
        }
    }
}

#[test]
fn reallocating_at_the_same_size_is_idempotent() {
    let tier = QualityTier::for_level(TierLevel::High);
    let viewport = Viewport::new(640.0, 360.0, 1.0);
    let mut cpu = CpuFields::default();
    let mut store = FieldStore::default();

    let snapshot = |cpu: &CpuFields| -> Vec<(TextureSlot, GridSize, Vec4)> {
        TextureSlot::ALL
            .iter()
            .filter_map(|&slot| cpu.field(slot).map(|f| (slot, f.size(), f.get(0, 0))))
            .collect()
    };

    store.allocate(&mut cpu, viewport, &tier, DEFAULT_BASE_COLOR).unwrap();
    let first_layout = *store.layout().unwrap();
    let first = snapshot(&cpu);

    store.allocate(&mut cpu, viewport, &tier, DEFAULT_BASE_COLOR).unwrap();
    assert_eq!(*store.layout().unwrap(), first_layout);
    assert_eq!(snapshot(&cpu), first);

    let dye = cpu.field(TextureSlot::DyeA).unwrap();
    assert!(dye
        .texels()
        .iter()
        .all(|t| *t == DEFAULT_BASE_COLOR.extend(0.0)));
}

#[test]
fn reallocation_reseeds_dye_with_the_current_base() {
    let tier = QualityTier::for_level(TierLevel::Medium);
    let pipeline = SolverPipeline::new(&tier);
    let viewport = Viewport::new(640.0, 360.0, 1.0);
    let mut cpu = CpuFields::default();
    let mut store = FieldStore::default();

    let first_base = Vec3::new(0.9, 0.2, 0.1);
    store.allocate(&mut cpu, viewport, &tier, first_base).unwrap();
    // leave both dye textures holding something other than a clean seed
    let splat = Splat::dye_only(Vec2::splat(0.5), Vec3::ONE, 0.1, 1.0, 1.0);
    for _ in 0..3 {
        let step = FrameInputs {
            base: first_base,
            ..inputs(Some(splat))
        };
        cpu.execute(&pipeline.plan_frame(&mut store, &step)).unwrap();
    }

    let second_base = Vec3::new(0.1, 0.3, 0.8);
    store.allocate(&mut cpu, viewport, &tier, second_base).unwrap();
    for slot in [TextureSlot::DyeA, TextureSlot::DyeB] {
        let dye = cpu.field(slot).unwrap();
        assert!(
            dye.texels().iter().all(|t| *t == second_base.extend(0.0)),
            "{slot:?} kept dye from the previous palette"
        );
    }
}

#[test]
fn red_splat_follows_the_gaussian() {
    let (tier, mut cpu, mut store) = allocated(TierLevel::Medium, Viewport::new(800.0, 600.0, 1.0));
    let pipeline = SolverPipeline::new(&tier);
    let grid = store.layout().unwrap().simulation;
    let splat = Splat::dye_only(Vec2::splat(0.5), Vec3::X, 0.06, 1.0, 1.0);

    let mut plan = FramePlan::new(store.generation());
    let fields = store.fields_mut().unwrap();
    pipeline.record_stage(SolverStage::Splat, &mut plan, fields, grid, &inputs(Some(splat)));
    cpu.execute(&plan).unwrap();

    let dye = cpu.field(fields.dye.read()).unwrap();
    let aspect = grid.aspect();
    let (cx, cy) = (grid.width / 2, grid.height / 2);
    let centre_uv = Vec2::new(
        (cx as f32 + 0.5) / grid.width as f32,
        (cy as f32 + 0.5) / grid.height as f32,
    );
    let mut d = centre_uv - Vec2::splat(0.5);
    d.x *= aspect;
    let expected = (-d.length_squared() / (0.06 * 0.06)).exp();
    let centre = dye.get(cx, cy);
    assert!((centre.w - expected).abs() < 1e-5);
    assert!(centre.w > 0.9);
    assert!(centre.x > DEFAULT_BASE_COLOR.x);

    for y in 0..grid.height {
        for x in 0..grid.width {
            let uv = Vec2::new(
                (x as f32 + 0.5) / grid.width as f32,
                (y as f32 + 0.5) / grid.height as f32,
            );
            if uv.distance(Vec2::splat(0.5)) > 0.2 {
                assert!(dye.get(x, y).w < 0.01, "alpha leaked to ({x}, {y})");
            }
        }
    }
}

#[test]
fn resting_dye_is_unchanged_without_dissipation() {
    let size = GridSize::new(24, 16);
    let mut rng = StdRng::seed_from_u64(42);
    let mut cpu = CpuFields::default();
    for slot in [TextureSlot::VelocityA, TextureSlot::DyeA, TextureSlot::DyeB] {
        cpu.create(slot, size, Vec4::ZERO).unwrap();
    }
    let dye = cpu.field_mut(TextureSlot::DyeA).unwrap();
    for y in 0..size.height {
        for x in 0..size.width {
            dye.set(x, y, Vec4::new(rng.gen(), rng.gen(), rng.gen(), rng.gen()));
        }
    }
    let original = cpu.field(TextureSlot::DyeA).unwrap().clone();

    let mut plan = FramePlan::new(1);
    let mut pair = [TextureSlot::DyeA, TextureSlot::DyeB];
    for _ in 0..10 {
        plan.push(
            Program::Advect,
            &[TextureSlot::VelocityA, pair[0]],
            pair[1],
            size,
            PassUniforms {
                dt: 1.0,
                dissipation: 1.0,
                base: DEFAULT_BASE_COLOR.extend(1.0).to_array(),
                ..PassUniforms::with_texel(size.texel())
            },
        );
        pair.swap(0, 1);
    }
    cpu.execute(&plan).unwrap();

    assert_eq!(cpu.field(pair[0]).unwrap().texels(), original.texels());
}
