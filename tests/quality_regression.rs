//! Quality Regression Tests
//!
//! These tests verify that every tier produces a stable, affordable solver
//! configuration and that host classification is deterministic.
//!
//! # Running tests
//! ```bash
//! cargo test --test quality_regression
//! ```

use liquid::quality::{classify, select_tier, GpuProfile, QualityTier, TierLevel};
use liquid::simulation::{FieldLayout, SolverPipeline, Viewport};

// ==================== UNIVERSAL CONSTANTS ====================

const ALL_LEVELS: [TierLevel; 4] = [
    TierLevel::Low,
    TierLevel::Medium,
    TierLevel::High,
    TierLevel::Fixed,
];

/// Largest grid any tier may build for a 1080p display at DPR 2
const MAX_SIMULATION_TEXELS: usize = 2_100_000;

// ==================== HELPER FUNCTIONS ====================

/// Static sanity check of one tier's parameters.
fn assert_tier_stable(tier: &QualityTier) {
    let name = tier.level;
    assert!(
        tier.resolution_scale > 0.0 && tier.resolution_scale < 1.0,
        "{name}: resolution scale must be in (0, 1)"
    );
    assert!(tier.pressure_iterations >= 4, "{name}: too few Jacobi iterations");
    assert!(tier.device_pixel_ratio_cap >= 1.0, "{name}: DPR cap below 1");
    assert!(tier.vorticity >= 0.0, "{name}: negative vorticity");
    assert!(tier.frame_rate_cap >= 24.0, "{name}: frame rate cap too low");

    assert!(
        tier.velocity_dissipation > 0.9 && tier.velocity_dissipation < 1.0,
        "{name}: velocity must decay, slowly"
    );
    assert!(
        tier.dye_dissipation > 0.9 && tier.dye_dissipation < 1.0,
        "{name}: dye must decay, slowly"
    );

    assert!(tier.injection.force > 0.0, "{name}: no splat force");
    assert!(
        tier.injection.radius > 0.0 && tier.injection.radius < 0.25,
        "{name}: splat radius out of range"
    );
    assert!(tier.injection.alpha_gain > 0.0, "{name}: splats add no alpha");
}

fn profile(renderer: Option<&str>, memory: Option<f32>, cores: Option<usize>) -> GpuProfile {
    GpuProfile {
        renderer: renderer.map(str::to_string),
        device_memory_gb: memory,
        cpu_cores: cores,
    }
}

// ==================== TESTS ====================

#[test]
fn test_every_tier_is_stable() {
    for level in ALL_LEVELS {
        assert_tier_stable(&QualityTier::for_level(level));
    }
}

#[test]
fn test_cost_grows_with_tier() {
    let low = QualityTier::for_level(TierLevel::Low);
    let medium = QualityTier::for_level(TierLevel::Medium);
    let high = QualityTier::for_level(TierLevel::High);

    assert!(low.resolution_scale < medium.resolution_scale);
    assert!(medium.resolution_scale < high.resolution_scale);
    assert!(low.pressure_iterations < medium.pressure_iterations);
    assert!(medium.pressure_iterations < high.pressure_iterations);
    assert!(low.frame_rate_cap <= medium.frame_rate_cap);
    assert!(medium.frame_rate_cap <= high.frame_rate_cap);
    assert!(!low.bloom_enabled && !medium.bloom_enabled && high.bloom_enabled);
}

#[test]
fn test_grids_stay_affordable_on_large_displays() {
    let viewport = Viewport::new(1920.0, 1080.0, 2.0);
    for level in ALL_LEVELS {
        let tier = QualityTier::for_level(level);
        let layout = FieldLayout::for_viewport(viewport, &tier).unwrap();
        assert!(
            layout.simulation.texel_count() <= MAX_SIMULATION_TEXELS,
            "{level}: {:?} is too large",
            layout.simulation
        );
    }
}

#[test]
fn test_classification_is_deterministic() {
    let profiles = [
        profile(Some("nvidia geforce rtx 3070 discretegpu"), None, Some(16)),
        profile(Some("intel(r) uhd graphics 620 integratedgpu"), Some(8.0), Some(8)),
        profile(Some("apple m2 integratedgpu"), None, Some(8)),
        profile(None, Some(2.0), None),
        profile(None, None, None),
    ];
    for p in &profiles {
        let first = classify(p);
        for _ in 0..100 {
            assert_eq!(classify(p), first, "{p:?}");
        }
        assert_eq!(select_tier(true, None, p), select_tier(true, None, p));
    }
}

#[test]
fn test_known_hosts() {
    assert_eq!(
        classify(&profile(Some("nvidia geforce gtx 1080"), None, Some(8))),
        TierLevel::High
    );
    assert_eq!(
        classify(&profile(Some("amd radeon rx 6800"), None, None)),
        TierLevel::High
    );
    assert_eq!(
        classify(&profile(Some("intel(r) iris(r) xe graphics"), None, Some(8))),
        TierLevel::Medium
    );
    assert_eq!(
        classify(&profile(Some("llvmpipe cpu"), Some(16.0), Some(8))),
        TierLevel::High
    );
    // a weak CPU caps even a strong GPU
    assert_eq!(
        classify(&profile(Some("nvidia geforce rtx 4090"), Some(32.0), Some(2))),
        TierLevel::Low
    );
}

#[test]
fn test_non_adaptive_uses_fixed_parameters() {
    let p = profile(Some("nvidia geforce rtx 3070"), None, None);
    let tier = select_tier(false, None, &p);
    assert_eq!(tier.level, TierLevel::Fixed);
    assert!(!tier.injection.adaptive_intensity);

    let solver = SolverPipeline::new(&tier);
    assert_eq!(solver.pressure_iterations, 16);
    assert_eq!(solver.dye_dissipation, 0.992);
}
