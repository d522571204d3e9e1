//! Adaptive quality: one-shot classification of the host into a parameter tier.
//!
//! This module defines the canonical simulation parameters. Instead of constants
//! scattered across shaders and systems, every tunable that depends on host
//! capability lives in a [`QualityTier`] chosen once at startup and handed
//! read-only to the field store and the solver pipeline.

use std::fmt;

use crate::simulation::InjectionProfile;

/// Capability class the host was sorted into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TierLevel {
    Low,
    Medium,
    High,
    /// Adaptive quality disabled: one fixed parameter set for every host.
    Fixed,
}

impl TierLevel {
    /// Parse a pinned tier name (`low`, `medium`, `high`, `fixed`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "low" => Some(TierLevel::Low),
            "medium" => Some(TierLevel::Medium),
            "high" => Some(TierLevel::High),
            "fixed" => Some(TierLevel::Fixed),
            _ => None,
        }
    }
}

impl fmt::Display for TierLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TierLevel::Low => "low",
            TierLevel::Medium => "medium",
            TierLevel::High => "high",
            TierLevel::Fixed => "fixed",
        };
        f.write_str(name)
    }
}

/// Immutable simulation parameters for the whole session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityTier {
    pub level: TierLevel,
    /// Simulation grid size relative to the (DPR-scaled) viewport, < 1
    pub resolution_scale: f32,
    /// Jacobi iterations per pressure solve
    pub pressure_iterations: u32,
    /// Upper bound applied to the host's device pixel ratio
    pub device_pixel_ratio_cap: f32,
    /// Vorticity confinement strength
    pub vorticity: f32,
    /// Maximum solver steps per second
    pub frame_rate_cap: f32,
    pub bloom_enabled: bool,
    /// Per-step velocity decay (< 1)
    pub velocity_dissipation: f32,
    /// Per-step dye decay toward the base colour (< 1)
    pub dye_dissipation: f32,
    /// Splat force/radius constants and intensity policy
    pub injection: InjectionProfile,
}

impl QualityTier {
    pub fn for_level(level: TierLevel) -> Self {
        match level {
            TierLevel::Low => Self {
                level,
                resolution_scale: 0.35,
                pressure_iterations: 8,
                device_pixel_ratio_cap: 1.0,
                vorticity: 15.0,
                frame_rate_cap: 30.0,
                bloom_enabled: false,
                velocity_dissipation: 0.988,
                dye_dissipation: 0.994,
                injection: InjectionProfile::ADAPTIVE,
            },
            TierLevel::Medium => Self {
                level,
                resolution_scale: 0.45,
                pressure_iterations: 12,
                device_pixel_ratio_cap: 1.2,
                vorticity: 20.0,
                frame_rate_cap: 45.0,
                bloom_enabled: false,
                velocity_dissipation: 0.988,
                dye_dissipation: 0.994,
                injection: InjectionProfile::ADAPTIVE,
            },
            TierLevel::High => Self {
                level,
                resolution_scale: 0.65,
                pressure_iterations: 20,
                device_pixel_ratio_cap: 1.5,
                vorticity: 30.0,
                frame_rate_cap: 60.0,
                bloom_enabled: true,
                velocity_dissipation: 0.988,
                dye_dissipation: 0.994,
                injection: InjectionProfile::ADAPTIVE,
            },
            TierLevel::Fixed => Self {
                level,
                resolution_scale: 0.55,
                pressure_iterations: 16,
                device_pixel_ratio_cap: 1.5,
                vorticity: 26.0,
                frame_rate_cap: 60.0,
                bloom_enabled: false,
                velocity_dissipation: 0.985,
                dye_dissipation: 0.992,
                injection: InjectionProfile::FIXED,
            },
        }
    }

    /// Minimum milliseconds between two solver steps.
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.frame_rate_cap as f64
    }
}

/// Signals gathered once from the host. Any of them may be missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GpuProfile {
    /// Renderer descriptor (adapter name and device class)
    pub renderer: Option<String>,
    /// Installed memory in gigabytes
    pub device_memory_gb: Option<f32>,
    /// Logical CPU cores
    pub cpu_cores: Option<usize>,
}

/// Classify a host. Pure: the same profile always yields the same level, and a
/// profile with nothing recognisable in it lands on [`TierLevel::Medium`].
pub fn classify(profile: &GpuProfile) -> TierLevel {
    let mut level = TierLevel::Medium;

    if let Some(renderer) = &profile.renderer {
        let r = renderer.to_lowercase();
        if r.contains("nvidia") && (r.contains("rtx") || r.contains("gtx 1")) {
            level = TierLevel::High;
        } else if r.contains("amd") && r.contains("rx") {
            level = TierLevel::High;
        } else if r.contains("apple") && (r.contains("m1") || r.contains("m2") || r.contains("m3")) {
            level = TierLevel::High;
        } else if r.contains("intel") && !r.contains("iris") {
            level = TierLevel::Low;
        } else if r.contains("integrated") {
            level = TierLevel::Low;
        }
    }

    match profile.device_memory_gb {
        Some(gb) if gb < 4.0 => level = TierLevel::Low,
        Some(gb) if gb >= 8.0 && level == TierLevel::Medium => level = TierLevel::High,
        _ => {}
    }

    if matches!(profile.cpu_cores, Some(cores) if cores < 4) {
        level = TierLevel::Low;
    }

    level
}

/// Select the session tier: a pinned level wins, otherwise adaptive
/// classification, otherwise the fixed parameter set.
pub fn select_tier(adaptive: bool, pinned: Option<TierLevel>, profile: &GpuProfile) -> QualityTier {
    let level = match (pinned, adaptive) {
        (Some(level), _) => level,
        (None, true) => classify(profile),
        (None, false) => TierLevel::Fixed,
    };
    QualityTier::for_level(level)
}
