//! Injection scenarios.
//!
//! `Interactive` is the normal effect. `ForcedSplat` is a diagnostic: it
//! ignores input and drops a red splat at the centre every step, which makes
//! it obvious whether injection and presentation work on a given machine.
//!
//! Select with `LIQUID_SCENARIO=interactive|forced-splat`.

use super::injection::{InjectionTranslator, PointerState, Splat};
use crate::palette::Palette;

// ==================== Scenario Config ====================

pub mod config {
    use bevy::math::{Vec2, Vec3};

    pub const FORCED_POINT: Vec2 = Vec2::splat(0.5);
    pub const FORCED_COLOR: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    pub const FORCED_RADIUS: f32 = 0.1;
    /// Alpha builds up quickly so the dot is visible within a few frames
    pub const FORCED_ALPHA_GAIN: f32 = 3.0;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scenario {
    #[default]
    Interactive,
    ForcedSplat,
}

impl Scenario {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "interactive" => Some(Scenario::Interactive),
            "forced-splat" | "forced" | "red" => Some(Scenario::ForcedSplat),
            _ => None,
        }
    }

    /// The splat for this step.
    pub fn injection(
        self,
        translator: &InjectionTranslator,
        pointer: &PointerState,
        scroll: f32,
        palette: &Palette,
        t: f32,
    ) -> Option<Splat> {
        match self {
            Scenario::Interactive => translator.translate(pointer, scroll, palette, t),
            Scenario::ForcedSplat => Some(forced_splat()),
        }
    }
}

/// Red dye at the centre, no force.
pub fn forced_splat() -> Splat {
    use config::*;
    Splat::dye_only(FORCED_POINT, FORCED_COLOR, FORCED_RADIUS, 1.0, FORCED_ALPHA_GAIN)
}
