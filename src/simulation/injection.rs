//! Injection Translator: pointer and scroll state in, one splat out.

use bevy::math::{Vec2, Vec3};
use bevy::prelude::Resource;

use crate::palette::Palette;

/// |scroll scalar| above which scrolling alone injects.
pub const SCROLL_THRESHOLD: f32 = 5e-4;

/// Scroll pixels to normalised scroll velocity.
pub const SCROLL_SCALE: f32 = 0.002;

/// Per executed step decay of the scroll velocity.
pub const SCROLL_DECAY: f32 = 0.86;

/// What makes the pointer "active".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointerMode {
    /// Any movement inside the window; leaving the window deactivates
    #[default]
    Hover,
    /// Primary button held
    Press,
}

impl PointerMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "hover" | "move" => Some(PointerMode::Hover),
            "press" | "down" | "drag" => Some(PointerMode::Press),
            _ => None,
        }
    }
}

// ==================== Pointer / Scroll ====================

/// Cursor in normalised [0,1]² with y pointing up.
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct PointerState {
    pub position: Vec2,
    /// Position at the end of the previous executed step
    pub previous: Vec2,
    pub active: bool,
}

impl Default for PointerState {
    fn default() -> Self {
        Self {
            position: Vec2::splat(0.5),
            previous: Vec2::splat(0.5),
            active: false,
        }
    }
}

impl PointerState {
    /// Window coordinates (logical px, y down) to normalised y-up coordinates.
    pub fn normalize(cursor: Vec2, window_size: Vec2) -> Vec2 {
        let w = window_size.x.max(1.0);
        let h = window_size.y.max(1.0);
        Vec2::new(cursor.x / w, 1.0 - cursor.y / h)
    }

    pub fn move_to(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn delta(&self) -> Vec2 {
        self.position - self.previous
    }

    /// Close out a step: the next delta is measured from here.
    pub fn advance(&mut self) {
        self.previous = self.position;
    }
}

#[derive(Resource, Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollState {
    /// Scroll velocity in pixels, decayed once per executed step
    pub velocity: f32,
}

impl ScrollState {
    /// Accumulate a scroll delta (pixels, positive = content moves up).
    pub fn add_delta(&mut self, pixels: f32) {
        self.velocity += pixels;
    }

    /// Normalised scroll scalar for this step, then decay.
    pub fn step(&mut self) -> f32 {
        let sv = self.velocity * SCROLL_SCALE;
        self.velocity *= SCROLL_DECAY;
        sv
    }
}

// ==================== Translator ====================

/// Tier-dependent splat constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InjectionProfile {
    /// Pointer delta to velocity
    pub force: f32,
    /// Gaussian radius in normalised units
    pub radius: f32,
    /// Scale intensity by pointer speed and modulate the dye radius
    pub adaptive_intensity: bool,
    /// Dye alpha added per unit influence
    pub alpha_gain: f32,
}

impl InjectionProfile {
    pub const ADAPTIVE: Self = Self {
        force: 500.0,
        radius: 0.018,
        adaptive_intensity: true,
        alpha_gain: 0.8,
    };

    pub const FIXED: Self = Self {
        force: 700.0,
        radius: 0.06,
        adaptive_intensity: false,
        alpha_gain: 1.0,
    };
}

/// One injection: a velocity splat and a dye splat at the same point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    pub point: Vec2,
    pub force: Vec2,
    pub velocity_intensity: f32,
    pub velocity_radius: f32,
    pub color: Vec3,
    pub dye_intensity: f32,
    pub dye_radius: f32,
    pub alpha_gain: f32,
}

impl Splat {
    /// Pure dye at `point`, no force.
    pub fn dye_only(point: Vec2, color: Vec3, radius: f32, intensity: f32, alpha_gain: f32) -> Self {
        Self {
            point,
            force: Vec2::ZERO,
            velocity_intensity: 0.0,
            velocity_radius: radius,
            color,
            dye_intensity: intensity,
            dye_radius: radius,
            alpha_gain,
        }
    }
}

#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct InjectionTranslator {
    pub profile: InjectionProfile,
}

impl InjectionTranslator {
    pub fn new(profile: InjectionProfile) -> Self {
        Self { profile }
    }

    /// Splat for this step, or `None` when the pointer is idle and scrolling
    /// has died down. `scroll` is this step's normalised scroll scalar and `t`
    /// is wall time in seconds.
    pub fn translate(
        &self,
        pointer: &PointerState,
        scroll: f32,
        palette: &Palette,
        t: f32,
    ) -> Option<Splat> {
        if !pointer.active && scroll.abs() <= SCROLL_THRESHOLD {
            return None;
        }

        let p = &self.profile;
        let delta = pointer.delta() * p.force;
        let force = Vec2::new(delta.x, delta.y - scroll);

        let (velocity_intensity, dye_intensity, radius_scale) = if p.adaptive_intensity {
            let i = (delta.length() / 50.0).clamp(0.3, 1.0);
            (i, 0.7 + 0.3 * i, 0.8 + 0.4 * (t * 2.3).sin())
        } else {
            (1.0, 1.0, 1.0)
        };

        Some(Splat {
            point: pointer.position,
            force,
            velocity_intensity,
            velocity_radius: p.radius,
            color: palette.dye_color(t),
            dye_intensity,
            dye_radius: p.radius * radius_scale,
            alpha_gain: p.alpha_gain,
        })
    }
}
