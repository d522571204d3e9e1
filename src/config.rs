//! Runtime configuration for the liquid effect.
//!
//! Everything here is read once at startup. Values come from `LIQUID_*`
//! environment variables; anything missing or unparseable falls back to its
//! default with a warning, never an error.

use bevy::log::warn;
use bevy::math::Vec3;
use bevy::prelude::Resource;

use crate::palette::{resolve_base_color, resolve_opacity};
use crate::quality::TierLevel;
use crate::simulation::{PointerMode, Scenario};

/// Narrowest viewport (logical px) the effect starts on.
pub const DEFAULT_MIN_VIEWPORT_WIDTH: f32 = 768.0;

/// Styling inputs, kept as the raw strings the host supplied so a change can be
/// detected and re-resolved without restarting the effect.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct LiquidStyle {
    /// Explicit base colour override
    pub color: Option<String>,
    /// Host background colour, used when there is no override
    pub background: Option<String>,
    /// Explicit opacity override
    pub opacity: Option<String>,
}

impl LiquidStyle {
    pub fn base_color(&self) -> Vec3 {
        resolve_base_color(self.color.as_deref(), self.background.as_deref())
    }

    pub fn opacity(&self) -> f32 {
        resolve_opacity(self.opacity.as_deref())
    }
}

#[derive(Resource, Clone, Debug, PartialEq)]
pub struct LiquidConfig {
    pub style: LiquidStyle,
    /// Classify the host into low/medium/high; when false the fixed tier is used
    pub adaptive: bool,
    /// Skip classification and use this tier
    pub pinned_tier: Option<TierLevel>,
    pub pointer_mode: PointerMode,
    pub scenario: Scenario,
    pub min_viewport_width: f32,
}

impl Default for LiquidConfig {
    fn default() -> Self {
        Self {
            style: LiquidStyle::default(),
            adaptive: true,
            pinned_tier: None,
            pointer_mode: PointerMode::Hover,
            scenario: Scenario::Interactive,
            min_viewport_width: DEFAULT_MIN_VIEWPORT_WIDTH,
        }
    }
}

impl LiquidConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let style = LiquidStyle {
            color: non_empty("LIQUID_COLOR"),
            background: non_empty("LIQUID_BACKGROUND"),
            opacity: non_empty("LIQUID_OPACITY"),
        };

        let adaptive = match non_empty("LIQUID_ADAPTIVE") {
            None => defaults.adaptive,
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => {
                    warn!("LIQUID_ADAPTIVE={v:?} not understood, using {}", defaults.adaptive);
                    defaults.adaptive
                }
            },
        };

        let pinned_tier = non_empty("LIQUID_TIER").and_then(|v| {
            let level = TierLevel::parse(&v);
            if level.is_none() {
                warn!("LIQUID_TIER={v:?} is not a tier, classifying instead");
            }
            level
        });

        let pointer_mode = non_empty("LIQUID_POINTER")
            .and_then(|v| {
                let mode = PointerMode::parse(&v);
                if mode.is_none() {
                    warn!("LIQUID_POINTER={v:?} not understood, using hover");
                }
                mode
            })
            .unwrap_or(defaults.pointer_mode);

        let scenario = non_empty("LIQUID_SCENARIO")
            .and_then(|v| {
                let scenario = Scenario::parse(&v);
                if scenario.is_none() {
                    warn!("LIQUID_SCENARIO={v:?} not understood, using interactive");
                }
                scenario
            })
            .unwrap_or(defaults.scenario);

        let min_viewport_width = non_empty("LIQUID_MIN_WIDTH")
            .and_then(|v| match v.trim().parse::<f32>() {
                Ok(w) if w.is_finite() && w >= 0.0 => Some(w),
                _ => {
                    warn!("LIQUID_MIN_WIDTH={v:?} is not a width, using {DEFAULT_MIN_VIEWPORT_WIDTH}");
                    None
                }
            })
            .unwrap_or(defaults.min_viewport_width);

        Self {
            style,
            adaptive,
            pinned_tier,
            pointer_mode,
            scenario,
            min_viewport_width,
        }
    }
}
