//! Liquid - Main Entry
//!
//! Hosts the effect in a window. Configuration comes from `LIQUID_*`
//! environment variables.

use bevy::prelude::*;
use liquid::config::LiquidConfig;
use liquid::palette::parse_color;
use liquid::render::LiquidDisplayPlugin;
use liquid::simulation::{LiquidPlugin, LiquidStatus};

fn main() {
    let config = LiquidConfig::from_env();
    let background = config
        .style
        .background
        .as_deref()
        .and_then(parse_color)
        .map(|c| Color::srgba(c.rgb.x, c.rgb.y, c.rgb.z, c.alpha))
        .unwrap_or(Color::BLACK);

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Liquid".into(),
                resolution: (1280.0, 720.0).into(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(ClearColor(background))
        .insert_resource(config)
        .add_plugins(LiquidPlugin)
        .add_plugins(LiquidDisplayPlugin)
        .add_systems(Startup, setup_camera)
        .add_systems(Update, log_status)
        .run();
}

/// Set up the 2D main camera
fn setup_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}

/// Log lifecycle transitions
fn log_status(status: Res<LiquidStatus>) {
    if status.is_changed() {
        info!("Liquid status: {:?}", *status);
    }
}
