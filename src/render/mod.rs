//! Display surface - the composited image as a full-window sprite.

use bevy::{prelude::*, window::PrimaryWindow};

use crate::simulation::{GpuFieldImages, LiquidSet, TextureSlot};

/// Depth of the surface, above anything the host draws at z = 0.
pub const SURFACE_Z: f32 = 10.0;

/// Plugin presenting the display field over the window.
pub struct LiquidDisplayPlugin;

impl Plugin for LiquidDisplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, sync_surface.after(LiquidSet));
    }
}

/// Marker for the sprite showing the display field.
#[derive(Component)]
pub struct LiquidSurface;

/// Keep one sprite showing the current display image at window size; remove
/// it once the effect has released its fields.
fn sync_surface(
    mut commands: Commands,
    field_images: Res<GpuFieldImages>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut surfaces: Query<(Entity, &mut Sprite), With<LiquidSurface>>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    let size = window.size();
    let display = field_images.handle(TextureSlot::Display);

    match (surfaces.get_single_mut(), display) {
        (Ok((_, mut sprite)), Some(image)) => {
            if sprite.image != *image {
                sprite.image = image.clone();
            }
            if sprite.custom_size != Some(size) {
                sprite.custom_size = Some(size);
            }
        }
        (Ok((entity, _)), None) => {
            commands.entity(entity).despawn();
        }
        (Err(_), Some(image)) => {
            commands.spawn((
                LiquidSurface,
                Sprite {
                    image: image.clone(),
                    custom_size: Some(size),
                    ..default()
                },
                Transform::from_xyz(0.0, 0.0, SURFACE_Z),
            ));
        }
        (Err(_), None) => {}
    }
}
