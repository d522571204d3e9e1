//! Input handling: window events into pointer, scroll and visibility state.

use bevy::{
    input::mouse::{MouseScrollUnit, MouseWheel},
    prelude::*,
    window::{CursorLeft, CursorMoved, PrimaryWindow, WindowOccluded, WindowResized},
};

use super::injection::{PointerMode, PointerState, ScrollState};
use super::scheduler::ResizeDebouncer;
use super::setup::window_viewport;
use crate::config::LiquidConfig;

/// Pixels per wheel "line".
pub const LINE_HEIGHT_PX: f32 = 40.0;

/// Whether the compositor reports the window as covered.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostVisibility {
    pub occluded: bool,
}

/// Cursor position and the active flag, according to the pointer mode.
pub fn track_pointer(
    mut moved: EventReader<CursorMoved>,
    mut left: EventReader<CursorLeft>,
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<(Entity, &Window), With<PrimaryWindow>>,
    config: Res<LiquidConfig>,
    mut pointer: ResMut<PointerState>,
) {
    let Ok((primary, window)) = windows.get_single() else {
        return;
    };
    let size = window.size();

    for event in moved.read().filter(|e| e.window == primary) {
        pointer.move_to(PointerState::normalize(event.position, size));
        if config.pointer_mode == PointerMode::Hover {
            pointer.active = true;
        }
    }
    let left_window = left.read().filter(|e| e.window == primary).count() > 0;

    match config.pointer_mode {
        PointerMode::Hover => {
            if left_window {
                pointer.active = false;
            }
        }
        PointerMode::Press => {
            pointer.active = buttons.pressed(MouseButton::Left);
        }
    }
}

/// Wheel deltas accumulate into the scroll velocity, positive when the
/// content moves up.
pub fn track_scroll(mut wheel: EventReader<MouseWheel>, mut scroll: ResMut<ScrollState>) {
    for event in wheel.read() {
        let pixels = match event.unit {
            MouseScrollUnit::Line => event.y * LINE_HEIGHT_PX,
            MouseScrollUnit::Pixel => event.y,
        };
        scroll.add_delta(-pixels);
    }
}

/// Resizes go to the debouncer; occlusion feeds the scheduler's visibility.
pub fn track_window_state(
    time: Res<Time<Real>>,
    mut resized: EventReader<WindowResized>,
    mut occluded: EventReader<WindowOccluded>,
    windows: Query<(Entity, &Window), With<PrimaryWindow>>,
    mut debouncer: ResMut<ResizeDebouncer>,
    mut visibility: ResMut<HostVisibility>,
) {
    let Ok((primary, window)) = windows.get_single() else {
        return;
    };
    for event in occluded.read().filter(|e| e.window == primary) {
        visibility.occluded = event.occluded;
    }
    if resized.read().filter(|e| e.window == primary).count() > 0 {
        debouncer.notify(time.elapsed_secs_f64() * 1000.0, window_viewport(window));
    }
}
