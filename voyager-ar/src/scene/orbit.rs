use super::bounds::SceneBounds;
use super::setup::SetupFeatures;
use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll, MouseScrollUnit};
use bevy::prelude::*;

const YAW_SENSITIVITY: f32 = 0.0035;
const PITCH_SENSITIVITY: f32 = 0.0030;
const PITCH_LIMIT: f32 = 1.55;

/// Orbit pivot the viewer camera hangs from.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct ViewerOrbit {
    pub focus: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl Default for ViewerOrbit {
    fn default() -> Self {
        Self {
            focus: Vec3::ZERO,
            yaw: 0.0,
            pitch: -0.4,
            distance: 3.0,
        }
    }
}

impl ViewerOrbit {
    /// Frame the given bounds from a distance proportional to their size.
    pub fn with_bounds(bounds: &SceneBounds) -> Self {
        Self {
            focus: bounds.center(),
            distance: (bounds.radius() * 2.5).max(0.5),
            ..default()
        }
    }

    /// Transform of the pivot entity.
    pub fn pivot_transform(&self) -> Transform {
        Transform::from_translation(self.focus)
            .with_rotation(Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0))
    }

    /// Local transform of the camera below the pivot.
    pub fn camera_offset(&self) -> Transform {
        Transform::from_xyz(0.0, 0.0, self.distance)
    }

    fn rotate(&mut self, delta: Vec2) {
        self.yaw -= delta.x * YAW_SENSITIVITY;
        self.pitch = (self.pitch - delta.y * PITCH_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    fn dolly(&mut self, amount: f32) {
        let speed = (self.distance * 0.2).clamp(0.05, 50.0);
        self.distance = (self.distance - amount * speed).max(0.05);
    }
}

/// Left-drag orbits, wheel dollies. Inactive while navigation is disabled.
pub fn orbit_camera_controller(
    setup: Res<SetupFeatures>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    mouse_scroll: Res<AccumulatedMouseScroll>,
    mut orbits: Query<(&mut ViewerOrbit, &mut Transform, &Children)>,
    mut cameras: Query<&mut Transform, (With<super::ViewerCamera>, Without<ViewerOrbit>)>,
) {
    if !setup.navigation_enabled {
        return;
    }

    for (mut orbit, mut pivot, children) in &mut orbits {
        if mouse_button.pressed(MouseButton::Left) && mouse_motion.delta != Vec2::ZERO {
            orbit.rotate(mouse_motion.delta);
        }

        let scroll = match mouse_scroll.unit {
            MouseScrollUnit::Line => mouse_scroll.delta.y,
            MouseScrollUnit::Pixel => mouse_scroll.delta.y * 0.05,
        };
        if scroll.abs() > f32::EPSILON {
            orbit.dolly(scroll);
        }

        pivot.set_if_neq(orbit.pivot_transform());
        for child in children.iter() {
            if let Ok(mut camera) = cameras.get_mut(child) {
                camera.set_if_neq(orbit.camera_offset());
            }
        }
    }
}
