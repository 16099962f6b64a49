//! Contact shadow for the placed object.
//!
//! A straight-down directional light renders the object into a small shadow
//! map which is received by a ground plane under the object. The light is not
//! a child of the scaled scene root: inheriting scale would stretch the shadow
//! camera and blur the map, so scale and yaw are mirrored in by hand through
//! [`ContactShadow::set_scale_and_offset`] and [`ContactShadow::set_rotation`].
//!
//! Shadow-map auto update is off during AR. Every change raises
//! `needs_update`; the consumer must refresh the shadow map and clear the flag,
//! otherwise the shadow freezes.

use crate::scene::bounds::SceneBounds;
use ar_constants::shadow::{
    SHADOW_CAMERA_DEPTH_MARGIN, SHADOW_CAMERA_NEAR, SHADOW_FRAME_PADDING,
    SHADOW_LIGHT_CLEARANCE, SHADOW_PLANE_LIFT, SHADOW_RESOLUTION_EXPONENT_RANGE,
    SHADOW_RESOLUTION_MAX_EXPONENT, SHADOW_VIEWER_REACH,
};
use bevy::prelude::*;

/// Orthographic camera of the shadow light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCamera {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
    pub zoom: f32,
    /// Up vector of the downward-looking camera, in the horizontal plane.
    pub up: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactShadow {
    bounds: SceneBounds,
    softness: f32,
    resolution: u32,
    intensity: f32,
    visible: bool,
    scale: f32,
    vertical_offset: f32,
    yaw: f32,
    camera: ShadowCamera,
    light_position: Vec3,
    plane_position: Vec3,
    plane_size: Vec2,
    pub needs_update: bool,
}

/// Texels per shadow map side for a softness in [0, 1].
pub fn shadow_resolution(softness: f32) -> u32 {
    let softness = softness.clamp(0.0, 1.0);
    2f32.powf(SHADOW_RESOLUTION_MAX_EXPONENT - softness * SHADOW_RESOLUTION_EXPONENT_RANGE)
        .round() as u32
}

impl ContactShadow {
    /// Build from the object's bounds (scene-local, unscaled).
    pub fn new(bounds: SceneBounds, softness: f32, intensity: f32) -> Self {
        let softness = softness.clamp(0.0, 1.0);
        let intensity = intensity.clamp(0.0, 1.0);
        let size = bounds.size();
        let half_x = size.x * 0.5 * SHADOW_FRAME_PADDING;
        let half_z = size.z * 0.5 * SHADOW_FRAME_PADDING;

        let mut shadow = Self {
            bounds,
            softness,
            resolution: shadow_resolution(softness),
            intensity,
            visible: intensity > 0.0,
            scale: 1.0,
            vertical_offset: 0.0,
            yaw: 0.0,
            camera: ShadowCamera {
                left: -half_x,
                right: half_x,
                top: half_z,
                bottom: -half_z,
                near: SHADOW_CAMERA_NEAR,
                far: SHADOW_CAMERA_NEAR,
                zoom: 1.0,
                up: Vec3::NEG_Z,
            },
            light_position: Vec3::ZERO,
            plane_position: Vec3::ZERO,
            plane_size: Vec2::new(size.x, size.z) * SHADOW_FRAME_PADDING,
            needs_update: true,
        };
        shadow.set_scale_and_offset(1.0, 0.0);
        shadow
    }

    /// Track the scene scale without parenting the light under the scaled node.
    pub fn set_scale_and_offset(&mut self, scale: f32, vertical_offset: f32) {
        let scale = scale.max(f32::EPSILON);
        let size = self.bounds.size();
        let center = self.bounds.center();

        self.scale = scale;
        self.vertical_offset = vertical_offset;

        let clearance = SHADOW_LIGHT_CLEARANCE * scale;
        self.light_position = Vec3::new(
            center.x * scale,
            self.bounds.max.y * scale + clearance + vertical_offset,
            center.z * scale,
        );
        self.plane_position = Vec3::new(
            center.x * scale,
            self.bounds.min.y * scale + SHADOW_PLANE_LIFT + vertical_offset,
            center.z * scale,
        );

        // The frustum is kept in unscaled units; zoom widens it as the object grows.
        self.camera.zoom = 1.0 / scale;
        self.camera.near = SHADOW_CAMERA_NEAR * scale;
        self.camera.far = (clearance + size.y * scale) + SHADOW_CAMERA_DEPTH_MARGIN * scale;
        self.needs_update = true;
    }

    /// Mirror the scene yaw into the shadow camera's up vector.
    pub fn set_rotation(&mut self, yaw: f32) {
        self.yaw = yaw;
        self.camera.up = Quat::from_rotation_y(yaw) * Vec3::NEG_Z;
        self.needs_update = true;
    }

    /// Intensity in [0, 1]; zero hides the shadow so no map is rendered.
    pub fn set_intensity(&mut self, intensity: f32) {
        let intensity = intensity.clamp(0.0, 1.0);
        if intensity == self.intensity {
            return;
        }
        self.intensity = intensity;
        self.visible = intensity > 0.0;
        self.needs_update = true;
    }

    pub fn set_softness(&mut self, softness: f32) {
        let softness = softness.clamp(0.0, 1.0);
        let resolution = shadow_resolution(softness);
        self.softness = softness;
        if resolution != self.resolution {
            self.resolution = resolution;
            self.needs_update = true;
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn softness(&self) -> f32 {
        self.softness
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn camera(&self) -> &ShadowCamera {
        &self.camera
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Shadow light position relative to the scene root origin (unrotated).
    pub fn light_position(&self) -> Vec3 {
        self.light_position
    }

    /// Receiving plane centre relative to the scene root origin (unrotated).
    pub fn plane_position(&self) -> Vec3 {
        self.plane_position
    }

    /// Receiving plane extent at the current scale.
    pub fn plane_size(&self) -> Vec2 {
        self.plane_size * self.scale
    }

    /// World-space half extents covered by the shadow camera.
    pub fn frustum_half_extents(&self) -> Vec2 {
        Vec2::new(self.camera.right, self.camera.top) / self.camera.zoom
    }

    /// View-depth span `(min, max)` the light's single shadow cascade has to
    /// cover: the shadow camera's depth and footprint plus the viewer's reach.
    pub fn cascade_range(&self) -> (f32, f32) {
        let footprint = self.frustum_half_extents().length() * 2.0;
        let min = self.camera.near;
        let max = self.camera.far + footprint + SHADOW_VIEWER_REACH;
        (min, max.max(min + f32::EPSILON))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadow() -> ContactShadow {
        ContactShadow::new(
            SceneBounds::new(Vec3::new(-0.25, 0.0, -0.25), Vec3::new(0.25, 0.6, 0.25)),
            0.0,
            0.5,
        )
    }

    #[test]
    fn test_resolution_spans_512_to_64() {
        assert_eq!(shadow_resolution(0.0), 512);
        assert_eq!(shadow_resolution(1.0), 64);
        assert_eq!(shadow_resolution(2.0), 64);
        assert!(shadow_resolution(0.5) < 512 && shadow_resolution(0.5) > 64);
    }

    #[test]
    fn test_scale_changes_camera_monotonically() {
        let mut shadow = shadow();
        let mut last = *shadow.camera();

        for scale in [1.5, 2.0, 4.0, 8.0] {
            shadow.needs_update = false;
            shadow.set_scale_and_offset(scale, 0.0);
            let camera = *shadow.camera();
            assert!(shadow.needs_update);
            assert!(camera.near > last.near);
            assert!(camera.far > last.far);
            assert!(camera.zoom < last.zoom);
            last = camera;
        }
    }

    #[test]
    fn test_frustum_grows_with_scale() {
        let mut shadow = shadow();
        let before = shadow.frustum_half_extents();
        shadow.set_scale_and_offset(2.0, 0.0);
        let after = shadow.frustum_half_extents();
        assert!((after.x - before.x * 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_cascade_range_tracks_scale() {
        let mut shadow = shadow();
        let (near, far) = shadow.cascade_range();
        assert_eq!(near, shadow.camera().near);
        assert!(far > near);

        shadow.set_scale_and_offset(4.0, 0.0);
        let (scaled_near, scaled_far) = shadow.cascade_range();
        assert!(scaled_near > near);
        assert!(scaled_far > far);
    }

    #[test]
    fn test_offset_moves_plane_and_light_together() {
        let mut shadow = shadow();
        shadow.set_scale_and_offset(1.0, 0.3);
        assert!((shadow.plane_position().y - (0.3 + SHADOW_PLANE_LIFT)).abs() < 1e-6);
        assert!(shadow.light_position().y > 0.9);
    }

    #[test]
    fn test_rotation_turns_up_vector() {
        let mut shadow = shadow();
        shadow.needs_update = false;
        shadow.set_rotation(std::f32::consts::FRAC_PI_2);
        let up = shadow.camera().up;
        assert!((up - Vec3::NEG_X).length() < 1e-5);
        assert!(shadow.needs_update);
    }

    #[test]
    fn test_zero_intensity_hides_shadow() {
        let mut shadow = shadow();
        shadow.set_intensity(0.0);
        assert!(!shadow.is_visible());
        shadow.set_intensity(0.8);
        assert!(shadow.is_visible());
    }

    #[test]
    fn test_softness_updates_resolution() {
        let mut shadow = shadow();
        shadow.needs_update = false;
        shadow.set_softness(1.0);
        assert_eq!(shadow.resolution(), 64);
        assert!(shadow.needs_update);
    }
}
