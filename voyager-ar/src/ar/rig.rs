//! Extracted view of the viewer scene that the AR manager works on.
//!
//! The Bevy glue copies the relevant components into [`SceneRig`] at the
//! start of the AR system chain and writes them back at the end, so all AR
//! logic runs on plain data and can be tested without a `World`.

use super::contact_shadow::ContactShadow;
use crate::scene::bounds::SceneBounds;
use crate::scene::model::DerivativeQuality;
use crate::scene::setup::{ClipPlanes, SetupFeatures};
use ar_constants::placement::{
    HIT_PLANE_EXTENT_FACTOR, HIT_PLANE_THICKNESS, SELECTION_RING_RADIUS_FACTOR,
    SELECTION_RING_WIDTH_FACTOR,
};
use bevy::prelude::*;

/// Field of view and aspect of the viewer's own perspective projection.
/// Clip planes live in [`ClipPlanes`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraLens {
    pub fov: f32,
    pub aspect_ratio: f32,
}

impl Default for CameraLens {
    fn default() -> Self {
        let perspective = PerspectiveProjection::default();
        Self {
            fov: perspective.fov,
            aspect_ratio: perspective.aspect_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraRig {
    pub entity: Option<Entity>,
    /// Camera-to-world transform.
    pub transform: Transform,
    /// GL-convention projection. Only authoritative while AR drives the camera.
    pub projection: Mat4,
    /// Viewer lens, read from the camera while the viewer drives it.
    pub lens: CameraLens,
    /// Parent the camera is attached to in the viewer hierarchy.
    pub parent: Option<Entity>,
    /// When false the viewer's navigation must not touch the camera.
    pub auto_update: bool,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            entity: None,
            transform: Transform::IDENTITY,
            projection: Mat4::perspective_rh_gl(0.8, 1.0, 0.1, 1000.0),
            lens: CameraLens::default(),
            parent: None,
            auto_update: true,
        }
    }
}

impl CameraRig {
    pub fn world_matrix(&self) -> Mat4 {
        self.transform.compute_matrix()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSlot {
    pub entity: Entity,
    pub shadows_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelSlot {
    pub entity: Option<Entity>,
    pub quality: DerivativeQuality,
    pub ar_uri: Option<String>,
    pub android_uri: Option<String>,
    pub ios_uri: Option<String>,
}

/// Feature switches the toggler snapshots and restores.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureState {
    pub setup: SetupFeatures,
    pub clip: ClipPlanes,
    pub lights: Vec<LightSlot>,
}

/// Invisible hit plane plus visible selection ring, both in scene-local space.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionGeometry {
    pub plane: Transform,
    pub plane_size: Vec3,
    pub ring: Transform,
    pub ring_inner_radius: f32,
    pub ring_outer_radius: f32,
}

impl InteractionGeometry {
    /// Build geometry sized from the scene bounds. Floor mounts get a horizontal
    /// plane under the object; wall mounts a vertical plane behind it.
    pub fn new(bounds: &SceneBounds, wall_mount: bool) -> Self {
        let size = bounds.size();
        let center = bounds.center();
        let ring_outer_radius = bounds.footprint_radius().max(0.01) * SELECTION_RING_RADIUS_FACTOR;
        let ring_inner_radius = ring_outer_radius * (1.0 - SELECTION_RING_WIDTH_FACTOR);

        if wall_mount {
            let plane_size = Vec3::new(
                size.x * HIT_PLANE_EXTENT_FACTOR,
                size.y * HIT_PLANE_EXTENT_FACTOR,
                HIT_PLANE_THICKNESS,
            );
            let back = Vec3::new(center.x, center.y, bounds.min.z);
            Self {
                plane: Transform::from_translation(back),
                plane_size,
                // Ring stands on the wall facing outwards.
                ring: Transform::from_translation(back)
                    .with_rotation(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)),
                ring_inner_radius,
                ring_outer_radius,
            }
        } else {
            let extent = size.x.max(size.z) * HIT_PLANE_EXTENT_FACTOR;
            let plane_size = Vec3::new(extent, HIT_PLANE_THICKNESS, extent);
            let floor = Vec3::new(center.x, bounds.min.y, center.z);
            Self {
                plane: Transform::from_translation(floor),
                plane_size,
                ring: Transform::from_translation(floor),
                ring_inner_radius,
                ring_outer_radius,
            }
        }
    }

    /// World transform of the hit plane under the given scene root.
    pub fn plane_world(&self, root: &Transform) -> Transform {
        root.mul_transform(self.plane)
    }
}

/// Structural changes the Bevy glue has to perform after the AR chain ran.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    SpawnInteraction(InteractionGeometry),
    DespawnInteraction,
    SpawnShadow(ContactShadow),
    UpdateShadow(ContactShadow),
    DespawnShadow,
    ForceRender,
}

#[derive(Resource, Debug, Clone, PartialEq)]
pub struct SceneRig {
    pub root: Transform,
    pub light_rig: Transform,
    pub camera: CameraRig,
    pub bounds: SceneBounds,
    pub features: FeatureState,
    pub models: Vec<ModelSlot>,
    /// Window size in logical pixels.
    pub viewport: Vec2,
    pub commands: Vec<SceneCommand>,
}

impl Default for SceneRig {
    fn default() -> Self {
        Self {
            root: Transform::IDENTITY,
            light_rig: Transform::IDENTITY,
            camera: CameraRig::default(),
            bounds: SceneBounds::default(),
            features: FeatureState::default(),
            models: Vec::new(),
            viewport: Vec2::new(1280.0, 720.0),
            commands: Vec::new(),
        }
    }
}

impl SceneRig {
    /// Current yaw of the scene root around +Y.
    pub fn yaw(&self) -> f32 {
        self.root.rotation.to_euler(EulerRot::YXZ).0
    }

    pub fn scale(&self) -> f32 {
        self.root.scale.x
    }

    pub fn push(&mut self, command: SceneCommand) {
        self.commands.push(command);
    }
}
