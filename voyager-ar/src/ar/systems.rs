//! Bevy glue around [`ArSessionManager`].
//!
//! Per frame, in order: extract the world into [`SceneRig`], run the manager,
//! write the rig back, then perform the queued [`SceneCommand`]s.

use super::contact_shadow::ContactShadow;
use super::rig::{CameraLens, InteractionGeometry, LightSlot, ModelSlot, SceneCommand, SceneRig};
use super::session::{ArNotice, ArSessionManager, ArStatus, FrameInput};
use crate::platform::XrPlatformResource;
use crate::scene::bounds::SceneBounds;
use crate::scene::model::VoyagerModel;
use crate::scene::setup::{ClipPlanes, SetupFeatures};
use crate::scene::{ArLightRig, ArSceneRoot, ViewerCamera};
use ar_constants::render_settings::{READOUT_FONT_SIZE, READOUT_SCREEN_OFFSET};
use ar_constants::shadow::{
    DEFAULT_SHADOW_INTENSITY, DEFAULT_SHADOW_SOFTNESS, SHADOW_LIGHT_ILLUMINANCE,
};
use bevy::pbr::{
    CascadeShadowConfig, CascadeShadowConfigBuilder, DirectionalLightShadowMap, NotShadowCaster,
};
use bevy::prelude::*;
use bevy::window::{PrimaryWindow, RequestRedraw};
use serde::{Deserialize, Serialize};

/// AR inputs set by the frontend or the keyboard.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArSettings {
    pub enabled: bool,
    pub wall_mount: bool,
    pub scale: f32,
    pub shadow_softness: f32,
    pub shadow_intensity: f32,
}

impl Default for ArSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            wall_mount: false,
            scale: 1.0,
            shadow_softness: DEFAULT_SHADOW_SOFTNESS,
            shadow_intensity: DEFAULT_SHADOW_INTENSITY,
        }
    }
}

/// The scene content was replaced; any live session has to end.
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct ArContentReloaded;

/// Hit plane and selection ring entities.
#[derive(Component)]
pub struct ArInteraction;

#[derive(Component)]
pub struct ContactShadowLight;

#[derive(Component)]
pub struct ContactShadowPlane;

#[derive(Component)]
pub struct ScaleReadoutText;

/// Perspective parameters of a GL-convention projection matrix.
pub fn perspective_from_gl(projection: Mat4) -> PerspectiveProjection {
    let m00 = projection.x_axis.x;
    let m11 = projection.y_axis.y;
    let m22 = projection.z_axis.z;
    let m32 = projection.w_axis.z;
    PerspectiveProjection {
        fov: 2.0 * (1.0 / m11).atan(),
        aspect_ratio: m11 / m00,
        near: m32 / (m22 - 1.0),
        far: m32 / (m22 + 1.0),
    }
}

/// World transforms of the shadow light and receiving plane under the scene root.
pub fn shadow_transforms(root: &Transform, shadow: &ContactShadow) -> (Transform, Transform) {
    let yaw = Quat::from_rotation_y(shadow.yaw());
    let light = Transform::from_translation(root.translation + yaw * shadow.light_position())
        .looking_to(Vec3::NEG_Y, shadow.camera().up);
    let size = shadow.plane_size();
    let plane = Transform::from_translation(root.translation + yaw * shadow.plane_position())
        .with_rotation(yaw)
        .with_scale(Vec3::new(size.x, 1.0, size.y));
    (light, plane)
}

/// One cascade fitted to the contact shadow instead of the scene-wide default.
pub fn shadow_cascades(shadow: &ContactShadow) -> CascadeShadowConfig {
    let (minimum_distance, maximum_distance) = shadow.cascade_range();
    CascadeShadowConfigBuilder {
        num_cascades: 1,
        minimum_distance,
        maximum_distance,
        first_cascade_far_bound: maximum_distance,
        overlap_proportion: 0.0,
    }
    .build()
}

/// Directional shadow map size the scene had before the contact shadow
/// resized it.
#[derive(Debug, Default)]
pub struct ShadowMapOverride {
    saved: Option<usize>,
}

impl ShadowMapOverride {
    pub fn apply(&mut self, map: &mut DirectionalLightShadowMap, size: usize) {
        self.saved.get_or_insert(map.size);
        if map.size != size {
            map.size = size;
        }
    }

    pub fn restore(&mut self, map: &mut DirectionalLightShadowMap) {
        if let Some(size) = self.saved.take() {
            map.size = size;
        }
    }
}

pub fn ar_keyboard_shortcuts(keyboard: Res<ButtonInput<KeyCode>>, mut settings: ResMut<ArSettings>) {
    if keyboard.just_pressed(KeyCode::KeyR) {
        settings.enabled = !settings.enabled;
        info!("AR {} from keyboard", if settings.enabled { "requested" } else { "exit" });
    }
    if keyboard.just_pressed(KeyCode::KeyM) {
        settings.wall_mount = !settings.wall_mount;
        info!("Wall mount: {}", settings.wall_mount);
    }
}

pub fn extract_scene_rig(
    mut rig: ResMut<SceneRig>,
    setup: Res<SetupFeatures>,
    bounds: Res<SceneBounds>,
    windows: Query<&Window, With<PrimaryWindow>>,
    roots: Query<&Transform, With<ArSceneRoot>>,
    light_rigs: Query<&Transform, With<ArLightRig>>,
    cameras: Query<(Entity, &Transform, &Projection, Option<&ChildOf>), With<ViewerCamera>>,
    lights: Query<(Entity, &DirectionalLight), Without<ContactShadowLight>>,
    models: Query<(Entity, &VoyagerModel)>,
) {
    let rig = &mut *rig;

    if let Ok(root) = roots.single() {
        rig.root = *root;
    }
    if let Ok(light_rig) = light_rigs.single() {
        rig.light_rig = *light_rig;
    }
    if let Ok((entity, transform, projection, child_of)) = cameras.single() {
        rig.camera.entity = Some(entity);
        rig.camera.transform = *transform;
        rig.camera.parent = child_of.map(ChildOf::parent);
        if let Projection::Perspective(perspective) = projection {
            rig.features.clip = ClipPlanes {
                near: perspective.near,
                far: perspective.far,
            };
            // While AR drives the camera its projection is the XR one.
            if rig.camera.auto_update {
                rig.camera.lens = CameraLens {
                    fov: perspective.fov,
                    aspect_ratio: perspective.aspect_ratio,
                };
            }
        }
    }
    if let Ok(window) = windows.single() {
        rig.viewport = window.size();
    }

    rig.bounds = *bounds;
    rig.features.setup = setup.clone();

    // Sorted so snapshots taken at AR entry line up with the same lights on exit.
    rig.features.lights = lights
        .iter()
        .map(|(entity, light)| LightSlot {
            entity,
            shadows_enabled: light.shadows_enabled,
        })
        .collect();
    rig.features.lights.sort_by_key(|slot| slot.entity);

    rig.models = models
        .iter()
        .map(|(entity, model)| ModelSlot {
            entity: Some(entity),
            quality: model.quality,
            ar_uri: model.ar_derivative().map(|d| d.uri.clone()),
            android_uri: model.android_derivative().map(|d| d.uri.clone()),
            ios_uri: model.ios_derivative().map(|d| d.uri.clone()),
        })
        .collect();
    rig.models.sort_by_key(|slot| slot.entity);
}

pub fn drive_ar_session(
    mut manager: ResMut<ArSessionManager>,
    mut platform: ResMut<XrPlatformResource>,
    mut rig: ResMut<SceneRig>,
    mut settings: ResMut<ArSettings>,
    mut reloads: EventReader<ArContentReloaded>,
    mut notices: EventWriter<ArNotice>,
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
) {
    let platform = platform.0.as_mut();
    let rig = &mut *rig;
    let mut errors = Vec::new();

    if settings.is_changed() {
        manager.set_wall_mount(settings.wall_mount);
        manager.set_shadow_params(settings.shadow_softness, settings.shadow_intensity);
        if settings.scale != manager.placement().scale {
            manager.set_scale(rig, settings.scale);
        }
        if settings.enabled != manager.is_enabled() {
            if let Err(error) = manager.set_enabled(platform, rig, settings.enabled) {
                errors.push(error);
            }
        }
    }

    if reloads.read().count() > 0 {
        manager.on_content_reloaded(platform, rig);
    }

    let input = FrameInput {
        delta_secs: time.delta_secs(),
        snap_rotation: keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]),
    };
    errors.extend(manager.update(platform, rig, input));

    for error in &errors {
        match ArNotice::from_error(error) {
            Some(notice) => {
                warn!("AR: {}", error);
                notices.write(notice);
            }
            None => debug!("AR: {}", error),
        }
    }

    // Mirror outputs without re-triggering the settings branch above.
    let enabled = manager.is_enabled();
    let scale = manager.placement().scale;
    if settings.enabled != enabled || settings.scale != scale {
        let settings = settings.bypass_change_detection();
        settings.enabled = enabled;
        settings.scale = scale;
    }
}

pub fn apply_scene_rig(
    mut commands: Commands,
    rig: Res<SceneRig>,
    mut setup: ResMut<SetupFeatures>,
    mut roots: Query<
        &mut Transform,
        (With<ArSceneRoot>, Without<ArLightRig>, Without<ViewerCamera>),
    >,
    mut light_rigs: Query<
        &mut Transform,
        (With<ArLightRig>, Without<ArSceneRoot>, Without<ViewerCamera>),
    >,
    mut cameras: Query<
        (&mut Transform, &mut Projection, Option<&ChildOf>),
        (With<ViewerCamera>, Without<ArSceneRoot>, Without<ArLightRig>),
    >,
    mut lights: Query<&mut DirectionalLight, Without<ContactShadowLight>>,
    mut models: Query<&mut VoyagerModel>,
) {
    if let Ok(mut root) = roots.single_mut() {
        root.set_if_neq(rig.root);
    }
    if let Ok(mut light_rig) = light_rigs.single_mut() {
        light_rig.set_if_neq(rig.light_rig);
    }

    if let Some(entity) = rig.camera.entity {
        if let Ok((mut transform, mut projection, child_of)) = cameras.get_mut(entity) {
            transform.set_if_neq(rig.camera.transform);

            if child_of.map(ChildOf::parent) != rig.camera.parent {
                match rig.camera.parent {
                    Some(parent) => {
                        commands.entity(entity).insert(ChildOf(parent));
                    }
                    None => {
                        commands.entity(entity).remove::<ChildOf>();
                    }
                }
            }

            if !rig.camera.auto_update {
                *projection = Projection::Perspective(perspective_from_gl(rig.camera.projection));
            } else if let Projection::Perspective(perspective) = &mut *projection {
                let lens = rig.camera.lens;
                let clip = rig.features.clip;
                if perspective.fov != lens.fov
                    || perspective.aspect_ratio != lens.aspect_ratio
                    || perspective.near != clip.near
                    || perspective.far != clip.far
                {
                    perspective.fov = lens.fov;
                    perspective.aspect_ratio = lens.aspect_ratio;
                    perspective.near = clip.near;
                    perspective.far = clip.far;
                }
            }
        }
    }

    for slot in &rig.features.lights {
        if let Ok(mut light) = lights.get_mut(slot.entity) {
            if light.shadows_enabled != slot.shadows_enabled {
                light.shadows_enabled = slot.shadows_enabled;
            }
        }
    }

    for slot in &rig.models {
        let Some(entity) = slot.entity else {
            continue;
        };
        if let Ok(mut model) = models.get_mut(entity) {
            if model.quality != slot.quality {
                model.quality = slot.quality;
            }
        }
    }

    setup.set_if_neq(rig.features.setup.clone());
}

pub fn apply_scene_commands(
    mut commands: Commands,
    mut rig: ResMut<SceneRig>,
    roots: Query<Entity, With<ArSceneRoot>>,
    interaction: Query<Entity, With<ArInteraction>>,
    mut shadow_lights: Query<
        (
            Entity,
            &mut Transform,
            &mut DirectionalLight,
            &mut CascadeShadowConfig,
        ),
        (With<ContactShadowLight>, Without<ContactShadowPlane>),
    >,
    mut shadow_planes: Query<
        (Entity, &mut Transform, &mut Visibility),
        (With<ContactShadowPlane>, Without<ContactShadowLight>),
    >,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut shadow_map: Option<ResMut<DirectionalLightShadowMap>>,
    mut map_override: Local<ShadowMapOverride>,
    mut redraw: EventWriter<RequestRedraw>,
) {
    if rig.commands.is_empty() {
        return;
    }
    let root = rig.root;

    for command in std::mem::take(&mut rig.commands) {
        match command {
            SceneCommand::SpawnInteraction(geometry) => {
                let Ok(root_entity) = roots.single() else {
                    warn!("No scene root; interaction geometry not spawned");
                    continue;
                };
                spawn_interaction(&mut commands, &mut meshes, &mut materials, root_entity, &geometry);
            }
            SceneCommand::DespawnInteraction => {
                for entity in &interaction {
                    commands.entity(entity).despawn();
                }
            }
            SceneCommand::SpawnShadow(shadow) => {
                let (light, plane) = shadow_transforms(&root, &shadow);
                commands.spawn((
                    ContactShadowLight,
                    DirectionalLight {
                        shadows_enabled: shadow.is_visible(),
                        illuminance: SHADOW_LIGHT_ILLUMINANCE,
                        ..default()
                    },
                    shadow_cascades(&shadow),
                    light,
                ));
                // Lit so it receives the shadow map. Multiply only darkens what is behind.
                commands.spawn((
                    ContactShadowPlane,
                    Mesh3d(meshes.add(Plane3d::default().mesh().size(1.0, 1.0))),
                    MeshMaterial3d(materials.add(StandardMaterial {
                        base_color: Color::srgba(1.0, 1.0, 1.0, shadow.intensity()),
                        alpha_mode: AlphaMode::Multiply,
                        perceptual_roughness: 1.0,
                        reflectance: 0.0,
                        ..default()
                    })),
                    NotShadowCaster,
                    plane,
                    shadow_visibility(&shadow),
                ));
                if let Some(map) = shadow_map.as_mut() {
                    map_override.apply(map, shadow.resolution() as usize);
                }
            }
            SceneCommand::UpdateShadow(shadow) => {
                let (light, plane) = shadow_transforms(&root, &shadow);
                for (_, mut transform, mut directional, mut cascades) in &mut shadow_lights {
                    *transform = light;
                    directional.shadows_enabled = shadow.is_visible();
                    *cascades = shadow_cascades(&shadow);
                }
                for (_, mut transform, mut visibility) in &mut shadow_planes {
                    *transform = plane;
                    visibility.set_if_neq(shadow_visibility(&shadow));
                }
                if let Some(map) = shadow_map.as_mut() {
                    map_override.apply(map, shadow.resolution() as usize);
                }
            }
            SceneCommand::DespawnShadow => {
                for (entity, ..) in &shadow_lights {
                    commands.entity(entity).despawn();
                }
                for (entity, _, _) in &shadow_planes {
                    commands.entity(entity).despawn();
                }
                if let Some(map) = shadow_map.as_mut() {
                    map_override.restore(map);
                }
            }
            SceneCommand::ForceRender => {
                redraw.write(RequestRedraw);
            }
        }
    }
}

fn shadow_visibility(shadow: &ContactShadow) -> Visibility {
    if shadow.is_visible() {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    }
}

fn spawn_interaction(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    root: Entity,
    geometry: &InteractionGeometry,
) {
    let plane_mesh = meshes.add(Cuboid::from_size(geometry.plane_size));
    // Annulus lies in XY; lay it into XZ facing up.
    let ring_mesh = meshes.add(
        Mesh::from(Annulus::new(geometry.ring_inner_radius, geometry.ring_outer_radius))
            .rotated_by(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2)),
    );
    let plane_material = materials.add(StandardMaterial::default());
    let ring_material = materials.add(StandardMaterial {
        base_color: Color::srgba(1.0, 1.0, 1.0, 0.8),
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        ..default()
    });

    commands.entity(root).with_children(|parent| {
        parent.spawn((
            ArInteraction,
            Mesh3d(plane_mesh),
            MeshMaterial3d(plane_material),
            geometry.plane,
            Visibility::Hidden,
        ));
        parent.spawn((
            ArInteraction,
            Mesh3d(ring_mesh),
            MeshMaterial3d(ring_material),
            geometry.ring,
        ));
    });
}

pub fn publish_ar_status(manager: Res<ArSessionManager>, mut status: ResMut<ArStatus>) {
    status.set_if_neq(manager.report());
}

pub fn spawn_scale_readout(mut commands: Commands) {
    commands.spawn((
        ScaleReadoutText,
        Text::new(""),
        TextFont {
            font_size: READOUT_FONT_SIZE,
            ..default()
        },
        TextColor(Color::WHITE),
        Node {
            position_type: PositionType::Absolute,
            ..default()
        },
        Visibility::Hidden,
    ));
}

pub fn update_scale_readout(
    manager: Res<ArSessionManager>,
    mut query: Query<(&mut Text, &mut TextColor, &mut Node, &mut Visibility), With<ScaleReadoutText>>,
) {
    let readout = manager.gestures().readout();
    for (mut text, mut color, mut node, mut visibility) in &mut query {
        if !readout.visible {
            visibility.set_if_neq(Visibility::Hidden);
            continue;
        }
        visibility.set_if_neq(Visibility::Visible);
        if text.0 != readout.text {
            text.0 = readout.text.clone();
        }
        color.0 = Color::srgba(1.0, 1.0, 1.0, readout.opacity);
        node.left = Val::Px(readout.screen_position.x);
        node.top = Val::Px(readout.screen_position.y - READOUT_SCREEN_OFFSET);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::bounds::SceneBounds;

    #[test]
    fn test_perspective_recovered_from_gl_matrix() {
        let perspective = perspective_from_gl(Mat4::perspective_rh_gl(1.0, 1.5, 0.1, 100.0));
        assert!((perspective.fov - 1.0).abs() < 1e-4);
        assert!((perspective.aspect_ratio - 1.5).abs() < 1e-4);
        assert!((perspective.near - 0.1).abs() < 1e-4);
        assert!((perspective.far - 100.0).abs() < 1e-1);
    }

    #[test]
    fn test_shadow_follows_root_and_faces_down() {
        let shadow = ContactShadow::new(
            SceneBounds::new(Vec3::new(-0.5, 0.0, -0.5), Vec3::new(0.5, 1.0, 0.5)),
            0.5,
            0.5,
        );
        let root = Transform::from_xyz(2.0, 0.0, -3.0);
        let (light, plane) = shadow_transforms(&root, &shadow);

        assert!((light.forward().as_vec3() - Vec3::NEG_Y).length() < 1e-5);
        assert!(light.translation.y > 1.0);
        assert!((plane.translation.xz() - Vec2::new(2.0, -3.0)).length() < 1e-5);
        assert!(plane.scale.x > 1.0);
    }

    #[test]
    fn test_shadow_cascade_fits_object_and_follows_scale() {
        let mut shadow = ContactShadow::new(
            SceneBounds::new(Vec3::new(-0.25, 0.0, -0.25), Vec3::new(0.25, 0.5, 0.25)),
            0.5,
            0.5,
        );
        let config = shadow_cascades(&shadow);
        assert_eq!(config.bounds.len(), 1);
        assert!(config.bounds[0] < 10.0);
        assert_eq!(config.minimum_distance, shadow.camera().near);

        shadow.set_scale_and_offset(3.0, 0.0);
        let scaled = shadow_cascades(&shadow);
        assert!(scaled.bounds[0] > config.bounds[0]);
    }

    #[test]
    fn test_shadow_map_size_comes_back_after_ar() {
        let mut map = DirectionalLightShadowMap { size: 2048 };
        let mut map_override = ShadowMapOverride::default();

        map_override.apply(&mut map, 256);
        assert_eq!(map.size, 256);
        map_override.apply(&mut map, 64);
        assert_eq!(map.size, 64);

        map_override.restore(&mut map);
        assert_eq!(map.size, 2048);
        // A second despawn leaves the scene's size alone.
        map.size = 1024;
        map_override.restore(&mut map);
        assert_eq!(map.size, 1024);
    }

    fn perspective(app: &App, camera: Entity) -> PerspectiveProjection {
        match app.world().get::<Projection>(camera) {
            Some(Projection::Perspective(perspective)) => perspective.clone(),
            other => panic!("unexpected projection {other:?}"),
        }
    }

    #[test]
    fn test_viewer_fov_returns_after_ar() {
        let mut app = App::new();
        app.init_resource::<SetupFeatures>()
            .add_systems(Update, apply_scene_rig);
        let camera = app
            .world_mut()
            .spawn((
                ViewerCamera,
                Transform::default(),
                Projection::Perspective(PerspectiveProjection::default()),
            ))
            .id();
        let default_fov = PerspectiveProjection::default().fov;

        let mut rig = SceneRig::default();
        rig.camera.entity = Some(camera);
        rig.camera.auto_update = false;
        rig.camera.projection = Mat4::perspective_rh_gl(1.2, 0.5, 0.01, 1000.0);
        app.insert_resource(rig.clone());
        app.update();
        assert!((perspective(&app, camera).fov - 1.2).abs() < 1e-4);

        // Session over: the lens saved at entry is back in the rig.
        rig.camera.auto_update = true;
        app.insert_resource(rig);
        app.update();
        let restored = perspective(&app, camera);
        assert_eq!(restored.fov, default_fov);
        assert_eq!(restored.aspect_ratio, CameraLens::default().aspect_ratio);
    }
}
