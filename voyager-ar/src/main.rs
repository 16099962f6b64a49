use ar_constants::path::RELATIVE_MANIFEST_PATH;
use ar_constants::render_settings::{DEFAULT_FAR_CLIP, DEFAULT_NEAR_CLIP};
use bevy::asset::AssetMetaCheck;
use bevy::prelude::*;
use bevy::window::PresentMode;
use bevy_common_assets::json::JsonAssetPlugin;
use voyager_ar::ar::ArPlugin;
use voyager_ar::ar::session::{ArSessionManager, ArStatus};
use voyager_ar::ar::systems::ArContentReloaded;
use voyager_ar::platform::XrPlatformResource;
use voyager_ar::rpc::web_rpc::WebRpcPlugin;
use voyager_ar::scene::bounds::SceneBounds;
use voyager_ar::scene::model::{ModelManifest, VoyagerModel, sync_model_derivatives};
use voyager_ar::scene::orbit::{ViewerOrbit, orbit_camera_controller};
use voyager_ar::scene::{ArLightRig, ArSceneRoot, ViewerCamera};

#[derive(Resource, Default)]
struct ManifestLoader {
    handle: Option<Handle<ModelManifest>>,
}

fn main() {
    let mut app = create_app();

    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(async move {
            app.run();
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        app.run();
    }
}

fn create_app() -> App {
    let mut app = App::new();

    app.add_plugins(create_default_plugins())
        .add_plugins(JsonAssetPlugin::<ModelManifest>::new(&["manifest.json"]));

    insert_platform(&mut app);

    app.add_plugins(ArPlugin)
        .add_plugins(WebRpcPlugin)
        .init_resource::<ManifestLoader>()
        .add_systems(Startup, (setup, start_loading))
        .add_systems(
            Update,
            (
                load_manifest_system,
                sync_model_derivatives,
                orbit_camera_controller,
                status_text_update_system,
            ),
        );

    app
}

/// Wire the AR subsystem to the WebXR shim of the host page.
#[cfg(target_arch = "wasm32")]
fn insert_platform(app: &mut App) {
    use voyager_ar::ar::launch::detect_capabilities;
    use voyager_ar::platform::bridge::HostBridge;
    use wasm_bindgen::JsValue;

    let window = web_sys::window();
    let navigator = window.as_ref().map(|w| w.navigator());
    let user_agent = navigator
        .as_ref()
        .and_then(|n| n.user_agent().ok())
        .unwrap_or_default();
    let webxr_supported = navigator
        .as_ref()
        .and_then(|n| js_sys::Reflect::has(n.as_ref(), &JsValue::from_str("xr")).ok())
        .unwrap_or(false);

    let bridge = HostBridge::default();
    let capabilities = detect_capabilities(&user_agent, webxr_supported);
    bridge.set_capabilities(capabilities);
    info!("AR capabilities: {:?}", capabilities);

    let mut manager = ArSessionManager::new(capabilities);
    let base = window
        .and_then(|w| w.location().href().ok())
        .and_then(|href| url::Url::parse(&href).ok());
    if let Some(base) = base {
        manager = manager.with_asset_base(base);
    }

    app.insert_resource(XrPlatformResource::new(bridge.platform()))
        .insert_resource(manager)
        .insert_resource(bridge);
}

/// Native builds have no XR runtime; AR reports as unavailable.
#[cfg(not(target_arch = "wasm32"))]
fn insert_platform(app: &mut App) {
    use voyager_ar::platform::ArCapabilities;
    use voyager_ar::platform::scripted::ScriptedPlatform;

    let capabilities = ArCapabilities::none();
    app.insert_resource(XrPlatformResource::new(ScriptedPlatform::new(capabilities)))
        .insert_resource(ArSessionManager::new(capabilities));
}

fn start_loading(mut manifest_loader: ResMut<ManifestLoader>, asset_server: Res<AssetServer>) {
    info!("Loading scene manifest from: {}", RELATIVE_MANIFEST_PATH);
    manifest_loader.handle = Some(asset_server.load(RELATIVE_MANIFEST_PATH));
}

/// Populate the scene from the manifest, and again whenever it changes on disk.
fn load_manifest_system(
    mut events: EventReader<AssetEvent<ModelManifest>>,
    manifest_loader: Res<ManifestLoader>,
    manifests: Res<Assets<ModelManifest>>,
    mut manager: ResMut<ArSessionManager>,
    mut reloads: EventWriter<ArContentReloaded>,
    mut commands: Commands,
    roots: Query<Entity, With<ArSceneRoot>>,
    models: Query<Entity, With<VoyagerModel>>,
    mut orbits: Query<&mut ViewerOrbit>,
) {
    let Some(ref handle) = manifest_loader.handle else {
        return;
    };

    for event in events.read() {
        let (id, reloaded) = match event {
            AssetEvent::LoadedWithDependencies { id } => (*id, false),
            AssetEvent::Modified { id } => (*id, true),
            _ => continue,
        };
        if id != handle.id() {
            continue;
        }
        let Some(manifest) = manifests.get(id) else {
            continue;
        };
        let Ok(root) = roots.single() else {
            warn!("Scene root missing, manifest ignored");
            continue;
        };

        info!(
            "Manifest '{}' loaded with {} model(s)",
            manifest.title,
            manifest.models.len()
        );

        if reloaded {
            reloads.write(ArContentReloaded);
        }

        for entity in &models {
            commands.entity(entity).despawn();
        }
        for model in &manifest.models {
            commands.spawn((model.clone(), Transform::default(), ChildOf(root)));
        }

        let mut bounds = SceneBounds::new(manifest.bounds.min, manifest.bounds.max);
        if bounds.is_empty() {
            warn!("Manifest '{}' has empty bounds; using defaults", manifest.title);
            bounds = SceneBounds::default();
        }
        commands.insert_resource(bounds);
        manager.set_title(manifest.title.clone());
        for mut orbit in &mut orbits {
            *orbit = ViewerOrbit::with_bounds(&bounds);
        }
    }
}

fn create_default_plugins() -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(create_window_config()),
        ..default()
    };

    let asset_config = AssetPlugin {
        meta_check: AssetMetaCheck::Never,
        ..default()
    };

    DefaultPlugins.set(window_config).set(asset_config)
}

fn create_window_config() -> Window {
    #[cfg(target_arch = "wasm32")]
    {
        Window {
            canvas: Some("#bevy".into()),
            fit_canvas_to_parent: true,
            prevent_default_event_handling: false,
            present_mode: PresentMode::AutoVsync,
            ..default()
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        Window {
            present_mode: PresentMode::AutoVsync,
            ..default()
        }
    }
}

#[derive(Component)]
struct StatusText;

fn setup(mut commands: Commands) {
    spawn_camera(&mut commands);
    spawn_scene_root(&mut commands);
    spawn_ui(&mut commands);
}

fn spawn_camera(commands: &mut Commands) {
    let orbit = ViewerOrbit::default();
    commands
        .spawn((orbit, orbit.pivot_transform(), Visibility::default()))
        .with_children(|parent| {
            parent.spawn((
                ViewerCamera,
                Camera3d::default(),
                Projection::Perspective(PerspectiveProjection {
                    near: DEFAULT_NEAR_CLIP,
                    far: DEFAULT_FAR_CLIP,
                    ..default()
                }),
                orbit.camera_offset(),
            ));
        });
}

fn spawn_scene_root(commands: &mut Commands) {
    commands
        .spawn((ArSceneRoot, Transform::default(), Visibility::default()))
        .with_children(|parent| {
            parent
                .spawn((ArLightRig, Transform::default(), Visibility::default()))
                .with_children(|rig| {
                    rig.spawn((
                        DirectionalLight {
                            shadows_enabled: false,
                            ..default()
                        },
                        Transform::from_rotation(Quat::from_euler(
                            EulerRot::ZYX,
                            0.0,
                            1.0,
                            -std::f32::consts::FRAC_PI_4,
                        )),
                    ));
                });
        });
}

fn spawn_ui(commands: &mut Commands) {
    commands
        .spawn(Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                Text::new("AR: "),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(Color::srgb(1., 1., 1.)),
                Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(12.0),
                    right: Val::Px(12.0),
                    ..default()
                },
                StatusText,
            ));
        });
}

fn status_text_update_system(status: Res<ArStatus>, mut query: Query<&mut Text, With<StatusText>>) {
    if !status.is_changed() {
        return;
    }
    let label = match (status.available, status.is_presenting, status.is_placed) {
        (false, _, _) => "unavailable",
        (true, false, _) if status.enabled => "starting",
        (true, false, _) => "ready",
        (true, true, false) => "finding surface",
        (true, true, true) => "placed",
    };
    for mut text in &mut query {
        text.0 = format!("AR: {label}");
    }
}
