//! WebXR augmented-reality placement and gestures.
//!
//! ## Components
//!
//! ```text
//! ArSessionManager ──┬── SceneFeatureToggler   snapshot / restore viewer features
//!                    ├── HitTestCoordinator    initial + transient hit-test sources
//!                    ├── GestureController     translate / rotate / scale
//!                    └── ContactShadow         fitted shadow under the object
//! ```
//!
//! The manager works on [`rig::SceneRig`], a plain-data view of the Bevy
//! world, and talks to the device through [`XrPlatform`](crate::platform::XrPlatform).
//! [`systems`] moves data between the ECS and the rig once per frame.
//!
//! ## Lifecycle
//!
//! 1. `ArSettings.enabled` flips to true (RPC or keyboard).
//! 2. Features are suspended, models switch to AR quality, the camera is
//!    detached and an `immersive-ar` session is requested.
//! 3. Once granted, the initial hit test runs while the scene floats in
//!    front of the camera.
//! 4. The first valid hit places the scene; transient hit testing drives
//!    gestures from then on.
//! 5. On exit everything is restored in reverse and one frame is forced.

pub mod contact_shadow;
pub mod error;
pub mod features;
pub mod gestures;
pub mod hit_test;
pub mod launch;
pub mod ray;
pub mod rig;
pub mod session;
pub mod systems;

use crate::platform::XrPlatformResource;
use crate::platform::scripted::ScriptedPlatform;
use crate::scene::bounds::SceneBounds;
use crate::scene::setup::SetupFeatures;
use bevy::prelude::*;
use rig::SceneRig;
use session::{ArNotice, ArSessionManager, ArStatus};
use systems::*;

/// Registers AR resources, events and the per-frame system chain.
///
/// Insert an [`XrPlatformResource`] (and optionally a configured
/// [`ArSessionManager`]) before adding the plugin; otherwise a platform
/// without AR capability is used.
pub struct ArPlugin;

impl Plugin for ArPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<XrPlatformResource>() {
            app.insert_resource(XrPlatformResource::new(ScriptedPlatform::default()));
        }
        if !app.world().contains_resource::<ArSessionManager>() {
            let capabilities = app.world().resource::<XrPlatformResource>().0.capabilities();
            app.insert_resource(ArSessionManager::new(capabilities));
        }

        app.init_resource::<SceneRig>()
            .init_resource::<ArSettings>()
            .init_resource::<ArStatus>()
            .init_resource::<SetupFeatures>()
            .init_resource::<SceneBounds>()
            .add_event::<ArContentReloaded>()
            .add_event::<ArNotice>()
            .add_systems(Startup, spawn_scale_readout)
            .add_systems(
                Update,
                (
                    ar_keyboard_shortcuts,
                    extract_scene_rig,
                    drive_ar_session,
                    apply_scene_rig,
                    apply_scene_commands,
                    publish_ar_status,
                    update_scale_readout,
                )
                    .chain(),
            );
    }
}
