//! AR session state machine.
//!
//! ```text
//!   Idle ──enable──> Requesting ──granted──> Presenting ──first hit──> Presenting + placed
//!    ^                   │                        │                          │
//!    └──── rejected ─────┘                        └──── end / reload / exit ─┘
//! ```
//!
//! The manager never blocks. Platform requests return immediately and their
//! completions come back through [`ArSessionManager::handle_event`], tagged
//! with the session that issued them. Completions for any other session are
//! stale and dropped.
//!
//! All scene access goes through [`SceneRig`], so the whole flow can be driven
//! from tests with a [`ScriptedPlatform`](crate::platform::scripted::ScriptedPlatform).

use super::contact_shadow::ContactShadow;
use super::error::ArError;
use super::features::SceneFeatureToggler;
use super::gestures::{
    GestureController, GestureInput, GestureTarget, PlacementAnchor, apply_scale, apply_yaw,
};
use super::hit_test::{HitTestCoordinator, Placement};
use super::launch;
use super::ray::world_to_screen;
use super::rig::{CameraLens, InteractionGeometry, SceneCommand, SceneRig};
use crate::platform::{
    ArCapabilities, LaunchTarget, ListenerHandle, ListenerKind, ReferenceSpaceHandle,
    ReferenceSpaceKind, SessionId, SessionInit, XrEvent, XrPlatform,
};
use crate::scene::model::DerivativeQuality;
use ar_constants::placement::{PREVIEW_DISTANCE_RADIUS_FACTOR, PREVIEW_MIN_DISTANCE};
use ar_constants::shadow::{DEFAULT_SHADOW_INTENSITY, DEFAULT_SHADOW_SOFTNESS};
use bevy::prelude::*;
use serde::Serialize;
use url::Url;

/// DOM element the WebXR shim uses as overlay root.
pub const DOM_OVERLAY_ROOT: &str = "voyager-ar-overlay";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Requesting,
    Presenting,
}

/// Externally visible placement flags plus the two external inputs.
///
/// `is_placed` implies `is_presenting`; both drop to false on session end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlacementState {
    pub is_placed: bool,
    pub is_presenting: bool,
    pub wall_mount: bool,
    pub scale: f32,
}

impl Default for PlacementState {
    fn default() -> Self {
        Self {
            is_placed: false,
            is_presenting: false,
            wall_mount: false,
            scale: 1.0,
        }
    }
}

/// Status snapshot published to the frontend.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ArStatus {
    pub available: bool,
    pub enabled: bool,
    pub is_presenting: bool,
    pub is_placed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Unavailable,
    SessionBlocked,
    Error,
}

/// User-facing warning raised by a failed AR attempt.
#[derive(Event, Debug, Clone, PartialEq, Serialize)]
pub struct ArNotice {
    pub kind: NoticeKind,
    pub message: String,
}

impl ArNotice {
    /// Notice to show for an error, if any. Stale continuations stay in the log.
    pub fn from_error(error: &ArError) -> Option<Self> {
        let kind = match error {
            ArError::CapabilityAbsent | ArError::NoArDerivative | ArError::MissingCamera => {
                NoticeKind::Unavailable
            }
            ArError::SessionRejected { .. } => NoticeKind::SessionBlocked,
            ArError::Bridge(_) => NoticeKind::Error,
            ArError::StaleContinuation { .. } => return None,
        };
        Some(Self {
            kind,
            message: error.to_string(),
        })
    }
}

/// Per-frame inputs from the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInput {
    pub delta_secs: f32,
    pub snap_rotation: bool,
}

/// Camera state saved when AR takes the camera over.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DetachedCamera {
    original_parent: Option<Entity>,
    transform: Transform,
    projection: Mat4,
    lens: CameraLens,
}

/// Everything that must be put back when the session ends.
#[derive(Debug, Default)]
struct Suspended {
    qualities: Option<Vec<DerivativeQuality>>,
    camera: Option<DetachedCamera>,
    scene: Option<(Transform, Transform)>,
}

#[derive(Resource)]
pub struct ArSessionManager {
    capabilities: ArCapabilities,
    asset_base: Option<Url>,
    title: String,
    status: SessionStatus,
    enabled: bool,
    placement: PlacementState,
    next_session: u32,
    session: Option<SessionId>,
    viewer_space: Option<ReferenceSpaceHandle>,
    pose_seen: bool,
    listeners: Vec<ListenerHandle>,
    features: SceneFeatureToggler,
    suspended: Suspended,
    hit_test: HitTestCoordinator,
    gestures: GestureController,
    anchor: Option<PlacementAnchor>,
    interaction: Option<InteractionGeometry>,
    shadow: Option<ContactShadow>,
    shadow_softness: f32,
    shadow_intensity: f32,
    /// Scratch buffer for drained platform events.
    events: Vec<XrEvent>,
}

impl ArSessionManager {
    pub fn new(capabilities: ArCapabilities) -> Self {
        Self {
            capabilities,
            asset_base: None,
            title: String::new(),
            status: SessionStatus::Idle,
            enabled: false,
            placement: PlacementState::default(),
            next_session: 0,
            session: None,
            viewer_space: None,
            pose_seen: false,
            listeners: Vec::new(),
            features: SceneFeatureToggler::new(),
            suspended: Suspended::default(),
            hit_test: HitTestCoordinator::default(),
            gestures: GestureController::default(),
            anchor: None,
            interaction: None,
            shadow: None,
            shadow_softness: DEFAULT_SHADOW_SOFTNESS,
            shadow_intensity: DEFAULT_SHADOW_INTENSITY,
            events: Vec::new(),
        }
    }

    /// Page URL relative derivative URIs are resolved against.
    pub fn with_asset_base(mut self, base: Url) -> Self {
        self.asset_base = Some(base);
        self
    }

    /// Title shown by Scene Viewer.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn capabilities(&self) -> ArCapabilities {
        self.capabilities
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn placement(&self) -> &PlacementState {
        &self.placement
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn hit_test(&self) -> &HitTestCoordinator {
        &self.hit_test
    }

    pub fn gestures(&self) -> &GestureController {
        &self.gestures
    }

    pub fn shadow(&self) -> Option<&ContactShadow> {
        self.shadow.as_ref()
    }

    pub fn interaction(&self) -> Option<&InteractionGeometry> {
        self.interaction.as_ref()
    }

    pub fn features_suspended(&self) -> bool {
        self.features.is_suspended()
    }

    pub fn report(&self) -> ArStatus {
        ArStatus {
            available: self.capabilities.available(),
            enabled: self.enabled,
            is_presenting: self.placement.is_presenting,
            is_placed: self.placement.is_placed,
        }
    }

    /// Takes effect at the next placement.
    pub fn set_wall_mount(&mut self, wall_mount: bool) {
        self.placement.wall_mount = wall_mount;
    }

    /// Scale set from outside. Applied at once when the scene is placed.
    pub fn set_scale(&mut self, rig: &mut SceneRig, scale: f32) {
        if !(scale.is_finite() && scale > 0.0) {
            warn!("Ignoring invalid AR scale {}", scale);
            return;
        }
        self.placement.scale = scale;
        if let Some(anchor) = self.anchor.as_ref() {
            apply_scale(rig, self.shadow.as_mut(), anchor, scale);
        }
    }

    pub fn set_shadow_params(&mut self, softness: f32, intensity: f32) {
        self.shadow_softness = softness.clamp(0.0, 1.0);
        self.shadow_intensity = intensity.clamp(0.0, 1.0);
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.set_softness(self.shadow_softness);
            shadow.set_intensity(self.shadow_intensity);
        }
    }

    /// Turn AR on or off.
    ///
    /// Enabling while a session is already starting or running is ignored.
    /// Disabling ends any session.
    pub fn set_enabled(
        &mut self,
        platform: &mut dyn XrPlatform,
        rig: &mut SceneRig,
        requested: bool,
    ) -> Result<(), ArError> {
        if !requested {
            self.end_session(platform, rig);
            return Ok(());
        }
        if self.status != SessionStatus::Idle {
            debug!("AR already {:?}; enable ignored", self.status);
            return Ok(());
        }

        let capabilities = platform.capabilities();
        self.capabilities = capabilities;

        if capabilities.webxr {
            self.enter_webxr(platform, rig)
        } else if capabilities.android_intent {
            let uri = rig
                .models
                .iter()
                .find_map(|m| m.android_uri.as_deref())
                .ok_or(ArError::NoArDerivative)?;
            let intent = launch::scene_viewer_intent(self.asset_base.as_ref(), uri, &self.title)?;
            info!("Launching Scene Viewer for {}", uri);
            platform.launch(&LaunchTarget::AndroidIntent(intent));
            Ok(())
        } else if capabilities.ios_quick_look {
            let uri = rig
                .models
                .iter()
                .find_map(|m| m.ios_uri.as_deref())
                .ok_or(ArError::NoArDerivative)?;
            let url = launch::quick_look_url(self.asset_base.as_ref(), uri)?;
            info!("Launching AR Quick Look for {}", uri);
            platform.launch(&LaunchTarget::QuickLook(url));
            Ok(())
        } else {
            Err(ArError::CapabilityAbsent)
        }
    }

    fn enter_webxr(
        &mut self,
        platform: &mut dyn XrPlatform,
        rig: &mut SceneRig,
    ) -> Result<(), ArError> {
        if rig.camera.entity.is_none() {
            return Err(ArError::MissingCamera);
        }
        if !rig.models.iter().any(|m| m.ar_uri.is_some()) {
            return Err(ArError::NoArDerivative);
        }

        // Snapshot before anything else is touched.
        if !self.features.suspend(&mut rig.features) {
            return Ok(());
        }

        self.suspended.qualities = Some(rig.models.iter().map(|m| m.quality).collect());
        for model in rig.models.iter_mut().filter(|m| m.ar_uri.is_some()) {
            model.quality = DerivativeQuality::Ar;
        }

        self.suspended.scene = Some((rig.root, rig.light_rig));
        self.suspended.camera = Some(DetachedCamera {
            original_parent: rig.camera.parent,
            transform: rig.camera.transform,
            projection: rig.camera.projection,
            lens: rig.camera.lens,
        });
        rig.camera.parent = None;

        self.next_session += 1;
        let session = SessionId(self.next_session);
        self.session = Some(session);
        self.status = SessionStatus::Requesting;
        self.enabled = true;

        platform.set_animation_loop(Some(session));
        platform.request_session(session, &SessionInit::immersive_ar(Some(DOM_OVERLAY_ROOT.to_string())));
        info!("Requested immersive-ar session {:?}", session);
        Ok(())
    }

    /// Drain platform events and advance one frame.
    ///
    /// Returns every error raised on the way; none of them is fatal.
    pub fn update(
        &mut self,
        platform: &mut dyn XrPlatform,
        rig: &mut SceneRig,
        input: FrameInput,
    ) -> Vec<ArError> {
        let mut events = std::mem::take(&mut self.events);
        events.clear();
        platform.drain_events(&mut events);

        let mut errors = Vec::new();
        for event in events.drain(..) {
            if let Err(error) = self.handle_event(platform, rig, event) {
                errors.push(error);
            }
        }
        self.events = events;

        self.on_frame(platform, rig, input);
        errors
    }

    /// Apply one platform completion or notification.
    pub fn handle_event(
        &mut self,
        platform: &mut dyn XrPlatform,
        rig: &mut SceneRig,
        event: XrEvent,
    ) -> Result<(), ArError> {
        let session = event.session();
        if self.session != Some(session) {
            return Err(self.drop_stale(platform, event));
        }

        match event {
            XrEvent::SessionGranted { .. } => {
                if self.status != SessionStatus::Requesting {
                    warn!("Session {:?} granted twice; ignored", session);
                    return Ok(());
                }
                self.status = SessionStatus::Presenting;
                self.placement.is_presenting = true;
                self.placement.is_placed = false;
                platform.make_xr_compatible(session);
                info!("AR session {:?} started", session);
            }
            XrEvent::SessionRejected { reason, .. } => {
                warn!("AR session {:?} rejected: {}", session, reason);
                self.revert_enable(platform, rig);
                return Err(ArError::SessionRejected { reason });
            }
            XrEvent::XrCompatible { .. } => {
                platform.attach_base_layer(session);
                platform.set_shadow_auto_update(false);
                platform.set_xr_rendering(Some(ReferenceSpaceKind::Local));
                rig.camera.auto_update = false;
                platform.request_reference_space(session, ReferenceSpaceKind::Viewer);
                for kind in [
                    ListenerKind::SessionEnd,
                    ListenerKind::SelectStart,
                    ListenerKind::SelectEnd,
                ] {
                    self.listeners.push(platform.add_listener(session, kind));
                }
            }
            XrEvent::ReferenceSpaceReady { kind, space, .. } => {
                if kind == ReferenceSpaceKind::Viewer && self.viewer_space.is_none() {
                    self.viewer_space = Some(space);
                    self.hit_test
                        .start_initial(platform, session, space, self.placement.wall_mount);
                }
            }
            XrEvent::HitTestSourceReady { kind, source, .. } => {
                self.hit_test.on_source_ready(platform, kind, source);
            }
            XrEvent::SelectStart { .. } => {
                if self.placement.is_placed {
                    self.gestures.select_start();
                }
            }
            XrEvent::SelectEnd { .. } => self.gestures.select_end(),
            XrEvent::SessionEnded { .. } => {
                info!("AR session {:?} ended by the platform", session);
                self.cleanup(platform, rig, false);
            }
        }
        Ok(())
    }

    fn drop_stale(&mut self, platform: &mut dyn XrPlatform, event: XrEvent) -> ArError {
        let got = event.session();
        warn!("Dropping stale {:?} (current session: {:?})", event, self.session);
        match event {
            // Nobody owns these any more; release them so they cannot come back.
            XrEvent::HitTestSourceReady { source, .. } => platform.cancel_hit_test_source(source),
            XrEvent::SessionGranted { session } => platform.end_session(session),
            _ => {}
        }
        ArError::StaleContinuation {
            expected: self.session,
            got,
        }
    }

    /// Per-frame work while presenting.
    pub fn on_frame(&mut self, platform: &mut dyn XrPlatform, rig: &mut SceneRig, input: FrameInput) {
        self.gestures.readout_mut().tick(input.delta_secs);

        let Some(session) = self.session else {
            return;
        };
        if self.status != SessionStatus::Presenting {
            return;
        }
        let Some(frame) = platform.frame() else {
            return;
        };
        let Some(pose) = frame.pose else {
            return;
        };

        // 1. Camera
        if !self.pose_seen {
            self.pose_seen = true;
            debug!("First XR pose received; projection taken from the platform view");
        }
        rig.camera.transform = Transform::from_matrix(pose.world);
        rig.camera.projection = pose.projection;

        // 2. Hit testing
        if self.hit_test.awaiting_placement() {
            self.preview_in_front(rig);
            if let Some(placement) =
                self.hit_test
                    .poll_initial(platform, session, &frame, self.placement.wall_mount)
            {
                self.place(rig, placement);
            }
        } else if self.hit_test.transient_source().is_some() {
            // 3. Gestures
            let results = self.hit_test.poll_transient(&frame).unwrap_or(&[]);
            if let Some(anchor) = self.anchor.as_mut() {
                self.gestures.update(
                    results,
                    GestureTarget {
                        rig: &mut *rig,
                        shadow: self.shadow.as_mut(),
                        interaction: self.interaction.as_ref(),
                        anchor,
                    },
                    GestureInput {
                        snap_rotation: input.snap_rotation,
                    },
                );
                self.placement.scale = rig.scale();
            }
        }

        if let Some(shadow) = self.shadow.as_mut().filter(|s| s.needs_update) {
            platform.refresh_shadow_map();
            rig.push(SceneCommand::UpdateShadow(shadow.clone()));
            shadow.needs_update = false;
        }

        let scale = rig.scale();
        let readout = self.gestures.readout_mut();
        if readout.visible && scale != 1.0 {
            if let Some(position) = world_to_screen(
                rig.camera.world_matrix(),
                rig.camera.projection,
                rig.root.translation,
                rig.viewport,
            ) {
                readout.screen_position = position;
            }
        }

        // 4. Depth-only clear before the frame is presented.
        platform.clear_depth();
    }

    /// Keep the scene floating in front of the camera, facing it, until a
    /// surface is found.
    fn preview_in_front(&mut self, rig: &mut SceneRig) {
        let camera = rig.camera.transform;
        let forward = camera.forward();
        let horizontal = Vec3::new(forward.x, 0.0, forward.z).normalize_or(Vec3::NEG_Z);

        let scale = self.placement.scale;
        let distance =
            (rig.bounds.radius() * scale * PREVIEW_DISTANCE_RADIUS_FACTOR).max(PREVIEW_MIN_DISTANCE);
        let target = camera.translation + horizontal * distance;
        // The object's front (+Z) points back at the viewer.
        let yaw = (-horizontal.x).atan2(-horizontal.z);

        rig.root.rotation = Quat::from_rotation_y(yaw);
        rig.root.scale = Vec3::splat(scale);
        rig.light_rig.rotation = Quat::from_rotation_y(-yaw);
        rig.root.translation = target - rig.root.rotation * (rig.bounds.center() * scale);
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.set_rotation(yaw);
        }
    }

    /// First placement on a detected surface.
    fn place(&mut self, rig: &mut SceneRig, placement: Placement) {
        let wall_mount = self.placement.wall_mount;
        let anchor = PlacementAnchor {
            point: placement.point,
            wall_mount,
        };
        let yaw = placement.wall_yaw.unwrap_or_else(|| rig.yaw());
        let scale = self.placement.scale;

        rig.root.scale = Vec3::splat(scale);
        apply_yaw(rig, None, &anchor, yaw);

        let interaction = InteractionGeometry::new(&rig.bounds, wall_mount);
        rig.push(SceneCommand::SpawnInteraction(interaction.clone()));
        self.interaction = Some(interaction);

        let mut shadow = ContactShadow::new(rig.bounds, self.shadow_softness, self.shadow_intensity);
        shadow.set_scale_and_offset(scale, 0.0);
        shadow.set_rotation(yaw);
        rig.push(SceneCommand::SpawnShadow(shadow.clone()));
        self.shadow = Some(shadow);

        self.anchor = Some(anchor);
        self.placement.is_placed = true;
        info!(
            "Scene placed at {:?} ({} mount, scale {})",
            placement.point,
            if wall_mount { "wall" } else { "floor" },
            scale
        );
    }

    /// Content was swapped underneath a live session.
    pub fn on_content_reloaded(&mut self, platform: &mut dyn XrPlatform, rig: &mut SceneRig) {
        if self.status != SessionStatus::Idle {
            info!("Scene content reloaded; ending AR session");
            self.end_session(platform, rig);
        }
    }

    /// Explicit exit. Safe to call at any time and any number of times.
    pub fn end_session(&mut self, platform: &mut dyn XrPlatform, rig: &mut SceneRig) {
        self.cleanup(platform, rig, true);
    }

    /// Undo what `enter_webxr` did after a rejected request.
    fn revert_enable(&mut self, platform: &mut dyn XrPlatform, rig: &mut SceneRig) {
        self.features.restore(&mut rig.features);
        platform.set_animation_loop(None);
        self.restore_models(rig);
        self.restore_camera(rig);
        self.restore_scene(rig);
        self.session = None;
        self.status = SessionStatus::Idle;
        self.enabled = false;
        self.placement.is_presenting = false;
        self.placement.is_placed = false;
    }

    fn cleanup(&mut self, platform: &mut dyn XrPlatform, rig: &mut SceneRig, explicit: bool) {
        let Some(session) = self.session else {
            return;
        };

        self.enabled = false;
        self.placement.is_placed = false;
        self.placement.is_presenting = false;

        self.features.restore(&mut rig.features);
        platform.set_animation_loop(None);
        self.hit_test.dispose(platform);
        for listener in self.listeners.drain(..) {
            platform.remove_listener(listener);
        }

        self.session = None;
        self.viewer_space = None;
        self.pose_seen = false;
        self.anchor = None;
        self.gestures.reset();
        self.gestures.readout_mut().hide();
        self.restore_camera(rig);

        platform.set_xr_rendering(None);
        platform.set_shadow_auto_update(true);

        self.restore_models(rig);
        self.restore_scene(rig);
        if self.interaction.take().is_some() {
            rig.push(SceneCommand::DespawnInteraction);
        }
        if self.shadow.take().is_some() {
            rig.push(SceneCommand::DespawnShadow);
        }

        if explicit {
            platform.end_session(session);
        }
        self.status = SessionStatus::Idle;

        platform.render_now();
        rig.push(SceneCommand::ForceRender);
        info!("AR session {:?} cleaned up", session);
    }

    fn restore_models(&mut self, rig: &mut SceneRig) {
        if let Some(qualities) = self.suspended.qualities.take() {
            for (model, quality) in rig.models.iter_mut().zip(qualities) {
                model.quality = quality;
            }
        }
    }

    fn restore_camera(&mut self, rig: &mut SceneRig) {
        if let Some(camera) = self.suspended.camera.take() {
            rig.camera.parent = camera.original_parent;
            rig.camera.transform = camera.transform;
            rig.camera.projection = camera.projection;
            rig.camera.lens = camera.lens;
        }
        rig.camera.auto_update = true;
    }

    fn restore_scene(&mut self, rig: &mut SceneRig) {
        if let Some((root, light_rig)) = self.suspended.scene.take() {
            rig.root = root;
            rig.light_rig = light_rig;
        }
    }
}
