//! End-to-end AR flows driven through the scripted platform.

use bevy::prelude::*;
use std::collections::HashMap;
use voyager_ar::ar::error::ArError;
use voyager_ar::ar::gestures::GestureMode;
use voyager_ar::ar::rig::{CameraLens, ModelSlot, SceneCommand, SceneRig};
use voyager_ar::ar::session::{ArSessionManager, FrameInput, SessionStatus};
use voyager_ar::platform::scripted::{PlatformCall, ScriptedPlatform};
use voyager_ar::platform::{
    HitTestSourceHandle, HitTestSourceKind, HitTestSourceRequest, ReferenceSpaceHandle,
    ReferenceSpaceKind, SessionId, TransientInputResult, ViewerPose, XrEvent, XrFrame,
    XrHitResult, XrPlatform,
};
use voyager_ar::scene::model::DerivativeQuality;

const INITIAL_SOURCE: HitTestSourceHandle = HitTestSourceHandle(10);
const TRANSIENT_SOURCE: HitTestSourceHandle = HitTestSourceHandle(11);

fn scene() -> SceneRig {
    let mut rig = SceneRig::default();
    rig.camera.entity = Some(Entity::from_raw(1));
    rig.camera.parent = Some(Entity::from_raw(2));
    rig.features.setup.grid_visible = true;
    rig.models.push(ModelSlot {
        entity: Some(Entity::from_raw(5)),
        quality: DerivativeQuality::High,
        ar_uri: Some("models/amphora-ar.glb".to_string()),
        ..Default::default()
    });
    rig
}

fn pose() -> ViewerPose {
    ViewerPose {
        world: Mat4::from_translation(Vec3::new(0.0, 1.5, 0.0)),
        projection: Mat4::perspective_rh_gl(1.0, 0.5, 0.01, 1000.0),
    }
}

fn hit(position: Vec3, normal: Vec3) -> XrHitResult {
    XrHitResult {
        position,
        orientation: Quat::from_rotation_arc(Vec3::Y, normal.normalize()),
    }
}

fn touch(input_id: u32, x: f32, y: f32) -> TransientInputResult {
    TransientInputResult {
        input_id,
        axes: Vec2::new(x, y),
        hits: Vec::new(),
    }
}

fn touches_frame(touches: Vec<TransientInputResult>) -> XrFrame {
    let mut frame = XrFrame::with_pose(pose());
    frame.transient_results = HashMap::from([(TRANSIENT_SOURCE, touches)]);
    frame
}

fn tick(manager: &mut ArSessionManager, platform: &mut ScriptedPlatform, rig: &mut SceneRig) {
    let errors = manager.update(
        platform,
        rig,
        FrameInput {
            delta_secs: 1.0 / 60.0,
            snap_rotation: false,
        },
    );
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

/// Enable AR and feed the platform completions up to a live initial source.
fn start(platform: &mut ScriptedPlatform, rig: &mut SceneRig) -> ArSessionManager {
    start_mounted(platform, rig, false)
}

fn start_mounted(
    platform: &mut ScriptedPlatform,
    rig: &mut SceneRig,
    wall_mount: bool,
) -> ArSessionManager {
    let mut manager = ArSessionManager::new(platform.capabilities());
    manager.set_wall_mount(wall_mount);
    manager.set_enabled(platform, rig, true).unwrap();
    let session = manager.current_session().unwrap();

    platform.push_event(XrEvent::SessionGranted { session });
    platform.push_event(XrEvent::XrCompatible { session });
    platform.push_event(XrEvent::ReferenceSpaceReady {
        session,
        kind: ReferenceSpaceKind::Viewer,
        space: ReferenceSpaceHandle(1),
    });
    platform.push_event(XrEvent::HitTestSourceReady {
        session,
        kind: HitTestSourceKind::Initial,
        source: INITIAL_SOURCE,
    });
    tick(&mut manager, platform, rig);
    manager
}

/// Start a session and place the scene on a floor in front of the viewer.
fn placed(platform: &mut ScriptedPlatform, rig: &mut SceneRig) -> ArSessionManager {
    let mut manager = start(platform, rig);
    let mut frame = XrFrame::with_pose(pose());
    frame.hit_results = HashMap::from([(
        INITIAL_SOURCE,
        vec![hit(Vec3::new(0.0, 0.0, -1.2), Vec3::Y)],
    )]);
    platform.set_frame(Some(frame));
    tick(&mut manager, platform, rig);

    let session = manager.current_session().unwrap();
    platform.push_event(XrEvent::HitTestSourceReady {
        session,
        kind: HitTestSourceKind::Transient,
        source: TRANSIENT_SOURCE,
    });
    platform.set_frame(Some(touches_frame(Vec::new())));
    tick(&mut manager, platform, rig);
    assert!(manager.placement().is_placed);
    manager
}

#[test]
fn test_enable_without_ar_derivative_is_refused() {
    let mut platform = ScriptedPlatform::webxr();
    let mut rig = scene();
    rig.models[0].ar_uri = None;
    let original = rig.clone();
    let mut manager = ArSessionManager::new(platform.capabilities());

    assert_eq!(
        manager.set_enabled(&mut platform, &mut rig, true),
        Err(ArError::NoArDerivative)
    );
    assert_eq!(manager.status(), SessionStatus::Idle);
    assert!(!manager.features_suspended());
    assert_eq!(platform.count(|c| matches!(c, PlatformCall::RequestSession(_))), 0);
    assert_eq!(rig, original);
}

#[test]
fn test_slightly_tilted_floor_is_accepted() {
    let mut platform = ScriptedPlatform::webxr();
    let mut rig = scene();
    let mut manager = start(&mut platform, &mut rig);
    assert!(manager.hit_test().awaiting_placement());

    let normal = Vec3::new(0.0, 0.9, (1.0f32 - 0.81).sqrt());
    let mut frame = XrFrame::with_pose(pose());
    frame.hit_results = HashMap::from([(
        INITIAL_SOURCE,
        vec![hit(Vec3::new(0.3, 0.0, -1.5), normal)],
    )]);
    platform.set_frame(Some(frame));
    tick(&mut manager, &mut platform, &mut rig);

    assert!(manager.placement().is_placed);
    assert!(manager.placement().is_presenting);
    assert!(platform.calls().contains(&PlatformCall::CancelHitTestSource(INITIAL_SOURCE)));
    assert_eq!(
        platform.count(|c| matches!(
            c,
            PlatformCall::RequestHitTestSource(_, HitTestSourceRequest::TransientInput { .. })
        )),
        1
    );
    let bottom = rig.root.transform_point(Vec3::new(
        rig.bounds.center().x,
        rig.bounds.min.y,
        rig.bounds.center().z,
    ));
    assert!((bottom - Vec3::new(0.3, 0.0, -1.5)).length() < 1e-4);
}

#[test]
fn test_steep_surface_keeps_searching() {
    let mut platform = ScriptedPlatform::webxr();
    let mut rig = scene();
    let mut manager = start(&mut platform, &mut rig);

    let mut frame = XrFrame::with_pose(pose());
    frame.hit_results = HashMap::from([(
        INITIAL_SOURCE,
        vec![hit(Vec3::new(0.0, 0.5, -1.0), Vec3::new(0.0, 0.5, 1.0))],
    )]);
    platform.set_frame(Some(frame));
    tick(&mut manager, &mut platform, &mut rig);

    assert!(!manager.placement().is_placed);
    assert_eq!(manager.hit_test().initial_source(), Some(INITIAL_SOURCE));
}

#[test]
fn test_pinch_then_lift_fades_readout() {
    let mut platform = ScriptedPlatform::webxr();
    let mut rig = scene();
    let mut manager = placed(&mut platform, &mut rig);
    let session = manager.current_session().unwrap();

    platform.push_event(XrEvent::SelectStart { session });
    platform.set_frame(Some(touches_frame(vec![
        touch(0, -0.1, 0.0),
        touch(1, 0.1, 0.0),
    ])));
    tick(&mut manager, &mut platform, &mut rig);
    assert_eq!(manager.gestures().mode(), GestureMode::Scaling);

    platform.set_frame(Some(touches_frame(vec![
        touch(0, -0.2, 0.0),
        touch(1, 0.2, 0.0),
    ])));
    tick(&mut manager, &mut platform, &mut rig);
    assert!((rig.scale() - 2.0).abs() < 1e-4);
    assert!((manager.placement().scale - 2.0).abs() < 1e-4);
    assert!(manager.gestures().readout().visible);
    assert_eq!(manager.gestures().readout().text, "200%");

    // One finger lifts: scaling ends without falling back to translate.
    platform.set_frame(Some(touches_frame(vec![touch(0, -0.2, 0.0)])));
    tick(&mut manager, &mut platform, &mut rig);
    assert_eq!(manager.gestures().mode(), GestureMode::Idle);
    assert!(manager.gestures().readout().fading);

    manager.update(
        &mut platform,
        &mut rig,
        FrameInput {
            delta_secs: 0.6,
            snap_rotation: false,
        },
    );
    assert!(!manager.gestures().readout().visible);
    assert!((rig.scale() - 2.0).abs() < 1e-4);
}

#[test]
fn test_pinch_near_original_size_snaps_to_one() {
    let mut platform = ScriptedPlatform::webxr();
    let mut rig = scene();
    let mut manager = placed(&mut platform, &mut rig);
    let session = manager.current_session().unwrap();

    platform.push_event(XrEvent::SelectStart { session });
    platform.set_frame(Some(touches_frame(vec![
        touch(0, -0.2, 0.0),
        touch(1, 0.2, 0.0),
    ])));
    tick(&mut manager, &mut platform, &mut rig);

    platform.set_frame(Some(touches_frame(vec![
        touch(0, -0.21, 0.0),
        touch(1, 0.21, 0.0),
    ])));
    tick(&mut manager, &mut platform, &mut rig);
    assert_eq!(rig.scale(), 1.0);
    assert_eq!(manager.gestures().readout().text, "100%");
}

#[test]
fn test_double_exit_restores_once() {
    let mut platform = ScriptedPlatform::webxr();
    let original = scene();
    let mut rig = original.clone();
    let mut manager = placed(&mut platform, &mut rig);
    assert!(manager.features_suspended());
    assert!(!rig.features.setup.grid_visible);

    manager.end_session(&mut platform, &mut rig);
    manager.end_session(&mut platform, &mut rig);

    assert_eq!(platform.count(|c| matches!(c, PlatformCall::EndSession(_))), 1);
    assert_eq!(platform.count(|c| matches!(c, PlatformCall::RenderNow)), 1);
    assert_eq!(rig.features, original.features);
    assert!(!manager.features_suspended());
    assert_eq!(manager.status(), SessionStatus::Idle);
}

#[test]
fn test_cleanup_leaves_nothing_behind() {
    let mut platform = ScriptedPlatform::webxr();
    let original = scene();
    let mut rig = original.clone();
    let mut manager = placed(&mut platform, &mut rig);
    assert_eq!(platform.live_listeners(), 3);

    manager.end_session(&mut platform, &mut rig);

    assert!(manager.hit_test().initial_source().is_none());
    assert!(manager.hit_test().transient_source().is_none());
    assert!(platform.calls().contains(&PlatformCall::CancelHitTestSource(TRANSIENT_SOURCE)));
    assert_eq!(platform.live_listeners(), 0);
    assert!(manager.shadow().is_none());
    assert!(manager.interaction().is_none());
    assert_eq!(
        rig.commands.iter().filter(|c| **c == SceneCommand::DespawnInteraction).count(),
        1
    );
    assert_eq!(
        rig.commands.iter().filter(|c| **c == SceneCommand::DespawnShadow).count(),
        1
    );
    assert_eq!(rig.commands.last(), Some(&SceneCommand::ForceRender));

    assert_eq!(rig.features, original.features);
    assert_eq!(rig.models, original.models);
    assert_eq!(rig.root, original.root);
    assert_eq!(rig.camera.parent, original.camera.parent);
    assert!(rig.camera.auto_update);
    assert!(!manager.placement().is_placed);
    assert!(!manager.placement().is_presenting);
    let calls = platform.calls();
    assert!(calls.contains(&PlatformCall::SetAnimationLoop(None)));
    assert!(calls.contains(&PlatformCall::SetXrRendering(None)));
    assert!(calls.contains(&PlatformCall::SetShadowAutoUpdate(true)));
}

#[test]
fn test_platform_ended_session_does_not_end_again() {
    let mut platform = ScriptedPlatform::webxr();
    let mut rig = scene();
    let mut manager = placed(&mut platform, &mut rig);
    let session = manager.current_session().unwrap();

    platform.push_event(XrEvent::SessionEnded { session });
    tick(&mut manager, &mut platform, &mut rig);

    assert_eq!(manager.status(), SessionStatus::Idle);
    assert_eq!(platform.count(|c| matches!(c, PlatformCall::EndSession(_))), 0);
    assert_eq!(platform.live_listeners(), 0);
}

#[test]
fn test_grant_after_exit_is_ended() {
    let mut platform = ScriptedPlatform::webxr();
    let mut rig = scene();
    let mut manager = ArSessionManager::new(platform.capabilities());
    manager.set_enabled(&mut platform, &mut rig, true).unwrap();
    manager.set_enabled(&mut platform, &mut rig, false).unwrap();
    assert_eq!(manager.status(), SessionStatus::Idle);
    platform.clear_calls();

    // The user left before the request resolved.
    platform.push_event(XrEvent::SessionGranted {
        session: SessionId(1),
    });
    let errors = manager.update(&mut platform, &mut rig, FrameInput::default());

    assert!(matches!(
        errors.as_slice(),
        [ArError::StaleContinuation { expected: None, .. }]
    ));
    assert_eq!(platform.calls(), vec![PlatformCall::EndSession(SessionId(1))]);
    assert!(!manager.placement().is_presenting);
    assert_eq!(rig.camera.parent, Some(Entity::from_raw(2)));
}

#[test]
fn test_second_session_ignores_first_session_sources() {
    let mut platform = ScriptedPlatform::webxr();
    let mut rig = scene();
    let mut manager = placed(&mut platform, &mut rig);
    manager.end_session(&mut platform, &mut rig);

    manager.set_enabled(&mut platform, &mut rig, true).unwrap();
    assert_eq!(manager.current_session(), Some(SessionId(2)));
    platform.clear_calls();

    platform.push_event(XrEvent::HitTestSourceReady {
        session: SessionId(1),
        kind: HitTestSourceKind::Initial,
        source: HitTestSourceHandle(99),
    });
    let errors = manager.update(&mut platform, &mut rig, FrameInput::default());

    assert_eq!(errors.len(), 1);
    assert!(manager.hit_test().initial_source().is_none());
    assert_eq!(
        platform.calls(),
        vec![PlatformCall::CancelHitTestSource(HitTestSourceHandle(99))]
    );
    assert_eq!(rig.models[0].quality, DerivativeQuality::Ar);
}

#[test]
fn test_wall_mount_faces_out_of_the_wall() {
    let mut platform = ScriptedPlatform::webxr();
    let mut rig = scene();
    let mut manager = start_mounted(&mut platform, &mut rig, true);
    assert_eq!(
        platform.count(|c| matches!(
            c,
            PlatformCall::RequestHitTestSource(_, HitTestSourceRequest::Ray { ray: None, .. })
        )),
        1
    );

    // A floor under the ray is no wall.
    let mut frame = XrFrame::with_pose(pose());
    frame.hit_results = HashMap::from([(
        INITIAL_SOURCE,
        vec![hit(Vec3::new(0.0, 0.0, -1.0), Vec3::Y)],
    )]);
    platform.set_frame(Some(frame));
    tick(&mut manager, &mut platform, &mut rig);
    assert!(!manager.placement().is_placed);

    let wall_point = Vec3::new(0.4, 1.3, -2.0);
    let normal = Vec3::new(1.0, 0.0, 1.0).normalize();
    let mut frame = XrFrame::with_pose(pose());
    frame.hit_results = HashMap::from([(INITIAL_SOURCE, vec![hit(wall_point, normal)])]);
    platform.set_frame(Some(frame));
    tick(&mut manager, &mut platform, &mut rig);

    assert!(manager.placement().is_placed);
    assert!((rig.yaw() - std::f32::consts::FRAC_PI_4).abs() < 1e-4);
    let front = rig.root.rotation * Vec3::Z;
    assert!((front - normal).length() < 1e-4);

    let center = rig.bounds.center();
    let back = rig
        .root
        .transform_point(Vec3::new(center.x, center.y, rig.bounds.min.z));
    assert!((back - wall_point).length() < 1e-4);

    assert!(manager.interaction().unwrap().plane_size.z < 0.01);
    assert!((manager.shadow().unwrap().yaw() - std::f32::consts::FRAC_PI_4).abs() < 1e-4);
}

#[test]
fn test_content_reload_ends_live_session() {
    let mut platform = ScriptedPlatform::webxr();
    let original = scene();
    let mut rig = original.clone();
    let mut manager = placed(&mut platform, &mut rig);
    let session = manager.current_session().unwrap();

    manager.on_content_reloaded(&mut platform, &mut rig);

    assert_eq!(manager.status(), SessionStatus::Idle);
    assert!(!manager.is_enabled());
    assert!(platform.calls().contains(&PlatformCall::EndSession(session)));
    assert!(rig.commands.contains(&SceneCommand::DespawnShadow));
    assert_eq!(rig.features, original.features);
    assert_eq!(rig.root, original.root);

    // Reloading with no session is a no-op.
    platform.clear_calls();
    manager.on_content_reloaded(&mut platform, &mut rig);
    assert!(platform.calls().is_empty());
}

#[test]
fn test_exit_hands_viewer_camera_back() {
    let mut platform = ScriptedPlatform::webxr();
    let mut rig = scene();
    rig.camera.lens = CameraLens {
        fov: 0.6,
        aspect_ratio: 1.6,
    };
    let original = rig.camera.clone();
    let mut manager = placed(&mut platform, &mut rig);
    assert_eq!(rig.camera.projection, pose().projection);
    assert!(!rig.camera.auto_update);

    manager.end_session(&mut platform, &mut rig);

    assert_eq!(rig.camera, original);
}

#[test]
fn test_select_before_its_touch_frame_still_starts_gesture() {
    let mut platform = ScriptedPlatform::webxr();
    let mut rig = scene();
    let mut manager = placed(&mut platform, &mut rig);
    let session = manager.current_session().unwrap();

    // The select event lands on a frame that has no touch data yet.
    platform.push_event(XrEvent::SelectStart { session });
    platform.set_frame(Some(touches_frame(Vec::new())));
    tick(&mut manager, &mut platform, &mut rig);
    assert_eq!(manager.gestures().mode(), GestureMode::Idle);

    platform.set_frame(Some(touches_frame(vec![
        touch(0, -0.1, 0.0),
        touch(1, 0.1, 0.0),
    ])));
    tick(&mut manager, &mut platform, &mut rig);
    assert_eq!(manager.gestures().mode(), GestureMode::Scaling);
}
