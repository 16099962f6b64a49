use crate::platform::{
    HitTestSourceHandle, HitTestSourceKind, HitTestSourceRequest, ReferenceSpaceHandle,
    SessionId, TransientInputResult, XrFrame, XrHitResult, XrPlatform, XrRay,
};
use ar_constants::placement::{
    INITIAL_HIT_TEST_TILT_DEGREES, TRANSIENT_INPUT_PROFILE, UPWARD_NORMAL_THRESHOLD,
};
use bevy::prelude::*;

/// Where and how the scene should be placed after the first valid hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub point: Vec3,
    pub normal: Vec3,
    /// Yaw that turns the scene's +Z to face out of the wall (wall mounts only).
    pub wall_yaw: Option<f32>,
}

/// Offset ray for the initial hit test: 20° below the view direction, or
/// straight ahead (no offset) for wall mounts.
pub fn initial_ray(wall_mount: bool) -> Option<XrRay> {
    if wall_mount {
        return None;
    }
    let tilt = INITIAL_HIT_TEST_TILT_DEGREES.to_radians();
    Some(XrRay {
        origin: Vec3::ZERO,
        direction: Vec3::new(0.0, -tilt.sin(), -tilt.cos()),
    })
}

/// True when the hit surface faces up. The threshold itself counts as not upward.
pub fn is_upward(normal: Vec3) -> bool {
    normal.y > UPWARD_NORMAL_THRESHOLD
}

/// Accept a hit for the requested mount, or reject it as a miss.
pub fn classify_hit(hit: &XrHitResult, wall_mount: bool) -> Option<Placement> {
    let normal = hit.normal();
    let upward = is_upward(normal);

    if !wall_mount {
        return upward.then_some(Placement {
            point: hit.position,
            normal,
            wall_yaw: None,
        });
    }

    if upward {
        return None;
    }
    let horizontal = Vec2::new(normal.x, normal.z);
    if horizontal.length() < 0.1 {
        // Ceiling-like surface: not a wall either.
        return None;
    }
    Some(Placement {
        point: hit.position,
        normal,
        wall_yaw: Some(normal.x.atan2(normal.z)),
    })
}

/// Owns the initial and transient hit-test sources of one session.
///
/// Each handle is cancelled exactly once: it is taken out of its slot before
/// the cancel call, so repeated disposal finds nothing to release.
#[derive(Debug, Default)]
pub struct HitTestCoordinator {
    initial: Option<HitTestSourceHandle>,
    transient: Option<HitTestSourceHandle>,
    initial_requested: bool,
    transient_requested: bool,
    placed: bool,
}

impl HitTestCoordinator {
    pub fn initial_source(&self) -> Option<HitTestSourceHandle> {
        self.initial
    }

    pub fn transient_source(&self) -> Option<HitTestSourceHandle> {
        self.transient
    }

    /// True until the first successful placement.
    pub fn awaiting_placement(&self) -> bool {
        !self.placed
    }

    /// Request the viewer-anchored source used for first placement.
    pub fn start_initial(
        &mut self,
        platform: &mut dyn XrPlatform,
        session: SessionId,
        viewer_space: ReferenceSpaceHandle,
        wall_mount: bool,
    ) {
        if self.initial_requested || self.placed {
            return;
        }
        self.initial_requested = true;
        platform.request_hit_test_source(
            session,
            HitTestSourceRequest::Ray {
                space: viewer_space,
                ray: initial_ray(wall_mount),
            },
        );
        debug!("Initial hit-test source requested (wall mount: {})", wall_mount);
    }

    /// Store a source the platform just created. Sources nobody is waiting
    /// for any more are cancelled on the spot.
    pub fn on_source_ready(
        &mut self,
        platform: &mut dyn XrPlatform,
        kind: HitTestSourceKind,
        source: HitTestSourceHandle,
    ) {
        let slot = match kind {
            HitTestSourceKind::Initial if self.initial_requested && !self.placed => &mut self.initial,
            HitTestSourceKind::Transient if self.transient_requested => &mut self.transient,
            _ => {
                warn!("Unexpected {:?} hit-test source {:?}; cancelling", kind, source);
                platform.cancel_hit_test_source(source);
                return;
            }
        };

        if slot.is_some() {
            warn!("Duplicate {:?} hit-test source {:?}; cancelling", kind, source);
            platform.cancel_hit_test_source(source);
            return;
        }
        *slot = Some(source);
    }

    /// Look for a usable surface under the initial ray. On success the
    /// initial source is released and transient hit testing starts.
    pub fn poll_initial(
        &mut self,
        platform: &mut dyn XrPlatform,
        session: SessionId,
        frame: &XrFrame,
        wall_mount: bool,
    ) -> Option<Placement> {
        let source = self.initial?;
        let hit = frame.hit_results.get(&source)?.first()?;
        let placement = classify_hit(hit, wall_mount)?;

        if let Some(source) = self.initial.take() {
            platform.cancel_hit_test_source(source);
        }
        self.placed = true;
        self.transient_requested = true;
        platform.request_hit_test_source(
            session,
            HitTestSourceRequest::TransientInput {
                profile: TRANSIENT_INPUT_PROFILE.to_string(),
            },
        );
        info!("Surface found at {:?}; switching to transient hit testing", placement.point);
        Some(placement)
    }

    /// Per-touch results for this frame, once the transient source exists.
    pub fn poll_transient<'a>(&self, frame: &'a XrFrame) -> Option<&'a [TransientInputResult]> {
        let source = self.transient?;
        frame.transient_results.get(&source).map(Vec::as_slice)
    }

    /// Cancel whatever is still live. Safe to call any number of times.
    pub fn dispose(&mut self, platform: &mut dyn XrPlatform) {
        if let Some(source) = self.initial.take() {
            platform.cancel_hit_test_source(source);
        }
        if let Some(source) = self.transient.take() {
            platform.cancel_hit_test_source(source);
        }
        self.initial_requested = false;
        self.transient_requested = false;
        self.placed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::scripted::{PlatformCall, ScriptedPlatform};
    use std::collections::HashMap;

    const SESSION: SessionId = SessionId(1);
    const VIEWER: ReferenceSpaceHandle = ReferenceSpaceHandle(2);

    fn hit_with_normal(normal: Vec3) -> XrHitResult {
        XrHitResult {
            position: Vec3::new(0.0, -1.2, -1.5),
            orientation: Quat::from_rotation_arc(Vec3::Y, normal.normalize()),
        }
    }

    fn frame_with(source: HitTestSourceHandle, hit: XrHitResult) -> XrFrame {
        XrFrame {
            hit_results: HashMap::from([(source, vec![hit])]),
            ..Default::default()
        }
    }

    fn started(platform: &mut ScriptedPlatform, wall_mount: bool) -> HitTestCoordinator {
        let mut coordinator = HitTestCoordinator::default();
        coordinator.start_initial(platform, SESSION, VIEWER, wall_mount);
        coordinator.on_source_ready(platform, HitTestSourceKind::Initial, HitTestSourceHandle(10));
        coordinator
    }

    #[test]
    fn test_initial_ray_is_tilted_down() {
        let ray = initial_ray(false).unwrap();
        let angle = (-ray.direction.y).asin().to_degrees();
        assert!((angle - 20.0).abs() < 1e-3);
        assert!(initial_ray(true).is_none());
    }

    #[test]
    fn test_boundary_normal_is_not_upward() {
        let normal = Vec3::new((1.0f32 - 0.75 * 0.75).sqrt(), 0.75, 0.0);
        assert!(!is_upward(normal));
        assert!(is_upward(Vec3::new(0.0, 0.9, 0.1).normalize()));
    }

    #[test]
    fn test_floor_hit_places_and_switches_to_transient() {
        let mut platform = ScriptedPlatform::webxr();
        let mut coordinator = started(&mut platform, false);
        let frame = frame_with(HitTestSourceHandle(10), hit_with_normal(Vec3::Y));

        let placement = coordinator
            .poll_initial(&mut platform, SESSION, &frame, false)
            .unwrap();
        assert_eq!(placement.point, Vec3::new(0.0, -1.2, -1.5));
        assert!(placement.wall_yaw.is_none());
        assert!(coordinator.initial_source().is_none());
        assert!(!coordinator.awaiting_placement());

        let calls = platform.calls();
        assert!(calls.contains(&PlatformCall::CancelHitTestSource(HitTestSourceHandle(10))));
        assert!(calls.iter().any(|c| matches!(
            c,
            PlatformCall::RequestHitTestSource(_, HitTestSourceRequest::TransientInput { profile })
                if profile == TRANSIENT_INPUT_PROFILE
        )));
    }

    #[test]
    fn test_wrong_orientation_keeps_polling() {
        let mut platform = ScriptedPlatform::webxr();
        let mut coordinator = started(&mut platform, false);
        let wall = frame_with(HitTestSourceHandle(10), hit_with_normal(Vec3::Z));

        for _ in 0..3 {
            assert!(coordinator.poll_initial(&mut platform, SESSION, &wall, false).is_none());
        }
        assert_eq!(coordinator.initial_source(), Some(HitTestSourceHandle(10)));
        assert!(coordinator.awaiting_placement());
    }

    #[test]
    fn test_wall_hit_aligns_yaw() {
        let mut platform = ScriptedPlatform::webxr();
        let mut coordinator = started(&mut platform, true);
        let frame = frame_with(HitTestSourceHandle(10), hit_with_normal(Vec3::X));

        let placement = coordinator
            .poll_initial(&mut platform, SESSION, &frame, true)
            .unwrap();
        let yaw = placement.wall_yaw.unwrap();
        assert!((yaw - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn test_floor_hit_rejected_in_wall_mode() {
        let mut platform = ScriptedPlatform::webxr();
        let mut coordinator = started(&mut platform, true);
        let frame = frame_with(HitTestSourceHandle(10), hit_with_normal(Vec3::Y));
        assert!(coordinator.poll_initial(&mut platform, SESSION, &frame, true).is_none());
    }

    #[test]
    fn test_dispose_cancels_each_source_once() {
        let mut platform = ScriptedPlatform::webxr();
        let mut coordinator = started(&mut platform, false);
        let frame = frame_with(HitTestSourceHandle(10), hit_with_normal(Vec3::Y));
        coordinator.poll_initial(&mut platform, SESSION, &frame, false);
        coordinator.on_source_ready(&mut platform, HitTestSourceKind::Transient, HitTestSourceHandle(11));

        coordinator.dispose(&mut platform);
        coordinator.dispose(&mut platform);

        let cancels = |h: u32| {
            platform.count(|c| *c == PlatformCall::CancelHitTestSource(HitTestSourceHandle(h)))
        };
        assert_eq!(cancels(10), 1);
        assert_eq!(cancels(11), 1);
        assert!(coordinator.initial_source().is_none());
        assert!(coordinator.transient_source().is_none());
    }

    #[test]
    fn test_unrequested_source_is_cancelled() {
        let mut platform = ScriptedPlatform::webxr();
        let mut coordinator = HitTestCoordinator::default();
        coordinator.on_source_ready(&mut platform, HitTestSourceKind::Transient, HitTestSourceHandle(5));
        assert!(coordinator.transient_source().is_none());
        assert_eq!(
            platform.calls(),
            vec![PlatformCall::CancelHitTestSource(HitTestSourceHandle(5))]
        );
    }

    #[test]
    fn test_poll_transient_without_source_is_empty() {
        let coordinator = HitTestCoordinator::default();
        assert!(coordinator.poll_transient(&XrFrame::default()).is_none());
    }
}
