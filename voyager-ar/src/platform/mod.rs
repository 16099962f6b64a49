//! XR platform seam.
//!
//! The AR state machine never talks to WebXR directly. Everything it needs
//! from the device goes through [`XrPlatform`]:
//!
//! - **Requests** (`request_session`, `request_reference_space`, ...) return
//!   immediately. Their completions arrive later as [`XrEvent`]s, each tagged
//!   with the [`SessionId`] that issued the request.
//! - **Frame data** is a plain snapshot ([`XrFrame`]) valid for one update.
//! - **Renderer switches** (`set_shadow_auto_update`, `clear_depth`, ...) are
//!   synchronous and only meaningful while the host owns a GL context.
//!
//! ## Implementations
//!
//! - [`scripted::ScriptedPlatform`]: records calls, replays queued events and
//!   frames. Used by tests and by native builds (no AR capability).
//! - [`bridge::HostBridgePlatform`]: forwards requests to a JavaScript WebXR
//!   shim through the JSON-RPC layer and receives its callbacks back.

/// JSON-RPC backed platform talking to a browser WebXR shim.
pub mod bridge;

/// Deterministic platform for tests and native builds.
pub mod scripted;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifies one session request. A new id is issued for every request, so
/// continuations belonging to an abandoned session can be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceSpaceHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HitTestSourceHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceSpaceKind {
    Local,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitTestSourceKind {
    /// Fixed ray relative to the viewer, used once for first placement.
    Initial,
    /// Per-touch source used for gesture interaction.
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerKind {
    SessionEnd,
    SelectStart,
    SelectEnd,
}

/// What the device can do, computed once at load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArCapabilities {
    pub webxr: bool,
    pub android_intent: bool,
    pub ios_quick_look: bool,
}

impl ArCapabilities {
    pub fn none() -> Self {
        Self::default()
    }

    /// True when any AR path can be offered to the user.
    pub fn available(&self) -> bool {
        self.webxr || self.android_intent || self.ios_quick_look
    }
}

/// Options passed with an `immersive-ar` session request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInit {
    pub mode: String,
    pub required_features: Vec<String>,
    pub optional_features: Vec<String>,
    pub dom_overlay_root: Option<String>,
}

impl SessionInit {
    pub fn immersive_ar(dom_overlay_root: Option<String>) -> Self {
        Self {
            mode: "immersive-ar".to_string(),
            required_features: vec!["hit-test".to_string()],
            optional_features: vec!["dom-overlay".to_string()],
            dom_overlay_root,
        }
    }
}

/// Ray offset relative to a reference space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrRay {
    pub origin: Vec3,
    pub direction: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HitTestSourceRequest {
    Ray {
        space: ReferenceSpaceHandle,
        ray: Option<XrRay>,
    },
    TransientInput {
        profile: String,
    },
}

/// One-shot navigation used by the non-WebXR fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// Android Scene Viewer intent URL.
    AndroidIntent(String),
    /// iOS AR Quick Look anchor (`rel="ar"`) pointing at a USDZ asset.
    QuickLook(String),
}

/// Completion of an asynchronous platform request, or a platform notification.
#[derive(Debug, Clone, PartialEq)]
pub enum XrEvent {
    SessionGranted {
        session: SessionId,
    },
    SessionRejected {
        session: SessionId,
        reason: String,
    },
    XrCompatible {
        session: SessionId,
    },
    ReferenceSpaceReady {
        session: SessionId,
        kind: ReferenceSpaceKind,
        space: ReferenceSpaceHandle,
    },
    HitTestSourceReady {
        session: SessionId,
        kind: HitTestSourceKind,
        source: HitTestSourceHandle,
    },
    SelectStart {
        session: SessionId,
    },
    SelectEnd {
        session: SessionId,
    },
    SessionEnded {
        session: SessionId,
    },
}

impl XrEvent {
    pub fn session(&self) -> SessionId {
        match self {
            Self::SessionGranted { session }
            | Self::SessionRejected { session, .. }
            | Self::XrCompatible { session }
            | Self::ReferenceSpaceReady { session, .. }
            | Self::HitTestSourceReady { session, .. }
            | Self::SelectStart { session }
            | Self::SelectEnd { session }
            | Self::SessionEnded { session } => *session,
        }
    }
}

/// Camera pose reported by the platform for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerPose {
    /// Camera-to-world matrix.
    pub world: Mat4,
    /// GL-convention projection matrix of the (single) view.
    pub projection: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrHitResult {
    pub position: Vec3,
    pub orientation: Quat,
}

impl XrHitResult {
    /// Surface normal: the local +Y axis of the hit pose.
    pub fn normal(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }
}

/// Hit results for one active touch.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientInputResult {
    pub input_id: u32,
    /// Touch position in normalised screen axes, x right and y down, both in [-1, 1].
    pub axes: Vec2,
    pub hits: Vec<XrHitResult>,
}

/// Everything the platform reports for one animation frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XrFrame {
    pub pose: Option<ViewerPose>,
    pub hit_results: HashMap<HitTestSourceHandle, Vec<XrHitResult>>,
    pub transient_results: HashMap<HitTestSourceHandle, Vec<TransientInputResult>>,
}

impl XrFrame {
    pub fn with_pose(pose: ViewerPose) -> Self {
        Self {
            pose: Some(pose),
            ..Default::default()
        }
    }
}

/// Device-side operations consumed by the AR session manager.
pub trait XrPlatform: Send + Sync + 'static {
    fn capabilities(&self) -> ArCapabilities;

    // Session lifecycle
    fn request_session(&mut self, session: SessionId, init: &SessionInit);
    fn end_session(&mut self, session: SessionId);
    fn make_xr_compatible(&mut self, session: SessionId);
    fn attach_base_layer(&mut self, session: SessionId);
    fn request_reference_space(&mut self, session: SessionId, kind: ReferenceSpaceKind);

    // Hit testing
    fn request_hit_test_source(&mut self, session: SessionId, request: HitTestSourceRequest);
    fn cancel_hit_test_source(&mut self, source: HitTestSourceHandle);

    // Observers
    fn add_listener(&mut self, session: SessionId, kind: ListenerKind) -> ListenerHandle;
    fn remove_listener(&mut self, handle: ListenerHandle);

    // Renderer
    fn set_animation_loop(&mut self, session: Option<SessionId>);
    fn set_xr_rendering(&mut self, space: Option<ReferenceSpaceKind>);
    fn set_shadow_auto_update(&mut self, enabled: bool);
    fn refresh_shadow_map(&mut self);
    fn clear_depth(&mut self);
    fn render_now(&mut self);

    fn launch(&mut self, target: &LaunchTarget);

    /// Move pending completions into `out`, oldest first.
    fn drain_events(&mut self, out: &mut Vec<XrEvent>);

    /// Snapshot of the current animation frame, if one is being presented.
    fn frame(&self) -> Option<XrFrame>;
}

/// Resource wrapping the active platform implementation.
#[derive(Resource)]
pub struct XrPlatformResource(pub Box<dyn XrPlatform>);

impl XrPlatformResource {
    pub fn new(platform: impl XrPlatform) -> Self {
        Self(Box::new(platform))
    }
}
