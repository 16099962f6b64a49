//! WebXR shim bridge.
//!
//! The browser owns the `XRSession`. A small JavaScript shim in the parent
//! page executes [`XrCommand`]s it receives as `xr_command` notifications and
//! reports completions (`xr_event`) and per-frame data (`xr_frame`) back over
//! the same JSON-RPC channel.
//!
//! ```text
//! AR manager ──XrPlatform──> HostBridgePlatform ──outbox──> WebRpcInterface ──postMessage──> shim
//!     ^                               ^                                                        │
//!     └────── drain_events ───── inbox/frame <──── handle_rpc_messages <──── xr_event/xr_frame ┘
//! ```

use super::*;
use crate::ar::error::ArError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Request sent to the shim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum XrCommand {
    RequestSession {
        session: SessionId,
        init: SessionInit,
    },
    EndSession {
        session: SessionId,
    },
    MakeXrCompatible {
        session: SessionId,
    },
    AttachBaseLayer {
        session: SessionId,
    },
    RequestReferenceSpace {
        session: SessionId,
        kind: ReferenceSpaceKind,
    },
    RequestRayHitTestSource {
        session: SessionId,
        space: ReferenceSpaceHandle,
        origin: Option<[f32; 3]>,
        direction: Option<[f32; 3]>,
    },
    RequestTransientHitTestSource {
        session: SessionId,
        profile: String,
    },
    CancelHitTestSource {
        source: HitTestSourceHandle,
    },
    AddListener {
        session: SessionId,
        kind: ListenerKind,
        listener: ListenerHandle,
    },
    RemoveListener {
        listener: ListenerHandle,
    },
    SetAnimationLoop {
        session: Option<SessionId>,
    },
    SetXrRendering {
        space: Option<ReferenceSpaceKind>,
    },
    SetShadowAutoUpdate {
        enabled: bool,
    },
    RefreshShadowMap,
    ClearDepth,
    RenderNow,
    LaunchIntent {
        url: String,
    },
    QuickLook {
        url: String,
    },
}

/// Completion reported by the shim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    SessionGranted {
        session: SessionId,
    },
    SessionRejected {
        session: SessionId,
        #[serde(default)]
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

impl From<WireEvent> for XrEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::SessionGranted { session } => XrEvent::SessionGranted { session },
            WireEvent::SessionRejected { session, reason } => {
                XrEvent::SessionRejected { session, reason }
            }
            WireEvent::XrCompatible { session } => XrEvent::XrCompatible { session },
            WireEvent::ReferenceSpaceReady {
                session,
                kind,
                space,
            } => XrEvent::ReferenceSpaceReady {
                session,
                kind,
                space,
            },
            WireEvent::HitTestSourceReady {
                session,
                kind,
                source,
            } => XrEvent::HitTestSourceReady {
                session,
                kind,
                source,
            },
            WireEvent::SelectStart { session } => XrEvent::SelectStart { session },
            WireEvent::SelectEnd { session } => XrEvent::SelectEnd { session },
            WireEvent::SessionEnded { session } => XrEvent::SessionEnded { session },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireHit {
    pub position: [f32; 3],
    pub orientation: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTransientInput {
    pub input_id: u32,
    pub axes: [f32; 2],
    #[serde(default)]
    pub hits: Vec<WireHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSourceHits {
    pub source: HitTestSourceHandle,
    pub hits: Vec<WireHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTransientHits {
    pub source: HitTestSourceHandle,
    pub inputs: Vec<WireTransientInput>,
}

/// Per-frame snapshot reported by the shim. Matrices are column-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFrame {
    pub view_matrix_world: Option<[f32; 16]>,
    pub projection_matrix: Option<[f32; 16]>,
    #[serde(default)]
    pub hit_results: Vec<WireSourceHits>,
    #[serde(default)]
    pub transient_results: Vec<WireTransientHits>,
}

impl From<&WireHit> for XrHitResult {
    fn from(hit: &WireHit) -> Self {
        Self {
            position: Vec3::from_array(hit.position),
            orientation: Quat::from_array(hit.orientation).normalize(),
        }
    }
}

impl From<WireFrame> for XrFrame {
    fn from(wire: WireFrame) -> Self {
        let pose = match (wire.view_matrix_world, wire.projection_matrix) {
            (Some(world), Some(projection)) => Some(ViewerPose {
                world: Mat4::from_cols_array(&world),
                projection: Mat4::from_cols_array(&projection),
            }),
            _ => None,
        };

        let hit_results = wire
            .hit_results
            .iter()
            .map(|entry| (entry.source, entry.hits.iter().map(XrHitResult::from).collect()))
            .collect();

        let transient_results = wire
            .transient_results
            .iter()
            .map(|entry| {
                let inputs = entry
                    .inputs
                    .iter()
                    .map(|input| TransientInputResult {
                        input_id: input.input_id,
                        axes: Vec2::from_array(input.axes),
                        hits: input.hits.iter().map(XrHitResult::from).collect(),
                    })
                    .collect();
                (entry.source, inputs)
            })
            .collect();

        XrFrame {
            pose,
            hit_results,
            transient_results,
        }
    }
}

#[derive(Default)]
struct BridgeChannel {
    capabilities: ArCapabilities,
    outbox: Vec<XrCommand>,
    inbox: VecDeque<XrEvent>,
    frame: Option<XrFrame>,
    next_listener: u32,
}

/// Shared endpoint used by the RPC layer to feed the bridge and collect its commands.
#[derive(Resource, Clone, Default)]
pub struct HostBridge {
    channel: Arc<Mutex<BridgeChannel>>,
}

impl HostBridge {
    fn lock(&self) -> MutexGuard<'_, BridgeChannel> {
        match self.channel.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_capabilities(&self, capabilities: ArCapabilities) {
        self.lock().capabilities = capabilities;
    }

    /// Parse and enqueue an `xr_event` payload.
    pub fn receive_event(&self, params: &serde_json::Value) -> Result<(), ArError> {
        let event = serde_json::from_value::<WireEvent>(params.clone())
            .map_err(|e| ArError::Bridge(format!("invalid xr_event: {e}")))?;
        self.lock().inbox.push_back(event.into());
        Ok(())
    }

    /// Parse an `xr_frame` payload and make it the current frame.
    pub fn receive_frame(&self, params: &serde_json::Value) -> Result<(), ArError> {
        let frame = serde_json::from_value::<WireFrame>(params.clone())
            .map_err(|e| ArError::Bridge(format!("invalid xr_frame: {e}")))?;
        self.lock().frame = Some(frame.into());
        Ok(())
    }

    /// Take every command queued since the last call.
    pub fn take_commands(&self) -> Vec<XrCommand> {
        std::mem::take(&mut self.lock().outbox)
    }

    pub fn platform(&self) -> HostBridgePlatform {
        HostBridgePlatform {
            bridge: self.clone(),
        }
    }
}

/// [`XrPlatform`] that forwards everything to the WebXR shim.
pub struct HostBridgePlatform {
    bridge: HostBridge,
}

impl HostBridgePlatform {
    fn send(&self, command: XrCommand) {
        self.bridge.lock().outbox.push(command);
    }
}

impl XrPlatform for HostBridgePlatform {
    fn capabilities(&self) -> ArCapabilities {
        self.bridge.lock().capabilities
    }

    fn request_session(&mut self, session: SessionId, init: &SessionInit) {
        self.send(XrCommand::RequestSession {
            session,
            init: init.clone(),
        });
    }

    fn end_session(&mut self, session: SessionId) {
        // Frames of an ended session must not leak into the next one.
        self.bridge.lock().frame = None;
        self.send(XrCommand::EndSession { session });
    }

    fn make_xr_compatible(&mut self, session: SessionId) {
        self.send(XrCommand::MakeXrCompatible { session });
    }

    fn attach_base_layer(&mut self, session: SessionId) {
        self.send(XrCommand::AttachBaseLayer { session });
    }

    fn request_reference_space(&mut self, session: SessionId, kind: ReferenceSpaceKind) {
        self.send(XrCommand::RequestReferenceSpace { session, kind });
    }

    fn request_hit_test_source(&mut self, session: SessionId, request: HitTestSourceRequest) {
        let command = match request {
            HitTestSourceRequest::Ray { space, ray } => XrCommand::RequestRayHitTestSource {
                session,
                space,
                origin: ray.map(|r| r.origin.to_array()),
                direction: ray.map(|r| r.direction.to_array()),
            },
            HitTestSourceRequest::TransientInput { profile } => {
                XrCommand::RequestTransientHitTestSource { session, profile }
            }
        };
        self.send(command);
    }

    fn cancel_hit_test_source(&mut self, source: HitTestSourceHandle) {
        self.send(XrCommand::CancelHitTestSource { source });
    }

    fn add_listener(&mut self, session: SessionId, kind: ListenerKind) -> ListenerHandle {
        let listener = {
            let mut channel = self.bridge.lock();
            channel.next_listener += 1;
            ListenerHandle(channel.next_listener)
        };
        self.send(XrCommand::AddListener {
            session,
            kind,
            listener,
        });
        listener
    }

    fn remove_listener(&mut self, handle: ListenerHandle) {
        self.send(XrCommand::RemoveListener { listener: handle });
    }

    fn set_animation_loop(&mut self, session: Option<SessionId>) {
        if session.is_none() {
            self.bridge.lock().frame = None;
        }
        self.send(XrCommand::SetAnimationLoop { session });
    }

    fn set_xr_rendering(&mut self, space: Option<ReferenceSpaceKind>) {
        self.send(XrCommand::SetXrRendering { space });
    }

    fn set_shadow_auto_update(&mut self, enabled: bool) {
        self.send(XrCommand::SetShadowAutoUpdate { enabled });
    }

    fn refresh_shadow_map(&mut self) {
        self.send(XrCommand::RefreshShadowMap);
    }

    fn clear_depth(&mut self) {
        self.send(XrCommand::ClearDepth);
    }

    fn render_now(&mut self) {
        self.send(XrCommand::RenderNow);
    }

    fn launch(&mut self, target: &LaunchTarget) {
        let command = match target {
            LaunchTarget::AndroidIntent(url) => XrCommand::LaunchIntent { url: url.clone() },
            LaunchTarget::QuickLook(url) => XrCommand::QuickLook { url: url.clone() },
        };
        self.send(command);
    }

    fn drain_events(&mut self, out: &mut Vec<XrEvent>) {
        out.extend(self.bridge.lock().inbox.drain(..));
    }

    fn frame(&self) -> Option<XrFrame> {
        self.bridge.lock().frame.clone()
    }
}
