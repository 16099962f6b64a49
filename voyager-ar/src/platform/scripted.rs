use super::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Every platform call, in the order it was made.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    RequestSession(SessionId),
    EndSession(SessionId),
    MakeXrCompatible(SessionId),
    AttachBaseLayer(SessionId),
    RequestReferenceSpace(SessionId, ReferenceSpaceKind),
    RequestHitTestSource(SessionId, HitTestSourceRequest),
    CancelHitTestSource(HitTestSourceHandle),
    AddListener(SessionId, ListenerKind, ListenerHandle),
    RemoveListener(ListenerHandle),
    SetAnimationLoop(Option<SessionId>),
    SetXrRendering(Option<ReferenceSpaceKind>),
    SetShadowAutoUpdate(bool),
    RefreshShadowMap,
    ClearDepth,
    RenderNow,
    Launch(LaunchTarget),
}

#[derive(Default)]
struct ScriptState {
    capabilities: ArCapabilities,
    calls: Vec<PlatformCall>,
    events: VecDeque<XrEvent>,
    frame: Option<XrFrame>,
    live_listeners: Vec<ListenerHandle>,
    next_listener: u32,
}

/// Platform double driven entirely by the caller.
///
/// Clones share state, so a test can keep one handle while the manager owns
/// another (or the boxed copy inside [`XrPlatformResource`]).
#[derive(Clone, Default)]
pub struct ScriptedPlatform {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedPlatform {
    pub fn new(capabilities: ArCapabilities) -> Self {
        let platform = Self::default();
        platform.lock().capabilities = capabilities;
        platform
    }

    /// Platform with WebXR available.
    pub fn webxr() -> Self {
        Self::new(ArCapabilities {
            webxr: true,
            ..ArCapabilities::none()
        })
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        // A poisoned script only happens after a panicking test; keep going.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push_event(&self, event: XrEvent) {
        self.lock().events.push_back(event);
    }

    pub fn set_frame(&self, frame: Option<XrFrame>) {
        self.lock().frame = frame;
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn count(&self, predicate: impl Fn(&PlatformCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn live_listeners(&self) -> usize {
        self.lock().live_listeners.len()
    }

    fn record(&self, call: PlatformCall) {
        self.lock().calls.push(call);
    }
}

impl XrPlatform for ScriptedPlatform {
    fn capabilities(&self) -> ArCapabilities {
        self.lock().capabilities
    }

    fn request_session(&mut self, session: SessionId, _init: &SessionInit) {
        self.record(PlatformCall::RequestSession(session));
    }

    fn end_session(&mut self, session: SessionId) {
        self.record(PlatformCall::EndSession(session));
    }

    fn make_xr_compatible(&mut self, session: SessionId) {
        self.record(PlatformCall::MakeXrCompatible(session));
    }

    fn attach_base_layer(&mut self, session: SessionId) {
        self.record(PlatformCall::AttachBaseLayer(session));
    }

    fn request_reference_space(&mut self, session: SessionId, kind: ReferenceSpaceKind) {
        self.record(PlatformCall::RequestReferenceSpace(session, kind));
    }

    fn request_hit_test_source(&mut self, session: SessionId, request: HitTestSourceRequest) {
        self.record(PlatformCall::RequestHitTestSource(session, request));
    }

    fn cancel_hit_test_source(&mut self, source: HitTestSourceHandle) {
        self.record(PlatformCall::CancelHitTestSource(source));
    }

    fn add_listener(&mut self, session: SessionId, kind: ListenerKind) -> ListenerHandle {
        let mut state = self.lock();
        state.next_listener += 1;
        let handle = ListenerHandle(state.next_listener);
        state.live_listeners.push(handle);
        state.calls.push(PlatformCall::AddListener(session, kind, handle));
        handle
    }

    fn remove_listener(&mut self, handle: ListenerHandle) {
        let mut state = self.lock();
        state.live_listeners.retain(|h| *h != handle);
        state.calls.push(PlatformCall::RemoveListener(handle));
    }

    fn set_animation_loop(&mut self, session: Option<SessionId>) {
        self.record(PlatformCall::SetAnimationLoop(session));
    }

    fn set_xr_rendering(&mut self, space: Option<ReferenceSpaceKind>) {
        self.record(PlatformCall::SetXrRendering(space));
    }

    fn set_shadow_auto_update(&mut self, enabled: bool) {
        self.record(PlatformCall::SetShadowAutoUpdate(enabled));
    }

    fn refresh_shadow_map(&mut self) {
        self.record(PlatformCall::RefreshShadowMap);
    }

    fn clear_depth(&mut self) {
        self.record(PlatformCall::ClearDepth);
    }

    fn render_now(&mut self) {
        self.record(PlatformCall::RenderNow);
    }

    fn launch(&mut self, target: &LaunchTarget) {
        self.record(PlatformCall::Launch(target.clone()));
    }

    fn drain_events(&mut self, out: &mut Vec<XrEvent>) {
        out.extend(self.lock().events.drain(..));
    }

    fn frame(&self) -> Option<XrFrame> {
        self.lock().frame.clone()
    }
}
