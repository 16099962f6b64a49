use crate::ar::session::{ArNotice, ArStatus};
use crate::ar::systems::{ArContentReloaded, ArSettings};
use crate::platform::bridge::HostBridge;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
use web_sys::{MessageEvent, window};

/// JSON-RPC 2.0 request structure. Without an `id` it is a notification.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 notification structure for one-way communication.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// JSON-RPC error structure following specification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Resource managing bidirectional RPC communication with the host page.
#[derive(Resource, Default)]
pub struct WebRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
}

impl WebRpcInterface {
    /// Send notification to the host page without expecting a response.
    pub fn send_notification(&mut self, method: &str, params: serde_json::Value) {
        self.outgoing_notifications.push(RpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        });
    }

    /// Queue response for transmission to the host page.
    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }
}

/// Plugin establishing the WebRPC layer for iframe-based deployment.
pub struct WebRpcPlugin;

impl Plugin for WebRpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WebRpcInterface>()
            .add_event::<IncomingRpcMessage>()
            .add_systems(
                Update,
                (
                    process_incoming_messages,
                    handle_rpc_messages,
                    forward_ar_updates,
                    forward_xr_commands,
                    send_outgoing_messages,
                )
                    .chain(),
            );

        #[cfg(target_arch = "wasm32")]
        app.add_systems(Startup, setup_message_listener);
    }
}

#[cfg(target_arch = "wasm32")]
fn setup_message_listener(mut commands: Commands) {
    use std::sync::Arc;
    use std::sync::Mutex;

    // Thread-safe message queue filled by the JS callback.
    let message_queue: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let queue_clone = message_queue.clone();

    let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
        if let Ok(data) = event.data().dyn_into::<js_sys::JsString>() {
            let message_str: String = data.into();

            if message_str.contains("jsonrpc") {
                if let Ok(mut queue) = queue_clone.lock() {
                    queue.push(message_str);
                }
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    match window() {
        Some(window) => {
            if let Err(e) = window
                .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            {
                error!("Failed to register message listener: {:?}", e);
            }
        }
        None => error!("Window object not available"),
    }

    // Prevent closure from being dropped by transferring ownership to JS.
    closure.forget();
    commands.insert_resource(MessageQueue(message_queue));
}

/// Resource wrapping thread-safe message queue for WASM event handling.
#[derive(Resource)]
struct MessageQueue(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

/// Event representing an incoming RPC message from the host page.
#[derive(Event)]
struct IncomingRpcMessage {
    content: String,
}

fn process_incoming_messages(
    message_queue: Option<Res<MessageQueue>>,
    mut message_events: EventWriter<IncomingRpcMessage>,
) {
    let Some(queue_res) = message_queue else {
        return;
    };

    let messages = if let Ok(mut queue) = queue_res.0.lock() {
        std::mem::take(&mut *queue)
    } else {
        Vec::new()
    };

    for message_str in messages {
        message_events.write(IncomingRpcMessage {
            content: message_str,
        });
    }
}

/// State a single RPC message may read or change.
pub struct RpcContext<'a> {
    pub settings: ArSettings,
    pub status: ArStatus,
    pub bridge: Option<&'a HostBridge>,
    pub content_reloaded: bool,
}

fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut settings: ResMut<ArSettings>,
    status: Res<ArStatus>,
    bridge: Option<Res<HostBridge>>,
    mut reloads: EventWriter<ArContentReloaded>,
) {
    let mut context = RpcContext {
        settings: settings.clone(),
        status: *status,
        bridge: bridge.as_deref(),
        content_reloaded: false,
    };

    for event in events.read() {
        match serde_json::from_str::<RpcRequest>(&event.content) {
            Ok(request) => {
                debug!("RPC {}", request.method);
                if let Some(response) = handle_rpc_request(&request, &mut context) {
                    rpc_interface.queue_response(response);
                }
            }
            Err(parse_error) => {
                warn!("RPC parse error: {}", parse_error);
            }
        }
    }

    settings.set_if_neq(context.settings);
    if context.content_reloaded {
        reloads.write(ArContentReloaded);
    }
}

/// Handle one RPC message. Returns a response only for requests with IDs.
pub fn handle_rpc_request(request: &RpcRequest, context: &mut RpcContext) -> Option<RpcResponse> {
    let result = match request.method.as_str() {
        "set_ar_enabled" => handle_set_ar_enabled(&request.params, context),
        "set_wall_mount" => handle_set_wall_mount(&request.params, context),
        "set_ar_scale" => handle_set_ar_scale(&request.params, context),
        "get_ar_status" => handle_get_ar_status(context),
        "xr_event" => handle_xr_event(&request.params, context),
        "xr_frame" => handle_xr_frame(&request.params, context),
        "content_reloaded" => {
            context.content_reloaded = true;
            Ok(serde_json::json!({ "success": true }))
        }
        _ => {
            warn!("Unknown RPC method: {}", request.method);
            let id = request.id.clone()?;
            return Some(create_error_response(
                id,
                -32601,
                "Method not found",
                Some(serde_json::json!({"method": request.method})),
            ));
        }
    };

    // Notifications have no ID and get no response, failures are only logged.
    let Some(id) = request.id.clone() else {
        if let Err(error) = result {
            warn!("RPC notification '{}' failed: {}", request.method, error.message);
        }
        return None;
    };

    match result {
        Ok(result_value) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result_value),
            error: None,
            id: Some(id),
        }),
        Err(error) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id: Some(id),
        }),
    }
}

fn handle_set_ar_enabled(
    params: &serde_json::Value,
    context: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(serde::Deserialize)]
    struct EnabledParams {
        enabled: bool,
    }

    let parsed = serde_json::from_value::<EnabledParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'enabled' parameter"))?;

    if parsed.enabled && !context.status.available {
        return Err(RpcError::invalid_params("AR is not available on this device"));
    }
    context.settings.enabled = parsed.enabled;
    info!("AR enable requested over RPC: {}", parsed.enabled);

    Ok(serde_json::json!({
        "success": true,
        "enabled": parsed.enabled
    }))
}

fn handle_set_wall_mount(
    params: &serde_json::Value,
    context: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(serde::Deserialize)]
    struct WallMountParams {
        wall_mount: bool,
    }

    let parsed = serde_json::from_value::<WallMountParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'wall_mount' parameter"))?;
    context.settings.wall_mount = parsed.wall_mount;

    Ok(serde_json::json!({
        "success": true,
        "wall_mount": parsed.wall_mount
    }))
}

fn handle_set_ar_scale(
    params: &serde_json::Value,
    context: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(serde::Deserialize)]
    struct ScaleParams {
        scale: f32,
    }

    let parsed = serde_json::from_value::<ScaleParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'scale' parameter"))?;
    if !(parsed.scale.is_finite() && parsed.scale > 0.0) {
        return Err(RpcError::invalid_params("Scale must be a positive number"));
    }
    context.settings.scale = parsed.scale;

    Ok(serde_json::json!({
        "success": true,
        "scale": parsed.scale
    }))
}

fn handle_get_ar_status(context: &RpcContext) -> Result<serde_json::Value, RpcError> {
    Ok(serde_json::json!({
        "available": context.status.available,
        "enabled": context.status.enabled,
        "is_presenting": context.status.is_presenting,
        "is_placed": context.status.is_placed,
        "wall_mount": context.settings.wall_mount,
        "scale": context.settings.scale,
    }))
}

fn handle_xr_event(
    params: &serde_json::Value,
    context: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    let bridge = context
        .bridge
        .ok_or_else(|| RpcError::internal_error("No WebXR bridge installed"))?;
    bridge
        .receive_event(params)
        .map_err(|e| RpcError::invalid_params(&e.to_string()))?;
    Ok(serde_json::json!({ "success": true }))
}

fn handle_xr_frame(
    params: &serde_json::Value,
    context: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    let bridge = context
        .bridge
        .ok_or_else(|| RpcError::internal_error("No WebXR bridge installed"))?;
    bridge
        .receive_frame(params)
        .map_err(|e| RpcError::invalid_params(&e.to_string()))?;
    Ok(serde_json::json!({ "success": true }))
}

/// Push status changes and user-facing notices to the host page.
fn forward_ar_updates(
    status: Res<ArStatus>,
    mut notices: EventReader<ArNotice>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    if status.is_changed() {
        match serde_json::to_value(*status) {
            Ok(params) => rpc_interface.send_notification("ar_status_changed", params),
            Err(e) => error!("Failed to serialize AR status: {}", e),
        }
    }

    for notice in notices.read() {
        match serde_json::to_value(notice) {
            Ok(params) => rpc_interface.send_notification("ar_notification", params),
            Err(e) => error!("Failed to serialize AR notice: {}", e),
        }
    }
}

/// Relay queued WebXR shim commands as `xr_command` notifications.
fn forward_xr_commands(bridge: Option<Res<HostBridge>>, mut rpc_interface: ResMut<WebRpcInterface>) {
    let Some(bridge) = bridge else {
        return;
    };

    for command in bridge.take_commands() {
        match serde_json::to_value(&command) {
            Ok(params) => rpc_interface.send_notification("xr_command", params),
            Err(e) => error!("Failed to serialize XR command {:?}: {}", command, e),
        }
    }
}

/// Create standardized error response with optional data payload.
fn create_error_response(
    id: serde_json::Value,
    code: i32,
    message: &str,
    data: Option<serde_json::Value>,
) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(RpcError {
            code,
            message: message.to_string(),
            data,
        }),
        id: Some(id),
    }
}

/// Send queued notifications and responses to the host page.
fn send_outgoing_messages(mut rpc_interface: ResMut<WebRpcInterface>) {
    // Send notifications first.
    for notification in rpc_interface.outgoing_notifications.drain(..) {
        send_message_to_parent(&notification);
    }

    // Send responses second to maintain order.
    for response in rpc_interface.outgoing_responses.drain(..) {
        send_message_to_parent(&response);
    }
}

/// Send serialized message to the parent window.
fn send_message_to_parent<T: Serialize>(message: &T) {
    #[cfg(target_arch = "wasm32")]
    {
        match serde_json::to_string(message) {
            Ok(json) => {
                if let Some(window) = window() {
                    if let Some(parent) = window.parent().ok().flatten() {
                        if let Err(e) = parent.post_message(&JsValue::from_str(&json), "*") {
                            error!("Failed to send message to parent: {:?}", e);
                        }
                    } else {
                        warn!("No parent window available for message transmission");
                    }
                } else {
                    error!("Window object not available");
                }
            }
            Err(e) => {
                error!("Failed to serialize message: {}", e);
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        // No-op for non-WASM targets.
        let _ = message;
    }
}

/// Standard RPC error codes and constructors.
impl RpcError {
    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::XrPlatform;
    use serde_json::json;

    fn request(method: &str, params: serde_json::Value, id: Option<u32>) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: id.map(|id| json!(id)),
        }
    }

    fn context(bridge: Option<&HostBridge>) -> RpcContext<'_> {
        RpcContext {
            settings: ArSettings::default(),
            status: ArStatus {
                available: true,
                ..Default::default()
            },
            bridge,
            content_reloaded: false,
        }
    }

    #[test]
    fn test_set_ar_scale_validates_input() {
        let mut context = context(None);
        let ok = handle_rpc_request(&request("set_ar_scale", json!({"scale": 2.5}), Some(1)), &mut context)
            .unwrap();
        assert!(ok.error.is_none());
        assert_eq!(context.settings.scale, 2.5);

        let bad = handle_rpc_request(&request("set_ar_scale", json!({"scale": 0.0}), Some(2)), &mut context)
            .unwrap();
        assert_eq!(bad.error.unwrap().code, -32602);
        assert_eq!(context.settings.scale, 2.5);
    }

    #[test]
    fn test_enable_refused_when_unavailable() {
        let mut context = context(None);
        context.status.available = false;
        let response =
            handle_rpc_request(&request("set_ar_enabled", json!({"enabled": true}), Some(1)), &mut context)
                .unwrap();
        assert!(response.error.is_some());
        assert!(!context.settings.enabled);
    }

    #[test]
    fn test_notifications_get_no_response() {
        let mut context = context(None);
        assert!(handle_rpc_request(&request("content_reloaded", json!({}), None), &mut context).is_none());
        assert!(context.content_reloaded);
        assert!(handle_rpc_request(&request("no_such_method", json!({}), None), &mut context).is_none());
    }

    #[test]
    fn test_unknown_method_with_id_is_reported() {
        let mut context = context(None);
        let response =
            handle_rpc_request(&request("no_such_method", json!({}), Some(4)), &mut context).unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[test]
    fn test_xr_event_reaches_bridge() {
        let bridge = HostBridge::default();
        let mut context = context(Some(&bridge));
        handle_rpc_request(
            &request("xr_event", json!({"type": "session_granted", "session": 1}), None),
            &mut context,
        );

        let mut events = Vec::new();
        bridge.platform().drain_events(&mut events);
        assert_eq!(events.len(), 1);
    }
}
