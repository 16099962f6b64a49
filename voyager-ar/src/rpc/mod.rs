//! JSON-RPC 2.0 communication layer between the AR engine and its host page.
//!
//! The engine runs inside an iframe. The parent page hosts both the viewer UI
//! and the WebXR shim, and talks to the engine through `postMessage`.
//!
//! ## Message Flow
//!
//! ```text
//! Host page (UI + WebXR shim)  <──postMessage──>  Bevy (iframe)
//!        │                                              │
//!        ├─ Request (with ID) ────────────────────────> │
//!        │ <───────────────────────── Response (with ID) ┤
//!        │                                              │
//!        ├─ xr_event / xr_frame (no ID) ──────────────> │
//!        │ <──────────────────── xr_command (no ID) ─────┤
//!        │ <───── ar_status_changed / ar_notification ───┤
//! ```
//!
//! ## Requests
//!
//! - `set_ar_enabled { enabled }`: enter or leave AR
//! - `set_wall_mount { wall_mount }`: place on walls instead of floors
//! - `set_ar_scale { scale }`: uniform scale, must be positive
//! - `get_ar_status`: availability and progress flags
//!
//! ## Notifications in
//!
//! - `xr_event`: completion of an earlier `xr_command` (see [`crate::platform::bridge`])
//! - `xr_frame`: viewer pose and hit-test results for the current XR frame
//! - `content_reloaded`: scene content was replaced; a running session ends
//!
//! ## Notifications out
//!
//! - `ar_status_changed { available, enabled, is_presenting, is_placed }`
//! - `ar_notification { kind, message }`: user-facing warning
//! - `xr_command { op, ... }`: work for the WebXR shim
//!
//! ## Error Handling
//!
//! Standard JSON-RPC 2.0 error codes:
//! - `-32600`: Invalid request
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error

/// JSON-RPC 2.0 bidirectional communication system for the host page.
///
/// Handles request-response patterns, notifications, and WASM message listeners.
pub mod web_rpc;
