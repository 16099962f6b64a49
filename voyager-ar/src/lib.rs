//! Voyager AR: WebXR placement and gesture manipulation for the Voyager viewer.

/// AR session manager, hit testing, gestures, contact shadow and Bevy glue.
pub mod ar;

/// XR device seam and its implementations.
pub mod platform;

/// JSON-RPC bridge to the host page.
pub mod rpc;

/// Viewer collaborators: bounds, models, setup features.
pub mod scene;
