//! Host-side collaborators the AR subsystem reads and temporarily overrides.
//!
//! None of these know about AR. The viewer owns them; the AR manager only
//! snapshots and restores them through the feature toggler.

/// Axis-aligned scene bounds used for framing and placement.
pub mod bounds;

/// Model components, derivative lists and the JSON model manifest.
pub mod model;

/// Orbit navigation for the viewer camera.
pub mod orbit;

/// Viewer "setup" aggregate: floor, grid, tape, slicer and friends.
pub mod setup;

use bevy::prelude::*;

/// Root node carrying the whole viewer scene. AR moves, rotates and scales this node.
#[derive(Component)]
pub struct ArSceneRoot;

/// Node holding the scene lights. Counter-rotated while AR rotates the scene.
#[derive(Component)]
pub struct ArLightRig;

/// Camera the viewer renders with. AR takes it over while a session runs.
#[derive(Component)]
pub struct ViewerCamera;
