use ar_constants::render_settings::{DEFAULT_FAR_CLIP, DEFAULT_NEAR_CLIP};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderMode {
    #[default]
    Default,
    Clay,
    Normals,
    Wireframe,
    Xray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Millimeters,
    Centimeters,
    #[default]
    Meters,
    Inches,
    Feet,
}

/// Viewer feature switches that AR has to suspend while it owns the scene.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupFeatures {
    pub floor_visible: bool,
    pub grid_visible: bool,
    pub tape_enabled: bool,
    pub slicer_enabled: bool,
    pub shader_mode: ShaderMode,
    pub annotations_visible: bool,
    /// Orbit navigation input. Disabled while AR drives the scene transform.
    pub navigation_enabled: bool,
    pub units: UnitType,
}

impl Default for SetupFeatures {
    fn default() -> Self {
        Self {
            floor_visible: true,
            grid_visible: false,
            tape_enabled: false,
            slicer_enabled: false,
            shader_mode: ShaderMode::Default,
            annotations_visible: true,
            navigation_enabled: true,
            units: UnitType::Meters,
        }
    }
}

/// Near/far clip distances of the viewer camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlanes {
    pub near: f32,
    pub far: f32,
}

impl Default for ClipPlanes {
    fn default() -> Self {
        Self {
            near: DEFAULT_NEAR_CLIP,
            far: DEFAULT_FAR_CLIP,
        }
    }
}
