/// Exponent of the sharpest shadow map resolution (2^9 = 512 texels).
pub const SHADOW_RESOLUTION_MAX_EXPONENT: f32 = 9.0;

/// Exponent range spanned by softness 0..1 (512 down to 64 texels).
pub const SHADOW_RESOLUTION_EXPONENT_RANGE: f32 = 3.0;

/// Padding added around the object footprint when framing the shadow camera.
pub const SHADOW_FRAME_PADDING: f32 = 1.2;

/// Near plane of the unscaled shadow camera (metres).
pub const SHADOW_CAMERA_NEAR: f32 = 0.01;

/// Extra depth below the object covered by the unscaled shadow camera (metres).
pub const SHADOW_CAMERA_DEPTH_MARGIN: f32 = 0.05;

/// Height of the shadow light above the object's top face (metres, unscaled).
pub const SHADOW_LIGHT_CLEARANCE: f32 = 0.1;

/// Lift of the shadow-receiving plane above the surface to avoid z-fighting (metres).
pub const SHADOW_PLANE_LIFT: f32 = 0.001;

/// Default contact shadow settings.
pub const DEFAULT_SHADOW_SOFTNESS: f32 = 0.5;
pub const DEFAULT_SHADOW_INTENSITY: f32 = 0.5;

/// Viewer-to-object distance covered by the shadow cascade on top of the
/// shadow camera's own depth (metres).
pub const SHADOW_VIEWER_REACH: f32 = 4.0;

/// Illuminance of the contact shadow light (lux). Just enough for the
/// receiving plane to show the shadow without washing out the model.
pub const SHADOW_LIGHT_ILLUMINANCE: f32 = 300.0;
