/// Yaw applied per unit of normalised horizontal screen drag (radians).
pub const ROTATION_RATE: f32 = 1.5;

/// Step used while rotation snapping is held (radians, 90 degrees).
pub const ROTATION_SNAP_STEP: f32 = std::f32::consts::FRAC_PI_2;

/// Scale factors strictly inside this band commit as exactly 1.0.
pub const SCALE_SNAP_MIN: f32 = 0.9;
pub const SCALE_SNAP_MAX: f32 = 1.1;

/// Hard limits for the committed scale factor.
pub const SCALE_MIN: f32 = 0.01;
pub const SCALE_MAX: f32 = 100.0;

/// Accumulated translate drag (metres) below which a touch is treated as a tap.
pub const TRANSLATE_DRAG_THRESHOLD: f32 = 0.01;

/// Minimum two-finger separation (normalised screen units) accepted as a scale baseline.
pub const MIN_FINGER_SEPARATION: f32 = 1e-3;

/// Seconds for the scale readout to fade out after a scale gesture ends.
pub const READOUT_FADE_SECONDS: f32 = 0.5;
