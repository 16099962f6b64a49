/// Camera clip planes used while the AR session drives the camera.
pub const AR_NEAR_CLIP: f32 = 0.01;
pub const AR_FAR_CLIP: f32 = 1000.0;

/// Clip planes the viewer starts with before any AR session.
pub const DEFAULT_NEAR_CLIP: f32 = 0.1;
pub const DEFAULT_FAR_CLIP: f32 = 1000.0;

/// Font size of the floating scale readout.
pub const READOUT_FONT_SIZE: f32 = 18.0;

/// Vertical offset of the readout above the projected scene origin (pixels).
pub const READOUT_SCREEN_OFFSET: f32 = 48.0;
