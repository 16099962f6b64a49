/// Downward tilt of the initial viewer-anchored hit-test ray, in degrees.
pub const INITIAL_HIT_TEST_TILT_DEGREES: f32 = 20.0;

/// A hit whose local +Y has a vertical component above this is a floor-like surface.
/// The boundary value itself counts as non-upward.
pub const UPWARD_NORMAL_THRESHOLD: f32 = 0.75;

/// Distance multiplier applied to the bounding radius while the scene floats in front
/// of the camera before first placement.
pub const PREVIEW_DISTANCE_RADIUS_FACTOR: f32 = 2.5;

/// Lower bound for the floating preview distance (metres).
pub const PREVIEW_MIN_DISTANCE: f32 = 0.5;

/// Input profile requested for the transient hit-test source.
pub const TRANSIENT_INPUT_PROFILE: &str = "generic-touchscreen";

/// Hit plane extent as a multiple of the object's footprint.
pub const HIT_PLANE_EXTENT_FACTOR: f32 = 2.0;

/// Hit plane thickness used by the slab test (metres).
pub const HIT_PLANE_THICKNESS: f32 = 0.002;

/// Selection ring outer radius as a multiple of the footprint half-diagonal.
pub const SELECTION_RING_RADIUS_FACTOR: f32 = 1.1;

/// Selection ring width relative to its outer radius.
pub const SELECTION_RING_WIDTH_FACTOR: f32 = 0.08;
