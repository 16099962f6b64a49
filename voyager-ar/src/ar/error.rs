use crate::platform::SessionId;
use thiserror::Error;

/// Failures inside the AR subsystem.
///
/// None of these escape to the host application. The Bevy glue turns each one
/// into an [`ArNotice`](super::session::ArNotice) and leaves the output flags false.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArError {
    /// Neither WebXR nor a native AR fallback is available on this device.
    #[error("augmented reality is not available on this device")]
    CapabilityAbsent,

    /// No model in the scene carries an AR-quality derivative.
    #[error("no AR-quality derivative found for any model in the scene")]
    NoArDerivative,

    /// The viewer has no active camera to hand over to the AR session.
    #[error("no active camera found in the scene")]
    MissingCamera,

    /// The platform refused or blocked the session request.
    #[error("AR session request was rejected: {reason}")]
    SessionRejected { reason: String },

    /// A continuation arrived for a session that is no longer current.
    #[error("stale continuation for session {got:?} (current: {expected:?})")]
    StaleContinuation {
        expected: Option<SessionId>,
        got: SessionId,
    },

    /// A message from the WebXR shim could not be understood.
    #[error("XR bridge error: {0}")]
    Bridge(String),
}
