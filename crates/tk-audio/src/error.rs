use thiserror::Error;
use tk_core::CoreError;

/// Errors originating from the audio module.
#[derive(Error, Debug)]
pub enum AudioError {
    /// The requested input cannot be opened (missing, removed, permission denied).
    #[error("Périphérique audio indisponible '{device}' : {reason}")]
    DeviceUnavailable {
        /// Selector passed to `start()`; empty for the default device.
        device: String,
        /// Backend explanation.
        reason: String,
    },

    /// `start()` called while a session is already running.
    #[error("Session déjà démarrée")]
    AlreadyRunning,

    /// Audio stream error.
    #[error("Erreur de stream audio : {0}")]
    StreamError(String),

    /// Invalid acquisition settings.
    #[error(transparent)]
    Config(#[from] CoreError),
}

impl AudioError {
    pub(crate) fn unavailable(device: &str, reason: impl std::fmt::Display) -> Self {
        Self::DeviceUnavailable {
            device: device.to_string(),
            reason: reason.to_string(),
        }
    }
}
