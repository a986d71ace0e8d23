use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Referenced file does not exist.
    #[error("Fichier introuvable : {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },

    /// FFT size outside the supported range or not a power of two.
    #[error("Taille FFT invalide : {size}")]
    InvalidFftSize {
        /// The rejected size.
        size: usize,
    },
}
