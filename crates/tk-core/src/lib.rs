/// Configuration, types, and shared structures for ticktock.
///
/// This crate contains the event types exchanged between the analysis
/// pipeline and its collaborators, the detector configuration, and the
/// listener / source traits used across the ticktock workspace.

pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod traits;

pub use clock::SessionClock;
pub use config::{AppConfig, DetectorConfig};
pub use error::CoreError;
pub use frame::{AudioFrame, FrameFeatures, Measurement, NoiseArtifact, Pulse};
pub use traits::{EventListener, SampleSource};

/// Re-exports for event types.
pub mod events {
    pub use crate::frame::{ArtifactKind, Measurement, NoiseArtifact, Pulse};
}
