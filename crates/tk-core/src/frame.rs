use serde::{Deserialize, Serialize};

/// Byte value representing zero amplitude in a time-domain frame.
pub const BYTE_CENTER: u8 = 128;

/// Une trame d'analyse, produite à chaque tick de polling.
///
/// Pré-allouée une fois par session puis réécrite en place à chaque cycle.
///
/// # Example
/// ```
/// use tk_core::frame::AudioFrame;
/// let frame = AudioFrame::new(2048);
/// assert_eq!(frame.time_domain.len(), 2048);
/// assert_eq!(frame.frequency_domain.len(), 1024);
/// assert!(frame.time_domain.iter().all(|&s| s == 128));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioFrame {
    /// Unsigned 8-bit samples centered on 128, length = FFT size.
    pub time_domain: Vec<u8>,
    /// Unsigned 8-bit magnitudes, ascending frequency, length = FFT size / 2.
    pub frequency_domain: Vec<u8>,
}

impl AudioFrame {
    /// Crée une trame silencieuse pour la taille FFT donnée.
    #[must_use]
    pub fn new(fft_size: usize) -> Self {
        Self {
            time_domain: vec![BYTE_CENTER; fft_size],
            frequency_domain: vec![0; fft_size / 2],
        }
    }

    /// FFT size this frame was allocated for.
    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.time_domain.len()
    }

    /// Number of frequency bins.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.frequency_domain.len()
    }
}

/// Amplitude features of one frame.
///
/// # Example
/// ```
/// use tk_core::frame::FrameFeatures;
/// let f = FrameFeatures::default();
/// assert_eq!(f.effective_amplitude, 0.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameFeatures {
    /// Root mean square of the normalized samples [0.0, 1.0].
    pub rms: f32,
    /// Largest absolute normalized sample [0.0, 1.0].
    pub peak: f32,
    /// Peak-weighted blend `0.3 * rms + 0.7 * peak`.
    pub effective_amplitude: f32,
}

/// A single detected tick or tock.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pulse {
    /// Monotonic capture time since session start, in seconds.
    pub timestamp_seconds: f64,
    /// Blended amplitude score at detection time.
    pub magnitude: f32,
}

/// Timing statistic derived from two consecutive accepted pulses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Elapsed recording time at the closing pulse, `HH:MM:SS`.
    pub sequence_time: String,
    /// Milliseconds since the previous accepted pulse. Always > 0.
    pub interval_ms: f64,
    /// `60000 / interval_ms`.
    pub frequency_bpm: f64,
    /// Percent deviation from the rolling average interval.
    pub deviation_pct: f64,
    /// Timestamp of the pulse that closed the interval, in seconds.
    pub timestamp_seconds: f64,
}

/// Why a transient was not turned into an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Amplitude crossing inside the refractory window of the previous pulse.
    Refractory,
    /// Pulse whose interval fell below the plausibility floor.
    Implausible,
}

/// A rejected transient, reported to the debug hook only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseArtifact {
    /// Which gate rejected it.
    pub kind: ArtifactKind,
    /// Time of the rejected transient, in seconds.
    pub timestamp_seconds: f64,
    /// Amplitude score of the rejected transient.
    pub magnitude: f32,
    /// Milliseconds since the last accepted event at the rejecting stage.
    pub since_last_ms: f64,
}
