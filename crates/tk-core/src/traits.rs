use std::time::Duration;

use crate::frame::{FrameFeatures, Measurement, NoiseArtifact, Pulse};

/// Reçoit les événements publiés par la boucle d'analyse.
///
/// Toutes les méthodes ont une implémentation vide : un listener n'implémente
/// que ce qui l'intéresse. Appelé uniquement depuis le thread d'analyse.
///
/// # Example
/// ```
/// use tk_core::traits::EventListener;
/// use tk_core::frame::Pulse;
///
/// #[derive(Default)]
/// struct PulseCounter(usize);
/// impl EventListener for PulseCounter {
///     fn on_pulse(&mut self, _pulse: &Pulse) { self.0 += 1; }
/// }
///
/// let mut counter = PulseCounter::default();
/// counter.on_pulse(&Pulse { timestamp_seconds: 0.5, magnitude: 0.4 });
/// counter.on_waveform_frame(&[128; 16]);
/// assert_eq!(counter.0, 1);
/// ```
pub trait EventListener: Send {
    /// Frequency frame: raw bins, or the combined history grid (row-major).
    fn on_frequency_frame(&mut self, _frame: &[u8]) {}

    /// Raw time-domain bytes of the current frame.
    fn on_waveform_frame(&mut self, _frame: &[u8]) {}

    /// Amplitude features of the current frame.
    fn on_features(&mut self, _features: &FrameFeatures) {}

    /// Accepted detection.
    fn on_pulse(&mut self, _pulse: &Pulse) {}

    /// Accepted interval.
    fn on_measurement(&mut self, _measurement: &Measurement) {}

    /// Rejected transient (tuning hook).
    fn on_noise_artifact(&mut self, _artifact: &NoiseArtifact) {}

    /// No samples for `silent_for`. Fired once per stall.
    fn on_stream_stalled(&mut self, _silent_for: Duration) {}
}

/// Fournit des échantillons audio mono au pipeline.
///
/// Implémenté par : `AudioCapture` (cpal) et les sources synthétiques des tests.
///
/// # Example
/// ```
/// use tk_core::traits::SampleSource;
///
/// struct Silence;
/// impl SampleSource for Silence {
///     fn read_samples(&mut self, out: &mut Vec<f32>) -> usize { out.clear(); 0 }
///     fn sample_rate(&self) -> u32 { 44100 }
/// }
/// ```
pub trait SampleSource: Send {
    /// Remplace le contenu de `out` par les échantillons disponibles.
    ///
    /// Ne bloque JAMAIS. Retourne le nombre d'échantillons lus.
    fn read_samples(&mut self, out: &mut Vec<f32>) -> usize;

    /// Sample rate of the produced samples.
    fn sample_rate(&self) -> u32;

    /// Release the underlying input. Called once by the session on teardown.
    fn close(&mut self) {}
}
