use tk_core::config::{DetectorConfig, HARD_MIN_INTER_ARRIVAL_MS};
use tk_core::frame::{ArtifactKind, NoiseArtifact, Pulse};

/// Share of the previous interval the adaptive refractory window tracks.
pub const ADAPTIVE_RATIO: f64 = 0.6;

/// Detector lifecycle. Refractory behavior is a guard, not a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorState {
    /// No session: frames are ignored.
    Idle,
    /// Session active, waiting for the next transient.
    Armed,
}

/// Outcome of one frame evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Detection {
    /// Detector not armed.
    Idle,
    /// Amplitude below the threshold.
    Quiet,
    /// Accepted transient.
    Pulse(Pulse),
    /// Transient rejected by the refractory gate.
    Artifact(NoiseArtifact),
}

/// Pulse detector: amplitude gate + refractory gate.
///
/// A frame yields a pulse when its blended amplitude exceeds
/// `detection_threshold * 0.7` and more than the refractory window has
/// elapsed since the previous pulse. The refractory gate keeps the decaying
/// ring-down of one mechanical impact from triggering twice.
///
/// # Example
/// ```
/// use tk_audio::detector::{Detection, PulseDetector};
/// use tk_core::config::DetectorConfig;
///
/// let config = DetectorConfig::default();
/// let mut detector = PulseDetector::new();
/// detector.arm();
/// assert!(matches!(detector.evaluate(0.5, &config, 0.0), Detection::Pulse(_)));
/// assert!(matches!(detector.evaluate(0.5, &config, 40.0), Detection::Artifact(_)));
/// assert!(matches!(detector.evaluate(0.5, &config, 520.0), Detection::Pulse(_)));
/// ```
pub struct PulseDetector {
    state: DetectorState,
    /// Time of the last emitted pulse, in ms.
    last_pulse_ms: Option<f64>,
    /// Interval between the last two emitted pulses, in ms.
    last_interval_ms: Option<f64>,
    pulses: u64,
    artifacts: u64,
}

impl PulseDetector {
    /// Create an idle detector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: DetectorState::Idle,
            last_pulse_ms: None,
            last_interval_ms: None,
            pulses: 0,
            artifacts: 0,
        }
    }

    /// Start a session: forget previous pulses and accept frames.
    pub fn arm(&mut self) {
        self.last_pulse_ms = None;
        self.last_interval_ms = None;
        self.pulses = 0;
        self.artifacts = 0;
        self.state = DetectorState::Armed;
    }

    /// End the session. Later frames are ignored.
    pub fn disarm(&mut self) {
        self.state = DetectorState::Idle;
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Pulses emitted since `arm()`.
    #[must_use]
    pub fn pulse_count(&self) -> u64 {
        self.pulses
    }

    /// Refractory rejections since `arm()`.
    #[must_use]
    pub fn artifact_count(&self) -> u64 {
        self.artifacts
    }

    /// Refractory window in force for the next frame, in ms.
    ///
    /// With `adaptive_refractory`, shrinks toward `0.6 ×` the previous interval
    /// but never below the configured floor's hard limit (50 ms) and never
    /// above the configured value.
    #[must_use]
    pub fn refractory_ms(&self, config: &DetectorConfig) -> f64 {
        let floor = config.refractory_floor_ms();
        match (config.adaptive_refractory, self.last_interval_ms) {
            (true, Some(interval)) => (interval * ADAPTIVE_RATIO)
                .min(floor)
                .max(HARD_MIN_INTER_ARRIVAL_MS),
            _ => floor,
        }
    }

    /// Evaluate one frame.
    ///
    /// `now_ms` is monotonic session time; `config` is the snapshot for this frame.
    pub fn evaluate(&mut self, effective_amplitude: f32, config: &DetectorConfig, now_ms: f64) -> Detection {
        if self.state == DetectorState::Idle {
            return Detection::Idle;
        }

        if effective_amplitude <= config.effective_threshold() {
            return Detection::Quiet;
        }

        if let Some(last) = self.last_pulse_ms {
            let since_last = now_ms - last;
            let refractory = self.refractory_ms(config);
            if since_last <= refractory {
                self.artifacts += 1;
                let artifact = NoiseArtifact {
                    kind: ArtifactKind::Refractory,
                    timestamp_seconds: now_ms / 1000.0,
                    magnitude: effective_amplitude,
                    since_last_ms: since_last,
                };
                log::trace!(
                    "Transitoire ignoré : {since_last:.0}ms < {refractory:.0}ms (amplitude {effective_amplitude:.3})"
                );
                return Detection::Artifact(artifact);
            }
            self.last_interval_ms = Some(since_last);
        }

        self.last_pulse_ms = Some(now_ms);
        self.pulses += 1;
        log::debug!(
            "Pulse détecté : amplitude {effective_amplitude:.3}, seuil {:.3}",
            config.effective_threshold()
        );

        Detection::Pulse(Pulse {
            timestamp_seconds: now_ms / 1000.0,
            magnitude: effective_amplitude,
        })
    }
}

impl Default for PulseDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed() -> PulseDetector {
        let mut detector = PulseDetector::new();
        detector.arm();
        detector
    }

    fn pulses(detections: &[Detection]) -> usize {
        detections
            .iter()
            .filter(|d| matches!(d, Detection::Pulse(_)))
            .count()
    }

    #[test]
    fn idle_detector_never_fires() {
        let mut detector = PulseDetector::new();
        let config = DetectorConfig::default();
        assert_eq!(detector.evaluate(1.0, &config, 0.0), Detection::Idle);

        detector.arm();
        detector.disarm();
        assert_eq!(detector.evaluate(1.0, &config, 500.0), Detection::Idle);
        assert_eq!(detector.state(), DetectorState::Idle);
    }

    #[test]
    fn threshold_is_softened_and_strict() {
        let config = DetectorConfig::new(0.5, 0.0);
        let mut detector = armed();
        // 0.5 * 0.7 = 0.35, equality does not trigger
        assert_eq!(detector.evaluate(0.35, &config, 0.0), Detection::Quiet);
        assert!(matches!(detector.evaluate(0.36, &config, 16.0), Detection::Pulse(_)));
    }

    #[test]
    fn one_pulse_per_spike() {
        let config = DetectorConfig::default();
        let mut detector = armed();
        let mut detections = Vec::new();
        // 60Hz frames, spikes every 500ms, each spike visible for 3 frames
        for frame in 0..300u32 {
            let now = f64::from(frame) * 1000.0 / 60.0;
            let phase = frame % 30;
            let amplitude = if phase < 3 { 0.6 } else { 0.01 };
            detections.push(detector.evaluate(amplitude, &config, now));
        }
        assert_eq!(pulses(&detections), 10);
        assert_eq!(detector.pulse_count(), 10);
        assert_eq!(detector.artifact_count(), 20);
    }

    #[test]
    fn close_spikes_yield_one_pulse() {
        let config = DetectorConfig::default();
        let mut detector = armed();
        let first = detector.evaluate(0.3, &config, 1000.0);
        let second = detector.evaluate(0.99, &config, 1080.0);
        assert!(matches!(first, Detection::Pulse(_)));
        match second {
            Detection::Artifact(a) => {
                assert_eq!(a.kind, ArtifactKind::Refractory);
                assert!((a.since_last_ms - 80.0).abs() < 1e-9);
            }
            other => panic!("expected artifact, got {other:?}"),
        }
    }

    #[test]
    fn pulse_carries_timestamp_and_magnitude() {
        let config = DetectorConfig::default();
        let mut detector = armed();
        match detector.evaluate(0.42, &config, 1500.0) {
            Detection::Pulse(p) => {
                assert!((p.timestamp_seconds - 1.5).abs() < 1e-12);
                assert!((p.magnitude - 0.42).abs() < f32::EPSILON);
            }
            other => panic!("expected pulse, got {other:?}"),
        }
    }

    #[test]
    fn adaptive_window_tracks_fast_clock_within_bounds() {
        let config = DetectorConfig {
            min_inter_arrival_ms: 300.0,
            adaptive_refractory: true,
            ..DetectorConfig::default()
        };
        let mut detector = armed();
        assert!((detector.refractory_ms(&config) - 300.0).abs() < 1e-9);

        let _ = detector.evaluate(0.5, &config, 0.0);
        let _ = detector.evaluate(0.5, &config, 350.0);
        // 0.6 * 350 = 210
        assert!((detector.refractory_ms(&config) - 210.0).abs() < 1e-9);
        // 250ms later passes the adapted gate, would fail the static one
        assert!(matches!(detector.evaluate(0.5, &config, 600.0), Detection::Pulse(_)));

        let static_config = DetectorConfig {
            adaptive_refractory: false,
            ..config.clone()
        };
        assert!((detector.refractory_ms(&static_config) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn adaptive_window_respects_hard_floor() {
        let config = DetectorConfig {
            adaptive_refractory: true,
            ..DetectorConfig::default()
        };
        let mut detector = armed();
        let _ = detector.evaluate(0.5, &config, 0.0);
        let _ = detector.evaluate(0.5, &config, 101.0);
        // 0.6 * 101 = 60.6, below the configured 100, above 50
        assert!((detector.refractory_ms(&config) - 60.6).abs() < 1e-9);

        let mut detector = armed();
        let _ = detector.evaluate(0.5, &config, 0.0);
        let _ = detector.evaluate(0.5, &config, 101.0);
        let _ = detector.evaluate(0.5, &config, 162.0);
        // 0.6 * 61 = 36.6 -> 50
        assert!((detector.refractory_ms(&config) - HARD_MIN_INTER_ARRIVAL_MS).abs() < 1e-9);
    }

    #[test]
    fn arm_resets_history() {
        let config = DetectorConfig::default();
        let mut detector = armed();
        let _ = detector.evaluate(0.5, &config, 0.0);
        detector.arm();
        assert_eq!(detector.pulse_count(), 0);
        assert!(matches!(detector.evaluate(0.5, &config, 10.0), Detection::Pulse(_)));
    }
}
