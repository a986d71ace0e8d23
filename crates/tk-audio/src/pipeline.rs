use tk_core::config::{AppConfig, DetectorConfig};
use tk_core::frame::{AudioFrame, FrameFeatures, Measurement, Pulse};
use tk_core::EventListener;

use crate::analyser::ByteAnalyser;
use crate::conditioning::SignalConditioner;
use crate::detector::{Detection, PulseDetector};
use crate::error::AudioError;
use crate::features::extract_features;
use crate::history::FrequencyHistory;
use crate::stats::{IntervalOutcome, IntervalTracker, StatsSnapshot};

/// What one analysis cycle produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleOutput {
    /// Amplitude features of the frame.
    pub features: FrameFeatures,
    /// Accepted detection, if any.
    pub pulse: Option<Pulse>,
    /// Interval closed by that detection, if any.
    pub measurement: Option<Measurement>,
    /// Counters or aggregates moved: pulse, artifact or discard.
    pub stats_changed: bool,
}

/// Synchronous analysis chain, one call per polling tick.
///
/// conditioning → analyser → features → detector → statistics. Owns every
/// buffer it needs; nothing is allocated per cycle except published copies.
///
/// # Example
/// ```
/// use tk_audio::pipeline::AnalysisPipeline;
/// use tk_core::config::AppConfig;
///
/// let config = AppConfig::default();
/// let mut pipeline = AnalysisPipeline::new(&config, 44100).unwrap();
/// pipeline.arm();
/// let out = pipeline.run_cycle(&[0.0; 735], &config.detector, 16.7, &mut []);
/// assert!(out.pulse.is_none());
/// ```
pub struct AnalysisPipeline {
    conditioner: SignalConditioner,
    analyser: ByteAnalyser,
    frame: AudioFrame,
    history: FrequencyHistory,
    detector: PulseDetector,
    tracker: IntervalTracker,
    combined_spectrogram: bool,
    scratch: Vec<f32>,
}

impl AnalysisPipeline {
    /// Build the chain for a stream at `sample_rate`.
    ///
    /// # Errors
    /// Returns `AudioError::Config` if the FFT size is not usable.
    pub fn new(config: &AppConfig, sample_rate: u32) -> Result<Self, AudioError> {
        let acquisition = &config.acquisition;
        let analyser = ByteAnalyser::new(acquisition.fft_size)?;
        let frame = AudioFrame::new(analyser.fft_size());
        Ok(Self {
            conditioner: SignalConditioner::new(acquisition, sample_rate),
            analyser,
            frame,
            history: FrequencyHistory::new(acquisition.history_depth),
            detector: PulseDetector::new(),
            tracker: IntervalTracker::new(&config.stats),
            combined_spectrogram: acquisition.combined_spectrogram,
            scratch: Vec::with_capacity(acquisition.fft_size),
        })
    }

    /// Start a recording: clear every buffer and arm the detector.
    pub fn arm(&mut self) {
        self.conditioner.reset();
        self.analyser.reset();
        self.history.clear();
        self.tracker.reset();
        self.detector.arm();
    }

    /// Stop accepting pulses. Statistics stay readable.
    pub fn disarm(&mut self) {
        self.detector.disarm();
    }

    /// Latest rendered frame.
    #[must_use]
    pub fn frame(&self) -> &AudioFrame {
        &self.frame
    }

    /// Run one cycle on the samples captured since the previous one.
    ///
    /// `config` is this cycle's snapshot, `now_ms` the session time of the
    /// newest sample. Listeners are called in order, on the calling thread.
    pub fn run_cycle(
        &mut self,
        samples: &[f32],
        config: &DetectorConfig,
        now_ms: f64,
        listeners: &mut [Box<dyn EventListener>],
    ) -> CycleOutput {
        self.scratch.clear();
        self.scratch.extend_from_slice(samples);
        self.conditioner.process(&mut self.scratch, config.gain());
        self.analyser.push_samples(&self.scratch);
        self.analyser.render(&mut self.frame);
        self.history.push(&self.frame.frequency_domain);

        if self.combined_spectrogram {
            let grid = self.history.combined(self.frame.bin_count());
            for listener in listeners.iter_mut() {
                listener.on_frequency_frame(&grid);
            }
        } else {
            for listener in listeners.iter_mut() {
                listener.on_frequency_frame(&self.frame.frequency_domain);
            }
        }
        for listener in listeners.iter_mut() {
            listener.on_waveform_frame(&self.frame.time_domain);
        }

        let features = extract_features(&self.frame.time_domain);
        for listener in listeners.iter_mut() {
            listener.on_features(&features);
        }

        let mut output = CycleOutput {
            features,
            ..CycleOutput::default()
        };

        match self.detector.evaluate(features.effective_amplitude, config, now_ms) {
            Detection::Idle | Detection::Quiet => {}
            Detection::Artifact(artifact) => {
                output.stats_changed = true;
                for listener in listeners.iter_mut() {
                    listener.on_noise_artifact(&artifact);
                }
            }
            Detection::Pulse(pulse) => {
                output.stats_changed = true;
                for listener in listeners.iter_mut() {
                    listener.on_pulse(&pulse);
                }
                output.pulse = Some(pulse);
                match self.tracker.push(&pulse) {
                    IntervalOutcome::First => {}
                    IntervalOutcome::Discarded(artifact) => {
                        for listener in listeners.iter_mut() {
                            listener.on_noise_artifact(&artifact);
                        }
                    }
                    IntervalOutcome::Measured(measurement) => {
                        log::info!(
                            "{} | {:.1}ms | {:.2} bpm | {:+.2}%",
                            measurement.sequence_time,
                            measurement.interval_ms,
                            measurement.frequency_bpm,
                            measurement.deviation_pct
                        );
                        for listener in listeners.iter_mut() {
                            listener.on_measurement(&measurement);
                        }
                        output.measurement = Some(measurement);
                    }
                }
            }
        }

        output
    }

    /// Read-only statistics for collaborators.
    #[must_use]
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            session: self.tracker.session_stats(),
            window: self.tracker.window_stats(),
            measurements: self.tracker.measurement_count(),
            discarded: self.tracker.discarded_count(),
            artifacts: self.detector.artifact_count(),
        }
    }
}
