use std::time::Duration;

use flume::{Receiver, Sender, TrySendError};
use tk_core::EventListener;
use tk_core::frame::{FrameFeatures, Measurement, NoiseArtifact, Pulse};

/// Event published by a running session, in channel form.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Raw bins or combined history grid.
    FrequencyFrame(Vec<u8>),
    /// Raw time-domain bytes.
    WaveformFrame(Vec<u8>),
    /// Amplitude features of the frame.
    Features(FrameFeatures),
    /// Accepted detection.
    Pulse(Pulse),
    /// Accepted interval.
    Measurement(Measurement),
    /// Rejected transient.
    NoiseArtifact(NoiseArtifact),
    /// No samples for the given duration.
    StreamStalled(Duration),
}

/// Listener forwarding events into a bounded `flume` channel.
///
/// Never blocks the analysis loop: when the channel is full the event is
/// dropped. Per-frame events (frames, features, artifacts) are opt-in.
///
/// # Example
/// ```
/// use tk_audio::events::{ChannelListener, SessionEvent};
/// use tk_core::EventListener;
/// use tk_core::frame::Pulse;
///
/// let (mut listener, rx) = ChannelListener::bounded(16);
/// let pulse = Pulse { timestamp_seconds: 1.0, magnitude: 0.3 };
/// listener.on_pulse(&pulse);
/// listener.on_waveform_frame(&[128; 8]);
/// assert_eq!(rx.try_recv().ok(), Some(SessionEvent::Pulse(pulse)));
/// assert!(rx.try_recv().is_err());
/// ```
pub struct ChannelListener {
    tx: Sender<SessionEvent>,
    frames: bool,
    features: bool,
    artifacts: bool,
    dropped: u64,
}

impl ChannelListener {
    /// Listener publishing pulses, measurements and stalls.
    #[must_use]
    pub fn new(tx: Sender<SessionEvent>) -> Self {
        Self {
            tx,
            frames: false,
            features: false,
            artifacts: false,
            dropped: 0,
        }
    }

    /// Create a listener and its bounded receiver.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Receiver<SessionEvent>) {
        let (tx, rx) = flume::bounded(capacity);
        (Self::new(tx), rx)
    }

    /// Also publish frequency and waveform frames.
    #[must_use]
    pub fn with_frames(mut self) -> Self {
        self.frames = true;
        self
    }

    /// Also publish per-frame features.
    #[must_use]
    pub fn with_features(mut self) -> Self {
        self.features = true;
        self
    }

    /// Also publish noise artifacts.
    #[must_use]
    pub fn with_artifacts(mut self) -> Self {
        self.artifacts = true;
        self
    }

    /// Events dropped because the channel was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn send(&mut self, event: SessionEvent) {
        match self.tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                log::trace!("Canal plein, événement ignoré ({} au total)", self.dropped);
            }
        }
    }
}

impl EventListener for ChannelListener {
    fn on_frequency_frame(&mut self, frame: &[u8]) {
        if self.frames {
            self.send(SessionEvent::FrequencyFrame(frame.to_vec()));
        }
    }

    fn on_waveform_frame(&mut self, frame: &[u8]) {
        if self.frames {
            self.send(SessionEvent::WaveformFrame(frame.to_vec()));
        }
    }

    fn on_features(&mut self, features: &FrameFeatures) {
        if self.features {
            self.send(SessionEvent::Features(*features));
        }
    }

    fn on_pulse(&mut self, pulse: &Pulse) {
        self.send(SessionEvent::Pulse(*pulse));
    }

    fn on_measurement(&mut self, measurement: &Measurement) {
        self.send(SessionEvent::Measurement(measurement.clone()));
    }

    fn on_noise_artifact(&mut self, artifact: &NoiseArtifact) {
        if self.artifacts {
            self.send(SessionEvent::NoiseArtifact(*artifact));
        }
    }

    fn on_stream_stalled(&mut self, silent_for: Duration) {
        self.send(SessionEvent::StreamStalled(silent_for));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (mut listener, rx) = ChannelListener::bounded(1);
        let pulse = Pulse {
            timestamp_seconds: 0.0,
            magnitude: 0.5,
        };
        listener.on_pulse(&pulse);
        listener.on_pulse(&pulse);
        assert_eq!(listener.dropped(), 1);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn opt_in_streams() {
        let (listener, rx) = ChannelListener::bounded(8);
        let mut listener = listener.with_frames().with_features();
        listener.on_frequency_frame(&[1, 2, 3]);
        listener.on_features(&FrameFeatures::default());
        listener.on_noise_artifact(&NoiseArtifact {
            kind: tk_core::events::ArtifactKind::Refractory,
            timestamp_seconds: 0.0,
            magnitude: 0.2,
            since_last_ms: 10.0,
        });
        let events: Vec<SessionEvent> = rx.drain().collect();
        assert_eq!(
            events,
            vec![
                SessionEvent::FrequencyFrame(vec![1, 2, 3]),
                SessionEvent::Features(FrameFeatures::default()),
            ]
        );
    }

    #[test]
    fn disconnected_receiver_is_harmless() {
        let (mut listener, rx) = ChannelListener::bounded(1);
        drop(rx);
        listener.on_stream_stalled(Duration::from_secs(3));
        assert_eq!(listener.dropped(), 0);
    }
}
