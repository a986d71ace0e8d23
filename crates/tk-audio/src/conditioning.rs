use biquad::{Biquad, Coefficients, DirectForm1, ToHertz, Type};
use tk_core::config::AcquisitionConfig;

/// Pre-conditioning applied to the raw stream before analysis: input gain,
/// then an optional wide band-pass around the tick/tock envelope.
///
/// Stateful: samples must be fed in stream order.
///
/// # Example
/// ```
/// use tk_audio::conditioning::SignalConditioner;
/// use tk_core::config::AcquisitionConfig;
///
/// let settings = AcquisitionConfig { bandpass_enabled: false, ..Default::default() };
/// let mut conditioner = SignalConditioner::new(&settings, 44100);
/// let mut samples = vec![0.25f32; 8];
/// conditioner.process(&mut samples, 2.0);
/// assert!(samples.iter().all(|&s| (s - 0.5).abs() < 1e-6));
/// ```
pub struct SignalConditioner {
    bandpass: Option<DirectForm1<f32>>,
}

impl SignalConditioner {
    /// Build the conditioning chain for the given sample rate.
    ///
    /// An impossible band-pass (center above Nyquist) is logged and skipped.
    #[must_use]
    pub fn new(settings: &AcquisitionConfig, sample_rate: u32) -> Self {
        let bandpass = if settings.bandpass_enabled {
            make_bandpass(sample_rate as f32, settings.bandpass_center_hz, settings.bandpass_q)
        } else {
            None
        };
        Self { bandpass }
    }

    /// `true` if the band-pass stage is active.
    #[must_use]
    pub fn has_bandpass(&self) -> bool {
        self.bandpass.is_some()
    }

    /// Apply gain then band-pass to `samples` in place.
    #[inline]
    pub fn process(&mut self, samples: &mut [f32], gain: f32) {
        match self.bandpass.as_mut() {
            Some(filter) => {
                for s in samples.iter_mut() {
                    *s = filter.run(*s * gain);
                }
            }
            None => {
                for s in samples.iter_mut() {
                    *s *= gain;
                }
            }
        }
    }

    /// Forget filter history (new session).
    pub fn reset(&mut self) {
        if let Some(filter) = self.bandpass.as_mut() {
            filter.reset_state();
        }
    }
}

fn make_bandpass(fs: f32, center: f32, q: f32) -> Option<DirectForm1<f32>> {
    match Coefficients::<f32>::from_params(Type::BandPass, fs.hz(), center.hz(), q) {
        Ok(coeffs) => Some(DirectForm1::<f32>::new(coeffs)),
        Err(e) => {
            log::warn!("Passe-bande {center}Hz (Q={q}) impossible @ {fs}Hz : {e:?}, filtre désactivé");
            None
        }
    }
}
