use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use tk_core::config::AcquisitionConfig;
use tk_core::error::CoreError;
use tk_core::frame::AudioFrame;

/// Lower bound of the byte magnitude scale, in dB.
pub const MIN_DECIBELS: f32 = -100.0;
/// Upper bound of the byte magnitude scale, in dB.
pub const MAX_DECIBELS: f32 = -30.0;
/// Temporal smoothing of magnitudes between frames.
pub const SMOOTHING_TIME_CONSTANT: f32 = 0.5;

/// Byte analyser: keeps the last `fft_size` conditioned samples and renders
/// them into an `AudioFrame` (time-domain bytes + smoothed dB magnitudes).
///
/// Pre-allocates the FFT plan and scratch buffers for zero-allocation hot path.
///
/// # Example
/// ```
/// use tk_audio::analyser::ByteAnalyser;
/// use tk_core::frame::AudioFrame;
///
/// let mut analyser = ByteAnalyser::new(256).unwrap();
/// let mut frame = AudioFrame::new(256);
/// analyser.push_samples(&[0.5; 256]);
/// analyser.render(&mut frame);
/// assert_eq!(frame.time_domain[0], 192);
/// ```
pub struct ByteAnalyser {
    fft_size: usize,
    /// Circular sample window, oldest sample at `write_pos`.
    window_buf: Vec<f32>,
    write_pos: usize,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    plan: Arc<dyn RealToComplex<f32>>,
    /// Blackman window coefficients.
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl ByteAnalyser {
    /// Create an analyser with the given FFT size.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidFftSize` if the size is not a supported power of two.
    pub fn new(fft_size: usize) -> Result<Self, CoreError> {
        let fft_size = AcquisitionConfig::validate_fft_size(fft_size)?;

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);

        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        let n = fft_size as f32;
        let window = (0..fft_size)
            .map(|i| {
                let x = 2.0 * std::f32::consts::PI * i as f32 / n;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();

        Ok(Self {
            fft_size,
            window_buf: vec![0.0; fft_size],
            write_pos: 0,
            input_buf,
            spectrum_buf,
            scratch,
            plan,
            window,
            smoothed: vec![0.0; fft_size / 2],
        })
    }

    /// FFT window size.
    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins produced (`fft_size / 2`).
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Append conditioned samples, dropping the oldest ones.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let tail = if samples.len() > self.fft_size {
            &samples[samples.len() - self.fft_size..]
        } else {
            samples
        };
        for &s in tail {
            self.window_buf[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Render the current window into `frame`.
    ///
    /// `frame` must have been allocated with `AudioFrame::new(self.fft_size())`.
    pub fn render(&mut self, frame: &mut AudioFrame) {
        debug_assert_eq!(frame.fft_size(), self.fft_size, "frame/analyser size mismatch");

        for (i, (slot, windowed)) in frame
            .time_domain
            .iter_mut()
            .zip(self.input_buf.iter_mut())
            .enumerate()
        {
            let s = self.window_buf[(self.write_pos + i) % self.fft_size];
            *slot = sample_to_byte(s);
            *windowed = s * self.window[i];
        }

        if self
            .plan
            .process_with_scratch(&mut self.input_buf, &mut self.spectrum_buf, &mut self.scratch)
            .is_err()
        {
            frame.frequency_domain.fill(0);
            return;
        }

        let norm = 1.0 / self.fft_size as f32;
        for ((byte, smoothed), c) in frame
            .frequency_domain
            .iter_mut()
            .zip(self.smoothed.iter_mut())
            .zip(self.spectrum_buf.iter())
        {
            let magnitude = c.norm() * norm;
            *smoothed =
                SMOOTHING_TIME_CONSTANT * *smoothed + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
            *byte = magnitude_to_byte(*smoothed);
        }
    }

    /// Forget samples and smoothing history (new session).
    pub fn reset(&mut self) {
        self.window_buf.fill(0.0);
        self.smoothed.fill(0.0);
        self.write_pos = 0;
    }
}

/// Float sample [-1, 1] to analyser byte, 128 = silence.
///
/// # Example
/// ```
/// use tk_audio::analyser::sample_to_byte;
/// assert_eq!(sample_to_byte(0.0), 128);
/// assert_eq!(sample_to_byte(-1.0), 0);
/// assert_eq!(sample_to_byte(4.0), 255);
/// ```
#[inline]
#[must_use]
pub fn sample_to_byte(sample: f32) -> u8 {
    (128.0 * (1.0 + sample)).floor().clamp(0.0, 255.0) as u8
}

/// Linear magnitude to byte on the `[MIN_DECIBELS, MAX_DECIBELS]` scale.
#[inline]
#[must_use]
pub fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 / (MAX_DECIBELS - MIN_DECIBELS) * (db - MIN_DECIBELS);
    scaled.floor().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_sizes() {
        assert!(ByteAnalyser::new(1000).is_err());
        assert!(ByteAnalyser::new(64).is_err());
    }

    #[test]
    fn silence_renders_centered_and_empty() {
        let mut analyser = ByteAnalyser::new(512).unwrap();
        let mut frame = AudioFrame::new(512);
        analyser.push_samples(&[0.0; 512]);
        analyser.render(&mut frame);
        assert!(frame.time_domain.iter().all(|&b| b == 128));
        assert!(frame.frequency_domain.iter().all(|&b| b == 0));
    }

    #[test]
    fn window_keeps_newest_samples_in_order() {
        let mut analyser = ByteAnalyser::new(256).unwrap();
        let mut frame = AudioFrame::new(256);
        analyser.push_samples(&[0.5; 300]);
        analyser.push_samples(&[-0.5; 56]);
        analyser.render(&mut frame);
        assert_eq!(frame.time_domain[0], 192);
        assert_eq!(frame.time_domain[199], 192);
        assert_eq!(frame.time_domain[200], 64);
        assert_eq!(frame.time_domain[255], 64);
    }

    #[test]
    fn tone_lands_in_its_bin() {
        let fs = 44100.0;
        let size = 2048;
        let mut analyser = ByteAnalyser::new(size).unwrap();
        let mut frame = AudioFrame::new(size);
        // Exactly on bin 40
        let freq = 40.0 * fs / size as f32;
        let tone: Vec<f32> = (0..size)
            .map(|i| 0.1 * (2.0 * std::f32::consts::PI * freq * i as f32 / fs).sin())
            .collect();
        analyser.push_samples(&tone);
        analyser.render(&mut frame);

        let loudest = frame
            .frequency_domain
            .iter()
            .enumerate()
            .max_by_key(|(_, b)| **b)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(loudest, 40);
        assert!(frame.frequency_domain[40] > 200);
        assert!(frame.frequency_domain[400] < frame.frequency_domain[40] / 2);
    }

    #[test]
    fn magnitude_scale_bounds() {
        assert_eq!(magnitude_to_byte(0.0), 0);
        assert_eq!(magnitude_to_byte(1e-6), 0);
        assert_eq!(magnitude_to_byte(1.0), 255);
    }
}
