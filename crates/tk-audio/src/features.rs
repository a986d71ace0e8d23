use tk_core::frame::{BYTE_CENTER, FrameFeatures};

/// Weight of RMS in the blended amplitude score.
pub const RMS_WEIGHT: f32 = 0.3;
/// Weight of the peak in the blended amplitude score.
pub const PEAK_WEIGHT: f32 = 0.7;

/// Extract amplitude features from analyser time-domain bytes.
///
/// Bytes are normalized from `[0, 255]` to `[-1, 1]` around 128. The blend
/// favours the peak because tick/tock transients are short.
///
/// # Example
/// ```
/// use tk_audio::features::extract_features;
///
/// let silence = vec![128u8; 1024];
/// let features = extract_features(&silence);
/// assert!(features.rms.abs() < f32::EPSILON);
/// assert!(features.effective_amplitude.abs() < f32::EPSILON);
/// ```
#[must_use]
pub fn extract_features(time_domain: &[u8]) -> FrameFeatures {
    if time_domain.is_empty() {
        return FrameFeatures::default();
    }

    let center = f32::from(BYTE_CENTER);
    let (sum_sq, peak) = time_domain.iter().fold((0.0f32, 0.0f32), |(sum, peak), &b| {
        let amplitude = (f32::from(b) - center) / center;
        (sum + amplitude * amplitude, peak.max(amplitude.abs()))
    });

    let rms = (sum_sq / time_domain.len() as f32).sqrt();

    FrameFeatures {
        rms,
        peak,
        effective_amplitude: RMS_WEIGHT * rms + PEAK_WEIGHT * peak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame_is_silent() {
        assert_eq!(extract_features(&[]), FrameFeatures::default());
    }

    #[test]
    fn square_wave_has_equal_rms_and_peak() {
        let frame: Vec<u8> = (0..512).map(|i| if i % 2 == 0 { 192 } else { 64 }).collect();
        let f = extract_features(&frame);
        assert!((f.rms - 0.5).abs() < 1e-6);
        assert!((f.peak - 0.5).abs() < 1e-6);
        assert!((f.effective_amplitude - 0.5).abs() < 1e-6);
    }

    #[test]
    fn single_click_is_peak_dominated() {
        let mut frame = vec![128u8; 2048];
        frame[1000] = 0;
        let f = extract_features(&frame);
        assert!((f.peak - 1.0).abs() < 1e-6);
        assert!(f.rms < 0.05);
        // 0.3 * rms + 0.7 * 1.0
        assert!((f.effective_amplitude - (0.7 + 0.3 * f.rms)).abs() < 1e-6);
    }
}
