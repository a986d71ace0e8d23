use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Multiplier applied to the user-facing threshold before comparison.
pub const THRESHOLD_SOFTENING: f32 = 0.7;
/// Amplification applied with noise reduction at zero.
pub const BASE_GAIN: f32 = 2.0;
/// Share of the base gain removed at full noise reduction.
pub const MAX_GAIN_REDUCTION: f32 = 0.5;
/// Default refractory window between two pulses, in ms.
pub const DEFAULT_MIN_INTER_ARRIVAL_MS: f64 = 100.0;
/// The refractory window never goes below this, adaptive or not.
pub const HARD_MIN_INTER_ARRIVAL_MS: f64 = 50.0;

/// Réglages du détecteur, modifiables en direct.
///
/// Lu comme un snapshot immuable à chaque frame : un cycle d'analyse voit
/// toujours une paire (seuil, réduction de bruit) cohérente.
///
/// # Example
/// ```
/// use tk_core::config::DetectorConfig;
/// let config = DetectorConfig::new(0.3, 0.4);
/// assert!((config.gain() - 1.6).abs() < 1e-6);
/// assert!((config.effective_threshold() - 0.21).abs() < 1e-6);
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DetectorConfig {
    /// Seuil de détection [0.0, 1.0].
    pub detection_threshold: f32,
    /// Réduction de bruit [0.0, 1.0]. Diminue le gain d'entrée jusqu'à 50 %.
    pub noise_reduction: f32,
    /// Fenêtre réfractaire entre deux pulses, en ms (plancher 50).
    pub min_inter_arrival_ms: f64,
    /// Adapter la fenêtre réfractaire à 0.6 × l'intervalle précédent.
    pub adaptive_refractory: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detection_threshold: 0.2,
            noise_reduction: 0.2,
            min_inter_arrival_ms: DEFAULT_MIN_INTER_ARRIVAL_MS,
            adaptive_refractory: false,
        }
    }
}

impl DetectorConfig {
    /// Build a config from the two live levels, clamped to [0, 1].
    #[must_use]
    pub fn new(detection_threshold: f32, noise_reduction: f32) -> Self {
        Self::default().with_levels(detection_threshold, noise_reduction)
    }

    /// Copy of `self` with new levels, clamped to [0, 1].
    ///
    /// # Example
    /// ```
    /// use tk_core::config::DetectorConfig;
    /// let config = DetectorConfig::default().with_levels(1.7, -0.2);
    /// assert_eq!(config.detection_threshold, 1.0);
    /// assert_eq!(config.noise_reduction, 0.0);
    /// ```
    #[must_use]
    pub fn with_levels(&self, detection_threshold: f32, noise_reduction: f32) -> Self {
        let mut next = Self {
            detection_threshold,
            noise_reduction,
            ..self.clone()
        };
        next.clamp_all();
        next
    }

    /// Threshold the effective amplitude must exceed.
    #[inline]
    #[must_use]
    pub fn effective_threshold(&self) -> f32 {
        self.detection_threshold * THRESHOLD_SOFTENING
    }

    /// Input gain derived from the noise reduction level.
    #[inline]
    #[must_use]
    pub fn gain(&self) -> f32 {
        BASE_GAIN * (1.0 - MAX_GAIN_REDUCTION * self.noise_reduction)
    }

    /// Configured refractory window, never below the hard floor.
    #[inline]
    #[must_use]
    pub fn refractory_floor_ms(&self) -> f64 {
        self.min_inter_arrival_ms.max(HARD_MIN_INTER_ARRIVAL_MS)
    }

    /// Clamp all numeric fields to their valid ranges. NaN falls back to the default.
    pub fn clamp_all(&mut self) {
        let defaults = Self::default();
        self.detection_threshold =
            clamp_or(self.detection_threshold, 0.0, 1.0, defaults.detection_threshold);
        self.noise_reduction = clamp_or(self.noise_reduction, 0.0, 1.0, defaults.noise_reduction);
        self.min_inter_arrival_ms = if self.min_inter_arrival_ms.is_nan() {
            defaults.min_inter_arrival_ms
        } else {
            self.min_inter_arrival_ms.clamp(HARD_MIN_INTER_ARRIVAL_MS, 5000.0)
        };
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// Réglages du moteur de statistiques.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StatsConfig {
    /// Intervalles plus courts que ce plancher (ms) sont rejetés comme bruit.
    pub min_plausible_interval_ms: f64,
    /// Nombre d'intervalles de la moyenne glissante.
    pub rolling_window: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            min_plausible_interval_ms: 100.0,
            rolling_window: 10,
        }
    }
}

/// Réglages de l'acquisition et de la visualisation (pris en compte au `start`).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    /// Taille FFT (puissance de 2, 256..=8192).
    pub fft_size: usize,
    /// Fréquence de polling de la boucle d'analyse, en Hz.
    pub poll_hz: u32,
    /// Activer le filtre passe-bande.
    pub bandpass_enabled: bool,
    /// Fréquence centrale du passe-bande, en Hz.
    pub bandpass_center_hz: f32,
    /// Facteur Q du passe-bande (bas = large).
    pub bandpass_q: f32,
    /// Profondeur de l'historique spectral (frames).
    pub history_depth: usize,
    /// Publier la grille combinée plutôt que les bins bruts.
    pub combined_spectrogram: bool,
    /// Silence (ms) avant de signaler un flux bloqué.
    pub stall_timeout_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            poll_hz: 60,
            bandpass_enabled: true,
            bandpass_center_hz: 800.0,
            bandpass_q: 0.5,
            history_depth: 15,
            combined_spectrogram: true,
            stall_timeout_ms: 2000,
        }
    }
}

impl AcquisitionConfig {
    /// Smallest supported FFT size.
    pub const MIN_FFT_SIZE: usize = 256;
    /// Largest supported FFT size.
    pub const MAX_FFT_SIZE: usize = 8192;

    /// Check that `fft_size` is usable by the analyser.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidFftSize` if the size is out of range or not a power of two.
    pub fn validate_fft_size(size: usize) -> Result<usize, CoreError> {
        if size.is_power_of_two() && (Self::MIN_FFT_SIZE..=Self::MAX_FFT_SIZE).contains(&size) {
            Ok(size)
        } else {
            Err(CoreError::InvalidFftSize { size })
        }
    }

    /// Clamp all fields to their valid ranges.
    pub fn clamp_all(&mut self) {
        self.fft_size = self
            .fft_size
            .clamp(Self::MIN_FFT_SIZE, Self::MAX_FFT_SIZE)
            .next_power_of_two();
        self.poll_hz = self.poll_hz.clamp(15, 120);
        self.bandpass_center_hz = self.bandpass_center_hz.clamp(20.0, 8000.0);
        self.bandpass_q = self.bandpass_q.clamp(0.1, 10.0);
        self.history_depth = self.history_depth.clamp(1, 64);
        self.stall_timeout_ms = self.stall_timeout_ms.clamp(100, 60_000);
    }
}

/// Configuration complète, sérialisable en TOML.
///
/// # Example
/// ```
/// use tk_core::config::AppConfig;
/// let config = AppConfig::default();
/// assert_eq!(config.stats.rolling_window, 10);
/// assert_eq!(config.acquisition.fft_size, 2048);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    /// Live detector settings.
    pub detector: DetectorConfig,
    /// Interval statistics settings.
    pub stats: StatsConfig,
    /// Capture and visualization settings.
    pub acquisition: AcquisitionConfig,
}

impl AppConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        self.detector.clamp_all();
        self.acquisition.clamp_all();
        self.stats.min_plausible_interval_ms = if self.stats.min_plausible_interval_ms.is_nan() {
            StatsConfig::default().min_plausible_interval_ms
        } else {
            self.stats.min_plausible_interval_ms.clamp(1.0, 5000.0)
        };
        self.stats.rolling_window = self.stats.rolling_window.clamp(1, 100);
    }

    /// Reject values clamping cannot repair (NaN, infinities).
    ///
    /// # Errors
    /// Returns `CoreError::Config` naming the first non-finite field.
    pub fn validate(&self) -> Result<(), CoreError> {
        let fields: [(&str, f64); 6] = [
            ("detector.detection_threshold", f64::from(self.detector.detection_threshold)),
            ("detector.noise_reduction", f64::from(self.detector.noise_reduction)),
            ("detector.min_inter_arrival_ms", self.detector.min_inter_arrival_ms),
            ("stats.min_plausible_interval_ms", self.stats.min_plausible_interval_ms),
            ("acquisition.bandpass_center_hz", f64::from(self.acquisition.bandpass_center_hz)),
            ("acquisition.bandpass_q", f64::from(self.acquisition.bandpass_q)),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(CoreError::Config(format!("{name} n'est pas un nombre fini")));
            }
        }
        Ok(())
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    detector: Option<DetectorSection>,
    stats: Option<StatsSection>,
    acquisition: Option<AcquisitionSection>,
}

/// Detector section of the TOML config, all fields optional for partial override.
#[derive(Deserialize)]
struct DetectorSection {
    detection_threshold: Option<f32>,
    noise_reduction: Option<f32>,
    min_inter_arrival_ms: Option<f64>,
    adaptive_refractory: Option<bool>,
}

/// Stats section of the TOML config, all fields optional.
#[derive(Deserialize)]
struct StatsSection {
    min_plausible_interval_ms: Option<f64>,
    rolling_window: Option<usize>,
}

/// Acquisition section of the TOML config, all fields optional.
#[derive(Deserialize)]
struct AcquisitionSection {
    fft_size: Option<usize>,
    poll_hz: Option<u32>,
    bandpass_enabled: Option<bool>,
    bandpass_center_hz: Option<f32>,
    bandpass_q: Option<f32>,
    history_depth: Option<usize>,
    combined_spectrogram: Option<bool>,
    stall_timeout_ms: Option<u64>,
}

/// Parse un document TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the document is not valid TOML or holds non-finite numbers.
///
/// # Example
/// ```
/// use tk_core::config::parse_config;
/// let config = parse_config("[detector]\ndetection_threshold = 0.35\n").unwrap();
/// assert!((config.detector.detection_threshold - 0.35).abs() < 1e-6);
/// assert_eq!(config.stats.rolling_window, 10);
/// ```
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;

    let mut config = AppConfig::default();

    if let Some(d) = file.detector {
        if let Some(v) = d.detection_threshold {
            config.detector.detection_threshold = v;
        }
        if let Some(v) = d.noise_reduction {
            config.detector.noise_reduction = v;
        }
        if let Some(v) = d.min_inter_arrival_ms {
            config.detector.min_inter_arrival_ms = v;
        }
        if let Some(v) = d.adaptive_refractory {
            config.detector.adaptive_refractory = v;
        }
    }

    if let Some(s) = file.stats {
        if let Some(v) = s.min_plausible_interval_ms {
            config.stats.min_plausible_interval_ms = v;
        }
        if let Some(v) = s.rolling_window {
            config.stats.rolling_window = v;
        }
    }

    if let Some(a) = file.acquisition {
        if let Some(v) = a.fft_size {
            config.acquisition.fft_size = v;
        }
        if let Some(v) = a.poll_hz {
            config.acquisition.poll_hz = v;
        }
        if let Some(v) = a.bandpass_enabled {
            config.acquisition.bandpass_enabled = v;
        }
        if let Some(v) = a.bandpass_center_hz {
            config.acquisition.bandpass_center_hz = v;
        }
        if let Some(v) = a.bandpass_q {
            config.acquisition.bandpass_q = v;
        }
        if let Some(v) = a.history_depth {
            config.acquisition.history_depth = v;
        }
        if let Some(v) = a.combined_spectrogram {
            config.acquisition.combined_spectrogram = v;
        }
        if let Some(v) = a.stall_timeout_ms {
            config.acquisition.stall_timeout_ms = v;
        }
    }

    config.validate()?;
    config.clamp_all();
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file does not exist, cannot be read, or cannot be parsed.
///
/// # Example
/// ```no_run
/// use tk_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(CoreError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    let config =
        parse_config(&content).with_context(|| format!("Config invalide : {}", path.display()))?;
    log::debug!("Config chargée depuis {}", path.display());
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn gain_follows_noise_reduction() {
        assert!((DetectorConfig::new(0.3, 0.0).gain() - 2.0).abs() < 1e-6);
        assert!((DetectorConfig::new(0.3, 0.4).gain() - 1.6).abs() < 1e-6);
        assert!((DetectorConfig::new(0.3, 1.0).gain() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn levels_are_clamped_not_rejected() {
        let config = DetectorConfig::new(-4.0, 12.0);
        assert_eq!(config.detection_threshold, 0.0);
        assert_eq!(config.noise_reduction, 1.0);

        let config = DetectorConfig::new(f32::NAN, 0.5);
        assert!((config.detection_threshold - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn refractory_never_below_hard_floor() {
        let mut config = DetectorConfig {
            min_inter_arrival_ms: 10.0,
            ..DetectorConfig::default()
        };
        assert!((config.refractory_floor_ms() - HARD_MIN_INTER_ARRIVAL_MS).abs() < f64::EPSILON);
        config.clamp_all();
        assert!((config.min_inter_arrival_ms - HARD_MIN_INTER_ARRIVAL_MS).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config(
            "[stats]\nrolling_window = 4\n\n[acquisition]\nbandpass_enabled = false\n",
        )
        .unwrap();
        assert_eq!(config.stats.rolling_window, 4);
        assert!(!config.acquisition.bandpass_enabled);
        assert_eq!(config.detector, DetectorConfig::default());
        assert_eq!(config.acquisition.fft_size, 2048);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = parse_config(
            "[detector]\ndetection_threshold = 3.0\n\n[acquisition]\nfft_size = 1000\npoll_hz = 1000\n",
        )
        .unwrap();
        assert_eq!(config.detector.detection_threshold, 1.0);
        assert_eq!(config.acquisition.fft_size, 1024);
        assert_eq!(config.acquisition.poll_hz, 120);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let err = parse_config("[detector]\nnoise_reduction = nan\n").unwrap_err();
        assert!(format!("{err:#}").contains("detector.noise_reduction"));
    }

    #[test]
    fn nan_plausibility_floor_falls_back_to_default() {
        let mut config = AppConfig::default();
        config.stats.min_plausible_interval_ms = f64::NAN;
        config.clamp_all();
        assert!((config.stats.min_plausible_interval_ms - 100.0).abs() < f64::EPSILON);

        config.stats.min_plausible_interval_ms = 0.0;
        config.clamp_all();
        assert!((config.stats.min_plausible_interval_ms - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fft_size_validation() {
        assert!(AcquisitionConfig::validate_fft_size(2048).is_ok());
        assert!(AcquisitionConfig::validate_fft_size(3000).is_err());
        assert!(AcquisitionConfig::validate_fft_size(128).is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[detector]\nadaptive_refractory = true").unwrap();
        let config = load_config(file.path()).unwrap();
        assert!(config.detector.adaptive_refractory);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_config(Path::new("/nonexistent/ticktock.toml")).unwrap_err();
        assert!(err.downcast_ref::<CoreError>().is_some());
    }

    #[test]
    fn shipped_default_file_matches_defaults() {
        let config = parse_config(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
