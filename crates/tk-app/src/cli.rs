use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tk_core::config::AppConfig;

/// ticktock : mesure en direct de la marche d'une horloge mécanique.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Périphérique d'entrée (nom exact). Vide : entrée par défaut.
    #[arg(short, long, default_value = "")]
    pub device: String,

    /// Lister les périphériques d'entrée et quitter.
    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    /// Seuil de détection [0.0, 1.0].
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Réduction de bruit [0.0, 1.0].
    #[arg(short, long)]
    pub noise_reduction: Option<f32>,

    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Durée d'enregistrement en secondes. Défaut : jusqu'à Ctrl-C.
    #[arg(long)]
    pub duration: Option<u64>,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Désactiver le filtre passe-bande.
    #[arg(long, default_value_t = false)]
    pub no_filter: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(threshold) = self.threshold {
            config.detector.detection_threshold = threshold;
        }
        if let Some(noise_reduction) = self.noise_reduction {
            config.detector.noise_reduction = noise_reduction;
        }
        if self.no_filter {
            config.acquisition.bandpass_enabled = false;
        }
        config.clamp_all();
    }

    /// Recording limit, if any.
    #[must_use]
    pub fn duration_limit(&self) -> Option<Duration> {
        self.duration.map(Duration::from_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["ticktock"]).unwrap();
        assert_eq!(cli.device, "");
        assert_eq!(cli.log_level, "warn");
        assert_eq!(cli.config, PathBuf::from("config/default.toml"));
        assert!(cli.duration_limit().is_none());
        assert!(!cli.list_devices);
    }

    #[test]
    fn overrides_are_clamped() {
        let cli = Cli::try_parse_from([
            "ticktock",
            "--threshold",
            "1.5",
            "--noise-reduction",
            "0.4",
            "--no-filter",
            "--duration",
            "30",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert!((config.detector.detection_threshold - 1.0).abs() < f32::EPSILON);
        assert!((config.detector.noise_reduction - 0.4).abs() < f32::EPSILON);
        assert!(!config.acquisition.bandpass_enabled);
        assert_eq!(cli.duration_limit(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn rejects_non_numeric_threshold() {
        assert!(Cli::try_parse_from(["ticktock", "--threshold", "haut"]).is_err());
    }
}
