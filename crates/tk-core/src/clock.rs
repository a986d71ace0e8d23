use std::time::Instant;

/// Horloge monotone d'une session d'enregistrement.
///
/// Toutes les dates du pipeline (pulses, mesures) sont relatives à `start()`.
///
/// # Example
/// ```
/// use tk_core::clock::SessionClock;
/// let clock = SessionClock::start();
/// assert!(clock.elapsed_ms() >= 0.0);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    /// Démarre l'horloge maintenant.
    #[must_use]
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Millisecondes écoulées depuis le démarrage.
    #[inline]
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Formate une durée en secondes sous la forme `HH:MM:SS`.
///
/// Les fractions de seconde sont tronquées, les valeurs négatives ramenées à zéro.
///
/// # Example
/// ```
/// use tk_core::clock::format_hms;
/// assert_eq!(format_hms(3725.9), "01:02:05");
/// ```
#[must_use]
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hms_pads_each_field() {
        assert_eq!(format_hms(0.0), "00:00:00");
        assert_eq!(format_hms(59.99), "00:00:59");
        assert_eq!(format_hms(60.0), "00:01:00");
        assert_eq!(format_hms(36_000.0), "10:00:00");
    }

    #[test]
    fn hms_rejects_garbage() {
        assert_eq!(format_hms(-3.0), "00:00:00");
        assert_eq!(format_hms(f64::NAN), "00:00:00");
    }

    #[test]
    fn clock_is_monotonic() {
        let clock = SessionClock::start();
        let a = clock.elapsed_ms();
        let b = clock.elapsed_ms();
        assert!(b >= a);
    }
}
