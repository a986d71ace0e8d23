use std::collections::VecDeque;
use std::fmt;

use tk_core::clock::format_hms;
use tk_core::config::StatsConfig;
use tk_core::frame::{ArtifactKind, Measurement, NoiseArtifact, Pulse};

/// Qualitative timing stability, from the largest deviation to the mean.
///
/// Each band includes its lower cut point: exactly 5 % is `Fair`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stability {
    /// Max deviation below 2 %.
    Excellent,
    /// 2 % to below 5 %.
    Good,
    /// 5 % to below 10 %.
    Fair,
    /// 10 % and above.
    Poor,
}

impl Stability {
    /// Cut points between bands, in percent.
    pub const GOOD_FROM_PCT: f64 = 2.0;
    pub const FAIR_FROM_PCT: f64 = 5.0;
    pub const POOR_FROM_PCT: f64 = 10.0;

    /// Classify a max deviation percentage.
    ///
    /// # Example
    /// ```
    /// use tk_audio::stats::Stability;
    /// assert_eq!(Stability::classify(1.99), Stability::Excellent);
    /// assert_eq!(Stability::classify(2.0), Stability::Good);
    /// assert_eq!(Stability::classify(5.0), Stability::Fair);
    /// assert_eq!(Stability::classify(10.0), Stability::Poor);
    /// ```
    #[must_use]
    pub fn classify(max_deviation_pct: f64) -> Self {
        if max_deviation_pct >= Self::POOR_FROM_PCT {
            Self::Poor
        } else if max_deviation_pct >= Self::FAIR_FROM_PCT {
            Self::Fair
        } else if max_deviation_pct >= Self::GOOD_FROM_PCT {
            Self::Good
        } else {
            Self::Excellent
        }
    }

    /// Quality label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }

    /// Drift label.
    #[must_use]
    pub fn drift_label(self) -> &'static str {
        match self {
            Self::Excellent => "Consistent",
            Self::Good => "Minor drift",
            Self::Fair => "Significant",
            Self::Poor => "Unstable",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.drift_label())
    }
}

/// Aggregate statistics over a set of intervals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntervalStats {
    /// Number of intervals.
    pub count: usize,
    /// Mean interval, ms.
    pub mean_ms: f64,
    /// Population standard deviation (divide by N), ms.
    pub std_dev_ms: f64,
    /// Shortest interval, ms.
    pub min_ms: f64,
    /// Longest interval, ms.
    pub max_ms: f64,
    /// `max(|max - mean|, |min - mean|) / mean * 100`.
    pub max_deviation_pct: f64,
    /// Classification of `max_deviation_pct`.
    pub stability: Stability,
}

impl IntervalStats {
    /// Compute statistics over `intervals`; `None` if empty or mean not positive.
    ///
    /// # Example
    /// ```
    /// use tk_audio::stats::{IntervalStats, Stability};
    /// let stats = IntervalStats::from_intervals([480.0, 525.0, 495.0, 500.0]).unwrap();
    /// assert_eq!(stats.mean_ms, 500.0);
    /// assert_eq!(stats.max_deviation_pct, 5.0);
    /// assert_eq!(stats.stability, Stability::Fair);
    /// ```
    #[must_use]
    pub fn from_intervals<I>(intervals: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
        I::IntoIter: Clone,
    {
        let iter = intervals.into_iter();

        let (count, sum, min_ms, max_ms) = iter.clone().fold(
            (0usize, 0.0f64, f64::INFINITY, f64::NEG_INFINITY),
            |(n, sum, lo, hi), v| (n + 1, sum + v, lo.min(v), hi.max(v)),
        );
        if count == 0 {
            return None;
        }

        let mean_ms = sum / count as f64;
        let variance = iter.map(|v| (v - mean_ms).powi(2)).sum::<f64>() / count as f64;
        Self::from_moments(count, mean_ms, variance, min_ms, max_ms)
    }

    fn from_moments(count: usize, mean_ms: f64, variance: f64, min_ms: f64, max_ms: f64) -> Option<Self> {
        if count == 0 || mean_ms <= 0.0 {
            return None;
        }
        let max_dev = (max_ms - mean_ms).abs().max((min_ms - mean_ms).abs());
        let max_deviation_pct = max_dev * 100.0 / mean_ms;

        Some(Self {
            count,
            mean_ms,
            std_dev_ms: variance.max(0.0).sqrt(),
            min_ms,
            max_ms,
            max_deviation_pct,
            stability: Stability::classify(max_deviation_pct),
        })
    }

    /// Mean beat rate, beats per minute.
    #[must_use]
    pub fn mean_bpm(&self) -> f64 {
        60_000.0 / self.mean_ms
    }
}

/// Session-long aggregates in constant memory (Welford).
///
/// # Example
/// ```
/// use tk_audio::stats::RunningStats;
///
/// let mut running = RunningStats::default();
/// for v in [400.0, 600.0] {
///     running.push(v);
/// }
/// let stats = running.stats().unwrap();
/// assert_eq!(stats.mean_ms, 500.0);
/// assert_eq!(stats.std_dev_ms, 100.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    /// Sum of squared distances to the running mean.
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add one interval, in ms.
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Number of intervals seen.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Aggregates so far; `None` before the first interval.
    #[must_use]
    pub fn stats(&self) -> Option<IntervalStats> {
        if self.count == 0 {
            return None;
        }
        let variance = self.m2 / self.count as f64;
        IntervalStats::from_moments(self.count, self.mean, variance, self.min, self.max)
    }
}

/// What the tracker did with a pulse.
#[derive(Clone, Debug, PartialEq)]
pub enum IntervalOutcome {
    /// First pulse of the session: reference only.
    First,
    /// Interval below the plausibility floor; reference unchanged.
    Discarded(NoiseArtifact),
    /// Accepted interval.
    Measured(Measurement),
}

/// Read-only view published to collaborators while a session runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatsSnapshot {
    /// Statistics over every accepted interval of the session.
    pub session: Option<IntervalStats>,
    /// Statistics over the rolling window.
    pub window: Option<IntervalStats>,
    /// Accepted intervals.
    pub measurements: usize,
    /// Intervals discarded by the plausibility floor.
    pub discarded: usize,
    /// Transients rejected by the refractory gate.
    pub artifacts: u64,
}

/// Interval / statistics engine.
///
/// Turns the ordered pulse stream into measurements: interval, beat rate and
/// deviation from the rolling average.
///
/// # Example
/// ```
/// use tk_audio::stats::{IntervalOutcome, IntervalTracker};
/// use tk_core::config::StatsConfig;
/// use tk_core::frame::Pulse;
///
/// let mut tracker = IntervalTracker::new(&StatsConfig::default());
/// let first = tracker.push(&Pulse { timestamp_seconds: 0.0, magnitude: 0.5 });
/// assert_eq!(first, IntervalOutcome::First);
/// match tracker.push(&Pulse { timestamp_seconds: 0.5, magnitude: 0.5 }) {
///     IntervalOutcome::Measured(m) => assert!((m.frequency_bpm - 120.0).abs() < 1e-9),
///     other => panic!("{other:?}"),
/// }
/// ```
pub struct IntervalTracker {
    min_plausible_interval_ms: f64,
    capacity: usize,
    last_pulse_s: Option<f64>,
    window: VecDeque<f64>,
    session: RunningStats,
    discarded: usize,
}

impl IntervalTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new(config: &StatsConfig) -> Self {
        let capacity = config.rolling_window.max(1);
        Self {
            min_plausible_interval_ms: config.min_plausible_interval_ms,
            capacity,
            last_pulse_s: None,
            window: VecDeque::with_capacity(capacity + 1),
            session: RunningStats::default(),
            discarded: 0,
        }
    }

    /// Forget everything (new recording).
    pub fn reset(&mut self) {
        self.last_pulse_s = None;
        self.window.clear();
        self.session = RunningStats::default();
        self.discarded = 0;
    }

    /// Feed the next pulse.
    pub fn push(&mut self, pulse: &Pulse) -> IntervalOutcome {
        let Some(last) = self.last_pulse_s else {
            self.last_pulse_s = Some(pulse.timestamp_seconds);
            return IntervalOutcome::First;
        };

        let interval_ms = (pulse.timestamp_seconds - last) * 1000.0;
        if interval_ms < self.min_plausible_interval_ms || interval_ms <= 0.0 {
            self.discarded += 1;
            log::debug!(
                "Intervalle {interval_ms:.1}ms < {:.0}ms, ignoré",
                self.min_plausible_interval_ms
            );
            return IntervalOutcome::Discarded(NoiseArtifact {
                kind: ArtifactKind::Implausible,
                timestamp_seconds: pulse.timestamp_seconds,
                magnitude: pulse.magnitude,
                since_last_ms: interval_ms,
            });
        }

        self.window.push_back(interval_ms);
        if self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.session.push(interval_ms);

        let avg = self.window.iter().sum::<f64>() / self.window.len() as f64;
        let measurement = Measurement {
            sequence_time: format_hms(pulse.timestamp_seconds),
            interval_ms,
            frequency_bpm: 60_000.0 / interval_ms,
            deviation_pct: (interval_ms - avg) / avg * 100.0,
            timestamp_seconds: pulse.timestamp_seconds,
        };
        self.last_pulse_s = Some(pulse.timestamp_seconds);
        IntervalOutcome::Measured(measurement)
    }

    /// Timestamp of the last accepted pulse, in seconds.
    #[must_use]
    pub fn last_pulse_seconds(&self) -> Option<f64> {
        self.last_pulse_s
    }

    /// Intervals currently in the rolling window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }

    /// Accepted intervals so far.
    #[must_use]
    pub fn measurement_count(&self) -> usize {
        self.session.count()
    }

    /// Intervals discarded by the plausibility floor.
    #[must_use]
    pub fn discarded_count(&self) -> usize {
        self.discarded
    }

    /// Statistics over the whole session.
    #[must_use]
    pub fn session_stats(&self) -> Option<IntervalStats> {
        self.session.stats()
    }

    /// Statistics over the rolling window.
    #[must_use]
    pub fn window_stats(&self) -> Option<IntervalStats> {
        IntervalStats::from_intervals(self.window.iter().copied())
    }
}
