use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tk_core::config::{AppConfig, DetectorConfig};
use tk_core::{EventListener, SampleSource, SessionClock};

use crate::capture::AudioCapture;
use crate::error::AudioError;
use crate::pipeline::AnalysisPipeline;
use crate::stats::{IntervalStats, StatsSnapshot};

type Listeners = Arc<Mutex<Vec<Box<dyn EventListener>>>>;

/// A recording session: owns the input, the analysis thread and the state.
///
/// Lifecycle: `new` → `start` → `stop` (→ `start` again) → `dispose`.
/// Detector settings are read as one snapshot per frame and may be changed
/// at any time, from any thread, through `configure` or `config_handle`.
///
/// # Example
/// ```no_run
/// use tk_audio::{ChannelListener, Session, SessionEvent};
/// use tk_core::AppConfig;
///
/// let mut session = Session::new(AppConfig::default());
/// let (listener, events) = ChannelListener::bounded(64);
/// session.add_listener(Box::new(listener));
/// session.start("").unwrap();
/// while let Ok(event) = events.recv() {
///     if let SessionEvent::Measurement(m) = event {
///         println!("{} {:.1}ms", m.sequence_time, m.interval_ms);
///     }
/// }
/// ```
pub struct Session {
    settings: AppConfig,
    config: Arc<ArcSwap<DetectorConfig>>,
    stats: Arc<ArcSwap<StatsSnapshot>>,
    running: Arc<AtomicBool>,
    listeners: Listeners,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    /// Create an idle session. Out-of-range settings are clamped.
    #[must_use]
    pub fn new(mut settings: AppConfig) -> Self {
        settings.clamp_all();
        let config = Arc::new(ArcSwap::from_pointee(settings.detector.clone()));
        Self {
            settings,
            config,
            stats: Arc::new(ArcSwap::from_pointee(StatsSnapshot::default())),
            running: Arc::new(AtomicBool::new(false)),
            listeners: Arc::new(Mutex::new(Vec::new())),
            worker: None,
        }
    }

    /// Register a listener. Takes effect on the next frame, even while running.
    pub fn add_listener(&mut self, listener: Box<dyn EventListener>) {
        lock(&self.listeners).push(listener);
    }

    /// Set threshold and noise reduction, each clamped to [0, 1].
    ///
    /// Visible to the analysis loop from the next frame.
    pub fn configure(&self, detection_threshold: f32, noise_reduction: f32) {
        self.config
            .rcu(|current| current.with_levels(detection_threshold, noise_reduction));
        log::debug!(
            "Réglages : seuil {:.2}, réduction de bruit {:.2}",
            detection_threshold,
            noise_reduction
        );
    }

    /// Replace the whole detector section (clamped).
    pub fn configure_detector(&self, mut detector: DetectorConfig) {
        detector.clamp_all();
        self.config.store(Arc::new(detector));
    }

    /// Current detector settings.
    #[must_use]
    pub fn config(&self) -> DetectorConfig {
        DetectorConfig::clone(&self.config.load())
    }

    /// Shared handle on the live detector settings (hot reload, UI threads).
    #[must_use]
    pub fn config_handle(&self) -> Arc<ArcSwap<DetectorConfig>> {
        Arc::clone(&self.config)
    }

    /// Input gain derived from the current noise reduction level.
    #[must_use]
    pub fn effective_gain(&self) -> f32 {
        self.config.load().gain()
    }

    /// `true` between a successful `start` and `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Open `device` (`""` for the default input) and start analysing.
    ///
    /// # Errors
    /// `AudioError::AlreadyRunning` if a session is active,
    /// `AudioError::DeviceUnavailable` if the input cannot be opened.
    pub fn start(&mut self, device: &str) -> Result<(), AudioError> {
        if self.is_running() {
            return Err(AudioError::AlreadyRunning);
        }
        let capture = AudioCapture::open(device)?;
        self.start_with_source(Box::new(capture))
    }

    /// Start analysing samples from an arbitrary source.
    ///
    /// Statistics from the previous recording are cleared.
    ///
    /// # Errors
    /// `AudioError::AlreadyRunning` if a session is active,
    /// `AudioError::Config` if the acquisition settings are unusable,
    /// `AudioError::StreamError` if the analysis thread cannot be spawned.
    pub fn start_with_source(&mut self, source: Box<dyn SampleSource>) -> Result<(), AudioError> {
        if self.is_running() {
            return Err(AudioError::AlreadyRunning);
        }
        // Previous worker already told to stop; reap it.
        self.join_worker();

        let mut pipeline = AnalysisPipeline::new(&self.settings, source.sample_rate())?;
        pipeline.arm();
        self.stats.store(Arc::new(StatsSnapshot::default()));

        let ctx = LoopContext {
            config: Arc::clone(&self.config),
            stats: Arc::clone(&self.stats),
            running: Arc::clone(&self.running),
            listeners: Arc::clone(&self.listeners),
            poll_period: Duration::from_secs_f64(1.0 / f64::from(self.settings.acquisition.poll_hz.max(1))),
            stall_timeout: Duration::from_millis(self.settings.acquisition.stall_timeout_ms),
        };

        self.running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name("tk-analysis".to_string())
            .spawn(move || run_analysis_loop(source, pipeline, &ctx));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                log::info!("Session démarrée");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(AudioError::StreamError(format!(
                    "thread d'analyse impossible à lancer : {e}"
                )))
            }
        }
    }

    /// Stop analysing and release the input. Idempotent.
    ///
    /// Returns once the analysis thread has exited: no event is delivered
    /// after `stop` returns.
    pub fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        self.join_worker();
        if was_running {
            log::info!("Session arrêtée");
        }
    }

    /// Stop and drop every listener. The session can still be restarted.
    pub fn dispose(&mut self) {
        self.stop();
        lock(&self.listeners).clear();
    }

    /// Latest statistics published by the analysis loop.
    #[must_use]
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::clone(&self.stats.load())
    }

    /// Statistics over every accepted interval of the current recording.
    #[must_use]
    pub fn session_stats(&self) -> Option<IntervalStats> {
        self.stats.load().session
    }

    /// Statistics over the rolling window.
    #[must_use]
    pub fn window_stats(&self) -> Option<IntervalStats> {
        self.stats.load().window
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            log::warn!("Le thread d'analyse a paniqué");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LoopContext {
    config: Arc<ArcSwap<DetectorConfig>>,
    stats: Arc<ArcSwap<StatsSnapshot>>,
    running: Arc<AtomicBool>,
    listeners: Listeners,
    poll_period: Duration,
    stall_timeout: Duration,
}

/// Clears the running flag when the loop exits, unwinding included.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Core loop: one cycle per poll period, only when new samples arrived.
fn run_analysis_loop(mut source: Box<dyn SampleSource>, mut pipeline: AnalysisPipeline, ctx: &LoopContext) {
    let _running = RunningGuard(&ctx.running);
    let clock = SessionClock::start();
    let mut samples: Vec<f32> = Vec::with_capacity(8192);
    let mut last_samples_at = Instant::now();
    let mut stalled = false;

    while ctx.running.load(Ordering::Acquire) {
        let cycle_start = Instant::now();

        if source.read_samples(&mut samples) > 0 {
            if stalled {
                log::info!("Flux audio rétabli");
                stalled = false;
            }
            last_samples_at = cycle_start;

            let config = ctx.config.load();
            let now_ms = clock.elapsed_ms();
            let output = {
                let mut listeners = lock(&ctx.listeners);
                pipeline.run_cycle(&samples, &config, now_ms, &mut listeners)
            };
            if output.stats_changed {
                ctx.stats.store(Arc::new(pipeline.stats_snapshot()));
            }
        } else {
            let silent_for = cycle_start.duration_since(last_samples_at);
            if !stalled && silent_for >= ctx.stall_timeout {
                stalled = true;
                log::warn!("Aucun échantillon depuis {}ms, flux bloqué ?", silent_for.as_millis());
                for listener in lock(&ctx.listeners).iter_mut() {
                    listener.on_stream_stalled(silent_for);
                }
            }
        }

        let elapsed = cycle_start.elapsed();
        if elapsed < ctx.poll_period {
            thread::sleep(ctx.poll_period - elapsed);
        }
    }

    pipeline.disarm();
    source.close();
    log::debug!("Boucle d'analyse terminée");
}

fn lock(listeners: &Listeners) -> std::sync::MutexGuard<'_, Vec<Box<dyn EventListener>>> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}
