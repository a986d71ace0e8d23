#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tk_audio::{AudioError, ChannelListener, Session, SessionEvent};
use tk_core::config::AppConfig;
use tk_core::SampleSource;

const RATE: u32 = 44100;
/// 500 ms between beats.
const BEAT_SAMPLES: u64 = 22050;

/// Synthetic clock paced on the wall clock, like a live input.
struct ClockSource {
    started: Instant,
    produced: u64,
    closed: Arc<AtomicBool>,
}

impl ClockSource {
    fn new(closed: Arc<AtomicBool>) -> Self {
        Self {
            started: Instant::now(),
            produced: 0,
            closed,
        }
    }

    fn sample_at(index: u64) -> f32 {
        let offset = index % BEAT_SAMPLES;
        if offset >= 441 {
            return 0.0;
        }
        let t = offset as f32 / RATE as f32;
        0.5 * (-t / 0.003).exp() * (2.0 * std::f32::consts::PI * 800.0 * t).sin()
    }
}

impl SampleSource for ClockSource {
    fn read_samples(&mut self, out: &mut Vec<f32>) -> usize {
        out.clear();
        let due = (self.started.elapsed().as_secs_f64() * f64::from(RATE)) as u64;
        while self.produced < due {
            out.push(Self::sample_at(self.produced));
            self.produced += 1;
        }
        out.len()
    }

    fn sample_rate(&self) -> u32 {
        RATE
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[test]
fn live_session_measures_paced_clock() {
    let mut session = Session::new(AppConfig::default());
    let (listener, events) = ChannelListener::bounded(64);
    session.add_listener(Box::new(listener));

    let closed = Arc::new(AtomicBool::new(false));
    session
        .start_with_source(Box::new(ClockSource::new(Arc::clone(&closed))))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut intervals = Vec::new();
    while intervals.len() < 3 && Instant::now() < deadline {
        if let Ok(SessionEvent::Measurement(m)) = events.recv_timeout(Duration::from_millis(200)) {
            intervals.push(m.interval_ms);
        }
    }
    session.stop();

    assert!(closed.load(Ordering::SeqCst));
    assert!(intervals.len() >= 3, "measurements: {intervals:?}");
    // wall-clock timestamps: one poll period of jitter either way
    for interval in &intervals {
        assert!((interval - 500.0).abs() < 60.0, "{intervals:?}");
    }
    let stats = session.session_stats().unwrap();
    assert!(stats.count >= 3);
}

#[test]
fn start_twice_then_dispose() {
    let mut session = Session::new(AppConfig::default());
    session
        .start_with_source(Box::new(ClockSource::new(Arc::default())))
        .unwrap();
    let second = session.start_with_source(Box::new(ClockSource::new(Arc::default())));
    assert!(matches!(second, Err(AudioError::AlreadyRunning)));
    session.dispose();
    session.dispose();
    assert!(!session.is_running());
}
