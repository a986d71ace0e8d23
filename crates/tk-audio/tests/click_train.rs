#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use tk_audio::Stability;
use tk_audio::pipeline::AnalysisPipeline;
use tk_core::config::AppConfig;
use tk_core::frame::{Measurement, NoiseArtifact, Pulse};
use tk_core::EventListener;

const RATE: u32 = 44100;
/// One poll period at 60 Hz.
const CHUNK: usize = 735;

#[derive(Default)]
struct Collected {
    pulses: Vec<Pulse>,
    measurements: Vec<Measurement>,
    artifacts: Vec<NoiseArtifact>,
}

struct Collector(Arc<Mutex<Collected>>);

impl EventListener for Collector {
    fn on_pulse(&mut self, pulse: &Pulse) {
        self.0.lock().unwrap().pulses.push(*pulse);
    }
    fn on_measurement(&mut self, measurement: &Measurement) {
        self.0.lock().unwrap().measurements.push(measurement.clone());
    }
    fn on_noise_artifact(&mut self, artifact: &NoiseArtifact) {
        self.0.lock().unwrap().artifacts.push(*artifact);
    }
}

/// Decaying 800 Hz burst, the shape of an escapement impact.
fn write_click(chunk: &mut [f32], amplitude: f32) {
    for (i, s) in chunk.iter_mut().enumerate().take(441) {
        let t = i as f32 / RATE as f32;
        *s = amplitude * (-t / 0.003).exp() * (2.0 * std::f32::consts::PI * 800.0 * t).sin();
    }
}

/// Feed a click at each chunk index in `clicks`, with time derived from the sample count.
fn run(config: &AppConfig, clicks: &[usize], total_chunks: usize) -> (Collected, AnalysisPipeline) {
    let mut pipeline = AnalysisPipeline::new(config, RATE).unwrap();
    pipeline.arm();
    let collected = Arc::new(Mutex::new(Collected::default()));
    let mut listeners: Vec<Box<dyn EventListener>> = vec![Box::new(Collector(Arc::clone(&collected)))];

    for index in 0..total_chunks {
        let mut chunk = [0.0f32; CHUNK];
        if clicks.contains(&index) {
            write_click(&mut chunk, 0.5);
        }
        let now_ms = ((index + 1) * CHUNK) as f64 * 1000.0 / f64::from(RATE);
        let _ = pipeline.run_cycle(&chunk, &config.detector, now_ms, &mut listeners);
    }

    drop(listeners);
    let collected = Arc::try_unwrap(collected)
        .ok()
        .unwrap()
        .into_inner()
        .unwrap();
    (collected, pipeline)
}

#[test]
fn regular_clock_is_excellent() {
    let config = AppConfig::default();
    // 500 ms = 30 chunks
    let clicks: Vec<usize> = (0..10).map(|k| k * 30).collect();
    let (collected, pipeline) = run(&config, &clicks, 10 * 30);

    assert_eq!(collected.pulses.len(), 10);
    assert_eq!(collected.measurements.len(), 9);
    for m in &collected.measurements {
        assert!((m.interval_ms - 500.0).abs() < 1e-6, "{m:?}");
        assert!((m.frequency_bpm - 120.0).abs() < 1e-6);
        assert!(m.deviation_pct.abs() < 1e-6);
    }
    assert_eq!(collected.measurements[0].sequence_time, "00:00:00");
    assert_eq!(collected.measurements[8].sequence_time, "00:00:04");

    let stats = pipeline.stats_snapshot().session.unwrap();
    assert_eq!(stats.count, 9);
    assert_eq!(stats.stability, Stability::Excellent);
    assert!((stats.mean_bpm() - 120.0).abs() < 1e-6);
}

#[test]
fn beat_error_is_reported_as_drift() {
    let config = AppConfig::default();
    // alternating 29 / 31 chunks: 483.3 ms / 516.7 ms
    let mut clicks = vec![0usize];
    for k in 0..9 {
        let step = if k % 2 == 0 { 29 } else { 31 };
        clicks.push(clicks[k] + step);
    }
    let total = clicks[9] + 30;
    let (collected, pipeline) = run(&config, &clicks, total);

    assert_eq!(collected.measurements.len(), 9);
    let stats = pipeline.stats_snapshot().session.unwrap();
    assert!(stats.max_deviation_pct > 2.0 && stats.max_deviation_pct < 5.0, "{stats:?}");
    assert_eq!(stats.stability, Stability::Good);
    assert!(stats.min_ms < stats.mean_ms && stats.mean_ms < stats.max_ms);
}

#[test]
fn ring_down_never_doubles_a_pulse() {
    let config = AppConfig::default();
    let clicks: Vec<usize> = (0..4).map(|k| k * 30).collect();
    let (collected, _) = run(&config, &clicks, 4 * 30);

    assert_eq!(collected.pulses.len(), 4);
    assert!(!collected.artifacts.is_empty());
    assert!(collected.artifacts.iter().all(|a| a.since_last_ms < 100.0));
}

#[test]
fn high_threshold_ignores_faint_clock() {
    let mut config = AppConfig::default();
    config.detector.detection_threshold = 1.0;
    config.detector.noise_reduction = 1.0;
    let clicks: Vec<usize> = (0..4).map(|k| k * 30).collect();
    let mut pipeline = AnalysisPipeline::new(&config, RATE).unwrap();
    pipeline.arm();
    let mut listeners: Vec<Box<dyn EventListener>> = Vec::new();

    let mut pulses = 0;
    for index in 0..(4 * 30) {
        let mut chunk = [0.0f32; CHUNK];
        if clicks.contains(&index) {
            write_click(&mut chunk, 0.2);
        }
        let now_ms = ((index + 1) * CHUNK) as f64 * 1000.0 / f64::from(RATE);
        if pipeline
            .run_cycle(&chunk, &config.detector, now_ms, &mut listeners)
            .pulse
            .is_some()
        {
            pulses += 1;
        }
    }
    assert_eq!(pulses, 0);
}
