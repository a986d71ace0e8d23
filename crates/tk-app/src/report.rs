use std::fmt::Write as _;

use tk_audio::StatsSnapshot;
use tk_core::frame::Measurement;

/// En-tête du tableau des mesures.
#[must_use]
pub fn table_header() -> String {
    format!(
        "{:>4} | {:<8} | {:>13} | {:>10} | {:>9}",
        "#", "Time", "Interval (ms)", "Rate (bpm)", "Deviation"
    )
}

/// Une ligne du tableau. `index` commence à 1.
#[must_use]
pub fn table_row(index: usize, m: &Measurement) -> String {
    format!(
        "{:>4} | {:<8} | {:>13.1} | {:>10.2} | {:>+8.2}%",
        index, m.sequence_time, m.interval_ms, m.frequency_bpm, m.deviation_pct
    )
}

/// Résumé de fin d'enregistrement.
#[must_use]
pub fn summary(snapshot: &StatsSnapshot) -> String {
    let mut out = String::new();
    let Some(stats) = &snapshot.session else {
        out.push_str("Aucune mesure : pas assez de pulses détectés.");
        return out;
    };

    let _ = writeln!(out, "Mesures        : {}", stats.count);
    let _ = writeln!(out, "Intervalle moy.: {:.1} ms ({:.2} bpm)", stats.mean_ms, stats.mean_bpm());
    let _ = writeln!(out, "Écart-type     : {:.2} ms", stats.std_dev_ms);
    let _ = writeln!(out, "Min / Max      : {:.1} / {:.1} ms", stats.min_ms, stats.max_ms);
    let _ = writeln!(out, "Déviation max  : {:.2} %", stats.max_deviation_pct);
    let _ = write!(out, "Stabilité      : {}", stats.stability);
    if snapshot.discarded > 0 || snapshot.artifacts > 0 {
        let _ = write!(
            out,
            "\nRejets         : {} intervalle(s), {} transitoire(s)",
            snapshot.discarded, snapshot.artifacts
        );
    }
    out
}
