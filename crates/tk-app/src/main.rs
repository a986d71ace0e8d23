use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tk_audio::capture::{default_input_device_name, list_input_devices};
use tk_audio::{ChannelListener, Session, SessionEvent};
use tk_core::config::AppConfig;

pub mod cli;
pub mod hotreload;
pub mod report;

/// Capacité du canal d'événements vers le terminal.
const EVENT_CAPACITY: usize = 256;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Lister les entrées
    if cli.list_devices {
        return print_devices();
    }

    // 4. Charger la config + overrides CLI
    let mut config = resolve_config(&cli)?;
    cli.apply_overrides(&mut config);

    // 5. Session + listener canal
    let mut session = Session::new(config);
    let (listener, events) = ChannelListener::bounded(EVENT_CAPACITY);
    session.add_listener(Box::new(listener));

    // 6. Hot-reload de la section [detector]
    let _watcher = if cli.config.exists() {
        match hotreload::spawn_config_watcher(&cli.config, &session.config_handle()) {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!("Hot-reload indisponible : {e}");
                None
            }
        }
    } else {
        None
    };

    // 7. Ctrl-C
    let (shutdown_tx, shutdown_rx) = flume::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("Impossible d'installer le handler Ctrl-C")?;

    // 8. Démarrer
    let device_label = if cli.device.is_empty() {
        default_input_device_name().unwrap_or_else(|| "défaut".to_string())
    } else {
        cli.device.clone()
    };
    session
        .start(&cli.device)
        .with_context(|| format!("Démarrage de la capture sur '{device_label}'"))?;

    let gain = session.effective_gain();
    let detector = session.config();
    println!(
        "Écoute sur '{device_label}' (seuil {:.2}, réduction de bruit {:.2}, gain {gain:.2}). Ctrl-C pour arrêter.",
        detector.detection_threshold, detector.noise_reduction
    );
    println!("{}", report::table_header());

    // 9. Boucle principale
    run_event_loop(&events, &shutdown_rx, cli.duration_limit());

    // 10. Arrêt + résumé (TOUJOURS, même après Ctrl-C)
    session.stop();
    println!();
    println!("{}", report::summary(&session.stats_snapshot()));
    session.dispose();
    Ok(())
}

/// Print measurement rows until Ctrl-C or the duration limit.
fn run_event_loop(
    events: &flume::Receiver<SessionEvent>,
    shutdown: &flume::Receiver<()>,
    limit: Option<Duration>,
) {
    let started = Instant::now();
    let mut rows = 0usize;

    loop {
        if shutdown.try_recv().is_ok() {
            log::info!("Ctrl-C reçu");
            break;
        }
        if limit.is_some_and(|l| started.elapsed() >= l) {
            log::info!("Durée d'enregistrement atteinte");
            break;
        }

        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(SessionEvent::Measurement(m)) => {
                rows += 1;
                println!("{}", report::table_row(rows, &m));
            }
            Ok(SessionEvent::StreamStalled(silent_for)) => {
                eprintln!(
                    "Aucun signal depuis {:.1}s : vérifier le micro.",
                    silent_for.as_secs_f64()
                );
            }
            Ok(_) | Err(flume::RecvTimeoutError::Timeout) => {}
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn print_devices() -> Result<()> {
    let devices = list_input_devices().context("Énumération des entrées audio")?;
    let default = default_input_device_name();
    if devices.is_empty() {
        println!("Aucun périphérique d'entrée.");
    }
    for name in devices {
        let marker = if default.as_deref() == Some(name.as_str()) { '*' } else { ' ' };
        println!("{marker} {name}");
    }
    Ok(())
}

/// Resolve config: missing file falls back to the defaults.
fn resolve_config(cli: &cli::Cli) -> Result<AppConfig> {
    if cli.config.exists() {
        tk_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(AppConfig::default())
    }
}
