use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use arc_swap::ArcSwap;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tk_core::config::DetectorConfig;

/// Surveille le fichier config et pousse la section `[detector]` dans la session.
///
/// Retourne le Watcher (doit rester vivant tant que la session tourne).
/// Les réglages d'acquisition ne sont relus qu'au prochain `start`.
///
/// # Errors
/// Returns an error if the watcher cannot be created or the path cannot be watched.
pub fn spawn_config_watcher(
    config_path: &Path,
    detector: &Arc<ArcSwap<DetectorConfig>>,
) -> Result<impl Watcher + use<>> {
    let detector = Arc::clone(detector);
    let path: PathBuf = config_path.to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res
            && matches!(event.kind, EventKind::Modify(_))
        {
            match reload_detector(&path, &detector) {
                Ok(()) => log::info!("Réglages du détecteur rechargés depuis {}", path.display()),
                // On garde les anciens réglages. Pas de panic.
                Err(e) => log::warn!("Erreur de rechargement config : {e:#}"),
            }
        }
    })?;

    watcher.watch(config_path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Reload `path` and store its detector section.
///
/// # Errors
/// Returns the load error; `detector` is left untouched.
pub fn reload_detector(path: &Path, detector: &ArcSwap<DetectorConfig>) -> Result<()> {
    let config = tk_core::config::load_config(path)?;
    detector.store(Arc::new(config.detector));
    Ok(())
}
