//! Hot reload of router settings from the config file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{parse_config, ConfigError};
use crate::config::schema::RouterConfig;

/// Last applied `[router]` section.
///
/// A single save usually fires several notify events, so only a section
/// that differs from the one in force is forwarded.
struct RouterReload {
    current: RouterConfig,
}

impl RouterReload {
    fn new(current: RouterConfig) -> Self {
        Self { current }
    }

    /// Validate the whole file and return the router section if it changed.
    fn next(&mut self, content: &str) -> Result<Option<RouterConfig>, ConfigError> {
        let router = parse_config(content)?.router;
        if router == self.current {
            return Ok(None);
        }
        self.current = router.clone();
        Ok(Some(router))
    }
}

/// Watches the config file and sends each valid, changed `[router]`
/// section.
///
/// Invalid files are logged and skipped; the running settings stay in
/// place.
pub struct ConfigWatcher {
    path: PathBuf,
    reload: RouterReload,
    update_tx: mpsc::UnboundedSender<RouterConfig>,
}

impl ConfigWatcher {
    /// `current` is the router section already in force.
    pub fn new(
        path: &Path,
        current: RouterConfig,
    ) -> (Self, mpsc::UnboundedReceiver<RouterConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                reload: RouterReload::new(current),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            mut reload,
            update_tx,
        } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let outcome = fs::read_to_string(&path)
                        .map_err(ConfigError::from)
                        .and_then(|content| reload.next(&content));
                    match outcome {
                        Ok(Some(router)) => {
                            tracing::info!(
                                path = %path.display(),
                                max_retries = router.max_retries,
                                "Router config changed, applying"
                            );
                            let _ = update_tx.send(router);
                        }
                        Ok(None) => {
                            tracing::debug!(path = %path.display(), "Router config unchanged");
                        }
                        Err(e) => {
                            tracing::error!(
                                path = %path.display(),
                                error = %e,
                                "Rejected config reload, keeping current router settings"
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watched, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?watched, "Config watcher started");
        Ok(watcher)
    }
}
