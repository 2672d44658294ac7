//! The chosen UI theme, persisted in the settings database.

use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use chatty_shared::constants::{DEFAULT_THEME, THEME_KEY};
use chatty_store::Database;

use crate::error::ClientError;

pub struct ThemeStore {
    db: Mutex<Database>,
    current: watch::Sender<String>,
}

impl ThemeStore {
    /// Load the stored theme, or the default when none was ever saved.
    ///
    /// A read failure is logged and treated as "nothing saved".
    pub fn load(db: Database) -> Self {
        let theme = match db.get_setting(THEME_KEY) {
            Ok(Some(theme)) => theme,
            Ok(None) => DEFAULT_THEME.to_string(),
            Err(e) => {
                warn!(error = %e, "failed to read theme, using default");
                DEFAULT_THEME.to_string()
            }
        };
        debug!(theme = %theme, "theme loaded");
        let (current, _) = watch::channel(theme);
        Self {
            db: Mutex::new(db),
            current,
        }
    }

    pub fn theme(&self) -> String {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.current.subscribe()
    }

    /// Switch to `theme` and write it through to the database.
    pub fn set_theme(&self, theme: &str) -> Result<(), ClientError> {
        let theme = theme.trim();
        {
            let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
            db.set_setting(THEME_KEY, theme)?;
        }
        self.current.send_replace(theme.to_string());
        debug!(theme = %theme, "theme changed");
        Ok(())
    }
}
