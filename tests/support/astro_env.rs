use std::{
    path::PathBuf,
    sync::{Mutex, OnceLock},
};

use astrowatch::app_dirs::CONFIG_HOME_ENV;
use astrowatch::session::DISABLE_KEYRING_ENV;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Points the app root at a temp dir and keeps tokens out of the OS keyring.
pub struct AstroEnvGuard {
    previous: Vec<(&'static str, Option<String>)>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl AstroEnvGuard {
    pub fn set_config_home(path: PathBuf) -> Self {
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let previous = [CONFIG_HOME_ENV, DISABLE_KEYRING_ENV]
            .into_iter()
            .map(|key| (key, std::env::var(key).ok()))
            .collect();
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        unsafe {
            std::env::set_var(CONFIG_HOME_ENV, path);
            std::env::set_var(DISABLE_KEYRING_ENV, "1");
        }
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for AstroEnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..) {
            // SAFETY: tests run under a global lock to prevent concurrent env mutations.
            unsafe {
                match value {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}
