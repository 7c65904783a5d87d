use crate::config::{Config, SuiteConfig};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// Config whose suites finish fast and pass on any machine that runs the tests.
pub(crate) fn quick_config() -> Config {
    let mut config = Config::default();
    config.suites.clear();
    for name in ["fmt", "build"] {
        config
            .suites
            .insert(name.to_string(), SuiteConfig::new("cargo --version"));
    }
    config.full_suites = vec!["fmt".to_string(), "build".to_string()];
    config.quick_suites = vec!["build".to_string()];
    config
}
