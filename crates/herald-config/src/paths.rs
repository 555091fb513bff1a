//! File system paths.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Runtime directory name under the home directory.
const BASE_DIR_NAME: &str = ".herald";

/// Manages file system paths for herald.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.herald)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.herald`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.herald).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.herald/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the logs directory (~/.herald/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.herald/logs/herald.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("herald.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn paths_layout_under_base_dir() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/herald-test"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/herald-test/config.json"));
        assert_eq!(paths.logs_dir(), PathBuf::from("/tmp/herald-test/logs"));
        assert_eq!(
            paths.log_file(),
            PathBuf::from("/tmp/herald-test/logs/herald.jsonl")
        );
    }

    #[test]
    fn ensure_dirs_creates_logs_dir() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("nested"));
        paths.ensure_dirs().unwrap();
        assert!(paths.logs_dir().is_dir());
    }

    #[test]
    fn default_base_dir_is_dot_herald() {
        if let Ok(paths) = Paths::new() {
            assert!(paths.base_dir().ends_with(BASE_DIR_NAME));
        }
    }
}
