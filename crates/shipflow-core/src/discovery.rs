//! 設定ファイルの探索
//!
//! 以下の優先順位で ship.kdl を探します:
//! 1. 明示的に指定されたパス（--file）
//! 2. 環境変数 SHIPFLOW_CONFIG
//! 3. カレントディレクトリから上に向かって:
//!    - ship.kdl
//!    - .shipflow/ship.kdl
//! 4. ユーザー設定ディレクトリ（~/.config/shipflow/ship.kdl）

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 設定ファイル名
pub const CONFIG_FILE_NAME: &str = "ship.kdl";

/// 設定ファイルを指定する環境変数
pub const CONFIG_ENV_VAR: &str = "SHIPFLOW_CONFIG";

/// 設定ファイルを探す
#[tracing::instrument]
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    // 1. 明示指定
    if let Some(path) = explicit {
        return resolve_candidate(path)
            .ok_or_else(|| ConfigError::ConfigNotFound(path.to_path_buf()));
    }

    // 2. 環境変数
    if let Ok(value) = std::env::var(CONFIG_ENV_VAR)
        && !value.is_empty()
    {
        let path = PathBuf::from(&value);
        debug!(env_config = %value, "Checking SHIPFLOW_CONFIG");
        return resolve_candidate(&path).ok_or(ConfigError::ConfigNotFound(path));
    }

    // 3. カレントディレクトリから上に向かって探す
    let start_dir = std::env::current_dir()?;
    if let Some(found) = find_config_file_from(&start_dir) {
        return Ok(found);
    }

    // 4. ユーザー設定ディレクトリ
    if let Some(config_dir) = dirs::config_dir() {
        let user_config = config_dir.join("shipflow").join(CONFIG_FILE_NAME);
        debug!(checking = %user_config.display(), "Looking for user config");
        if user_config.is_file() {
            info!(config = %user_config.display(), "Found config in user config directory");
            return Ok(user_config);
        }
    }

    warn!(start_dir = %start_dir.display(), "Config file not found");
    Err(ConfigError::ConfigNotFound(start_dir))
}

/// 指定ディレクトリから上に向かって設定ファイルを探す
pub fn find_config_file_from(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let config_file = current.join(CONFIG_FILE_NAME);
        debug!(checking = %current.display(), "Looking for ship.kdl");
        if config_file.is_file() {
            info!(config = %config_file.display(), "Found config file");
            return Some(config_file);
        }

        let hidden_config = current.join(".shipflow").join(CONFIG_FILE_NAME);
        if hidden_config.is_file() {
            info!(config = %hidden_config.display(), "Found config file (.shipflow/ship.kdl)");
            return Some(hidden_config);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// ファイルならそのまま、ディレクトリなら中の ship.kdl
fn resolve_candidate(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        Some(path.to_path_buf())
    } else if path.is_dir() {
        let inner = path.join(CONFIG_FILE_NAME);
        inner.is_file().then_some(inner)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_find_from_nested_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(CONFIG_FILE_NAME), "project \"demo\"").unwrap();
        let nested = root.join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let found = find_config_file_from(&nested).unwrap();
        assert_eq!(found, root.join(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_find_hidden_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".shipflow")).unwrap();
        fs::write(root.join(".shipflow/ship.kdl"), "project \"demo\"").unwrap();

        let found = find_config_file_from(root).unwrap();
        assert!(found.ends_with(".shipflow/ship.kdl"));
    }

    #[test]
    fn test_plain_file_wins_over_hidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(CONFIG_FILE_NAME), "").unwrap();
        fs::create_dir_all(root.join(".shipflow")).unwrap();
        fs::write(root.join(".shipflow/ship.kdl"), "").unwrap();

        let found = find_config_file_from(root).unwrap();
        assert_eq!(found, root.join(CONFIG_FILE_NAME));
    }

    #[test]
    #[serial]
    fn test_explicit_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("custom.kdl");
        fs::write(&file, "").unwrap();

        temp_env::with_var(CONFIG_ENV_VAR, None::<&str>, || {
            assert_eq!(find_config_file(Some(&file)).unwrap(), file);

            let missing = temp_dir.path().join("missing.kdl");
            let err = find_config_file(Some(&missing)).unwrap_err();
            assert!(matches!(err, ConfigError::ConfigNotFound(p) if p == missing));
        });
    }

    #[test]
    #[serial]
    fn test_env_var_overrides_search() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("from-env.kdl");
        fs::write(&file, "").unwrap();

        temp_env::with_var(CONFIG_ENV_VAR, Some(file.to_str().unwrap()), || {
            assert_eq!(find_config_file(None).unwrap(), file);
        });
    }

    #[test]
    #[serial]
    fn test_env_var_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "").unwrap();

        temp_env::with_var(CONFIG_ENV_VAR, Some(temp_dir.path().to_str().unwrap()), || {
            assert_eq!(
                find_config_file(None).unwrap(),
                temp_dir.path().join(CONFIG_FILE_NAME)
            );
        });
    }

    #[test]
    #[serial]
    fn test_env_var_missing_file_is_error() {
        temp_env::with_var(CONFIG_ENV_VAR, Some("/nonexistent/shipflow/ship.kdl"), || {
            assert!(matches!(
                find_config_file(None),
                Err(ConfigError::ConfigNotFound(_))
            ));
        });
    }
}
