use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pagefix_core::{SelectorSet, TunerConfig};
use pagefix_logging::pagefix_info;
use serde::Deserialize;

/// Contents of a RON settings file. Every field is optional; anything not
/// set keeps its built-in default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub config: TunerConfig,
    pub selectors: SelectorSet,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = ron::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    pagefix_info!("Loaded settings from {:?}", path);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagefix_core::BannerAction;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pagefix.ron");
        fs::write(
            &path,
            "(config: (banner_action: Hide, code_blocks: (max_height: \"50vh\")), selectors: (cookie_banner: \"#consent\"))",
        )
        .unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.config.banner_action, BannerAction::Hide);
        assert_eq!(settings.config.code_blocks.max_height, "50vh");
        assert!(settings.config.smooth_scroll);
        assert_eq!(settings.selectors.cookie_banner, "#consent");
        assert_eq!(settings.selectors.message_item, ".ms-chat-turn");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.ron");
        fs::write(&path, "(config: (smooth_scroll: maybe))").unwrap();
        assert!(matches!(
            load_settings(&path),
            Err(SettingsError::Parse { .. })
        ));
    }
}
