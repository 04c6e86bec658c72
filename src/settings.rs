use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::notes::NoteOptions;
use crate::position_bridge::DEFAULT_STORAGE_READ_TIMEOUT;
use crate::reference::{DEFAULT_LINK_ACTION, DEFAULT_LINK_SCHEME, LinkFormat};
use crate::selection_toolbar::DEFAULT_TOOLBAR_OFFSET;
use crate::theme::FontScale;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "readmark";

/// How the publication flows on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// One page at a time
    #[default]
    Paginated,
    /// Continuous vertical scroll
    Scrolled,
}

impl LayoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutMode::Paginated => "Paginated",
            LayoutMode::Scrolled => "Scrolled",
        }
    }
}

impl std::str::FromStr for LayoutMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "paginated" => Ok(LayoutMode::Paginated),
            "scrolled" => Ok(LayoutMode::Scrolled),
            other => Err(format!("unknown layout {other:?}, expected paginated or scrolled")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub font_scale: FontScale,

    #[serde(default)]
    pub layout: LayoutMode,

    #[serde(default = "default_link_scheme")]
    pub link_scheme: String,

    #[serde(default = "default_link_action")]
    pub link_action: String,

    #[serde(default = "default_toolbar_offset")]
    pub toolbar_offset: f64,

    #[serde(default = "default_storage_read_timeout_ms")]
    pub storage_read_timeout_ms: u64,

    /// Folder for new notes when `use_same_folder` is off
    #[serde(default)]
    pub note_folder: String,

    #[serde(default = "default_true")]
    pub use_same_folder: bool,

    #[serde(default = "default_note_tags")]
    pub note_tags: String,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_link_scheme() -> String {
    DEFAULT_LINK_SCHEME.to_string()
}

fn default_link_action() -> String {
    DEFAULT_LINK_ACTION.to_string()
}

fn default_toolbar_offset() -> f64 {
    DEFAULT_TOOLBAR_OFFSET
}

fn default_storage_read_timeout_ms() -> u64 {
    DEFAULT_STORAGE_READ_TIMEOUT.as_millis() as u64
}

fn default_note_tags() -> String {
    "notes/booknotes".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            font_scale: FontScale::default(),
            layout: LayoutMode::default(),
            link_scheme: default_link_scheme(),
            link_action: default_link_action(),
            toolbar_offset: default_toolbar_offset(),
            storage_read_timeout_ms: default_storage_read_timeout_ms(),
            note_folder: String::new(),
            use_same_folder: true,
            note_tags: default_note_tags(),
        }
    }
}

impl Settings {
    pub fn link_format(&self) -> LinkFormat {
        LinkFormat::new(&self.link_scheme, &self.link_action)
    }

    pub fn storage_read_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_read_timeout_ms)
    }

    pub fn note_options(&self) -> NoteOptions {
        NoteOptions {
            folder: self.note_folder.clone(),
            use_same_folder: self.use_same_folder,
            tags: self.note_tags.clone(),
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));
static SETTINGS_PATH: LazyLock<RwLock<Option<PathBuf>>> = LazyLock::new(|| RwLock::new(None));

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

fn active_config_path() -> Option<PathBuf> {
    let remembered = SETTINGS_PATH.read().ok().and_then(|p| p.clone());
    remembered.or_else(preferred_config_path)
}

pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    load_settings_from_path(&path);
}

/// Load settings from an explicit file, creating it with defaults when missing.
/// Later saves go back to the same file.
pub fn load_settings_from_path(path: &Path) {
    if let Ok(mut remembered) = SETTINGS_PATH.write() {
        *remembered = Some(path.to_path_buf());
    }

    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(mut global) = SETTINGS.write() {
            *global = Settings::default();
            save_settings_to_file(&global, path);
        }
        return;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings() {
    let Some(path) = active_config_path() else {
        warn!("Could not determine config directory, cannot save settings");
        return;
    };

    if let Ok(settings) = SETTINGS.read() {
        save_settings_to_file(&settings, &path);
    }
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# readmark settings
# ============================================================================
# font_scale: 80-180 (percent)
# layout: paginated | scrolled
# link_scheme / link_action: jump links look like
#   <link_scheme>://<link_action>?file=...&cfi=...

"#;

// Public API for accessing/modifying settings

pub fn current() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn get_font_scale() -> FontScale {
    SETTINGS.read().map(|s| s.font_scale).unwrap_or_default()
}

pub fn set_font_scale(scale: FontScale) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.font_scale = scale;
    }
    save_settings();
}

pub fn get_layout() -> LayoutMode {
    SETTINGS.read().map(|s| s.layout).unwrap_or_default()
}

pub fn set_layout(layout: LayoutMode) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.layout = layout;
    }
    save_settings();
}

pub fn link_format() -> LinkFormat {
    SETTINGS
        .read()
        .map(|s| s.link_format())
        .unwrap_or_default()
}

pub fn note_options() -> NoteOptions {
    SETTINGS
        .read()
        .map(|s| s.note_options())
        .unwrap_or_else(|_| Settings::default().note_options())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readmark").join("config.yaml");

        load_settings_from_path(&path);

        assert!(path.exists());
        assert_eq!(get_font_scale(), FontScale::default());
        assert_eq!(link_format(), LinkFormat::default());
    }

    #[test]
    #[serial]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "font_scale: 500\nlayout: scrolled\n").unwrap();

        load_settings_from_path(&path);

        assert_eq!(get_font_scale().percent(), 180);
        assert_eq!(get_layout(), LayoutMode::Scrolled);
        assert_eq!(current().storage_read_timeout(), DEFAULT_STORAGE_READ_TIMEOUT);
        assert!(note_options().use_same_folder);
    }

    #[test]
    #[serial]
    fn changes_are_written_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        load_settings_from_path(&path);

        set_font_scale(FontScale::new(140));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# ==="));
        let reread: Settings = serde_yaml::from_str(&content).unwrap();
        assert_eq!(reread.font_scale.percent(), 140);
    }

    #[test]
    fn layout_names_parse_case_insensitively() {
        assert_eq!("Scrolled".parse::<LayoutMode>(), Ok(LayoutMode::Scrolled));
        assert!("spread".parse::<LayoutMode>().is_err());
    }

    #[test]
    #[serial]
    fn old_version_is_migrated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 0\n").unwrap();

        load_settings_from_path(&path);

        assert_eq!(current().version, CURRENT_VERSION);
        let reread: Settings = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reread.version, CURRENT_VERSION);
    }
}
