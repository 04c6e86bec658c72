use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::location::LocationToken;

pub const POSITION_KEY_PREFIX: &str = "reader-position:";
const APP_NAME: &str = "readmark";
const POSITIONS_FILENAME: &str = "positions.json";

/// Storage key for a document. Titles are the only identity, so two books
/// sharing a title share a position.
pub fn position_key(title: &str) -> String {
    format!("{POSITION_KEY_PREFIX}{title}")
}

/// Keyed storage of last-known reading positions.
///
/// Implementations are moved onto the persistence thread, hence `Send`.
pub trait PositionStore: Send {
    fn load(&self, key: &str) -> anyhow::Result<Option<LocationToken>>;

    fn store(&mut self, key: &str, location: &LocationToken) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    pub location: LocationToken,
    pub last_read: chrono::DateTime<chrono::Utc>,
}

/// JSON file of position records, one per key.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonPositionStore {
    positions: HashMap<String, PositionRecord>,
    #[serde(skip)]
    file_path: Option<PathBuf>,
}

impl JsonPositionStore {
    pub fn ephemeral() -> Self {
        Self {
            positions: HashMap::new(),
            file_path: None,
        }
    }

    pub fn with_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            positions: HashMap::new(),
            file_path: Some(file_path.into()),
        }
    }

    /// Default location under the user's data directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(APP_NAME).join(POSITIONS_FILENAME))
    }

    pub fn load_or_ephemeral(file_path: Option<&Path>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load positions from {}: {:#}", path.display(), e);
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &Path) -> anyhow::Result<Self> {
        if file_path.exists() {
            let content = fs::read_to_string(file_path)
                .with_context(|| format!("reading {}", file_path.display()))?;
            let mut store: Self = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", file_path.display()))?;
            store.file_path = Some(file_path.to_path_buf());
            Ok(store)
        } else {
            Ok(Self::with_file(file_path))
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Most recently read document, keyed by its display title.
    pub fn most_recent(&self) -> Option<(&str, &PositionRecord)> {
        self.positions
            .iter()
            .max_by_key(|(_, record)| record.last_read)
            .map(|(key, record)| {
                (
                    key.strip_prefix(POSITION_KEY_PREFIX).unwrap_or(key),
                    record,
                )
            })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl PositionStore for JsonPositionStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<LocationToken>> {
        Ok(self.positions.get(key).map(|record| record.location.clone()))
    }

    fn store(&mut self, key: &str, location: &LocationToken) -> anyhow::Result<()> {
        self.positions.insert(
            key.to_string(),
            PositionRecord {
                location: location.clone(),
                last_read: chrono::Utc::now(),
            },
        );
        self.save()
    }
}
